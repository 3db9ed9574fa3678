use swc_common::{Span, SyntaxContext};
use swc_ecma_ast::{Bool, Expr, Ident, Lit, MemberProp, Module, Null, Number, Str};
use swc_ecma_visit::{VisitMut, VisitMutWith};

/// Replacement value of one `--define:k=v` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum DefineValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    /// A bare identifier (`--define:global=window`); becomes an unbound
    /// reference at the substitution site.
    Ident(String),
}

impl DefineValue {
    /// Parses the right-hand side of a define: a JSON scalar, or an
    /// identifier name.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Null) => Ok(DefineValue::Null),
            Ok(serde_json::Value::Bool(b)) => Ok(DefineValue::Bool(b)),
            Ok(serde_json::Value::Number(n)) => n
                .as_f64()
                .map(DefineValue::Num)
                .ok_or_else(|| format!("define value out of range: {}", raw)),
            Ok(serde_json::Value::String(s)) => Ok(DefineValue::Str(s)),
            Ok(_) => Err(format!(
                "define value must be a JSON scalar or an identifier: {:?}",
                raw
            )),
            Err(_) => {
                let is_ident = !raw.is_empty()
                    && raw
                        .chars()
                        .enumerate()
                        .all(|(i, c)| c == '_' || c == '$' || if i == 0 { c.is_ascii_alphabetic() } else { c.is_ascii_alphanumeric() });
                if is_ident {
                    Ok(DefineValue::Ident(raw.to_string()))
                } else {
                    Err(format!("invalid define value: {:?}", raw))
                }
            }
        }
    }
}

/// Parsed `--define:` table: dotted paths to replacement values.
#[derive(Debug, Default, Clone)]
pub struct DefineMap {
    entries: Vec<(Vec<String>, DefineValue)>,
}

impl DefineMap {
    pub fn parse(pairs: &[(String, String)]) -> Result<Self, String> {
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let path: Vec<String> = key.split('.').map(|s| s.to_string()).collect();
            if path.iter().any(|seg| seg.is_empty()) {
                return Err(format!("invalid define key: {:?}", key));
            }
            entries.push((path, DefineValue::parse(value)?));
        }
        // longer (more specific) paths match first
        entries.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, path: &[String]) -> Option<&DefineValue> {
        self.entries
            .iter()
            .find(|(key, _)| key.as_slice() == path)
            .map(|(_, value)| value)
    }
}

/// Substitutes defined identifiers and dotted member chains, in place.
/// Runs right after parse, before scanning, so the scanner sees the
/// replaced values.
pub fn apply_defines(module: &mut Module, defines: &DefineMap, unresolved_ctxt: SyntaxContext) {
    if defines.is_empty() {
        return;
    }
    let mut visitor = DefineVisitor {
        defines,
        unresolved_ctxt,
    };
    module.visit_mut_with(&mut visitor);
}

struct DefineVisitor<'a> {
    defines: &'a DefineMap,
    unresolved_ctxt: SyntaxContext,
}

impl DefineVisitor<'_> {
    /// The dotted path of an expression rooted at an unbound identifier.
    fn dotted_path(&self, expr: &Expr, out: &mut Vec<String>) -> bool {
        match expr {
            Expr::Ident(ident) => {
                if ident.ctxt != self.unresolved_ctxt {
                    return false;
                }
                out.push(ident.sym.to_string());
                true
            }
            Expr::Member(member) => {
                if !self.dotted_path(&member.obj, out) {
                    return false;
                }
                match &member.prop {
                    MemberProp::Ident(prop) => {
                        out.push(prop.sym.to_string());
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn replacement(&self, value: &DefineValue, span: Span) -> Expr {
        match value {
            DefineValue::Null => Expr::Lit(Lit::Null(Null { span })),
            DefineValue::Bool(b) => Expr::Lit(Lit::Bool(Bool { span, value: *b })),
            DefineValue::Num(n) => Expr::Lit(Lit::Num(Number {
                span,
                value: *n,
                raw: None,
            })),
            DefineValue::Str(s) => Expr::Lit(Lit::Str(Str {
                span,
                value: s.as_str().into(),
                raw: None,
            })),
            DefineValue::Ident(name) => Expr::Ident(Ident {
                span,
                ctxt: self.unresolved_ctxt,
                sym: name.as_str().into(),
                optional: false,
            }),
        }
    }
}

impl VisitMut for DefineVisitor<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        let span = match expr {
            Expr::Ident(ident) => Some(ident.span),
            Expr::Member(member) => Some(member.span),
            _ => None,
        };
        if let Some(span) = span {
            let mut path = Vec::new();
            if self.dotted_path(expr, &mut path) {
                if let Some(value) = self.defines.lookup(&path) {
                    *expr = self.replacement(value, span);
                    return;
                }
            }
        }
        expr.visit_mut_children_with(self);
    }
}
