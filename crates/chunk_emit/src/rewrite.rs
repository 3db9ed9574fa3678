//! Per-statement AST rewriting, applied to a clone of each live item just
//! before printing: final symbol names, namespace property accesses that
//! collapsed to direct references, and `require()` / dynamic `import()`
//! calls redirected at the runtime.

use ahashmap::AHashMap;
use linker::{ImportTarget, LinkOutput, NsMember};
use module_graph::{ModuleGraph, ModuleId, ModuleRef, SymbolId, SymbolKind};
use swc_common::SyntaxContext;
use swc_ecma_ast::{
    AssignPat, BindingIdent, Callee, Expr, Ident, IdentName, KeyValuePatProp, KeyValueProp, Lit,
    MemberExpr, MemberProp, Number, ObjectPatProp, Pat, Prop, PropName, SeqExpr,
};
use swc_ecma_visit::{VisitMut, VisitMutWith};

use crate::runtime::RuntimeUsage;

pub struct Rewriter<'a> {
    pub graph: &'a ModuleGraph,
    pub link: &'a LinkOutput,
    pub names: &'a AHashMap<SymbolId, String>,
    pub module: ModuleId,
    /// Wrapped modules keep their own declarations function-scoped under
    /// their source names.
    pub inside_wrapper: bool,
    pub usage: &'a mut RuntimeUsage,
    /// `require()` / `import()` call spans to their import records.
    record_by_span: AHashMap<(u32, u32), usize>,
}

enum Replacement {
    Keep,
    Name(String),
    Member { object: String, prop: String },
}

impl<'a> Rewriter<'a> {
    pub fn new(
        graph: &'a ModuleGraph,
        link: &'a LinkOutput,
        names: &'a AHashMap<SymbolId, String>,
        module: ModuleId,
        inside_wrapper: bool,
        usage: &'a mut RuntimeUsage,
    ) -> Self {
        let record_by_span = graph
            .get(module)
            .imports
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_require || record.is_dynamic_import)
            .map(|(index, record)| ((record.span.lo.0, record.span.hi.0), index))
            .collect();
        Self {
            graph,
            link,
            names,
            module,
            inside_wrapper,
            usage,
            record_by_span,
        }
    }

    /// The emitted name for a symbol, following link redirects to the
    /// ground declaration.
    pub fn ground_name(&self, symbol: SymbolId) -> String {
        let mut current = symbol;
        // links are acyclic after import resolution; the bound is a backstop
        for _ in 0..=self.graph.len() {
            let sym = self.graph.get(current.module).symbols.get(current.index);
            match sym.link {
                Some(next) => current = next,
                None => break,
            }
        }
        match self.names.get(&current) {
            Some(name) => name.clone(),
            None => self
                .graph
                .get(current.module)
                .symbols
                .get(current.index)
                .name
                .clone(),
        }
    }

    fn replacement_for(&mut self, symbol: SymbolId) -> Replacement {
        let graph = self.graph;
        let link = self.link;
        let names = self.names;
        let sym = graph.get(symbol.module).symbols.get(symbol.index);

        if sym.kind == SymbolKind::ImportBinding {
            match link.import_targets.get(&symbol) {
                Some(ImportTarget::Symbol(target)) => {
                    return Replacement::Name(self.ground_name(*target));
                }
                Some(ImportTarget::RuntimeProp(target, prop)) => {
                    let interop = link.interop_symbol.get(&(symbol.module, *target)).copied();
                    if let Some(interop) = interop {
                        self.usage.use_import();
                        return Replacement::Member {
                            object: self.ground_name(SymbolId::new(symbol.module, interop)),
                            prop: prop.clone(),
                        };
                    }
                    return Replacement::Keep;
                }
                Some(ImportTarget::Namespace(target)) => {
                    if graph.get(*target).commonjs_markers {
                        // bound to `__import(id)` at the import site
                        return match names.get(&symbol) {
                            Some(name) => Replacement::Name(name.clone()),
                            None => Replacement::Keep,
                        };
                    }
                    if let Some(ns) = link.ns_symbol[*target as usize] {
                        return Replacement::Name(self.ground_name(SymbolId::new(*target, ns)));
                    }
                    return Replacement::Keep;
                }
                Some(ImportTarget::ExternalNamed { .. })
                | Some(ImportTarget::ExternalNamespace { .. }) => {
                    return match names.get(&symbol) {
                        Some(name) => Replacement::Name(name.clone()),
                        None => Replacement::Keep,
                    };
                }
                None => return Replacement::Keep,
            }
        }

        if self.inside_wrapper
            && matches!(
                sym.kind,
                SymbolKind::Variable | SymbolKind::Function | SymbolKind::Class
            )
        {
            // function scope keeps the source name
            return Replacement::Keep;
        }

        match names.get(&symbol) {
            Some(name) => Replacement::Name(name.clone()),
            None => Replacement::Keep,
        }
    }

    /// Rewrites `ns.key` to a direct reference when the namespace stayed
    /// virtual. Returns true when the expression was replaced.
    fn try_rewrite_ns_member(&mut self, expr: &mut Expr) -> bool {
        let Expr::Member(member) = expr else {
            return false;
        };
        let span = member.span;
        let Expr::Ident(obj) = &*member.obj else {
            return false;
        };
        let module = self.graph.get(self.module);
        let Some(index) = module.symbols.lookup(&obj.to_id()) else {
            return false;
        };
        let binding = SymbolId::new(self.module, index);
        let Some(ImportTarget::Namespace(target)) = self.link.import_targets.get(&binding) else {
            return false;
        };
        let target = *target;
        if self.graph.get(target).commonjs_markers
            || self.link.materialize_ns[target as usize]
        {
            // real object at runtime; only the object identifier renames
            return false;
        }
        let key = match &member.prop {
            MemberProp::Ident(prop) => prop.sym.to_string(),
            MemberProp::Computed(computed) => match &*computed.expr {
                Expr::Lit(Lit::Str(key)) => key.value.to_string(),
                _ => return false,
            },
            MemberProp::PrivateName(_) => return false,
        };
        let replacement = match self.link.ns_members[target as usize].get(&key) {
            Some(NsMember::Direct(symbol)) => self.ground_name(*symbol),
            Some(NsMember::NamespaceOf(inner)) => match self.link.ns_symbol[*inner as usize] {
                Some(ns) => self.ground_name(SymbolId::new(*inner, ns)),
                None => return false,
            },
            _ => return false,
        };
        *expr = Expr::Ident(Ident {
            span,
            ctxt: SyntaxContext::empty(),
            sym: replacement.as_str().into(),
            optional: false,
        });
        true
    }

    fn rewrite_runtime_call(&mut self, call: &mut swc_ecma_ast::CallExpr) {
        let key = (call.span.lo.0, call.span.hi.0);
        let Some(&record_index) = self.record_by_span.get(&key) else {
            return;
        };
        let graph = self.graph;
        let record = &graph.get(self.module).imports[record_index];
        let Some(ModuleRef::Module(target)) = &record.resolved else {
            // external require / dynamic import stays verbatim
            return;
        };
        let target = *target;

        let helper = if record.is_dynamic_import {
            self.usage.use_dynamic();
            "__dynamic"
        } else {
            self.usage.use_require();
            "__require"
        };
        call.callee = Callee::Expr(Box::new(Expr::Ident(Ident {
            span: call.span,
            ctxt: SyntaxContext::empty(),
            sym: helper.into(),
            optional: false,
        })));
        if let Some(arg) = call.args.first_mut() {
            arg.expr = Box::new(Expr::Lit(Lit::Num(Number {
                span: arg.expr.as_ref().span(),
                value: target as f64,
                raw: None,
            })));
        }
    }
}

use swc_common::Spanned;

impl VisitMut for Rewriter<'_> {
    fn visit_mut_ident(&mut self, ident: &mut Ident) {
        let Some(index) = self.graph.get(self.module).symbols.lookup(&ident.to_id()) else {
            return;
        };
        if let Replacement::Name(name) = self.replacement_for(SymbolId::new(self.module, index)) {
            ident.sym = name.as_str().into();
        }
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if self.try_rewrite_ns_member(expr) {
            return;
        }
        if let Expr::Ident(ident) = expr {
            let span = ident.span;
            let lookup = self.graph.get(self.module).symbols.lookup(&ident.to_id());
            if let Some(index) = lookup {
                match self.replacement_for(SymbolId::new(self.module, index)) {
                    Replacement::Member { object, prop } => {
                        *expr = Expr::Member(MemberExpr {
                            span,
                            obj: Box::new(Expr::Ident(Ident {
                                span,
                                ctxt: SyntaxContext::empty(),
                                sym: object.as_str().into(),
                                optional: false,
                            })),
                            prop: MemberProp::Ident(IdentName {
                                span,
                                sym: prop.as_str().into(),
                            }),
                        });
                        return;
                    }
                    Replacement::Name(name) => {
                        if let Expr::Ident(ident) = expr {
                            ident.sym = name.as_str().into();
                        }
                        return;
                    }
                    Replacement::Keep => return,
                }
            }
        }
        expr.visit_mut_children_with(self);
    }

    /// `{ a }` must become `{ a: a2 }` when `a` renames; the property name
    /// itself never changes.
    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = prop {
            let span = ident.span;
            let original = ident.sym.clone();
            let lookup = self.graph.get(self.module).symbols.lookup(&ident.to_id());
            if let Some(index) = lookup {
                let value = match self.replacement_for(SymbolId::new(self.module, index)) {
                    Replacement::Name(name) if name.as_str() != original.as_ref() => {
                        Some(Expr::Ident(Ident {
                            span,
                            ctxt: SyntaxContext::empty(),
                            sym: name.as_str().into(),
                            optional: false,
                        }))
                    }
                    Replacement::Member { object, prop } => Some(Expr::Member(MemberExpr {
                        span,
                        obj: Box::new(Expr::Ident(Ident {
                            span,
                            ctxt: SyntaxContext::empty(),
                            sym: object.as_str().into(),
                            optional: false,
                        })),
                        prop: MemberProp::Ident(IdentName {
                            span,
                            sym: prop.as_str().into(),
                        }),
                    })),
                    _ => None,
                };
                if let Some(value) = value {
                    *prop = Prop::KeyValue(KeyValueProp {
                        key: PropName::Ident(IdentName {
                            span,
                            sym: original,
                        }),
                        value: Box::new(value),
                    });
                }
                return;
            }
        }
        prop.visit_mut_children_with(self);
    }

    /// Destructuring shorthand: `const { a } = x` keeps reading property
    /// `a` even when the binding renames.
    fn visit_mut_object_pat_prop(&mut self, prop: &mut ObjectPatProp) {
        if let ObjectPatProp::Assign(assign) = prop {
            let span = assign.span;
            let original = assign.key.id.sym.clone();
            let lookup = self
                .graph
                .get(self.module)
                .symbols
                .lookup(&assign.key.id.to_id());
            if let Some(index) = lookup {
                if let Replacement::Name(name) =
                    self.replacement_for(SymbolId::new(self.module, index))
                {
                    if name.as_str() != original.as_ref() {
                        let renamed = BindingIdent::from(Ident {
                            span,
                            ctxt: SyntaxContext::empty(),
                            sym: name.as_str().into(),
                            optional: false,
                        });
                        let value: Pat = match assign.value.take() {
                            Some(default) => Pat::Assign(AssignPat {
                                span,
                                left: Box::new(Pat::Ident(renamed)),
                                right: default,
                            }),
                            None => Pat::Ident(renamed),
                        };
                        *prop = ObjectPatProp::KeyValue(KeyValuePatProp {
                            key: PropName::Ident(IdentName {
                                span,
                                sym: original,
                            }),
                            value: Box::new(value),
                        });
                        return;
                    }
                }
            }
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_call_expr(&mut self, call: &mut swc_ecma_ast::CallExpr) {
        self.rewrite_runtime_call(call);

        // a namespace access in callee position keeps its `this` unbound
        if let Callee::Expr(callee) = &mut call.callee {
            if self.try_rewrite_ns_member(callee) {
                let span = callee.span();
                let rewritten = std::mem::replace(
                    &mut **callee,
                    Expr::Lit(Lit::Num(Number {
                        span,
                        value: 0.0,
                        raw: None,
                    })),
                );
                **callee = Expr::Seq(SeqExpr {
                    span,
                    exprs: vec![
                        Box::new(Expr::Lit(Lit::Num(Number {
                            span,
                            value: 0.0,
                            raw: None,
                        }))),
                        Box::new(rewritten),
                    ],
                });
            }
        }
        call.visit_mut_children_with(self);
    }
}
