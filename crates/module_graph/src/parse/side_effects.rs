//! Top-level side-effect analysis for the tree-shaker.
//!
//! A statement is pure when dropping it cannot be observed: declarations
//! with statically pure initializers, and calls covered by a `@__PURE__`
//! annotation or a `--pure:` name.

use ahashmap::AHashSet;
use swc_common::comments::Comments;
use swc_common::SyntaxContext;
use swc_ecma_ast::{
    Callee, Class, ClassMember, Decl, Expr, Lit, PropOrSpread, Stmt, VarDecl,
};

pub struct PureCtx<'a> {
    pub comments: &'a dyn Comments,
    /// Dotted callee names declared side-effect-free (`--pure:console.log`).
    pub pure_fns: &'a AHashSet<String>,
    pub unresolved_ctxt: SyntaxContext,
}

impl PureCtx<'_> {
    fn call_is_annotated_pure(&self, span_lo: swc_common::BytePos) -> bool {
        self.comments
            .get_leading(span_lo)
            .map(|comments| {
                comments
                    .iter()
                    .any(|c| c.text.contains("@__PURE__") || c.text.contains("#__PURE__"))
            })
            .unwrap_or(false)
    }
}

/// Dotted name of a callee (`console.log`, `Object.freeze`), when the whole
/// chain is plain identifiers.
pub fn callee_dotted_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::Member(member) => {
            let obj = callee_dotted_name(&member.obj)?;
            let prop = member.prop.as_ident()?;
            Some(format!("{}.{}", obj, prop.sym))
        }
        _ => None,
    }
}

pub fn stmt_has_side_effects(stmt: &Stmt, ctx: &PureCtx<'_>) -> bool {
    match stmt {
        Stmt::Decl(decl) => decl_has_side_effects(decl, ctx),
        Stmt::Expr(expr_stmt) => !expr_is_pure(&expr_stmt.expr, ctx),
        Stmt::Empty(_) => false,
        _ => true,
    }
}

pub fn decl_has_side_effects(decl: &Decl, ctx: &PureCtx<'_>) -> bool {
    match decl {
        Decl::Var(var) => var_decl_has_side_effects(var, ctx),
        Decl::Fn(_) => false,
        Decl::Class(class_decl) => !class_is_pure(&class_decl.class, ctx),
        // TS-only declarations are erased
        _ => false,
    }
}

fn var_decl_has_side_effects(var: &VarDecl, ctx: &PureCtx<'_>) -> bool {
    var.decls.iter().any(|declarator| {
        !declarator.name.is_ident()
            || declarator
                .init
                .as_ref()
                .map(|init| !expr_is_pure(init, ctx))
                .unwrap_or(false)
    })
}

fn class_is_pure(class: &Class, ctx: &PureCtx<'_>) -> bool {
    let super_pure = class
        .super_class
        .as_ref()
        .map(|sup| expr_is_pure(sup, ctx))
        .unwrap_or(true);
    super_pure
        && class.body.iter().all(|member| match member {
            ClassMember::StaticBlock(_) => false,
            ClassMember::ClassProp(prop) if prop.is_static => prop
                .value
                .as_ref()
                .map(|v| expr_is_pure(v, ctx))
                .unwrap_or(true),
            _ => true,
        })
}

/// Conservative purity: anything that can invoke user code or throw at
/// evaluation time is impure, except annotated calls.
pub fn expr_is_pure(expr: &Expr, ctx: &PureCtx<'_>) -> bool {
    match expr {
        Expr::Lit(Lit::Regex(_)) => true,
        Expr::Lit(_) => true,
        Expr::Ident(_) => true,
        Expr::This(_) => true,
        Expr::Fn(_) | Expr::Arrow(_) => true,
        Expr::Class(class_expr) => class_is_pure(&class_expr.class, ctx),
        Expr::Array(array) => array.elems.iter().all(|elem| {
            elem.as_ref()
                .map(|e| e.spread.is_none() && expr_is_pure(&e.expr, ctx))
                .unwrap_or(true)
        }),
        Expr::Object(object) => object.props.iter().all(|prop| match prop {
            PropOrSpread::Spread(_) => false,
            PropOrSpread::Prop(prop) => match prop.as_ref() {
                swc_ecma_ast::Prop::Shorthand(_) => true,
                swc_ecma_ast::Prop::KeyValue(kv) => {
                    !matches!(kv.key, swc_ecma_ast::PropName::Computed(_))
                        && expr_is_pure(&kv.value, ctx)
                }
                swc_ecma_ast::Prop::Method(_) => true,
                swc_ecma_ast::Prop::Getter(_) | swc_ecma_ast::Prop::Setter(_) => true,
                swc_ecma_ast::Prop::Assign(_) => false,
            },
        }),
        Expr::Unary(unary) => {
            unary.op != swc_ecma_ast::UnaryOp::Delete && expr_is_pure(&unary.arg, ctx)
        }
        Expr::Bin(bin) => expr_is_pure(&bin.left, ctx) && expr_is_pure(&bin.right, ctx),
        Expr::Cond(cond) => {
            expr_is_pure(&cond.test, ctx)
                && expr_is_pure(&cond.cons, ctx)
                && expr_is_pure(&cond.alt, ctx)
        }
        Expr::Paren(paren) => expr_is_pure(&paren.expr, ctx),
        Expr::Seq(seq) => seq.exprs.iter().all(|e| expr_is_pure(e, ctx)),
        Expr::Tpl(tpl) => tpl.exprs.iter().all(|e| expr_is_pure(e, ctx)),
        Expr::Call(call) => {
            if ctx.call_is_annotated_pure(call.span.lo) {
                return call.args.iter().all(|arg| expr_is_pure(&arg.expr, ctx));
            }
            if let Callee::Expr(callee) = &call.callee {
                if let Some(name) = callee_dotted_name(callee) {
                    if ctx.pure_fns.contains(&name) {
                        return call.args.iter().all(|arg| expr_is_pure(&arg.expr, ctx));
                    }
                }
            }
            false
        }
        Expr::New(new) => {
            ctx.call_is_annotated_pure(new.span.lo)
                && new
                    .args
                    .as_ref()
                    .map(|args| args.iter().all(|arg| expr_is_pure(&arg.expr, ctx)))
                    .unwrap_or(true)
        }
        // property access can hit getters or throw on null
        Expr::Member(_) | Expr::SuperProp(_) => false,
        Expr::TsAs(as_expr) => expr_is_pure(&as_expr.expr, ctx),
        Expr::TsNonNull(nn) => expr_is_pure(&nn.expr, ctx),
        Expr::TsConstAssertion(ca) => expr_is_pure(&ca.expr, ctx),
        _ => false,
    }
}
