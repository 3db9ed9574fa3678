use ahashmap::{AHashMap, AHashSet};
use swc_common::{Span, Spanned, SyntaxContext};
use swc_ecma_ast::{
    Callee, Decl, ExportSpecifier, Expr, Id, ImportSpecifier, Lit, MemberExpr, MemberProp,
    ModuleDecl, ModuleExportName, ModuleItem, ObjectPatProp, Pat, SimpleAssignTarget, Stmt,
    UnaryOp,
};
use swc_ecma_visit::{Visit, VisitWith};
use swc_utils_parse::ParsedModule;

use crate::parse::side_effects::{
    decl_has_side_effects, expr_is_pure, stmt_has_side_effects, PureCtx,
};
use crate::record::{
    ExportKindTag, ExportRecord, ExportTarget, ImportRecord, ImportRecordKind, StmtInfo,
};
use crate::symbol::{SymbolKind, SymbolTable};

pub struct ScanOptions {
    /// `--pure:` names; calls to these are side-effect-free.
    pub pure_fns: AHashSet<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pure_fns: AHashSet::default(),
        }
    }
}

/// A message raised during the scan, located by span. The caller owns the
/// source map and turns these into diagnostics.
#[derive(Debug, PartialEq, Eq)]
pub struct ScanWarning {
    pub span: Span,
    pub message: String,
}

#[derive(Default)]
pub struct ScanOutput {
    pub symbols: SymbolTable,
    pub imports: Vec<ImportRecord>,
    pub exports: Vec<ExportRecord>,
    pub star_exports: Vec<usize>,
    pub stmts: Vec<StmtInfo>,
    pub export_kind: ExportKindTag,
    pub commonjs_markers: bool,
    pub has_side_effects: bool,
    pub unbound_names: AHashSet<String>,
    pub used_names: AHashSet<String>,
    pub warnings: Vec<ScanWarning>,
}

/// Walks a parsed module and produces its record contents: the symbol
/// table, import/export records, and per-statement facts.
pub fn scan_module(parsed: &ParsedModule, options: &ScanOptions) -> ScanOutput {
    let mut out = ScanOutput::default();
    let mut ns_bindings: AHashMap<Id, usize> = AHashMap::default();
    let mut esm_syntax = false;

    // Pass 1: register every top-level binding and the import/export
    // records introduced by module declarations. References are collected
    // in pass 2, once all hoisted names are known.
    for item in &parsed.module.body {
        let mut info = StmtInfo::default();
        match item {
            ModuleItem::ModuleDecl(decl) => {
                info.is_module_decl = true;
                esm_syntax = true;
                declare_module_decl(decl, &mut out, &mut ns_bindings, &mut info);
            }
            ModuleItem::Stmt(stmt) => {
                declare_stmt(stmt, &mut out, &mut info);
            }
        }
        out.stmts.push(info);
    }

    // `export { foo }` resolves against bindings declared anywhere in the
    // file, so these records wait until every declaration is registered.
    for item in &parsed.module.body {
        if let ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) = item {
            if named.src.is_none() && !named.type_only {
                record_local_named_exports(named, parsed, &mut out);
            }
        }
    }

    // Pass 2: per-statement references, side effects, nested import
    // records, CommonJS markers.
    let pure_ctx = PureCtx {
        comments: &parsed.comments,
        pure_fns: &options.pure_fns,
        unresolved_ctxt: parsed.unresolved_ctxt,
    };
    for (index, item) in parsed.module.body.iter().enumerate() {
        let mut visitor = ScanVisitor {
            out: &mut out,
            ns_bindings: &ns_bindings,
            unresolved_ctxt: parsed.unresolved_ctxt,
            esm_syntax,
            referenced: Vec::new(),
            stmt_records: Vec::new(),
            function_depth: 0,
        };
        item.visit_with(&mut visitor);
        let ScanVisitor {
            mut referenced,
            stmt_records,
            ..
        } = visitor;
        referenced.sort_unstable();
        referenced.dedup();

        let info = &mut out.stmts[index];
        info.referenced = referenced;
        info.import_records.extend(stmt_records);
        info.side_effects = match item {
            ModuleItem::Stmt(stmt) => stmt_has_side_effects(stmt, &pure_ctx),
            ModuleItem::ModuleDecl(decl) => match decl {
                ModuleDecl::ExportDecl(export) => decl_has_side_effects(&export.decl, &pure_ctx),
                ModuleDecl::ExportDefaultExpr(export) => !expr_is_pure(&export.expr, &pure_ctx),
                ModuleDecl::ExportDefaultDecl(_) => false,
                _ => false,
            },
        };
    }

    out.export_kind = match (esm_syntax, out.commonjs_markers) {
        (true, true) => ExportKindTag::Mixed,
        (true, false) => ExportKindTag::Esm,
        (false, true) => ExportKindTag::CommonJs,
        (false, false) => ExportKindTag::None,
    };
    out.has_side_effects = out.stmts.iter().any(|s| s.side_effects);
    out
}

fn export_name(name: &ModuleExportName) -> String {
    name.atom().to_string()
}

fn declare_module_decl(
    decl: &ModuleDecl,
    out: &mut ScanOutput,
    ns_bindings: &mut AHashMap<Id, usize>,
    info: &mut StmtInfo,
) {
    match decl {
        ModuleDecl::Import(import) => {
            if import.type_only {
                return;
            }
            let specifier = import.src.value.to_string();
            if import.specifiers.is_empty() {
                let record =
                    ImportRecord::new(specifier, import.span, ImportRecordKind::SideEffect);
                info.import_records.push(out.imports.len());
                out.imports.push(record);
                return;
            }
            for spec in &import.specifiers {
                let (kind, imported, local) = match spec {
                    ImportSpecifier::Default(default) => {
                        (ImportRecordKind::Default, Some("default".to_string()), &default.local)
                    }
                    ImportSpecifier::Named(named) => {
                        if named.is_type_only {
                            continue;
                        }
                        let imported = named
                            .imported
                            .as_ref()
                            .map(export_name)
                            .unwrap_or_else(|| named.local.sym.to_string());
                        (ImportRecordKind::Named, Some(imported), &named.local)
                    }
                    ImportSpecifier::Namespace(star) => {
                        (ImportRecordKind::Namespace, None, &star.local)
                    }
                };
                let symbol = out.symbols.declare(&local.to_id(), SymbolKind::ImportBinding);
                let mut record = ImportRecord::new(specifier.clone(), import.span, kind);
                record.imported_name = imported;
                record.local_symbol = Some(symbol);
                let index = out.imports.len();
                out.symbols.get_mut(symbol).import_record = Some(index);
                if kind == ImportRecordKind::Namespace {
                    ns_bindings.insert(local.to_id(), index);
                }
                info.declared.push(symbol);
                info.import_records.push(index);
                out.imports.push(record);
            }
        }
        ModuleDecl::ExportDecl(export) => {
            let mut names: Vec<(Id, SymbolKind, Span)> = Vec::new();
            collect_decl_bindings(&export.decl, &mut names);
            for (id, kind, span) in names {
                let symbol = out.symbols.declare(&id, kind);
                info.declared.push(symbol);
                out.exports.push(ExportRecord {
                    name: id.0.to_string(),
                    span,
                    target: ExportTarget::Local(symbol),
                });
            }
        }
        ModuleDecl::ExportNamed(named) => {
            if named.type_only {
                return;
            }
            let Some(src) = &named.src else {
                // handled after all declarations are known
                return;
            };
            for spec in &named.specifiers {
                match spec {
                    ExportSpecifier::Namespace(ns) => {
                        // export * as name from './m'
                        let mut record = ImportRecord::new(
                            src.value.to_string(),
                            named.span,
                            ImportRecordKind::Namespace,
                        );
                        record.ns_value_observed = true;
                        let index = out.imports.len();
                        out.imports.push(record);
                        info.import_records.push(index);
                        out.exports.push(ExportRecord {
                            name: export_name(&ns.name),
                            span: named.span,
                            target: ExportTarget::ReExport { import: index },
                        });
                    }
                    ExportSpecifier::Default(default) => {
                        let mut record = ImportRecord::new(
                            src.value.to_string(),
                            named.span,
                            ImportRecordKind::Default,
                        );
                        record.imported_name = Some("default".to_string());
                        let index = out.imports.len();
                        out.imports.push(record);
                        info.import_records.push(index);
                        out.exports.push(ExportRecord {
                            name: default.exported.sym.to_string(),
                            span: named.span,
                            target: ExportTarget::ReExport { import: index },
                        });
                    }
                    ExportSpecifier::Named(spec) => {
                        if spec.is_type_only {
                            continue;
                        }
                        let imported = export_name(&spec.orig);
                        let exported = spec
                            .exported
                            .as_ref()
                            .map(export_name)
                            .unwrap_or_else(|| imported.clone());
                        let mut record = ImportRecord::new(
                            src.value.to_string(),
                            named.span,
                            ImportRecordKind::Named,
                        );
                        record.imported_name = Some(imported);
                        let index = out.imports.len();
                        out.imports.push(record);
                        info.import_records.push(index);
                        out.exports.push(ExportRecord {
                            name: exported,
                            span: named.span,
                            target: ExportTarget::ReExport { import: index },
                        });
                    }
                }
            }
        }
        ModuleDecl::ExportDefaultDecl(default) => {
            let symbol = match &default.decl {
                swc_ecma_ast::DefaultDecl::Fn(fn_expr) => match &fn_expr.ident {
                    Some(ident) => out.symbols.declare(&ident.to_id(), SymbolKind::Function),
                    None => out.symbols.declare_synthetic("default", SymbolKind::Function),
                },
                swc_ecma_ast::DefaultDecl::Class(class_expr) => match &class_expr.ident {
                    Some(ident) => out.symbols.declare(&ident.to_id(), SymbolKind::Class),
                    None => out.symbols.declare_synthetic("default", SymbolKind::Class),
                },
                swc_ecma_ast::DefaultDecl::TsInterfaceDecl(_) => return,
            };
            info.declared.push(symbol);
            out.exports.push(ExportRecord {
                name: "default".to_string(),
                span: default.span,
                target: ExportTarget::Local(symbol),
            });
        }
        ModuleDecl::ExportDefaultExpr(default) => {
            let symbol = out.symbols.declare_synthetic("default", SymbolKind::Variable);
            info.declared.push(symbol);
            out.exports.push(ExportRecord {
                name: "default".to_string(),
                span: default.span,
                target: ExportTarget::Local(symbol),
            });
        }
        ModuleDecl::ExportAll(export_all) => {
            let record = ImportRecord::new(
                export_all.src.value.to_string(),
                export_all.span,
                ImportRecordKind::Namespace,
            );
            let index = out.imports.len();
            out.imports.push(record);
            info.import_records.push(index);
            out.star_exports.push(index);
        }
        ModuleDecl::TsExportAssignment(_) => {
            // `export =` is the TypeScript spelling of `module.exports =`
            out.commonjs_markers = true;
        }
        ModuleDecl::TsImportEquals(_) | ModuleDecl::TsNamespaceExport(_) => {}
    }
}

fn declare_stmt(stmt: &Stmt, out: &mut ScanOutput, info: &mut StmtInfo) {
    if let Stmt::Decl(decl) = stmt {
        let mut names: Vec<(Id, SymbolKind, Span)> = Vec::new();
        collect_decl_bindings(decl, &mut names);
        for (id, kind, _) in names {
            let symbol = out.symbols.declare(&id, kind);
            info.declared.push(symbol);
        }
    }
}

fn record_local_named_exports(
    named: &swc_ecma_ast::NamedExport,
    parsed: &ParsedModule,
    out: &mut ScanOutput,
) {
    for spec in &named.specifiers {
        let ExportSpecifier::Named(spec) = spec else {
            continue;
        };
        if spec.is_type_only {
            continue;
        }
        let exported = spec
            .exported
            .as_ref()
            .map(export_name)
            .unwrap_or_else(|| export_name(&spec.orig));
        let symbol = match &spec.orig {
            ModuleExportName::Ident(ident) => {
                out.symbols.lookup(&ident.to_id()).or_else(|| {
                    // hoisted bindings resolve at the top level
                    out.symbols
                        .lookup(&(ident.sym.clone(), parsed.top_level_ctxt))
                })
            }
            ModuleExportName::Str(_) => None,
        };
        let symbol = match symbol {
            Some(s) => s,
            // export of a name with no binding: keep a dead slot so the
            // record stays well-formed
            None => out
                .symbols
                .declare_synthetic(export_name(&spec.orig), SymbolKind::Unbound),
        };
        out.exports.push(ExportRecord {
            name: exported,
            span: named.span,
            target: ExportTarget::Local(symbol),
        });
    }
}

fn collect_decl_bindings(decl: &Decl, out: &mut Vec<(Id, SymbolKind, Span)>) {
    match decl {
        Decl::Var(var) => {
            for declarator in &var.decls {
                collect_pat_bindings(&declarator.name, declarator.span, out);
            }
        }
        Decl::Fn(fn_decl) => out.push((
            fn_decl.ident.to_id(),
            SymbolKind::Function,
            fn_decl.ident.span,
        )),
        Decl::Class(class_decl) => out.push((
            class_decl.ident.to_id(),
            SymbolKind::Class,
            class_decl.ident.span,
        )),
        _ => {}
    }
}

fn collect_pat_bindings(pat: &Pat, span: Span, out: &mut Vec<(Id, SymbolKind, Span)>) {
    match pat {
        Pat::Ident(binding) => out.push((binding.id.to_id(), SymbolKind::Variable, span)),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                collect_pat_bindings(elem, span, out);
            }
        }
        Pat::Rest(rest) => collect_pat_bindings(&rest.arg, span, out),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => collect_pat_bindings(&kv.value, span, out),
                    ObjectPatProp::Assign(assign) => {
                        out.push((assign.key.to_id(), SymbolKind::Variable, span))
                    }
                    ObjectPatProp::Rest(rest) => collect_pat_bindings(&rest.arg, span, out),
                }
            }
        }
        Pat::Assign(assign) => collect_pat_bindings(&assign.left, span, out),
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}

/// Pass-2 walker for one top-level statement.
struct ScanVisitor<'a> {
    out: &'a mut ScanOutput,
    ns_bindings: &'a AHashMap<Id, usize>,
    unresolved_ctxt: SyntaxContext,
    esm_syntax: bool,
    referenced: Vec<u32>,
    stmt_records: Vec<usize>,
    function_depth: u32,
}

impl ScanVisitor<'_> {
    fn reference(&mut self, id: &Id) {
        if let Some(index) = self.out.symbols.lookup(id) {
            self.referenced.push(index);
            self.out.symbols.get_mut(index).use_count += 1;
        }
    }

    fn is_unbound(&self, ident: &swc_ecma_ast::Ident) -> bool {
        ident.ctxt == self.unresolved_ctxt
    }

    /// True for `module.exports` or `exports` rooted expressions where the
    /// identifier is a host binding, i.e. CommonJS output markers.
    fn is_cjs_exports_target(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Ident(ident) => ident.sym.as_ref() == "exports" && self.is_unbound(ident),
            Expr::Member(member) => match &*member.obj {
                Expr::Ident(obj) => {
                    obj.sym.as_ref() == "module"
                        && self.is_unbound(obj)
                        && matches!(&member.prop, MemberProp::Ident(prop) if prop.sym.as_ref() == "exports")
                }
                inner @ Expr::Member(_) => self.is_cjs_exports_target(inner),
                _ => false,
            },
            _ => false,
        }
    }

    fn warn(&mut self, span: Span, message: impl Into<String>) {
        self.out.warnings.push(ScanWarning {
            span,
            message: message.into(),
        });
    }
}

impl Visit for ScanVisitor<'_> {
    fn visit_import_decl(&mut self, _import: &swc_ecma_ast::ImportDecl) {
        // specifier locals are declarations, not references
    }

    fn visit_named_export(&mut self, named: &swc_ecma_ast::NamedExport) {
        // re-export specifiers name the *target's* exports; only local
        // `export { foo }` statements reference bindings of this module
        if named.src.is_some() {
            return;
        }
        for spec in &named.specifiers {
            if let ExportSpecifier::Named(spec) = spec {
                if let ModuleExportName::Ident(orig) = &spec.orig {
                    self.out.used_names.insert(orig.sym.to_string());
                    self.reference(&orig.to_id());
                }
            }
        }
    }

    fn visit_ident(&mut self, ident: &swc_ecma_ast::Ident) {
        self.out.used_names.insert(ident.sym.to_string());
        if self.is_unbound(ident) {
            self.out.unbound_names.insert(ident.sym.to_string());
        }
        let id = ident.to_id();
        self.reference(&id);
        // a namespace binding reaching generic identifier position escapes
        // as a value
        if let Some(&record) = self.ns_bindings.get(&id) {
            self.out.imports[record].ns_value_observed = true;
        }
    }

    fn visit_member_expr(&mut self, member: &MemberExpr) {
        if let Expr::Ident(obj) = &*member.obj {
            if let Some(&record) = self.ns_bindings.get(&obj.to_id()) {
                self.out.used_names.insert(obj.sym.to_string());
                self.reference(&obj.to_id());
                match &member.prop {
                    MemberProp::Ident(prop) => {
                        self.out.imports[record]
                            .ns_static_keys
                            .push((prop.sym.to_string(), member.span));
                    }
                    MemberProp::Computed(computed) => {
                        if let Expr::Lit(Lit::Str(key)) = &*computed.expr {
                            self.out.imports[record]
                                .ns_static_keys
                                .push((key.value.to_string(), member.span));
                        } else {
                            // dynamic key: the whole namespace is observable
                            self.out.imports[record].ns_value_observed = true;
                            computed.expr.visit_with(self);
                        }
                    }
                    MemberProp::PrivateName(_) => {
                        self.out.imports[record].ns_value_observed = true;
                    }
                }
                return;
            }
        }
        member.obj.visit_with(self);
        if let MemberProp::Computed(computed) = &member.prop {
            computed.expr.visit_with(self);
        }
    }

    fn visit_assign_expr(&mut self, assign: &swc_ecma_ast::AssignExpr) {
        match &assign.left {
            swc_ecma_ast::AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
                if let Some(index) = self.out.symbols.lookup(&binding.id.to_id()) {
                    self.out.symbols.get_mut(index).mutated = true;
                }
            }
            swc_ecma_ast::AssignTarget::Simple(SimpleAssignTarget::Member(member)) => {
                if self.is_cjs_exports_target(&member.obj)
                    || self.is_cjs_exports_target(&Expr::Member(member.clone()))
                {
                    self.out.commonjs_markers = true;
                }
            }
            _ => {}
        }
        assign.visit_children_with(self);
    }

    fn visit_update_expr(&mut self, update: &swc_ecma_ast::UpdateExpr) {
        if let Expr::Ident(ident) = &*update.arg {
            if let Some(index) = self.out.symbols.lookup(&ident.to_id()) {
                self.out.symbols.get_mut(index).mutated = true;
            }
        }
        update.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, call: &swc_ecma_ast::CallExpr) {
        match &call.callee {
            Callee::Expr(callee) => {
                if let Expr::Ident(ident) = &**callee {
                    if ident.sym.as_ref() == "require" && self.is_unbound(ident) {
                        match call.args.first().map(|arg| &*arg.expr) {
                            Some(Expr::Lit(Lit::Str(src))) => {
                                let mut record = ImportRecord::new(
                                    src.value.to_string(),
                                    call.span,
                                    ImportRecordKind::Namespace,
                                );
                                record.is_require = true;
                                record.ns_value_observed = true;
                                let index = self.out.imports.len();
                                self.out.imports.push(record);
                                self.stmt_records.push(index);
                            }
                            _ => {
                                // dynamic require argument: CommonJS
                                // semantics when it happens at the top level
                                if self.function_depth == 0 {
                                    self.out.commonjs_markers = true;
                                }
                                self.warn(
                                    call.span,
                                    "this \"require\" argument cannot be resolved at build time",
                                );
                            }
                        }
                    }
                }
            }
            Callee::Import(_) => match call.args.first().map(|arg| &*arg.expr) {
                Some(Expr::Lit(Lit::Str(src))) => {
                    let mut record = ImportRecord::new(
                        src.value.to_string(),
                        call.span,
                        ImportRecordKind::Namespace,
                    );
                    record.is_dynamic_import = true;
                    record.ns_value_observed = true;
                    let index = self.out.imports.len();
                    self.out.imports.push(record);
                    self.stmt_records.push(index);
                }
                _ => self.warn(
                    call.span,
                    "this dynamic \"import\" argument cannot be resolved at build time",
                ),
            },
            Callee::Super(_) => {}
        }
        call.visit_children_with(self);
    }

    fn visit_unary_expr(&mut self, unary: &swc_ecma_ast::UnaryExpr) {
        if unary.op == UnaryOp::TypeOf && self.esm_syntax {
            if let Expr::Ident(ident) = &*unary.arg {
                if ident.sym.as_ref() == "require" && self.is_unbound(ident) {
                    self.warn(
                        unary.span,
                        "\"typeof require\" in an ES module always evaluates to \"undefined\"",
                    );
                }
            }
        }
        unary.visit_children_with(self);
    }

    fn visit_switch_stmt(&mut self, switch: &swc_ecma_ast::SwitchStmt) {
        let mut seen: AHashSet<String> = AHashSet::default();
        for case in &switch.cases {
            let Some(test) = &case.test else { continue };
            let key = match &**test {
                Expr::Lit(Lit::Str(s)) => Some(format!("s:{}", s.value)),
                Expr::Lit(Lit::Num(n)) => Some(format!("n:{}", n.value)),
                Expr::Lit(Lit::Bool(b)) => Some(format!("b:{}", b.value)),
                _ => None,
            };
            if let Some(key) = key {
                if !seen.insert(key) {
                    self.warn(test.span(), "duplicate case label in switch statement");
                }
            }
        }
        switch.visit_children_with(self);
    }

    fn visit_function(&mut self, function: &swc_ecma_ast::Function) {
        self.function_depth += 1;
        function.visit_children_with(self);
        self.function_depth -= 1;
    }

    fn visit_arrow_expr(&mut self, arrow: &swc_ecma_ast::ArrowExpr) {
        self.function_depth += 1;
        arrow.visit_children_with(self);
        self.function_depth -= 1;
    }
}
