//! Chunk printer.
//!
//! Renders one chunk: runtime prelude, the `__modules` factory table for
//! wrapped modules, inlined module bodies with `// path` banners,
//! materialized namespace literals, and the format envelope. Source-map
//! tuples are recorded per emitted statement.

use std::fmt::Write as _;
use std::str::FromStr;

use ahashmap::{AHashMap, AHashSet};
use anyhow::Result;
use linker::{ImportTarget, LinkOutput, NsMember};
use module_graph::{
    ExportTarget, ImportRecordKind, ModuleGraph, ModuleId, ModuleRef, Representation, StmtInfo,
    SymbolId, SymbolKind,
};
use swc_common::{Spanned, DUMMY_SP};
use swc_ecma_ast::{
    ClassDecl, Decl, ExprStmt, FnDecl, Ident, ModuleDecl, ModuleItem, Stmt,
};
use swc_ecma_visit::VisitMutWith;

use crate::chunk::Chunk;
use crate::rewrite::Rewriter;
use crate::runtime::RuntimeUsage;
use crate::source_map::SourceMapBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Iife,
    Cjs,
    Umd,
    Esm,
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iife" => Ok(OutputFormat::Iife),
            "cjs" => Ok(OutputFormat::Cjs),
            "umd" => Ok(OutputFormat::Umd),
            "esm" => Ok(OutputFormat::Esm),
            other => Err(format!("invalid format: {:?}", other)),
        }
    }
}

/// Cross-chunk dependency of a split-mode entry chunk.
#[derive(Debug, Clone)]
pub struct CrossChunkImport {
    /// Relative specifier of the chunk being imported.
    pub path: String,
    pub symbols: Vec<SymbolId>,
}

#[derive(Debug, Clone, Default)]
pub struct PrintOptions {
    pub format: OutputFormat,
    pub global_name: Option<String>,
    pub banner: Option<String>,
    pub footer: Option<String>,
    pub minify_whitespace: bool,
    pub source_map: bool,
    pub cross_imports: Vec<CrossChunkImport>,
    /// Split mode: symbols this (shared) chunk exports to entry chunks.
    pub cross_exports: Vec<SymbolId>,
}

pub struct PrintedChunk {
    pub code: String,
    pub map: Option<SourceMapBuilder>,
    /// Bytes each input module contributed to this chunk (metafile).
    pub input_bytes: Vec<(ModuleId, usize)>,
}

struct Writer {
    out: String,
    line: u32,
    map: SourceMapBuilder,
    with_map: bool,
    minify: bool,
}

impl Writer {
    fn raw(&mut self, text: &str) {
        self.push(text, None);
    }

    fn mapped(&mut self, text: &str, origin: (u32, u32, u32)) {
        self.push(text, Some(origin));
    }

    fn blank(&mut self) {
        if !self.minify {
            self.raw("\n");
        }
    }

    fn comment(&mut self, text: &str) {
        if !self.minify {
            self.raw(text);
        }
    }

    fn push(&mut self, text: &str, origin: Option<(u32, u32, u32)>) {
        if text.is_empty() {
            return;
        }
        if let (true, Some((source, orig_line, orig_col))) = (self.with_map, origin) {
            // first output line maps to the statement start; following
            // lines advance through the original
            for (offset, _) in text.trim_end_matches('\n').split('\n').enumerate() {
                self.map.add_mapping(
                    self.line + offset as u32,
                    0,
                    source,
                    orig_line + offset as u32,
                    if offset == 0 { orig_col } else { 0 },
                );
            }
        }
        self.out.push_str(text);
        self.line += text.matches('\n').count() as u32;
        if !text.ends_with('\n') {
            self.out.push('\n');
            self.line += 1;
        }
    }
}

/// Tracks external imports needed by the chunk, in first-use order.
#[derive(Default)]
struct ExternalCollector {
    /// (specifier) -> synthesized namespace binding for re-export getters
    ns_bindings: Vec<(String, String)>,
}

impl ExternalCollector {
    fn ns_binding(&mut self, specifier: &str) -> String {
        if let Some((_, name)) = self.ns_bindings.iter().find(|(s, _)| s == specifier) {
            return name.clone();
        }
        let name = format!("__ext{}", self.ns_bindings.len());
        self.ns_bindings.push((specifier.to_string(), name.clone()));
        name
    }
}

pub fn print_chunk(
    graph: &ModuleGraph,
    link: &LinkOutput,
    chunk: &Chunk,
    names: &AHashMap<SymbolId, String>,
    options: &PrintOptions,
) -> Result<PrintedChunk> {
    let mut usage = RuntimeUsage::default();
    let mut externals = ExternalCollector::default();

    let ctx = PrintCtx {
        graph,
        link,
        names,
        options,
    };

    // render wrapped factories and inlined sections before assembly; the
    // runtime prelude depends on what they used
    let mut wrapped_sections: Vec<(ModuleId, Vec<String>)> = Vec::new();
    let mut wrapped_ns_literals: Vec<String> = Vec::new();
    let mut inline_sections: Vec<ModuleSection> = Vec::new();
    let mut input_bytes: Vec<(ModuleId, usize)> = Vec::new();
    for &id in &chunk.modules {
        let module = graph.get(id);
        match module.representation {
            Representation::Wrapped => {
                let body = ctx.render_wrapped(id, &mut usage, &mut externals)?;
                input_bytes.push((id, body.iter().map(|l| l.len()).sum()));
                wrapped_sections.push((id, body));
                // a wrapped ES module's namespace object lives at the top
                // level, over its hoisted bindings
                if !module.commonjs_markers && link.materialize_ns[id as usize] {
                    if let Some(literal) = ctx.ns_literal(id, None, &mut usage, &mut externals) {
                        wrapped_ns_literals.push(literal);
                    }
                }
            }
            Representation::Inlined => {
                let section = ctx.render_inlined(id, &mut usage, &mut externals)?;
                input_bytes.push((id, section.byte_len()));
                inline_sections.push(section);
            }
            Representation::Dropped => {}
        }
    }

    let entry_epilogue = match chunk.entry {
        Some(entry) => ctx.render_entry_exports(entry, &mut usage, &mut externals)?,
        None => Vec::new(),
    };

    // external bindings render before assembly so the runtime prelude
    // knows about the helpers they use
    let esm = options.format == OutputFormat::Esm;
    let external_lines = if esm {
        ctx.render_external_imports_esm(chunk, &externals)
    } else {
        ctx.render_external_imports_cjs(chunk, &externals, &mut usage)
    };

    // the iife/umd envelope returns the entry namespace; resolve it now so
    // the runtime helpers it needs are in the prelude
    let envelope_ns = match (options.format, chunk.entry) {
        (OutputFormat::Iife, Some(entry)) if options.global_name.is_some() => {
            Some(ctx.entry_ns_expr(entry, &mut usage))
        }
        (OutputFormat::Umd, Some(entry)) => Some(ctx.entry_ns_expr(entry, &mut usage)),
        _ => None,
    };

    // assembly
    let mut writer = Writer {
        out: String::new(),
        line: 0,
        map: SourceMapBuilder::new(),
        with_map: options.source_map,
        minify: options.minify_whitespace,
    };

    if let Some(banner) = &options.banner {
        writer.raw(banner);
    }

    if esm {
        for cross in &options.cross_imports {
            let list = cross
                .symbols
                .iter()
                .map(|s| ctx.name_of(*s))
                .collect::<Vec<_>>()
                .join(", ");
            writer.raw(&format!("import {{ {} }} from {:?};\n", list, cross.path));
        }
        for line in &external_lines {
            writer.raw(line);
        }
    }

    match options.format {
        OutputFormat::Iife => {
            let open = match &options.global_name {
                Some(global) => format!("var {} = (() => {{\n", global),
                None => "(() => {\n".to_string(),
            };
            writer.raw(&open);
        }
        OutputFormat::Umd => {
            let name = options.global_name.clone().unwrap_or_else(|| "bundle".to_string());
            writer.raw(&format!(
                "(function (root, factory) {{\n\
                 \x20 if (typeof module === \"object\" && module.exports) module.exports = factory();\n\
                 \x20 else if (typeof define === \"function\" && define.amd) define([], factory);\n\
                 \x20 else root.{} = factory();\n\
                 }})(typeof self !== \"undefined\" ? self : this, function () {{\n",
                name
            ));
        }
        OutputFormat::Cjs | OutputFormat::Esm => {}
    }

    // runtime helpers, then the factory table
    let has_modules_object = !wrapped_sections.is_empty();
    for helper in usage.render(has_modules_object) {
        writer.raw(&helper);
    }

    if !esm {
        for line in &external_lines {
            writer.raw(line);
        }
    }

    // hoisted bindings of wrapped ES modules
    for (id, _) in &wrapped_sections {
        let hoisted = ctx.hoisted_names(*id);
        if !hoisted.is_empty() {
            writer.raw(&format!("var {};\n", hoisted.join(", ")));
        }
    }

    if has_modules_object {
        writer.raw("var __modules = {\n");
        for (index, (id, body)) in wrapped_sections.iter().enumerate() {
            let module = graph.get(*id);
            writer.comment(&format!("  // {}\n", module.display_path()));
            let params = if module.commonjs_markers {
                "(exports, module)"
            } else {
                "()"
            };
            writer.raw(&format!("  {}{} {{\n", id, params));
            for line in body {
                for inner in line.trim_end_matches('\n').split('\n') {
                    writer.raw(&format!("    {}\n", inner));
                }
            }
            let comma = if index + 1 == wrapped_sections.len() { "" } else { "," };
            writer.raw(&format!("  }}{}\n", comma));
        }
        writer.raw("};\n");
        for literal in &wrapped_ns_literals {
            writer.raw(literal);
        }
    }

    for section in &inline_sections {
        writer.blank();
        writer.comment(&format!("// {}\n", section.banner));
        for line in &section.prelude {
            writer.raw(line);
        }
        for (text, origin) in &section.stmts {
            match origin {
                Some(origin) => {
                    let source = writer.map.add_source(&section.source_path);
                    writer.mapped(text, (source, origin.0, origin.1));
                }
                None => writer.raw(text),
            }
        }
        for line in &section.epilogue {
            writer.raw(line);
        }
    }

    for line in &entry_epilogue {
        writer.raw(line);
    }

    // split mode: the shared chunk exports what entries consume
    if esm && !options.cross_exports.is_empty() {
        let list = options
            .cross_exports
            .iter()
            .map(|s| ctx.name_of(*s))
            .collect::<Vec<_>>()
            .join(", ");
        writer.raw(&format!("export {{ {} }};\n", list));
    }

    match options.format {
        OutputFormat::Iife => {
            if let Some(ns) = &envelope_ns {
                writer.raw(&format!("  return {};\n", ns));
            }
            writer.raw("})();\n");
        }
        OutputFormat::Umd => {
            if let Some(ns) = &envelope_ns {
                writer.raw(&format!("  return {};\n", ns));
            }
            writer.raw("});\n");
        }
        OutputFormat::Cjs | OutputFormat::Esm => {}
    }

    if let Some(footer) = &options.footer {
        writer.raw(footer);
    }

    Ok(PrintedChunk {
        map: options.source_map.then_some(writer.map),
        code: writer.out,
        input_bytes,
    })
}

/// One inlined module, rendered.
struct ModuleSection {
    banner: String,
    source_path: String,
    prelude: Vec<String>,
    stmts: Vec<(String, Option<(u32, u32)>)>,
    epilogue: Vec<String>,
}

impl ModuleSection {
    fn byte_len(&self) -> usize {
        self.prelude.iter().map(|l| l.len()).sum::<usize>()
            + self.stmts.iter().map(|(t, _)| t.len()).sum::<usize>()
            + self.epilogue.iter().map(|l| l.len()).sum::<usize>()
    }
}

struct PrintCtx<'a> {
    graph: &'a ModuleGraph,
    link: &'a LinkOutput,
    names: &'a AHashMap<SymbolId, String>,
    options: &'a PrintOptions,
}

impl PrintCtx<'_> {
    fn name_of(&self, symbol: SymbolId) -> String {
        match self.names.get(&symbol) {
            Some(name) => name.clone(),
            None => self
                .graph
                .get(symbol.module)
                .symbols
                .get(symbol.index)
                .name
                .clone(),
        }
    }

    fn ground_name(&self, symbol: SymbolId) -> String {
        let mut current = symbol;
        for _ in 0..=self.graph.len() {
            match self.graph.get(current.module).symbols.get(current.index).link {
                Some(next) => current = next,
                None => break,
            }
        }
        self.name_of(current)
    }

    /// Names of a wrapped ES module's hoisted exported bindings.
    fn hoisted_names(&self, id: ModuleId) -> Vec<String> {
        let module = self.graph.get(id);
        if module.commonjs_markers {
            return Vec::new();
        }
        let mut seen = AHashSet::default();
        let mut out = Vec::new();
        for export in &module.exports {
            if let ExportTarget::Local(symbol) = &export.target {
                if seen.insert(*symbol) {
                    if let Some(name) = self.names.get(&SymbolId::new(id, *symbol)) {
                        out.push(name.clone());
                    }
                }
            }
        }
        out
    }

    /// The expression for an entry module's namespace, used by the cjs,
    /// umd and global-name iife envelopes.
    fn entry_ns_expr(&self, entry: ModuleId, usage: &mut RuntimeUsage) -> String {
        let module = self.graph.get(entry);
        if module.commonjs_markers || module.representation == Representation::Wrapped {
            usage.use_import();
            return format!("__import({})", entry);
        }
        match self.link.ns_symbol[entry as usize] {
            Some(ns) => self.name_of(SymbolId::new(entry, ns)),
            None => "{}".to_string(),
        }
    }

    /// Getter body for one namespace member.
    fn member_expr(
        &self,
        member: &NsMember,
        own_module: Option<ModuleId>,
        usage: &mut RuntimeUsage,
        externals: &mut ExternalCollector,
        name: &str,
    ) -> String {
        match member {
            NsMember::Direct(symbol) => {
                if own_module == Some(symbol.module) {
                    // inside the module's own wrapper the source name is in
                    // scope
                    let sym = self.graph.get(symbol.module).symbols.get(symbol.index);
                    if sym.kind != SymbolKind::ImportBinding {
                        return sym.name.clone();
                    }
                }
                self.ground_name(*symbol)
            }
            NsMember::Runtime(module) => {
                usage.use_import();
                format!("__import({})[{}]", module, quote_str(name))
            }
            NsMember::NamespaceOf(module) => {
                if self.graph.get(*module).commonjs_markers {
                    usage.use_import();
                    format!("__import({})", module)
                } else {
                    match self.link.ns_symbol[*module as usize] {
                        Some(ns) => self.name_of(SymbolId::new(*module, ns)),
                        None => "{}".to_string(),
                    }
                }
            }
            NsMember::ReExport { .. } => "void 0".to_string(),
            NsMember::External {
                specifier,
                imported,
            } => {
                let binding = externals.ns_binding(specifier);
                if imported == "*" {
                    binding
                } else {
                    format!("{}[{}]", binding, quote_str(imported))
                }
            }
        }
    }

    /// The namespace object literal for a materialized module.
    fn ns_literal(
        &self,
        id: ModuleId,
        own_module: Option<ModuleId>,
        usage: &mut RuntimeUsage,
        externals: &mut ExternalCollector,
    ) -> Option<String> {
        let ns = self.link.ns_symbol[id as usize]?;
        usage.use_export();
        let mut out = format!("var {} = __export({{}}, {{\n", self.name_of(SymbolId::new(id, ns)));
        for (name, member) in &self.link.ns_members[id as usize] {
            let expr = self.member_expr(member, own_module, usage, externals, name);
            let _ = writeln!(out, "  {}: () => {},", quote_prop(name), expr);
        }
        out.push_str("});\n");
        Some(out)
    }

    /// Interop and initialization lines at the top of a module's body.
    fn record_prelude(&self, id: ModuleId, usage: &mut RuntimeUsage) -> Vec<String> {
        let module = self.graph.get(id);
        let mut lines = Vec::new();
        let mut initialized: AHashSet<ModuleId> = AHashSet::default();
        let mut interop_done: AHashSet<ModuleId> = AHashSet::default();

        for record in &module.imports {
            match &record.resolved {
                Some(ModuleRef::Module(target)) => {
                    let target = *target;
                    let target_module = self.graph.get(target);
                    if target_module.representation != Representation::Wrapped {
                        continue;
                    }
                    if record.is_require || record.is_dynamic_import {
                        // rewritten inline at the call site
                        continue;
                    }
                    let binding_live = record
                        .local_symbol
                        .map(|local| self.link.is_symbol_live(SymbolId::new(id, local)))
                        .unwrap_or(false);
                    match record.kind {
                        ImportRecordKind::SideEffect => {
                            if initialized.insert(target) {
                                usage.use_require();
                                lines.push(format!("__require({});\n", target));
                            }
                        }
                        ImportRecordKind::Namespace if binding_live => {
                            if target_module.commonjs_markers {
                                if let Some(local) = record.local_symbol {
                                    let name = self.name_of(SymbolId::new(id, local));
                                    usage.use_import();
                                    lines.push(format!(
                                        "var {} = __import({});\n",
                                        name, target
                                    ));
                                }
                            } else if initialized.insert(target) {
                                usage.use_require();
                                lines.push(format!("__require({});\n", target));
                            }
                        }
                        ImportRecordKind::Named | ImportRecordKind::Default
                            if binding_live =>
                        {
                            // direct links into a wrapped ES module need it
                            // initialized before first use
                            if !target_module.commonjs_markers && initialized.insert(target) {
                                usage.use_require();
                                lines.push(format!("__require({});\n", target));
                            }
                            if target_module.commonjs_markers
                                && interop_done.insert(target)
                            {
                                if let Some(&interop) =
                                    self.link.interop_symbol.get(&(id, target))
                                {
                                    usage.use_import();
                                    lines.push(format!(
                                        "var {} = __import({});\n",
                                        self.name_of(SymbolId::new(id, interop)),
                                        target
                                    ));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Some(ModuleRef::External(specifier)) => {
                    if record.kind == ImportRecordKind::SideEffect {
                        if self.options.format == OutputFormat::Esm {
                            // hoisted with the other external imports
                        } else {
                            lines.push(format!("require({});\n", quote_str(specifier)));
                        }
                    }
                }
                None => {}
            }
        }

        // runtime-prop targets that are wrapped ES modules (cycle fallback)
        let mut runtime_targets: Vec<ModuleId> = module
            .symbols
            .iter()
            .filter_map(|(index, _)| {
                match self.link.import_targets.get(&SymbolId::new(id, index)) {
                    Some(ImportTarget::RuntimeProp(target, _))
                        if self.link.is_symbol_live(SymbolId::new(id, index)) =>
                    {
                        Some(*target)
                    }
                    _ => None,
                }
            })
            .collect();
        runtime_targets.sort_unstable();
        runtime_targets.dedup();
        for target in runtime_targets {
            if !self.graph.get(target).commonjs_markers {
                if let Some(&interop) = self.link.interop_symbol.get(&(id, target)) {
                    if interop_done.insert(target) {
                        usage.use_import();
                        lines.push(format!(
                            "var {} = __import({});\n",
                            self.name_of(SymbolId::new(id, interop)),
                            target
                        ));
                    }
                }
            }
        }

        lines
    }

    fn render_inlined(
        &self,
        id: ModuleId,
        usage: &mut RuntimeUsage,
        externals: &mut ExternalCollector,
    ) -> Result<ModuleSection> {
        let module = self.graph.get(id);
        let prelude = self.record_prelude(id, usage);

        let mut stmts = Vec::new();
        for (index, item) in module.ast.body.iter().enumerate() {
            if !self.link.stmt_live[id as usize][index] {
                continue;
            }
            for piece in self.transform_item(id, item, &module.stmts[index], false, usage)? {
                stmts.push(piece);
            }
        }

        let mut epilogue = Vec::new();
        if self.link.materialize_ns[id as usize] {
            if let Some(literal) = self.ns_literal(id, None, usage, externals) {
                epilogue.push(literal);
            }
        }

        Ok(ModuleSection {
            banner: module.display_path(),
            source_path: module.display_path(),
            prelude,
            stmts,
            epilogue,
        })
    }

    fn render_wrapped(
        &self,
        id: ModuleId,
        usage: &mut RuntimeUsage,
        externals: &mut ExternalCollector,
    ) -> Result<Vec<String>> {
        let module = self.graph.get(id);
        let mut lines = Vec::new();

        // ES module exports surface through closure getters on `exports`
        if !module.exports.is_empty() || !module.star_exports.is_empty() {
            if module.export_kind != module_graph::ExportKindTag::CommonJs {
                let members = &self.link.ns_members[id as usize];
                if !members.is_empty() {
                    usage.use_export();
                    let mut text = "__export(exports, {\n".to_string();
                    for (name, member) in members {
                        let expr = self.member_expr(member, Some(id), usage, externals, name);
                        let _ = writeln!(text, "  {}: () => {},", quote_prop(name), expr);
                    }
                    text.push_str("});\n");
                    lines.push(text);
                }
            }
        }

        lines.extend(self.record_prelude(id, usage));

        for (index, item) in module.ast.body.iter().enumerate() {
            if !self.link.stmt_live[id as usize][index] {
                continue;
            }
            for (text, _) in self.transform_item(id, item, &module.stmts[index], true, usage)? {
                lines.push(text);
            }
        }

        Ok(lines)
    }

    /// Lowers one top-level item to output text. Import/export syntax is
    /// consumed here; plain statements rewrite and print as-is.
    fn transform_item(
        &self,
        id: ModuleId,
        item: &ModuleItem,
        info: &StmtInfo,
        inside_wrapper: bool,
        usage: &mut RuntimeUsage,
    ) -> Result<Vec<(String, Option<(u32, u32)>)>> {
        let module = self.graph.get(id);
        let origin = |span: swc_common::Span| -> Option<(u32, u32)> {
            if span.lo == swc_common::BytePos(0) && span.hi == swc_common::BytePos(0) {
                return None;
            }
            let loc = module.cm.lookup_char_pos(span.lo);
            Some((loc.line.saturating_sub(1) as u32, loc.col_display as u32))
        };

        let mut out: Vec<(String, Option<(u32, u32)>)> = Vec::new();

        match item {
            ModuleItem::Stmt(stmt) => {
                let text =
                    self.print_rewritten(id, ModuleItem::Stmt(stmt.clone()), inside_wrapper, usage)?;
                out.push((text, origin(stmt.span())));
            }
            ModuleItem::ModuleDecl(decl) => match decl {
                ModuleDecl::ExportDecl(export) => {
                    let text = self.print_rewritten(
                        id,
                        ModuleItem::Stmt(Stmt::Decl(export.decl.clone())),
                        inside_wrapper,
                        usage,
                    )?;
                    out.push((text, origin(export.span)));
                    if inside_wrapper {
                        self.hoist_assignments(id, info, &mut out);
                    }
                }
                ModuleDecl::ExportDefaultDecl(export) => {
                    let default_symbol = info.declared.first().copied();
                    let stmt = match &export.decl {
                        swc_ecma_ast::DefaultDecl::Fn(fn_expr) => {
                            let ident = self.default_ident(
                                id,
                                fn_expr.ident.clone(),
                                default_symbol,
                                inside_wrapper,
                            );
                            Some(Stmt::Decl(Decl::Fn(FnDecl {
                                ident,
                                declare: false,
                                function: fn_expr.function.clone(),
                            })))
                        }
                        swc_ecma_ast::DefaultDecl::Class(class_expr) => {
                            let ident = self.default_ident(
                                id,
                                class_expr.ident.clone(),
                                default_symbol,
                                inside_wrapper,
                            );
                            Some(Stmt::Decl(Decl::Class(ClassDecl {
                                ident,
                                declare: false,
                                class: class_expr.class.clone(),
                            })))
                        }
                        swc_ecma_ast::DefaultDecl::TsInterfaceDecl(_) => None,
                    };
                    if let Some(stmt) = stmt {
                        let text =
                            self.print_rewritten(id, ModuleItem::Stmt(stmt), inside_wrapper, usage)?;
                        out.push((text, origin(export.span)));
                        if inside_wrapper {
                            self.hoist_assignments(id, info, &mut out);
                        }
                    }
                }
                ModuleDecl::ExportDefaultExpr(export) => {
                    if let Some(&symbol) = info.declared.first() {
                        let name = self.name_for_default(id, symbol, inside_wrapper);
                        let printed = self.print_rewritten(
                            id,
                            ModuleItem::Stmt(Stmt::Expr(ExprStmt {
                                span: export.span,
                                expr: export.expr.clone(),
                            })),
                            inside_wrapper,
                            usage,
                        )?;
                        let keyword = if inside_wrapper { "" } else { "var " };
                        out.push((
                            format!("{}{} = {}", keyword, name, printed),
                            origin(export.span),
                        ));
                    }
                }
                // import declarations became prelude lines; bare export
                // lists and re-export forms are linker metadata
                ModuleDecl::Import(_)
                | ModuleDecl::ExportNamed(_)
                | ModuleDecl::ExportAll(_)
                | ModuleDecl::TsImportEquals(_)
                | ModuleDecl::TsExportAssignment(_)
                | ModuleDecl::TsNamespaceExport(_) => {}
            },
        }
        Ok(out)
    }

    /// Applies the rewriter to one item and prints it.
    fn print_rewritten(
        &self,
        id: ModuleId,
        mut item: ModuleItem,
        inside_wrapper: bool,
        usage: &mut RuntimeUsage,
    ) -> Result<String> {
        let mut rewriter =
            Rewriter::new(self.graph, self.link, self.names, id, inside_wrapper, usage);
        item.visit_mut_with(&mut rewriter);
        swc_utils_print::module_item_to_str(&self.graph.get(id).cm, &item, None)
    }

    /// `hoisted = local;` lines after a wrapped ES module's exported
    /// declaration.
    fn hoist_assignments(
        &self,
        id: ModuleId,
        info: &StmtInfo,
        out: &mut Vec<(String, Option<(u32, u32)>)>,
    ) {
        let module = self.graph.get(id);
        for &symbol in &info.declared {
            let exported = module.exports.iter().any(|export| {
                matches!(&export.target, ExportTarget::Local(local) if *local == symbol)
            });
            if !exported {
                continue;
            }
            if let Some(hoisted) = self.names.get(&SymbolId::new(id, symbol)) {
                let local = &module.symbols.get(symbol).name;
                out.push((format!("{} = {};\n", hoisted, local), None));
            }
        }
    }

    fn default_ident(
        &self,
        id: ModuleId,
        original: Option<Ident>,
        default_symbol: Option<u32>,
        inside_wrapper: bool,
    ) -> Ident {
        if let Some(ident) = original {
            return ident;
        }
        let name = match default_symbol {
            Some(symbol) => self.name_for_default(id, symbol, inside_wrapper),
            None => "__default".to_string(),
        };
        Ident {
            span: DUMMY_SP,
            ctxt: swc_common::SyntaxContext::empty(),
            sym: name.as_str().into(),
            optional: false,
        }
    }

    /// Output name for a module's `default` export symbol. Inside a
    /// wrapper the hoisted name is assigned, so an inner placeholder that
    /// cannot collide with module code is used.
    fn name_for_default(&self, id: ModuleId, symbol: u32, inside_wrapper: bool) -> String {
        if inside_wrapper {
            let module = self.graph.get(id);
            if let Some(name) = self.names.get(&SymbolId::new(id, symbol)) {
                return name.clone();
            }
            let mut candidate = "__default".to_string();
            let mut suffix = 2;
            while module.used_names.contains(&candidate) {
                candidate = format!("__default{}", suffix);
                suffix += 1;
            }
            candidate
        } else {
            self.name_of(SymbolId::new(id, symbol))
        }
    }

    fn render_entry_exports(
        &self,
        entry: ModuleId,
        usage: &mut RuntimeUsage,
        _externals: &mut ExternalCollector,
    ) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        match self.options.format {
            OutputFormat::Esm => {
                let module = self.graph.get(entry);
                if module.commonjs_markers {
                    usage.use_import();
                    lines.push(format!("export default __import({});\n", entry));
                    return Ok(lines);
                }
                let mut pairs: Vec<String> = Vec::new();
                for (name, member) in &self.link.ns_members[entry as usize] {
                    match member {
                        NsMember::Direct(symbol) => {
                            let local = self.ground_name(*symbol);
                            if &local == name {
                                pairs.push(local);
                            } else {
                                pairs.push(format!("{} as {}", local, name));
                            }
                        }
                        NsMember::NamespaceOf(inner) => {
                            if let Some(ns) = self.link.ns_symbol[*inner as usize] {
                                pairs.push(format!(
                                    "{} as {}",
                                    self.name_of(SymbolId::new(*inner, ns)),
                                    name
                                ));
                            }
                        }
                        NsMember::Runtime(runtime_module) => {
                            if is_valid_ident(name) {
                                usage.use_import();
                                lines.push(format!(
                                    "export var {} = __import({})[{}];\n",
                                    name,
                                    runtime_module,
                                    quote_str(name)
                                ));
                            }
                        }
                        NsMember::External {
                            specifier,
                            imported,
                        } => {
                            lines.push(format!(
                                "export {{ {} as {} }} from {:?};\n",
                                imported, name, specifier
                            ));
                        }
                        NsMember::ReExport { .. } => {}
                    }
                }
                if !pairs.is_empty() {
                    lines.push(format!("export {{ {} }};\n", pairs.join(", ")));
                }
            }
            OutputFormat::Cjs => {
                let ns = self.entry_ns_expr(entry, usage);
                lines.push(format!("module.exports = {};\n", ns));
            }
            // the envelope return handles iife and umd
            OutputFormat::Iife | OutputFormat::Umd => {}
        }
        Ok(lines)
    }

    fn render_external_imports_esm(
        &self,
        chunk: &Chunk,
        externals: &ExternalCollector,
    ) -> Vec<String> {
        let mut lines = Vec::new();

        // side-effect-only externals first, in module order
        let mut seen: AHashSet<String> = AHashSet::default();
        for &id in &chunk.modules {
            for record in &self.graph.get(id).imports {
                if let Some(ModuleRef::External(specifier)) = &record.resolved {
                    if record.kind == ImportRecordKind::SideEffect
                        && seen.insert(specifier.clone())
                    {
                        lines.push(format!("import {:?};\n", specifier));
                    }
                }
            }
        }

        for binding in self.external_bindings(chunk) {
            if binding.star {
                lines.push(format!(
                    "import * as {} from {:?};\n",
                    binding.local, binding.specifier
                ));
            } else if binding.imported == binding.local {
                lines.push(format!(
                    "import {{ {} }} from {:?};\n",
                    binding.local, binding.specifier
                ));
            } else {
                lines.push(format!(
                    "import {{ {} as {} }} from {:?};\n",
                    binding.imported, binding.local, binding.specifier
                ));
            }
        }

        for (specifier, binding) in &externals.ns_bindings {
            lines.push(format!("import * as {} from {:?};\n", binding, specifier));
        }
        lines
    }

    fn render_external_imports_cjs(
        &self,
        chunk: &Chunk,
        externals: &ExternalCollector,
        usage: &mut RuntimeUsage,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        for binding in self.external_bindings(chunk) {
            if binding.star {
                usage.to_module = true;
                lines.push(format!(
                    "var {} = __toModule(require({}));\n",
                    binding.local,
                    quote_str(&binding.specifier)
                ));
            } else if binding.imported == "default" {
                usage.to_module = true;
                lines.push(format!(
                    "var {} = __toModule(require({})).default;\n",
                    binding.local,
                    quote_str(&binding.specifier)
                ));
            } else {
                lines.push(format!(
                    "var {} = require({})[{}];\n",
                    binding.local,
                    quote_str(&binding.specifier),
                    quote_str(&binding.imported)
                ));
            }
        }
        for (specifier, binding) in &externals.ns_bindings {
            usage.to_module = true;
            lines.push(format!(
                "var {} = __toModule(require({}));\n",
                binding,
                quote_str(specifier)
            ));
        }
        lines
    }

    /// Live external import bindings of the chunk.
    fn external_bindings(&self, chunk: &Chunk) -> Vec<ExternalBinding> {
        let mut out = Vec::new();
        for &id in &chunk.modules {
            let module = self.graph.get(id);
            if module.representation == Representation::Dropped {
                continue;
            }
            for (index, _) in module.symbols.iter() {
                let symbol = SymbolId::new(id, index);
                if !self.link.is_symbol_live(symbol) {
                    continue;
                }
                match self.link.import_targets.get(&symbol) {
                    Some(ImportTarget::ExternalNamed {
                        specifier,
                        imported,
                    }) => out.push(ExternalBinding {
                        specifier: specifier.clone(),
                        imported: imported.clone(),
                        local: self.name_of(symbol),
                        star: false,
                    }),
                    Some(ImportTarget::ExternalNamespace { specifier }) => {
                        out.push(ExternalBinding {
                            specifier: specifier.clone(),
                            imported: "*".to_string(),
                            local: self.name_of(symbol),
                            star: true,
                        })
                    }
                    _ => {}
                }
            }
        }
        out
    }
}

struct ExternalBinding {
    specifier: String,
    imported: String,
    local: String,
    star: bool,
}

fn is_valid_ident(name: &str) -> bool {
    !name.is_empty()
        && name.chars().enumerate().all(|(i, c)| {
            c == '_' || c == '$' || if i == 0 { c.is_ascii_alphabetic() } else { c.is_ascii_alphanumeric() }
        })
}

fn quote_prop(name: &str) -> String {
    if is_valid_ident(name) {
        name.to_string()
    } else {
        quote_str(name)
    }
}

fn quote_str(value: &str) -> String {
    serde_json::to_string(value).expect("string serialization is infallible")
}
