use std::path::PathBuf;

use ahashmap::AHashSet;
use swc_common::sync::Lrc;
use swc_common::{SourceMap, Span, SyntaxContext};
use swc_ecma_ast::Module;
use swc_utils_parse::LoaderKind;

use crate::symbol::SymbolTable;

pub type ModuleId = u32;

/// Where a resolved import points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    Module(ModuleId),
    /// External imports keep the original specifier verbatim.
    External(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportRecordKind {
    Default,
    Named,
    Namespace,
    SideEffect,
}

/// One imported binding (or side-effect edge) of a module.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub specifier: String,
    pub span: Span,
    pub kind: ImportRecordKind,
    /// For named imports: the name as exported by the target.
    pub imported_name: Option<String>,
    /// Local symbol bound by this record, if any.
    pub local_symbol: Option<u32>,
    pub is_require: bool,
    pub is_dynamic_import: bool,
    /// Filled by the graph builder.
    pub resolved: Option<ModuleRef>,
    /// For namespace imports: the binding escapes as a value (assigned,
    /// passed, spread), which forces namespace materialization.
    pub ns_value_observed: bool,
    /// For namespace imports: statically-keyed property accesses
    /// (`ns.foo`, `ns["foo"]`).
    pub ns_static_keys: Vec<(String, Span)>,
}

impl ImportRecord {
    pub fn new(specifier: String, span: Span, kind: ImportRecordKind) -> Self {
        Self {
            specifier,
            span,
            kind,
            imported_name: None,
            local_symbol: None,
            is_require: false,
            is_dynamic_import: false,
            resolved: None,
            ns_value_observed: false,
            ns_static_keys: Vec::new(),
        }
    }
}

/// What an exported name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// A symbol declared in this module.
    Local(u32),
    /// Re-export through one of this module's import records
    /// (`export { x } from './a'`, `export * as ns from './a'`).
    ReExport { import: usize },
}

#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub name: String,
    pub span: Span,
    pub target: ExportTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportKindTag {
    #[default]
    None,
    Esm,
    CommonJs,
    Mixed,
}

/// Facts about one top-level statement, gathered at parse time and consumed
/// by the tree-shaker.
#[derive(Debug, Clone, Default)]
pub struct StmtInfo {
    /// Symbols declared by this statement.
    pub declared: Vec<u32>,
    /// Top-level symbols referenced anywhere inside this statement.
    pub referenced: Vec<u32>,
    /// Import records introduced by this statement (import declarations,
    /// `require()` calls, dynamic `import()`).
    pub import_records: Vec<usize>,
    pub side_effects: bool,
    /// True for import/export declarations, which never print as-is.
    pub is_module_decl: bool,
}

/// How a module is represented in its chunk. Decided by the linker,
/// executed by the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    #[default]
    Inlined,
    Wrapped,
    Dropped,
}

/// An asset emitted on behalf of a `file`-loader module.
#[derive(Debug, Clone)]
pub struct AssetRef {
    pub source_path: PathBuf,
    /// File name below the output directory.
    pub output_name: String,
}

/// One parsed source file.
pub struct ModuleRecord {
    pub id: ModuleId,
    /// Absolute path, or the raw specifier for non-`file` namespaces.
    pub path: PathBuf,
    pub namespace: String,
    pub loader: LoaderKind,
    /// Hash of the source bytes; determinism checks compare these.
    pub contents_hash: u64,
    pub source_len: usize,

    pub cm: Lrc<SourceMap>,
    pub ast: Module,
    pub unresolved_ctxt: SyntaxContext,
    pub top_level_ctxt: SyntaxContext,

    pub symbols: SymbolTable,
    pub imports: Vec<ImportRecord>,
    pub exports: Vec<ExportRecord>,
    /// Import-record indices of `export * from` statements, in source order.
    pub star_exports: Vec<usize>,
    pub stmts: Vec<StmtInfo>,

    pub export_kind: ExportKindTag,
    /// CommonJS markers seen in the body (`module.exports =`,
    /// `exports.x =`, dynamic-argument `require`).
    pub commonjs_markers: bool,
    pub must_wrap: bool,
    pub has_side_effects: bool,
    pub representation: Representation,

    /// Modules that import this one (or its namespace).
    pub referenced_by: AHashSet<ModuleId>,

    /// Names referenced but bound nowhere in the file: host globals the
    /// renamer must not shadow.
    pub unbound_names: AHashSet<String>,
    /// Every identifier that appears in the file, bindings included. Fresh
    /// names picked by the renamer must avoid these.
    pub used_names: AHashSet<String>,

    /// Set when the file failed to parse; the record participates in the
    /// graph but emit is disabled.
    pub failed: bool,
    pub asset: Option<AssetRef>,
}

impl ModuleRecord {
    pub fn is_entry_or_injected(&self, entries: &[ModuleId], injected: &[ModuleId]) -> bool {
        entries.contains(&self.id) || injected.contains(&self.id)
    }

    /// Printable name for banners and diagnostics.
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

impl std::fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("namespace", &self.namespace)
            .field("export_kind", &self.export_kind)
            .field("must_wrap", &self.must_wrap)
            .field("imports", &self.imports.len())
            .field("exports", &self.exports.len())
            .finish()
    }
}
