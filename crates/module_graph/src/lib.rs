//! The module graph: per-module symbol tables, module records,
//! and the graph builder that discovers modules from entry points.

pub mod builder;
pub mod parse;
pub mod record;
pub mod symbol;

pub use builder::{build_graph, BuildGraphOptions, ModuleGraph};
pub use record::{
    AssetRef, ExportKindTag, ExportRecord, ExportTarget, ImportRecord, ImportRecordKind,
    ModuleId, ModuleRecord, ModuleRef, Representation, StmtInfo,
};
pub use symbol::{Symbol, SymbolId, SymbolKind, SymbolTable};
