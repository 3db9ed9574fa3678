//! The import/export linker, tree-shaker and renamer.
//!
//! `link` runs single-threaded over a finished module graph: classify
//! modules and decide wrapping, flatten `export *` namespaces, resolve
//! every named import to its ground symbol (or a runtime read), decide
//! which namespaces materialize, then compute the live set. The renamer
//! runs later, per chunk.

mod classify;
mod named;
mod namespace;
mod rename;
mod star;
mod treeshake;

#[cfg(test)]
mod link_tests;

use ahashmap::AHashMap;
use logger::Logger;
use logger_srcfile::Diagnostic;
use module_graph::{ModuleGraph, ModuleId, SymbolId};
use multi_err::MultiErr;
use std::collections::BTreeMap;

pub use rename::{assign_names, NameRequest, RenameOptions, JS_KEYWORDS, RUNTIME_NAMES};

/// Where an imported binding ultimately points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// Direct link to a concrete symbol; emitted as a plain identifier.
    Symbol(SymbolId),
    /// Property read off the target module's runtime namespace (CommonJS
    /// targets, re-export cycles, star-ambiguous fallbacks).
    RuntimeProp(ModuleId, String),
    /// The target module's namespace object.
    Namespace(ModuleId),
    ExternalNamed {
        specifier: String,
        imported: String,
    },
    ExternalNamespace {
        specifier: String,
    },
}

/// One name in a module's flattened namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NsMember {
    /// Grounded in a concrete symbol.
    Direct(SymbolId),
    /// The whole namespace of another module (`export * as ns from`).
    NamespaceOf(ModuleId),
    /// Re-export through an import record; import resolution grounds these.
    ReExport { module: ModuleId, import: usize },
    /// Only readable off the named module's runtime exports object.
    Runtime(ModuleId),
    /// Re-export of an external module's name.
    External { specifier: String, imported: String },
}

#[derive(Debug, Default)]
pub struct LinkOptions {
    /// Disable statement-level dead code elimination (`--no-treeshake`
    /// style escape hatch; everything reachable stays live).
    pub keep_all: bool,
    /// Entry modules whose namespace object the output format consumes
    /// (`module.exports = ...` for cjs, the UMD factory return value, an
    /// iife assigned to a global).
    pub entries_need_namespace: Vec<ModuleId>,
}

pub struct LinkOutput {
    /// Resolution of every import-binding symbol.
    pub import_targets: AHashMap<SymbolId, ImportTarget>,
    /// Per module: flattened namespace membership (own exports plus
    /// `export *`), ambiguous names already dropped. Ordered for
    /// deterministic emission.
    pub ns_members: Vec<BTreeMap<String, NsMember>>,
    /// Per module: namespace object literal must be emitted.
    pub materialize_ns: Vec<bool>,
    /// Per module: synthesized namespace-object symbol.
    pub ns_symbol: Vec<Option<u32>>,
    /// `(importer, wrapped target)` -> synthesized binding in the importer
    /// holding `__import(target)`, used for runtime property reads.
    pub interop_symbol: AHashMap<(ModuleId, ModuleId), u32>,
    /// Tree-shaking results.
    pub included: Vec<bool>,
    pub stmt_live: Vec<Vec<bool>>,
    pub symbol_live: ahashmap::AHashSet<SymbolId>,
}

impl LinkOutput {
    pub fn is_symbol_live(&self, symbol: SymbolId) -> bool {
        self.symbol_live.contains(&symbol)
    }
}

/// Runs phases A through D plus the tree-shaker. Mutates the graph:
/// wrap flags, symbol links, use counts, synthesized symbols,
/// representations.
pub fn link(
    graph: &mut ModuleGraph,
    options: &LinkOptions,
    logger: impl Logger,
) -> (LinkOutput, MultiErr<Diagnostic>) {
    let mut log = MultiErr::new();

    // classification and wrapping
    classify::classify(graph);

    // flatten star exports
    let (raw_ns_members, star_warnings) = star::flatten_star_exports(graph);
    log.add_iter(star_warnings);

    // resolve named imports to ground symbols
    let named::NamedOutput {
        import_targets,
        mut extra_wraps,
    } = named::resolve_named_imports(graph, &raw_ns_members, &mut log);
    let ns_members = named::ground_ns_members(graph, raw_ns_members, &mut extra_wraps, &mut log);
    for module in extra_wraps {
        graph.get_mut(module).must_wrap = true;
    }

    // namespace materialization
    let namespace::NamespaceOutput {
        materialize_ns,
        ns_symbol,
        interop_symbol,
    } = namespace::materialize_namespaces(
        graph,
        &ns_members,
        &import_targets,
        &options.entries_need_namespace,
    );

    // tree-shaking
    let treeshake::ShakeOutput {
        included,
        stmt_live,
        symbol_live,
    } = treeshake::shake(
        graph,
        &import_targets,
        &ns_members,
        &materialize_ns,
        options.keep_all,
    );

    treeshake::apply_representations(graph, &included, &stmt_live, &logger);

    (
        LinkOutput {
            import_targets,
            ns_members,
            materialize_ns,
            ns_symbol,
            interop_symbol,
            included,
            stmt_live,
            symbol_live,
        },
        log,
    )
}
