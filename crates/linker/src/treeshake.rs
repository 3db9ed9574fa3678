//! Tree-shaker: statement-level liveness from a root set of entry
//! exports and side-effectful top-level statements.
//!
//! Worklist over three kinds of facts: a module is included, a statement
//! is live, a symbol is live. Wrapped modules do not shake internally;
//! including one keeps its whole body.

use ahashmap::{AHashMap, AHashSet};
use logger::Logger;
use module_graph::{
    ExportTarget, ImportRecordKind, ModuleGraph, ModuleId, ModuleRef, Representation, SymbolId,
};
use std::collections::BTreeMap;

use crate::{ImportTarget, NsMember};

pub struct ShakeOutput {
    pub included: Vec<bool>,
    pub stmt_live: Vec<Vec<bool>>,
    pub symbol_live: AHashSet<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    IncludeModule(ModuleId),
    LiveStmt(ModuleId, usize),
    LiveSymbol(SymbolId),
    /// Every export-reachable symbol of the module becomes live (entry
    /// exports, materialized namespaces).
    LiveNamespace(ModuleId),
}

pub struct Shaker<'a> {
    graph: &'a ModuleGraph,
    import_targets: &'a AHashMap<SymbolId, ImportTarget>,
    ns_members: &'a [BTreeMap<String, NsMember>],
    materialize_ns: &'a [bool],
    keep_all: bool,

    included: Vec<bool>,
    stmt_live: Vec<Vec<bool>>,
    symbol_live: AHashSet<SymbolId>,
    ns_done: Vec<bool>,
    /// symbol index -> declaring statement indices, per module
    declaring_stmts: Vec<AHashMap<u32, Vec<usize>>>,
    work: Vec<Action>,
}

pub fn shake(
    graph: &ModuleGraph,
    import_targets: &AHashMap<SymbolId, ImportTarget>,
    ns_members: &[BTreeMap<String, NsMember>],
    materialize_ns: &[bool],
    keep_all: bool,
) -> ShakeOutput {
    let count = graph.len();
    let declaring_stmts = graph
        .modules
        .iter()
        .map(|module| {
            let mut map: AHashMap<u32, Vec<usize>> = AHashMap::default();
            for (index, stmt) in module.stmts.iter().enumerate() {
                for &symbol in &stmt.declared {
                    map.entry(symbol).or_default().push(index);
                }
            }
            map
        })
        .collect();

    let mut shaker = Shaker {
        graph,
        import_targets,
        ns_members,
        materialize_ns,
        keep_all,
        included: vec![false; count],
        stmt_live: graph
            .modules
            .iter()
            .map(|m| vec![false; m.stmts.len()])
            .collect(),
        symbol_live: AHashSet::default(),
        ns_done: vec![false; count],
        declaring_stmts,
        work: Vec::new(),
    };

    for &entry in graph.entries.iter().chain(graph.injected.iter()) {
        shaker.work.push(Action::IncludeModule(entry));
        shaker.work.push(Action::LiveNamespace(entry));
    }
    shaker.run();

    ShakeOutput {
        included: shaker.included,
        stmt_live: shaker.stmt_live,
        symbol_live: shaker.symbol_live,
    }
}

impl Shaker<'_> {
    fn run(&mut self) {
        while let Some(action) = self.work.pop() {
            match action {
                Action::IncludeModule(id) => self.include_module(id),
                Action::LiveStmt(id, index) => self.live_stmt(id, index),
                Action::LiveSymbol(symbol) => self.live_symbol(symbol),
                Action::LiveNamespace(id) => self.live_namespace(id),
            }
        }
    }

    fn include_module(&mut self, id: ModuleId) {
        if self.included[id as usize] {
            return;
        }
        self.included[id as usize] = true;

        let graph = self.graph;
        let module = graph.get(id);
        let keep_everything = self.keep_all || module.must_wrap;
        for (index, stmt) in module.stmts.iter().enumerate() {
            if keep_everything || stmt.side_effects {
                self.work.push(Action::LiveStmt(id, index));
            }
        }
        // every import of an included module keeps its target included,
        // bindings used or not: the target's module-level side effects
        // still run. A target with no side effects ends up with no live
        // statements and is dropped from the chunk anyway.
        for index in 0..module.imports.len() {
            self.fire_record(id, index);
        }
    }

    fn live_stmt(&mut self, id: ModuleId, index: usize) {
        if self.stmt_live[id as usize][index] {
            return;
        }
        self.stmt_live[id as usize][index] = true;

        let graph = self.graph;
        let module = graph.get(id);
        let stmt = &module.stmts[index];
        for &symbol in &stmt.referenced {
            self.work.push(Action::LiveSymbol(SymbolId::new(id, symbol)));
        }
        for &symbol in &stmt.declared {
            self.work.push(Action::LiveSymbol(SymbolId::new(id, symbol)));
        }
        for &record in &stmt.import_records {
            let kind = module.imports[record].kind;
            // named bindings go live through their symbols; direct record
            // firing here covers the bindingless edges in live code
            if matches!(kind, ImportRecordKind::Namespace | ImportRecordKind::SideEffect)
                && module.imports[record].local_symbol.is_none()
            {
                self.fire_record(id, record);
            }
        }
    }

    fn live_symbol(&mut self, symbol: SymbolId) {
        if !self.symbol_live.insert(symbol) {
            return;
        }
        self.work.push(Action::IncludeModule(symbol.module));

        if let Some(stmts) = self.declaring_stmts[symbol.module as usize].get(&symbol.index) {
            for &index in stmts {
                self.work.push(Action::LiveStmt(symbol.module, index));
            }
        }

        let graph = self.graph;
        let sym = graph.get(symbol.module).symbols.get(symbol.index);
        if let Some(link) = sym.link {
            self.work.push(Action::LiveSymbol(link));
        }
        if let Some(record) = sym.import_record {
            self.fire_record(symbol.module, record);
        }
        let import_targets = self.import_targets;
        match import_targets.get(&symbol) {
            Some(ImportTarget::Symbol(target)) => {
                self.work.push(Action::LiveSymbol(*target));
            }
            Some(ImportTarget::RuntimeProp(target, _)) => {
                self.work.push(Action::IncludeModule(*target));
            }
            Some(ImportTarget::Namespace(target)) => {
                self.work.push(Action::IncludeModule(*target));
            }
            _ => {}
        }
    }

    /// Processes one import edge from live code.
    fn fire_record(&mut self, id: ModuleId, record_index: usize) {
        let graph = self.graph;
        let ns_members = self.ns_members;
        let record = &graph.get(id).imports[record_index];
        let Some(ModuleRef::Module(target)) = &record.resolved else {
            return;
        };
        let target = *target;
        self.work.push(Action::IncludeModule(target));

        match record.kind {
            ImportRecordKind::SideEffect => {}
            ImportRecordKind::Namespace => {
                if graph.get(target).commonjs_markers {
                    // runtime namespace, nothing static to keep
                } else if self.materialize_ns[target as usize]
                    || record.is_dynamic_import
                    || record.is_require
                {
                    self.work.push(Action::LiveNamespace(target));
                } else {
                    // virtual namespace: only the statically-keyed members
                    // stay live
                    for (key, _) in &record.ns_static_keys {
                        if let Some(member) = ns_members[target as usize].get(key) {
                            self.live_member(member.clone());
                        }
                    }
                }
            }
            ImportRecordKind::Default | ImportRecordKind::Named => {
                // resolution went through the binding symbol; liveness
                // arrives via LiveSymbol on the local binding
            }
        }
    }

    fn live_namespace(&mut self, id: ModuleId) {
        if self.ns_done[id as usize] {
            return;
        }
        self.ns_done[id as usize] = true;
        self.work.push(Action::IncludeModule(id));

        // entry modules re-export through their own records too
        let graph = self.graph;
        let module = graph.get(id);
        for export in &module.exports {
            if let ExportTarget::ReExport { import } = &export.target {
                self.fire_record(id, *import);
            }
        }
        for &star in &module.star_exports {
            self.fire_record(id, star);
        }

        let members: Vec<NsMember> = self.ns_members[id as usize].values().cloned().collect();
        for member in members {
            self.live_member(member);
        }
    }

    fn live_member(&mut self, member: NsMember) {
        match member {
            NsMember::Direct(symbol) => {
                self.work.push(Action::LiveSymbol(symbol));
            }
            NsMember::Runtime(module) => {
                self.work.push(Action::IncludeModule(module));
            }
            NsMember::NamespaceOf(module) => {
                self.work.push(Action::IncludeModule(module));
                if self.materialize_ns[module as usize] {
                    self.work.push(Action::LiveNamespace(module));
                }
            }
            NsMember::ReExport { module, import } => {
                // un-grounded leftovers only appear for unresolved imports
                self.fire_record(module, import);
            }
            NsMember::External { .. } => {}
        }
    }
}

/// Converts liveness into each module's terminal representation.
pub fn apply_representations(
    graph: &mut ModuleGraph,
    included: &[bool],
    stmt_live: &[Vec<bool>],
    logger: &impl Logger,
) {
    let mut dropped = 0usize;
    for module in graph.modules.iter_mut() {
        let id = module.id as usize;
        let any_live = stmt_live[id].iter().any(|&live| live);
        module.representation = if !included[id] || (!any_live && !module.must_wrap) {
            dropped += 1;
            Representation::Dropped
        } else if module.must_wrap {
            Representation::Wrapped
        } else {
            Representation::Inlined
        };
    }
    logger::debug_logf!(
        logger,
        "tree shaking dropped {} of {} modules",
        dropped,
        graph.len()
    );
}
