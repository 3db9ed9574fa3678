//! Namespace materialization.
//!
//! A module's namespace object literal is emitted only when the namespace
//! is observed as a value somewhere, or when a static property access
//! cannot be rewritten to a direct symbol reference. CommonJS-like targets
//! never materialize a literal; their namespace is the runtime exports
//! object behind `__import(id)`.

use ahashmap::AHashMap;
use module_graph::{ImportRecordKind, ModuleGraph, ModuleId, ModuleRef, SymbolKind};
use std::collections::BTreeMap;

use crate::{ImportTarget, NsMember};

pub struct NamespaceOutput {
    pub materialize_ns: Vec<bool>,
    pub ns_symbol: Vec<Option<u32>>,
    /// `(importer, wrapped target)` -> synthesized binding in the importer
    /// holding `__import(target)`, used for runtime property reads.
    pub interop_symbol: AHashMap<(ModuleId, ModuleId), u32>,
}

pub fn materialize_namespaces(
    graph: &mut ModuleGraph,
    ns_members: &[BTreeMap<String, NsMember>],
    import_targets: &AHashMap<module_graph::SymbolId, ImportTarget>,
    entries_need_namespace: &[ModuleId],
) -> NamespaceOutput {
    let count = graph.len();
    let mut materialize = vec![false; count];

    for module in graph.modules.iter() {
        for record in &module.imports {
            if record.kind != ImportRecordKind::Namespace {
                continue;
            }
            let Some(ModuleRef::Module(target)) = &record.resolved else {
                continue;
            };
            let target = *target;
            if graph.get(target).commonjs_markers {
                // runtime namespace; no literal either way
                continue;
            }
            if record.ns_value_observed || record.is_dynamic_import || record.is_require {
                materialize[target as usize] = true;
                continue;
            }
            // property-only access: the namespace stays virtual as long as
            // every key grounds in a direct export
            for (key, _) in &record.ns_static_keys {
                match ns_members[target as usize].get(key) {
                    Some(NsMember::Direct(_)) | Some(NsMember::NamespaceOf(_)) => {}
                    _ => {
                        materialize[target as usize] = true;
                        break;
                    }
                }
            }
        }
    }

    for &entry in entries_need_namespace {
        if !graph.get(entry).commonjs_markers {
            materialize[entry as usize] = true;
        }
    }

    // a materialized namespace whose member is itself a namespace object
    // forces that namespace to exist too
    loop {
        let mut changed = false;
        for id in 0..count {
            if !materialize[id] {
                continue;
            }
            for member in ns_members[id].values() {
                if let NsMember::NamespaceOf(inner) = member {
                    let inner = *inner as usize;
                    if !materialize[inner] && !graph.modules[inner].commonjs_markers {
                        materialize[inner] = true;
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    // synthesize the namespace-object symbols
    let mut ns_symbol: Vec<Option<u32>> = vec![None; count];
    for id in 0..count {
        if materialize[id] {
            let name = format!("{}_exports", stem_ident(graph, id as ModuleId));
            let symbol = graph.modules[id]
                .symbols
                .declare_synthetic(name, SymbolKind::Namespace);
            ns_symbol[id] = Some(symbol);
        }
    }

    // synthesize interop bindings for runtime property reads
    let mut interop_symbol: AHashMap<(ModuleId, ModuleId), u32> = AHashMap::default();
    let mut needed: Vec<(ModuleId, ModuleId)> = import_targets
        .iter()
        .filter_map(|(binding, target)| match target {
            ImportTarget::RuntimeProp(target, _) => Some((binding.module, *target)),
            _ => None,
        })
        .collect();
    needed.sort_unstable();
    needed.dedup();
    for (importer, target) in needed {
        let name = format!("import_{}", stem_ident(graph, target));
        let symbol = graph
            .get_mut(importer)
            .symbols
            .declare_synthetic(name, SymbolKind::Namespace);
        interop_symbol.insert((importer, target), symbol);
    }

    NamespaceOutput {
        materialize_ns: materialize,
        ns_symbol,
        interop_symbol,
    }
}

/// Identifier-safe stem of a module's file name, for synthesized symbol
/// names (`foo_exports`, `import_foo`).
pub fn stem_ident(graph: &ModuleGraph, id: ModuleId) -> String {
    let module = graph.get(id);
    let stem = module
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module");
    let mut out = String::with_capacity(stem.len());
    for (i, c) in stem.chars().enumerate() {
        let valid = c == '_' || c == '$' || if i == 0 { c.is_ascii_alphabetic() } else { c.is_ascii_alphanumeric() };
        out.push(if valid { c } else { '_' });
    }
    if out.is_empty() || out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        out.insert(0, '_');
    }
    out
}
