//! Named-import resolution: every import links to a ground symbol.
//!
//! Every `{target, imported_name}` pair walks the target's export records,
//! following import-binding redirects and re-export chains. A visited set
//! cuts resolution cycles; a cyclic name degrades to a late-binding read
//! through the wrapped target's namespace instead of a direct link.

use std::collections::BTreeMap;

use ahashmap::{AHashMap, AHashSet};
use logger_srcfile::Diagnostic;
use module_graph::{
    ExportKindTag, ImportRecordKind, ModuleGraph, ModuleId, ModuleRef, SymbolId, SymbolKind,
};
use multi_err::MultiErr;

use crate::{ImportTarget, NsMember};

pub struct NamedOutput {
    pub import_targets: AHashMap<SymbolId, ImportTarget>,
    /// Modules that gained a wrap requirement during resolution (cycle and
    /// runtime-read targets).
    pub extra_wraps: AHashSet<ModuleId>,
}

/// Ground form of one exported name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved {
    Found(SymbolId),
    Runtime(ModuleId, String),
    Namespace(ModuleId),
    External { specifier: String, imported: String },
    Missing,
}

pub fn resolve_named_imports(
    graph: &mut ModuleGraph,
    ns_members: &[BTreeMap<String, NsMember>],
    log: &mut MultiErr<Diagnostic>,
) -> NamedOutput {
    let mut import_targets: AHashMap<SymbolId, ImportTarget> = AHashMap::default();
    let mut extra_wraps: AHashSet<ModuleId> = AHashSet::default();
    let mut observe_ns: Vec<(ModuleId, usize)> = Vec::new();
    let mut links: Vec<(SymbolId, SymbolId)> = Vec::new();
    let mut errors: Vec<(ModuleId, usize, String)> = Vec::new();

    for id in 0..graph.len() as ModuleId {
        let module = graph.get(id);
        for (index, record) in module.imports.iter().enumerate() {
            let Some(local) = record.local_symbol else {
                continue;
            };
            let binding = SymbolId::new(id, local);
            match (&record.resolved, record.kind) {
                (Some(ModuleRef::External(specifier)), ImportRecordKind::Namespace) => {
                    import_targets.insert(
                        binding,
                        ImportTarget::ExternalNamespace {
                            specifier: specifier.clone(),
                        },
                    );
                }
                (Some(ModuleRef::External(specifier)), _) => {
                    import_targets.insert(
                        binding,
                        ImportTarget::ExternalNamed {
                            specifier: specifier.clone(),
                            imported: record
                                .imported_name
                                .clone()
                                .unwrap_or_else(|| "default".to_string()),
                        },
                    );
                }
                (Some(ModuleRef::Module(target)), ImportRecordKind::Namespace) => {
                    import_targets.insert(binding, ImportTarget::Namespace(*target));
                }
                (Some(ModuleRef::Module(target)), _) => {
                    let name = record
                        .imported_name
                        .clone()
                        .unwrap_or_else(|| "default".to_string());
                    let mut visited = AHashSet::default();
                    let resolved = resolve_member(
                        graph,
                        ns_members,
                        *target,
                        &name,
                        &mut visited,
                        &mut extra_wraps,
                        &mut observe_ns,
                    );
                    match resolved {
                        Resolved::Found(symbol) => {
                            links.push((binding, symbol));
                            import_targets.insert(binding, ImportTarget::Symbol(symbol));
                        }
                        Resolved::Runtime(runtime_module, runtime_name) => {
                            if !graph.get(runtime_module).commonjs_markers {
                                extra_wraps.insert(runtime_module);
                            }
                            import_targets.insert(
                                binding,
                                ImportTarget::RuntimeProp(runtime_module, runtime_name),
                            );
                        }
                        Resolved::Namespace(ns_module) => {
                            import_targets.insert(binding, ImportTarget::Namespace(ns_module));
                        }
                        Resolved::External {
                            specifier,
                            imported,
                        } => {
                            import_targets.insert(
                                binding,
                                ImportTarget::ExternalNamed {
                                    specifier,
                                    imported,
                                },
                            );
                        }
                        Resolved::Missing => {
                            let target_module = graph.get(*target);
                            if !target_module.failed {
                                errors.push((
                                    id,
                                    index,
                                    format!(
                                        "No matching export in {:?} for import {:?}",
                                        target_module.display_path(),
                                        name
                                    ),
                                ));
                            }
                        }
                    }
                }
                (None, _) => {}
            }
        }
    }

    // deferred mutations: symbol links, use counts, namespace observations
    for (binding, target) in links {
        graph
            .get_mut(binding.module)
            .symbols
            .get_mut(binding.index)
            .link = Some(target);
        graph
            .get_mut(target.module)
            .symbols
            .get_mut(target.index)
            .external_use_count += 1;
    }
    for (module, import) in observe_ns {
        graph.get_mut(module).imports[import].ns_value_observed = true;
    }
    for (module, import, message) in errors {
        let record_span = graph.get(module).imports[import].span;
        let cm = graph.get(module).cm.clone();
        log.add_single(Diagnostic::error(message).with_span(&cm, record_span));
    }

    NamedOutput {
        import_targets,
        extra_wraps,
    }
}

/// Resolves `name` in `target`'s namespace to its ground form.
#[allow(clippy::too_many_arguments)]
fn resolve_member(
    graph: &ModuleGraph,
    ns_members: &[BTreeMap<String, NsMember>],
    target: ModuleId,
    name: &str,
    visited: &mut AHashSet<(ModuleId, String)>,
    extra_wraps: &mut AHashSet<ModuleId>,
    observe_ns: &mut Vec<(ModuleId, usize)>,
) -> Resolved {
    if !visited.insert((target, name.to_string())) {
        // re-export cycle: collapse to a late-binding read through the
        // wrapped module's namespace
        extra_wraps.insert(target);
        return Resolved::Runtime(target, name.to_string());
    }

    let module = graph.get(target);
    if module.commonjs_markers {
        return Resolved::Runtime(target, name.to_string());
    }

    match ns_members[target as usize].get(name) {
        None => {
            if module.export_kind == ExportKindTag::Esm {
                Resolved::Missing
            } else {
                // scripts without exports: permitted, resolved at runtime
                Resolved::Runtime(target, name.to_string())
            }
        }
        Some(NsMember::Runtime(runtime_module)) => {
            Resolved::Runtime(*runtime_module, name.to_string())
        }
        Some(NsMember::External {
            specifier,
            imported,
        }) => Resolved::External {
            specifier: specifier.clone(),
            imported: imported.clone(),
        },
        Some(NsMember::NamespaceOf(ns_module)) => Resolved::Namespace(*ns_module),
        Some(NsMember::ReExport { module, import }) => {
            follow_record(graph, ns_members, *module, *import, visited, extra_wraps, observe_ns)
        }
        Some(NsMember::Direct(symbol)) => {
            let owner = graph.get(symbol.module);
            let sym = owner.symbols.get(symbol.index);
            if sym.kind == SymbolKind::ImportBinding {
                match sym.import_record {
                    Some(record) => follow_record(
                        graph,
                        ns_members,
                        symbol.module,
                        record,
                        visited,
                        extra_wraps,
                        observe_ns,
                    ),
                    None => Resolved::Found(*symbol),
                }
            } else {
                Resolved::Found(*symbol)
            }
        }
    }
}

/// Follows one import record while resolving a re-exported name.
fn follow_record(
    graph: &ModuleGraph,
    ns_members: &[BTreeMap<String, NsMember>],
    module: ModuleId,
    import: usize,
    visited: &mut AHashSet<(ModuleId, String)>,
    extra_wraps: &mut AHashSet<ModuleId>,
    observe_ns: &mut Vec<(ModuleId, usize)>,
) -> Resolved {
    let record = &graph.get(module).imports[import];
    match (&record.resolved, record.kind) {
        (Some(ModuleRef::External(specifier)), ImportRecordKind::Namespace) => {
            Resolved::External {
                specifier: specifier.clone(),
                imported: "*".to_string(),
            }
        }
        (Some(ModuleRef::External(specifier)), _) => Resolved::External {
            specifier: specifier.clone(),
            imported: record
                .imported_name
                .clone()
                .unwrap_or_else(|| "default".to_string()),
        },
        (Some(ModuleRef::Module(target)), ImportRecordKind::Namespace) => {
            // the re-exported value IS a namespace object
            observe_ns.push((module, import));
            Resolved::Namespace(*target)
        }
        (Some(ModuleRef::Module(target)), _) => {
            let name = record
                .imported_name
                .clone()
                .unwrap_or_else(|| "default".to_string());
            resolve_member(
                graph,
                ns_members,
                *target,
                &name,
                visited,
                extra_wraps,
                observe_ns,
            )
        }
        (None, _) => Resolved::Missing,
    }
}

/// Grounds the flattened namespace tables: re-export members become their
/// resolved form so the printer can emit getters without re-walking
/// chains. A re-export of a name its target never exports is an error at
/// the re-export site, exactly like a missing direct import.
pub fn ground_ns_members(
    graph: &mut ModuleGraph,
    ns_members: Vec<BTreeMap<String, NsMember>>,
    extra_wraps: &mut AHashSet<ModuleId>,
    log: &mut MultiErr<Diagnostic>,
) -> Vec<BTreeMap<String, NsMember>> {
    let mut observe_ns: Vec<(ModuleId, usize)> = Vec::new();
    // (record owner, record index, imported name) of missing re-exports
    let mut missing: Vec<(ModuleId, usize, String)> = Vec::new();
    let grounded: Vec<BTreeMap<String, NsMember>> = (0..graph.len() as ModuleId)
        .map(|id| {
            ns_members[id as usize]
                .iter()
                .map(|(name, member)| {
                    let origin = member_record(graph, member);
                    let grounded = if origin.is_some() {
                        let mut visited = AHashSet::default();
                        match resolve_member(
                            graph,
                            &ns_members,
                            id,
                            name,
                            &mut visited,
                            extra_wraps,
                            &mut observe_ns,
                        ) {
                            Resolved::Found(symbol) => NsMember::Direct(symbol),
                            Resolved::Runtime(runtime_module, _) => {
                                NsMember::Runtime(runtime_module)
                            }
                            Resolved::Namespace(ns_module) => NsMember::NamespaceOf(ns_module),
                            Resolved::External {
                                specifier,
                                imported,
                            } => NsMember::External {
                                specifier,
                                imported,
                            },
                            Resolved::Missing => {
                                if let Some((owner, import)) = origin {
                                    let record = &graph.get(owner).imports[import];
                                    // records with a local binding already
                                    // errored in the direct-import pass
                                    if record.local_symbol.is_none() {
                                        let imported = record
                                            .imported_name
                                            .clone()
                                            .unwrap_or_else(|| name.clone());
                                        missing.push((owner, import, imported));
                                    }
                                }
                                // emit is disabled once the error is logged;
                                // the placeholder only keeps the table shaped
                                NsMember::Runtime(id)
                            }
                        }
                    } else {
                        member.clone()
                    };
                    (name.clone(), grounded)
                })
                .collect()
        })
        .collect();

    for (module, import) in observe_ns {
        graph.get_mut(module).imports[import].ns_value_observed = true;
    }

    missing.sort();
    missing.dedup();
    for (owner, import, imported) in missing {
        let record = &graph.get(owner).imports[import];
        let target = match &record.resolved {
            Some(ModuleRef::Module(target)) => graph.get(*target).display_path(),
            Some(ModuleRef::External(specifier)) => specifier.clone(),
            None => record.specifier.clone(),
        };
        let span = record.span;
        let cm = graph.get(owner).cm.clone();
        log.add_single(
            Diagnostic::error(format!(
                "No matching export in {:?} for import {:?}",
                target, imported
            ))
            .with_span(&cm, span),
        );
    }

    grounded
}

/// The import record a namespace member resolves through, when it is a
/// re-export that still needs grounding.
fn member_record(graph: &ModuleGraph, member: &NsMember) -> Option<(ModuleId, usize)> {
    match member {
        NsMember::ReExport { module, import } => Some((*module, *import)),
        NsMember::Direct(symbol) => {
            let sym = graph.get(symbol.module).symbols.get(symbol.index);
            if sym.kind == SymbolKind::ImportBinding {
                sym.import_record.map(|import| (symbol.module, import))
            } else {
                None
            }
        }
        _ => None,
    }
}
