//! Flattens `export *` chains into per-module namespace
//! membership.
//!
//! Rules: locally declared or re-exported names shadow star contributions;
//! `default` never travels through a star; a name supplied by two star
//! sources with no local shadow is ambiguous and is dropped from the
//! namespace entirely.

use std::collections::BTreeMap;

use logger_srcfile::Diagnostic;
use module_graph::{ExportTarget, ImportRecordKind, ModuleGraph, ModuleId, ModuleRef, SymbolId};

use crate::NsMember;

pub fn flatten_star_exports(
    graph: &ModuleGraph,
) -> (Vec<BTreeMap<String, NsMember>>, Vec<Diagnostic>) {
    let mut warnings = Vec::new();
    let count = graph.len();

    // own membership first: export records only
    let mut own: Vec<BTreeMap<String, NsMember>> = Vec::with_capacity(count);
    for module in graph.modules.iter() {
        let mut members = BTreeMap::new();
        for export in &module.exports {
            let member = match &export.target {
                ExportTarget::Local(symbol) => {
                    NsMember::Direct(SymbolId::new(module.id, *symbol))
                }
                ExportTarget::ReExport { import } => {
                    let record = &module.imports[*import];
                    match &record.resolved {
                        Some(ModuleRef::External(specifier)) => NsMember::External {
                            specifier: specifier.clone(),
                            imported: record
                                .imported_name
                                .clone()
                                .unwrap_or_else(|| "*".to_string()),
                        },
                        // grounded to a concrete symbol during import resolution
                        _ => NsMember::ReExport {
                            module: module.id,
                            import: *import,
                        },
                    }
                }
            };
            members.insert(export.name.clone(), member);
        }
        // CommonJS-like modules expose whatever the factory assigns; their
        // static membership is empty and reads go through the runtime.
        own.push(members);
    }

    // flatten stars, depth-first with a cycle cut
    let mut full: Vec<Option<BTreeMap<String, NsMember>>> = vec![None; count];
    for id in 0..count as ModuleId {
        let mut in_progress = vec![false; count];
        flatten_one(graph, id, &own, &mut full, &mut in_progress, &mut warnings);
    }

    (
        full.into_iter().map(|m| m.unwrap_or_default()).collect(),
        warnings,
    )
}

fn flatten_one(
    graph: &ModuleGraph,
    id: ModuleId,
    own: &[BTreeMap<String, NsMember>],
    full: &mut Vec<Option<BTreeMap<String, NsMember>>>,
    in_progress: &mut Vec<bool>,
    warnings: &mut Vec<Diagnostic>,
) -> BTreeMap<String, NsMember> {
    if let Some(done) = &full[id as usize] {
        return done.clone();
    }
    if in_progress[id as usize] {
        // star cycle: contribute only the names known so far
        return own[id as usize].clone();
    }
    in_progress[id as usize] = true;

    let module = graph.get(id);
    let mut members = own[id as usize].clone();
    let mut ambiguous: Vec<String> = Vec::new();

    for &star in &module.star_exports {
        let record = &module.imports[star];
        debug_assert_eq!(record.kind, ImportRecordKind::Namespace);
        match &record.resolved {
            Some(ModuleRef::Module(target)) => {
                let contributed = flatten_one(graph, *target, own, full, in_progress, warnings);
                for (name, member) in contributed {
                    if name == "default" {
                        continue;
                    }
                    if own[id as usize].contains_key(&name) {
                        continue;
                    }
                    match members.get(&name) {
                        None => {
                            members.insert(name, member);
                        }
                        Some(existing) if *existing == member => {}
                        Some(_) => {
                            // two stars supply the same name with no local shadow:
                            // the name is ambiguous and leaves the namespace
                            ambiguous.push(name);
                        }
                    }
                }
            }
            Some(ModuleRef::External(specifier)) => {
                warnings.push(Diagnostic::warning(format!(
                    "\"export * from {:?}\" is external and its names are not statically tracked",
                    specifier
                )));
            }
            None => {}
        }
    }

    for name in ambiguous {
        members.remove(&name);
    }

    in_progress[id as usize] = false;
    full[id as usize] = Some(members.clone());
    members
}

