//! The metadata file (`--metafile=` / the analyse command).

use std::collections::BTreeMap;

use module_graph::{ModuleGraph, ModuleRef};
use serde::Serialize;

#[derive(Debug, Default, Serialize)]
pub struct Metafile {
    pub inputs: BTreeMap<String, MetaInput>,
    pub outputs: BTreeMap<String, MetaOutput>,
}

#[derive(Debug, Default, Serialize)]
pub struct MetaInput {
    pub bytes: usize,
    pub imports: Vec<MetaImport>,
}

#[derive(Debug, Serialize)]
pub struct MetaImport {
    pub path: String,
    pub kind: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaOutput {
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    pub inputs: BTreeMap<String, MetaOutputInput>,
    pub imports: Vec<MetaImport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaOutputInput {
    pub bytes_in_output: usize,
}

pub fn record_kind(record: &module_graph::ImportRecord) -> &'static str {
    if record.is_dynamic_import {
        "dynamic-import"
    } else if record.is_require {
        "require-call"
    } else {
        "import-statement"
    }
}

/// The `inputs` half, from the finished graph.
pub fn collect_inputs(graph: &ModuleGraph) -> BTreeMap<String, MetaInput> {
    let mut inputs = BTreeMap::new();
    for module in graph.modules.iter() {
        let imports = module
            .imports
            .iter()
            .filter_map(|record| {
                let path = match &record.resolved {
                    Some(ModuleRef::Module(target)) => graph.get(*target).display_path(),
                    Some(ModuleRef::External(specifier)) => specifier.clone(),
                    None => return None,
                };
                Some(MetaImport {
                    path,
                    kind: record_kind(record).to_string(),
                })
            })
            .collect();
        inputs.insert(
            module.display_path(),
            MetaInput {
                bytes: module.source_len,
                imports,
            },
        );
    }
    inputs
}
