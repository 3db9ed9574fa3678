//! Graph builder: walks entry points, drives the resolver and loader,
//! and numbers modules in discovery order.
//!
//! Discovery runs in waves so parsing parallelizes without giving up
//! deterministic ids: every file in a wave parses on the rayon pool, then
//! the driver walks the wave's results in order, assigning ids to newly
//! discovered children as they are first seen. Entries come first in input
//! order, then children in source order within each parent.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahashmap::{AHashMap, AHashSet};
use import_resolver::{Load, Resolution, Resolve};
use logger::{debug_logf, Logger};
use logger_srcfile::Diagnostic;
use multi_err::MultiErr;
use rayon::prelude::*;
use swc_common::FileName;
use swc_ecma_ast::Module;
use swc_utils_parse::{parse_module, synthesize_module_source, LoaderKind, ParsedModule};

use crate::parse::{apply_defines, scan_module, DefineMap, ScanOptions, ScanOutput};
use crate::record::{AssetRef, ModuleId, ModuleRecord, ModuleRef, Representation};

pub struct BuildGraphOptions {
    pub entries: Vec<PathBuf>,
    /// `--inject:` modules; discovered after entries, added to the
    /// tree-shaking roots by the driver.
    pub injected: Vec<PathBuf>,
    pub defines: DefineMap,
    pub pure_fns: AHashSet<String>,
    /// Prefix for `file`-loader asset URLs (`--public-path=`).
    pub public_path: String,
    pub error_limit: usize,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for BuildGraphOptions {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            injected: Vec::new(),
            defines: DefineMap::default(),
            pure_fns: AHashSet::default(),
            public_path: String::new(),
            error_limit: 10,
            cancel: None,
        }
    }
}

pub struct ModuleGraph {
    pub modules: Vec<ModuleRecord>,
    pub entries: Vec<ModuleId>,
    pub injected: Vec<ModuleId>,
    by_key: AHashMap<(PathBuf, String), ModuleId>,
}

impl ModuleGraph {
    pub fn get(&self, id: ModuleId) -> &ModuleRecord {
        &self.modules[id as usize]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut ModuleRecord {
        &mut self.modules[id as usize]
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn lookup(&self, path: &Path, namespace: &str) -> Option<ModuleId> {
        self.by_key
            .get(&(path.to_path_buf(), namespace.to_string()))
            .copied()
    }
}

/// One unit of wave work: a module id plus where to load it from.
#[derive(Debug, Clone)]
struct QueueItem {
    id: ModuleId,
    path: PathBuf,
    namespace: String,
}

/// The Send subset of a [`ParsedModule`]; comments stay on the worker.
struct ParsedParts {
    cm: swc_common::sync::Lrc<swc_common::SourceMap>,
    module: Module,
    unresolved_ctxt: swc_common::SyntaxContext,
    top_level_ctxt: swc_common::SyntaxContext,
}

impl From<ParsedModule> for ParsedParts {
    fn from(parsed: ParsedModule) -> Self {
        Self {
            cm: parsed.cm,
            module: parsed.module,
            unresolved_ctxt: parsed.unresolved_ctxt,
            top_level_ctxt: parsed.top_level_ctxt,
        }
    }
}

/// What a parse worker hands back to the driver.
struct WorkerOutput {
    parsed: Option<ParsedParts>,
    scan: ScanOutput,
    loader: LoaderKind,
    contents_hash: u64,
    source_len: usize,
    asset: Option<AssetRef>,
    resolutions: Vec<Option<Resolution>>,
    diagnostics: Vec<Diagnostic>,
    failed: bool,
}

pub fn build_graph(
    options: BuildGraphOptions,
    resolver: &dyn Resolve,
    loader: &dyn Load,
    logger: impl Logger + Sync,
) -> (ModuleGraph, MultiErr<Diagnostic>) {
    let mut log: MultiErr<Diagnostic> = MultiErr::with_limit(options.error_limit);
    let mut graph = ModuleGraph {
        modules: Vec::new(),
        entries: Vec::new(),
        injected: Vec::new(),
        by_key: AHashMap::default(),
    };

    let mut queue: Vec<QueueItem> = Vec::new();
    let mut next_id: ModuleId = 0;
    let mut enqueue = |graph: &mut ModuleGraph,
                       queue: &mut Vec<QueueItem>,
                       next_id: &mut ModuleId,
                       path: PathBuf,
                       namespace: String|
     -> ModuleId {
        let key = (path.clone(), namespace.clone());
        if let Some(&existing) = graph.by_key.get(&key) {
            return existing;
        }
        let id = *next_id;
        *next_id += 1;
        graph.by_key.insert(key, id);
        queue.push(QueueItem {
            id,
            path,
            namespace,
        });
        id
    };

    for entry in &options.entries {
        let id = enqueue(
            &mut graph,
            &mut queue,
            &mut next_id,
            entry.clone(),
            "file".to_string(),
        );
        if !graph.entries.contains(&id) {
            graph.entries.push(id);
        }
    }
    for injected in &options.injected {
        let id = enqueue(
            &mut graph,
            &mut queue,
            &mut next_id,
            injected.clone(),
            "file".to_string(),
        );
        if !graph.injected.contains(&id) {
            graph.injected.push(id);
        }
    }

    while !queue.is_empty() {
        if cancelled(&options.cancel) {
            break;
        }
        let wave = std::mem::take(&mut queue);
        debug_logf!(logger, "parsing wave of {} files", wave.len());

        let outputs: Vec<WorkerOutput> = wave
            .par_iter()
            .map(|item| {
                if cancelled(&options.cancel) {
                    return failed_output();
                }
                process_file(item, resolver, loader, &options)
            })
            .collect();

        for (item, mut output) in wave.into_iter().zip(outputs) {
            log.add_iter(std::mem::take(&mut output.diagnostics));
            let resolutions = std::mem::take(&mut output.resolutions);

            let mut record = into_record(item.id, item.path, item.namespace, output);
            for (index, resolution) in resolutions.into_iter().enumerate() {
                match resolution {
                    Some(Resolution::Path { path, namespace }) => {
                        let target = enqueue(&mut graph, &mut queue, &mut next_id, path, namespace);
                        record.imports[index].resolved = Some(ModuleRef::Module(target));
                    }
                    Some(Resolution::External { specifier }) => {
                        record.imports[index].resolved = Some(ModuleRef::External(specifier));
                    }
                    // resolution failed; the diagnostic is already logged
                    None => {}
                }
            }
            graph.modules.push(record);
        }

        if options.error_limit > 0 && log.len() >= options.error_limit {
            logger.error("too many errors, giving up on the module graph");
            break;
        }
    }

    // reverse edges, for wrap propagation and diagnostics
    let edges: Vec<(ModuleId, ModuleId)> = graph
        .modules
        .iter()
        .flat_map(|module| {
            module.imports.iter().filter_map(move |import| {
                match &import.resolved {
                    Some(ModuleRef::Module(target)) => Some((*target, module.id)),
                    _ => None,
                }
            })
        })
        .collect();
    for (target, source) in edges {
        // an aborted build can leave edges to ids that were never parsed
        if (target as usize) < graph.modules.len() {
            graph.modules[target as usize].referenced_by.insert(source);
        }
    }

    (graph, log)
}

fn cancelled(flag: &Option<Arc<AtomicBool>>) -> bool {
    flag.as_ref()
        .map(|f| f.load(Ordering::Relaxed))
        .unwrap_or(false)
}

fn failed_output() -> WorkerOutput {
    WorkerOutput {
        parsed: None,
        scan: ScanOutput::default(),
        loader: LoaderKind::Js,
        contents_hash: 0,
        source_len: 0,
        asset: None,
        resolutions: Vec::new(),
        diagnostics: Vec::new(),
        failed: true,
    }
}

/// Loads, synthesizes (for non-JS loaders), parses, and scans one file.
fn process_file(
    item: &QueueItem,
    resolver: &dyn Resolve,
    loader: &dyn Load,
    options: &BuildGraphOptions,
) -> WorkerOutput {
    let loaded = match loader.load(&item.path, &item.namespace) {
        Ok(loaded) => loaded,
        Err(err) => {
            let mut out = failed_output();
            out.diagnostics
                .push(Diagnostic::error(format!("{:#}", err)));
            return out;
        }
    };

    let mut hasher = DefaultHasher::new();
    loaded.bytes.hash(&mut hasher);
    let contents_hash = hasher.finish();
    let source_len = loaded.bytes.len();

    let mut asset = None;
    let public_url = if loaded.loader == LoaderKind::File {
        Some(asset_public_url(item, contents_hash, options, &mut asset))
    } else {
        None
    };
    let source = match synthesize_module_source(
        loaded.loader,
        &loaded.bytes,
        public_url.as_deref(),
    ) {
        None => match String::from_utf8(loaded.bytes) {
            Ok(source) => source,
            Err(err) => {
                let mut out = failed_output();
                out.diagnostics.push(Diagnostic::error(format!(
                    "{}: file is not valid UTF-8: {}",
                    item.path.display(),
                    err
                )));
                return out;
            }
        },
        Some(Ok(source)) => source,
        Some(Err(message)) => {
            let mut out = failed_output();
            out.diagnostics.push(Diagnostic::error(format!(
                "{}: {}",
                item.path.display(),
                message
            )));
            return out;
        }
    };

    let file_name = if item.namespace == "file" {
        FileName::Real(item.path.clone())
    } else {
        FileName::Custom(item.path.to_string_lossy().to_string())
    };
    let mut parsed = match parse_module(file_name, source, loaded.loader) {
        Ok(parsed) => parsed,
        Err(diagnostics) => {
            let mut out = failed_output();
            out.diagnostics = diagnostics;
            return out;
        }
    };

    apply_defines(&mut parsed.module, &options.defines, parsed.unresolved_ctxt);

    let scan = scan_module(
        &parsed,
        &ScanOptions {
            pure_fns: options.pure_fns.clone(),
        },
    );

    let mut diagnostics: Vec<Diagnostic> = scan
        .warnings
        .iter()
        .map(|w| Diagnostic::warning(w.message.clone()).with_span(&parsed.cm, w.span))
        .collect();

    // resolve this file's imports; per-import work is independent
    let resolve_dir = item
        .path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/"));
    let resolutions: Vec<Option<Resolution>> = scan
        .imports
        .iter()
        .map(|import| {
            match resolver.resolve(&import.specifier, &item.path, &resolve_dir) {
                Ok(resolution) => Some(resolution),
                Err(err) => {
                    diagnostics
                        .push(Diagnostic::error(err.to_string()).with_span(&parsed.cm, import.span));
                    None
                }
            }
        })
        .collect();

    WorkerOutput {
        parsed: Some(parsed.into()),
        scan,
        loader: loaded.loader,
        contents_hash,
        source_len,
        asset,
        resolutions,
        diagnostics,
        failed: false,
    }
}

/// Output name and public URL for a `file`-loader asset. The name carries
/// a content hash so renamed inputs do not collide in the out directory.
fn asset_public_url(
    item: &QueueItem,
    contents_hash: u64,
    options: &BuildGraphOptions,
    asset: &mut Option<AssetRef>,
) -> String {
    let stem = item
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("asset");
    let ext = item
        .path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let output_name = format!("{}-{:08X}{}", stem, (contents_hash >> 32) as u32, ext);
    *asset = Some(AssetRef {
        source_path: item.path.clone(),
        output_name: output_name.clone(),
    });
    format!("{}{}", options.public_path, output_name)
}

fn into_record(
    id: ModuleId,
    path: PathBuf,
    namespace: String,
    output: WorkerOutput,
) -> ModuleRecord {
    let WorkerOutput {
        parsed,
        scan,
        loader,
        contents_hash,
        source_len,
        asset,
        resolutions: _,
        diagnostics: _,
        failed,
    } = output;

    let (cm, ast, unresolved_ctxt, top_level_ctxt) = match parsed {
        Some(parsed) => (
            parsed.cm,
            parsed.module,
            parsed.unresolved_ctxt,
            parsed.top_level_ctxt,
        ),
        None => (
            Default::default(),
            Module {
                span: Default::default(),
                body: vec![],
                shebang: None,
            },
            swc_common::SyntaxContext::empty(),
            swc_common::SyntaxContext::empty(),
        ),
    };

    ModuleRecord {
        id,
        path,
        namespace,
        loader,
        contents_hash,
        source_len,
        cm,
        ast,
        unresolved_ctxt,
        top_level_ctxt,
        symbols: scan.symbols,
        imports: scan.imports,
        exports: scan.exports,
        star_exports: scan.star_exports,
        stmts: scan.stmts,
        export_kind: scan.export_kind,
        commonjs_markers: scan.commonjs_markers,
        must_wrap: false,
        has_side_effects: scan.has_side_effects,
        representation: Representation::Inlined,
        referenced_by: AHashSet::default(),
        unbound_names: scan.unbound_names,
        used_names: scan.used_names,
        failed,
        asset,
    }
}
