//! The build driver: validates options, runs the pipeline stages in
//! order, checks the log between stages, and writes output files.
//!
//! Stage order: graph build (parallel parse) -> link -> chunk plan ->
//! rename -> print (parallel per chunk) -> write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ahashmap::AHashSet;
use anyhow::{Context, Result};
use chunk_emit::{
    plan_chunks, print_chunk, Chunk, ChunkMode, CrossChunkImport, OutputFormat, PrintOptions,
};
use import_resolver::{FsLoader, FsResolver, FsResolverOptions, Load, Resolve};
use linker::{link, LinkOptions, LinkOutput, NsMember, RenameOptions};
use logger::{debug_logf, Logger};
use logger_srcfile::Diagnostic;
use module_graph::{
    build_graph, BuildGraphOptions, ModuleGraph, ModuleId, Representation, SymbolId,
};
use multi_err::MultiErr;
use path_utils::{common_ancestor, rebase_output_path, swap_out_extension, to_slash_string};
use rayon::prelude::*;

use crate::cfg::{BundleOptions, SourceMapMode};
use crate::metafile::{self, MetaImport, MetaOutput, MetaOutputInput, Metafile};

#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
    pub executable: bool,
}

#[derive(Default)]
pub struct BuildResult {
    pub outputs: Vec<OutputFile>,
    pub metafile: Option<String>,
    pub diagnostics: MultiErr<Diagnostic>,
}

impl BuildResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    fn from_config_error(error: impl std::fmt::Display) -> Self {
        let mut diagnostics = MultiErr::new();
        diagnostics.add_single(Diagnostic::error(error.to_string()));
        Self {
            diagnostics,
            ..Default::default()
        }
    }
}

pub fn build(options: &BundleOptions, logger: impl Logger + Sync) -> BuildResult {
    if let Err(error) = options.validate() {
        return BuildResult::from_config_error(error);
    }

    // without --bundle each entry transforms in isolation
    if !options.bundle {
        return transform(options, logger);
    }

    // resolver configuration files load before any module work
    let tsconfig = match &options.tsconfig {
        Some(path) => match tsconfig_paths::TsconfigPathsJson::from_path(path) {
            Ok(parsed) => Some((config_base(path), parsed)),
            Err(error) => return BuildResult::from_config_error(error),
        },
        None => None,
    };
    let amd = match &options.amdconfig {
        Some(path) => match amd_config::AmdConfigJson::from_path(path) {
            Ok(parsed) => Some((config_base(path), parsed)),
            Err(error) => return BuildResult::from_config_error(error),
        },
        None => None,
    };
    let defines = match module_graph::parse::DefineMap::parse(&options.defines) {
        Ok(defines) => defines,
        Err(error) => return BuildResult::from_config_error(error),
    };

    let resolver = FsResolver::new(FsResolverOptions {
        extensions: options.resolve_extensions.clone(),
        externals: options.externals.clone(),
        tsconfig,
        amd,
    });
    let loader = FsLoader::new(options.loader_overrides.clone());

    build_with(options, &resolver, &loader, defines, logger)
}

/// The pipeline behind [`build`], parameterized over the resolver/loader
/// contracts so plugins and tests can substitute their own.
pub fn build_with(
    options: &BundleOptions,
    resolver: &dyn Resolve,
    loader: &dyn Load,
    defines: module_graph::parse::DefineMap,
    logger: impl Logger + Sync,
) -> BuildResult {
    let graph_options = BuildGraphOptions {
        entries: options.entries.clone(),
        injected: options.inject.clone(),
        defines,
        pure_fns: options.pure_fns.iter().cloned().collect(),
        public_path: options.public_path.clone(),
        error_limit: options.error_limit,
        cancel: None,
    };

    let (mut graph, mut log) = build_graph(graph_options, resolver, loader, &logger);
    if graph.modules.iter().any(|m| m.failed) || log.has_errors() {
        // parse and resolution problems disable emit; everything collected
        // so far is returned
        return BuildResult {
            diagnostics: log,
            ..Default::default()
        };
    }

    debug_logf!(logger, "linking {} modules", graph.len());
    let entries_need_namespace = match options.format {
        OutputFormat::Cjs | OutputFormat::Umd => graph.entries.clone(),
        OutputFormat::Iife if options.global_name.is_some() => graph.entries.clone(),
        _ => Vec::new(),
    };
    let (link_output, link_log) = link(
        &mut graph,
        &LinkOptions {
            keep_all: false,
            entries_need_namespace,
        },
        &logger,
    );
    log.add_multi(link_log);
    if log.has_errors() {
        return BuildResult {
            diagnostics: log,
            ..Default::default()
        };
    }

    let mode = if options.splitting {
        ChunkMode::Split
    } else {
        ChunkMode::Single
    };
    let chunks = plan_chunks(&graph, &link_output.included, mode);

    if options.splitting {
        if let Some(shared) = chunks.iter().find(|c| c.entry.is_none()) {
            if let Some(&wrapped) = shared
                .modules
                .iter()
                .find(|&&m| graph.get(m).representation == Representation::Wrapped)
            {
                log.add_single(Diagnostic::error(format!(
                    "Code splitting does not support the CommonJS module {:?} shared between entry points",
                    graph.get(wrapped).display_path()
                )));
                return BuildResult {
                    diagnostics: log,
                    ..Default::default()
                };
            }
        }
    }

    // one naming scope across all chunks keeps split-mode imports aligned
    let all_modules: Vec<ModuleId> = chunks.iter().flat_map(|c| c.modules.clone()).collect();
    let names = linker::assign_names(
        &graph,
        &link_output,
        &all_modules,
        &RenameOptions {
            minify_identifiers: options.minify_identifiers,
            keep_names: options.keep_names,
        },
    );

    let chunk_paths = output_paths(options, &graph, &chunks);
    let shared_exports = shared_chunk_exports(&graph, &link_output, &chunks);

    let printed: Vec<_> = chunks
        .par_iter()
        .zip(chunk_paths.par_iter())
        .map(|(chunk, path)| {
            let print_options = PrintOptions {
                format: options.format,
                global_name: options.global_name.clone(),
                banner: options.banner.clone(),
                footer: options.footer.clone(),
                minify_whitespace: options.minify_whitespace,
                source_map: options.sourcemap != SourceMapMode::None,
                cross_imports: cross_imports_for(chunk, &chunks, &chunk_paths, &shared_exports),
                cross_exports: if chunk.entry.is_none() {
                    shared_exports.clone()
                } else {
                    Vec::new()
                },
            };
            print_chunk(&graph, &link_output, chunk, &names, &print_options)
                .with_context(|| format!("printing chunk {}", path.display()))
        })
        .collect();

    let mut outputs: Vec<OutputFile> = Vec::new();
    let mut meta_outputs: BTreeMap<String, MetaOutput> = BTreeMap::new();
    for ((printed, chunk), path) in printed.into_iter().zip(&chunks).zip(&chunk_paths) {
        let printed = match printed {
            Ok(printed) => printed,
            Err(error) => {
                log.add_single(Diagnostic::error(format!("{:#}", error)));
                continue;
            }
        };

        let mut code = printed.code;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("out.js")
            .to_string();
        let mut map_file: Option<OutputFile> = None;
        if let Some(map) = printed.map {
            let map_json = map.build(&file_name);
            match options.sourcemap {
                SourceMapMode::Inline => {
                    code.push_str(&inline_map_comment(&map_json));
                }
                SourceMapMode::External => {
                    code.push_str(&format!("//# sourceMappingURL={}.map\n", file_name));
                    map_file = Some(OutputFile {
                        path: PathBuf::from(format!("{}.map", path.display())),
                        contents: map_json.into_bytes(),
                        executable: false,
                    });
                }
                SourceMapMode::Both => {
                    code.push_str(&inline_map_comment(&map_json));
                    map_file = Some(OutputFile {
                        path: PathBuf::from(format!("{}.map", path.display())),
                        contents: map_json.into_bytes(),
                        executable: false,
                    });
                }
                SourceMapMode::None => {}
            }
        }

        let mut meta_inputs: BTreeMap<String, MetaOutputInput> = BTreeMap::new();
        for (module, bytes) in &printed.input_bytes {
            meta_inputs.insert(
                graph.get(*module).display_path(),
                MetaOutputInput {
                    bytes_in_output: *bytes,
                },
            );
        }
        let imports = cross_imports_for(chunk, &chunks, &chunk_paths, &shared_exports)
            .into_iter()
            .map(|cross| MetaImport {
                path: cross.path,
                kind: "import-statement".to_string(),
            })
            .collect();
        meta_outputs.insert(
            to_slash_string(path),
            MetaOutput {
                bytes: code.len(),
                entry_point: chunk.entry.map(|e| graph.get(e).display_path()),
                inputs: meta_inputs,
                imports,
            },
        );

        outputs.push(OutputFile {
            path: path.clone(),
            contents: code.into_bytes(),
            executable: false,
        });
        outputs.extend(map_file);
    }

    // copy `file`-loader assets next to the chunks
    let asset_dir = options
        .outdir
        .clone()
        .or_else(|| options.outfile.as_ref().and_then(|f| f.parent().map(Path::to_path_buf)));
    for module in graph.modules.iter() {
        let Some(asset) = &module.asset else { continue };
        if !link_output.included[module.id as usize] {
            continue;
        }
        match std::fs::read(&asset.source_path) {
            Ok(bytes) => {
                let path = asset_dir
                    .clone()
                    .unwrap_or_default()
                    .join(&asset.output_name);
                meta_outputs.insert(
                    to_slash_string(&path),
                    MetaOutput {
                        bytes: bytes.len(),
                        entry_point: None,
                        inputs: BTreeMap::new(),
                        imports: Vec::new(),
                    },
                );
                outputs.push(OutputFile {
                    path,
                    contents: bytes,
                    executable: false,
                });
            }
            Err(error) => log.add_single(Diagnostic::error(format!(
                "reading asset {}: {}",
                asset.source_path.display(),
                error
            ))),
        }
    }

    let metafile_json = if options.metafile.is_some() {
        let meta = Metafile {
            inputs: metafile::collect_inputs(&graph),
            outputs: meta_outputs,
        };
        Some(serde_json::to_string_pretty(&meta).expect("metafile serialization is infallible"))
    } else {
        None
    };

    if log.has_errors() {
        return BuildResult {
            diagnostics: log,
            metafile: metafile_json,
            ..Default::default()
        };
    }

    if options.write {
        for output in &outputs {
            if let Err(error) = write_output(output) {
                // I/O failures are fatal
                log.add_single(Diagnostic::error(format!("{:#}", error)));
                return BuildResult {
                    diagnostics: log,
                    metafile: metafile_json,
                    ..Default::default()
                };
            }
        }
        if let (Some(path), Some(json)) = (&options.metafile, &metafile_json) {
            if let Err(error) = std::fs::write(path, json) {
                log.add_single(Diagnostic::error(format!(
                    "writing metafile {}: {}",
                    path.display(),
                    error
                )));
            }
        }
    }

    BuildResult {
        outputs,
        metafile: metafile_json,
        diagnostics: log,
    }
}

/// `analyse` command: the whole pipeline runs, nothing is written, the
/// metadata JSON is the result.
pub fn analyse(options: &BundleOptions, logger: impl Logger + Sync) -> BuildResult {
    let mut options = options.clone();
    options.write = false;
    if options.metafile.is_none() {
        options.metafile = Some(PathBuf::from("meta.json"));
    }
    let mut result = build(&options, logger);
    result.outputs.clear();
    result
}

/// `transform` command: single file, no resolution, no linking.
pub fn transform(options: &BundleOptions, logger: impl Logger + Sync) -> BuildResult {
    if options.entries.len() != 1 {
        return BuildResult::from_config_error("transform expects exactly one input file");
    }
    let input = &options.entries[0];
    debug_logf!(logger, "transforming {}", input.display());
    let defines = match module_graph::parse::DefineMap::parse(&options.defines) {
        Ok(defines) => defines,
        Err(error) => return BuildResult::from_config_error(error),
    };

    let loader = FsLoader::new(options.loader_overrides.clone());
    let loaded = match loader.load(input, "file") {
        Ok(loaded) => loaded,
        Err(error) => return BuildResult::from_config_error(format!("{:#}", error)),
    };
    let source = match String::from_utf8(loaded.bytes) {
        Ok(source) => source,
        Err(error) => return BuildResult::from_config_error(error),
    };

    let mut parsed = match swc_utils_parse::parse_module(
        swc_common::FileName::Real(input.clone()),
        source,
        loaded.loader,
    ) {
        Ok(parsed) => parsed,
        Err(diagnostics) => {
            let mut log = MultiErr::new();
            log.add_iter(diagnostics);
            return BuildResult {
                diagnostics: log,
                ..Default::default()
            };
        }
    };
    module_graph::parse::apply_defines(&mut parsed.module, &defines, parsed.unresolved_ctxt);

    let code = match swc_utils_print::ast_to_str(&parsed.cm, &parsed.module, None) {
        Ok(code) => code,
        Err(error) => return BuildResult::from_config_error(format!("{:#}", error)),
    };

    let path = options
        .outfile
        .clone()
        .unwrap_or_else(|| PathBuf::from("out.js"));
    let output = OutputFile {
        path,
        contents: code.into_bytes(),
        executable: false,
    };
    if options.write {
        if let Err(error) = write_output(&output) {
            return BuildResult::from_config_error(format!("{:#}", error));
        }
    }
    BuildResult {
        outputs: vec![output],
        ..Default::default()
    }
}

fn config_base(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn inline_map_comment(map_json: &str) -> String {
    format!(
        "//# sourceMappingURL=data:application/json;base64,{}\n",
        data_encoding::BASE64.encode(map_json.as_bytes())
    )
}

fn write_output(output: &OutputFile) -> Result<()> {
    if let Some(parent) = output.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    std::fs::write(&output.path, &output.contents)
        .with_context(|| format!("writing {}", output.path.display()))
}

/// Output file path per chunk, honoring `outfile`/`outdir`/`outbase` and
/// the out-extension mapping.
fn output_paths(options: &BundleOptions, graph: &ModuleGraph, chunks: &[Chunk]) -> Vec<PathBuf> {
    let outbase = options.outbase.clone().or_else(|| {
        common_ancestor(
            graph
                .entries
                .iter()
                .map(|&entry| graph.get(entry).path.as_path()),
        )
    });

    chunks
        .iter()
        .map(|chunk| {
            if let Some(outfile) = &options.outfile {
                return outfile.clone();
            }
            let file_name = format!("{}.js", chunk.name);
            let raw = match (&options.outdir, chunk.entry, &outbase) {
                (Some(outdir), Some(entry), Some(outbase)) => {
                    let entry_path = graph.get(entry).path.with_extension("js");
                    rebase_output_path(&entry_path, outbase, outdir)
                        .unwrap_or_else(|_| outdir.join(&file_name))
                }
                (Some(outdir), _, _) => outdir.join(&file_name),
                (None, _, _) => PathBuf::from(&file_name),
            };
            swap_out_extension(&raw, &options.out_extension)
        })
        .collect()
}

/// Split mode: every symbol the shared chunk must export.
fn shared_chunk_exports(
    graph: &ModuleGraph,
    link_output: &LinkOutput,
    chunks: &[Chunk],
) -> Vec<SymbolId> {
    let Some(shared) = chunks.iter().find(|c| c.entry.is_none()) else {
        return Vec::new();
    };
    let shared_set: AHashSet<ModuleId> = shared.modules.iter().copied().collect();

    let mut exports: Vec<SymbolId> = Vec::new();
    for &id in &shared.modules {
        if let Some(ns) = link_output.ns_symbol[id as usize] {
            if link_output.materialize_ns[id as usize] {
                exports.push(SymbolId::new(id, ns));
            }
        }
        for member in link_output.ns_members[id as usize].values() {
            if let NsMember::Direct(symbol) = member {
                if shared_set.contains(&symbol.module)
                    && link_output.is_symbol_live(ground(graph, *symbol))
                {
                    exports.push(ground(graph, *symbol));
                }
            }
        }
    }
    exports.sort_unstable();
    exports.dedup();
    exports
}

fn ground(graph: &ModuleGraph, symbol: SymbolId) -> SymbolId {
    let mut current = symbol;
    for _ in 0..=graph.len() {
        match graph.get(current.module).symbols.get(current.index).link {
            Some(next) => current = next,
            None => break,
        }
    }
    current
}

fn cross_imports_for(
    chunk: &Chunk,
    chunks: &[Chunk],
    chunk_paths: &[PathBuf],
    shared_exports: &[SymbolId],
) -> Vec<CrossChunkImport> {
    if chunk.entry.is_none() || shared_exports.is_empty() {
        return Vec::new();
    }
    let Some(shared_index) = chunks.iter().position(|c| c.entry.is_none()) else {
        return Vec::new();
    };
    let shared_name = chunk_paths[shared_index]
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("shared.js")
        .to_string();
    vec![CrossChunkImport {
        path: format!("./{}", shared_name),
        symbols: shared_exports.to_vec(),
    }]
}

/// Formats the per-build summary table the CLI prints on success.
pub fn summarize_outputs(outputs: &[OutputFile]) -> String {
    let mut lines = Vec::new();
    for output in outputs {
        lines.push(format!(
            "  {}  {}",
            to_slash_string(&output.path),
            human_size(output.contents.len())
        ));
    }
    lines.join("\n")
}

fn human_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1}mb", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1}kb", bytes as f64 / 1024.0)
    } else {
        format!("{}b", bytes)
    }
}
