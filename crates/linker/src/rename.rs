//! Renamer: assigns output identifiers to every symbol that lives at
//! the top level of a chunk.
//!
//! Collisions resolve by appending the smallest free numeric suffix.
//! Assignment walks modules by id ascending, symbols by index ascending,
//! so ties break deterministically. Identifier minification replaces names
//! with frequency-ordered short names from a 54-character head / 64-
//! character tail alphabet.

use ahashmap::{AHashMap, AHashSet};
use module_graph::{
    ExportTarget, ModuleGraph, ModuleId, Representation, SymbolId, SymbolKind,
};

use crate::{ImportTarget, LinkOutput};

pub const JS_KEYWORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Identifiers the runtime prelude defines; the renamer must never hand
/// them out.
pub const RUNTIME_NAMES: &[&str] = &[
    "__export",
    "__import",
    "__require",
    "__commonJS",
    "__toModule",
    "__dynamic",
    "__modules",
    "__cache",
    "__defProp",
];

const NAME_HEAD: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_$";
const NAME_TAIL: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_$0123456789";

#[derive(Debug, Default, Clone)]
pub struct RenameOptions {
    pub minify_identifiers: bool,
    /// `--keep-names`: function and class names survive minification.
    pub keep_names: bool,
}

/// One symbol that needs a chunk-level name.
#[derive(Debug, Clone, Copy)]
pub struct NameRequest {
    pub symbol: SymbolId,
    pub frequency: u32,
    pub keep_original: bool,
}

/// How one chunk module relates to an identifier it mentions. References
/// that the rewriter replaces (import bindings onto other modules) do not
/// block the ground symbol from keeping its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mention {
    /// The module declares its own surviving binding under this name.
    OwnDecl(ModuleId),
    /// The name only appears as an import binding that rewrites to the
    /// given ground symbol.
    BindingTo(SymbolId, ModuleId),
    /// The name appears with no top-level binding (nested scopes, labels);
    /// treated as a potential shadow.
    Loose(ModuleId),
}

impl Mention {
    fn module(&self) -> ModuleId {
        match self {
            Mention::OwnDecl(m) | Mention::BindingTo(_, m) | Mention::Loose(m) => *m,
        }
    }
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

fn classify_mentions(
    graph: &ModuleGraph,
    link: &LinkOutput,
    chunk_modules: &[ModuleId],
) -> AHashMap<String, Vec<Mention>> {
    let mut mentions: AHashMap<String, Vec<Mention>> = AHashMap::default();
    for &id in chunk_modules {
        let module = graph.get(id);
        // top-level symbols by source name
        let mut by_name: AHashMap<&str, Vec<u32>> = AHashMap::default();
        for (index, symbol) in module.symbols.iter() {
            by_name.entry(symbol.name.as_str()).or_default().push(index);
        }

        for name in &module.used_names {
            let entry = mentions.entry(name.clone()).or_default();
            match by_name.get(name.as_str()) {
                None => entry.push(Mention::Loose(id)),
                Some(indices) => {
                    for &index in indices {
                        let symbol = module.symbols.get(index);
                        let mention = if symbol.kind == SymbolKind::ImportBinding {
                            match link.import_targets.get(&SymbolId::new(id, index)) {
                                Some(ImportTarget::Symbol(target)) => {
                                    Mention::BindingTo(ground(graph, *target), id)
                                }
                                Some(ImportTarget::Namespace(target)) => {
                                    match link.ns_symbol[*target as usize] {
                                        // rewrites to the namespace object
                                        Some(ns) => Mention::BindingTo(
                                            SymbolId::new(*target, ns),
                                            id,
                                        ),
                                        // virtual or runtime namespaces: the
                                        // binding either vanishes or keeps a
                                        // name of its own
                                        None if graph.get(*target).commonjs_markers => {
                                            Mention::OwnDecl(id)
                                        }
                                        None => continue,
                                    }
                                }
                                // rewritten to an interop member access
                                Some(ImportTarget::RuntimeProp(..)) => continue,
                                Some(ImportTarget::ExternalNamed { .. })
                                | Some(ImportTarget::ExternalNamespace { .. }) => {
                                    Mention::OwnDecl(id)
                                }
                                None => continue,
                            }
                        } else {
                            Mention::OwnDecl(id)
                        };
                        entry.push(mention);
                    }
                }
            }
        }
    }
    mentions
}

/// Assigns output names for every top-level symbol of the chunk's modules.
pub fn assign_names(
    graph: &ModuleGraph,
    link: &LinkOutput,
    chunk_modules: &[ModuleId],
    options: &RenameOptions,
) -> AHashMap<SymbolId, String> {
    let mut reserved: AHashSet<String> = AHashSet::default();
    reserved.extend(JS_KEYWORDS.iter().map(|s| s.to_string()));
    reserved.extend(RUNTIME_NAMES.iter().map(|s| s.to_string()));
    for &id in chunk_modules {
        reserved.extend(graph.get(id).unbound_names.iter().cloned());
    }

    // which modules mention each identifier, and how
    let mentions = classify_mentions(graph, link, chunk_modules);

    let requests = collect_requests(graph, link, chunk_modules, options);

    let mut assigned: AHashSet<String> = AHashSet::default();
    let mut names: AHashMap<SymbolId, String> = AHashMap::default();

    if options.minify_identifiers {
        let mut minifier = NameMinifier::default();
        // most-used symbols get the shortest names
        let mut ordered = requests.clone();
        ordered.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        for request in ordered {
            let name = if request.keep_original {
                pick_readable_name(graph, request.symbol, &reserved, &assigned, &mentions)
            } else {
                loop {
                    let candidate = minifier.next_name();
                    if !reserved.contains(&candidate)
                        && !assigned.contains(&candidate)
                        && !mentions.contains_key(&candidate)
                    {
                        break candidate;
                    }
                }
            };
            assigned.insert(name.clone());
            names.insert(request.symbol, name);
        }
    } else {
        for request in requests {
            let name = pick_readable_name(graph, request.symbol, &reserved, &assigned, &mentions);
            assigned.insert(name.clone());
            names.insert(request.symbol, name);
        }
    }

    names
}

/// Keeps the original name when nothing else in the chunk can collide with
/// it; otherwise appends the smallest free numeric suffix.
fn pick_readable_name(
    graph: &ModuleGraph,
    symbol: SymbolId,
    reserved: &AHashSet<String>,
    assigned: &AHashSet<String>,
    mentions: &AHashMap<String, Vec<Mention>>,
) -> String {
    let module = graph.get(symbol.module);
    let original = module.symbols.get(symbol.index).name.clone();

    // a mention in another module blocks the original name unless it is an
    // import binding that rewrites to this very symbol
    let blocked = mentions
        .get(&original)
        .map(|entries| {
            entries.iter().any(|entry| {
                entry.module() != symbol.module
                    && !matches!(entry, Mention::BindingTo(target, _) if *target == symbol)
            })
        })
        .unwrap_or(false);

    if !reserved.contains(&original) && !assigned.contains(&original) && !blocked {
        return original;
    }

    // fresh names must dodge every identifier any chunk module mentions,
    // including nested scopes that might shadow them
    let mut suffix: u32 = 2;
    loop {
        let candidate = format!("{}{}", original, suffix);
        if !reserved.contains(&candidate)
            && !assigned.contains(&candidate)
            && !mentions.contains_key(&candidate)
        {
            return candidate;
        }
        suffix += 1;
    }
}

/// Which symbols of the chunk need top-level names, in deterministic
/// (module id, symbol index) order.
fn collect_requests(
    graph: &ModuleGraph,
    link: &LinkOutput,
    chunk_modules: &[ModuleId],
    options: &RenameOptions,
) -> Vec<NameRequest> {
    let mut sorted_modules: Vec<ModuleId> = chunk_modules.to_vec();
    sorted_modules.sort_unstable();

    let mut requests = Vec::new();
    for id in sorted_modules {
        let module = graph.get(id);
        if module.representation == Representation::Dropped {
            continue;
        }
        let wrapped = module.representation == Representation::Wrapped;
        let esm_wrapped = wrapped && !module.commonjs_markers;
        let exported: AHashSet<u32> = module
            .exports
            .iter()
            .filter_map(|export| match &export.target {
                ExportTarget::Local(symbol) => Some(*symbol),
                ExportTarget::ReExport { .. } => None,
            })
            .collect();

        for (index, symbol) in module.symbols.iter() {
            let id_symbol = SymbolId::new(id, index);
            let needed = match symbol.kind {
                SymbolKind::Unbound => false,
                SymbolKind::Namespace => {
                    // synthesized namespace objects and interop bindings
                    link.included[id as usize]
                }
                SymbolKind::ImportBinding => match link.import_targets.get(&id_symbol) {
                    Some(ImportTarget::Symbol(_)) => false,
                    Some(ImportTarget::RuntimeProp(..)) => false,
                    Some(ImportTarget::Namespace(target)) => {
                        // CommonJS namespaces bind `__import(id)` locally;
                        // materialized ones alias the target's object
                        link.is_symbol_live(id_symbol)
                            && graph.get(*target).commonjs_markers
                            && !wrapped
                    }
                    Some(ImportTarget::ExternalNamed { .. })
                    | Some(ImportTarget::ExternalNamespace { .. }) => {
                        link.is_symbol_live(id_symbol) && !wrapped
                    }
                    None => false,
                },
                SymbolKind::Variable | SymbolKind::Function | SymbolKind::Class => {
                    if wrapped {
                        // CommonJS bodies keep function scope; wrapped ESM
                        // hoists only its exported bindings
                        esm_wrapped && exported.contains(&index)
                    } else {
                        link.is_symbol_live(id_symbol)
                    }
                }
            };
            if needed {
                requests.push(NameRequest {
                    symbol: id_symbol,
                    frequency: symbol.use_count + symbol.external_use_count,
                    keep_original: options.keep_names
                        && matches!(symbol.kind, SymbolKind::Function | SymbolKind::Class),
                });
            }
        }
    }
    requests
}

/// Short-name generator for `--minify-identifiers`.
#[derive(Default)]
pub struct NameMinifier {
    counter: u32,
}

impl NameMinifier {
    pub fn next_name(&mut self) -> String {
        let mut n = self.counter;
        self.counter += 1;

        let head = NAME_HEAD.as_bytes();
        let tail = NAME_TAIL.as_bytes();
        let mut out = String::new();
        out.push(head[(n % head.len() as u32) as usize] as char);
        n /= head.len() as u32;
        while n > 0 {
            n -= 1;
            out.push(tail[(n % tail.len() as u32) as usize] as char);
            n /= tail.len() as u32;
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::NameMinifier;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_names_walk_the_alphabets() {
        let mut minifier = NameMinifier::default();
        let first: Vec<String> = (0..56).map(|_| minifier.next_name()).collect();
        assert_eq!(first[0], "a");
        assert_eq!(first[25], "z");
        assert_eq!(first[52], "_");
        assert_eq!(first[53], "$");
        // wraps into two-character names
        assert_eq!(first[54], "aa");
        assert_eq!(first[55], "ba");
    }
}
