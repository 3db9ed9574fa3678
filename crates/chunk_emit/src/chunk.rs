//! Chunk planner.
//!
//! Non-splitting mode produces one chunk per entry point holding every
//! live module reachable from it. Splitting mode (ESM only) moves modules
//! reachable from two or more entries into a synthesized shared chunk that
//! entry chunks import.

use ahashmap::AHashSet;
use module_graph::{ModuleGraph, ModuleId, ModuleRef, Representation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    Single,
    Split,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    /// Modules in print order: wrapped first in dependency order, then
    /// inlined modules dependencies-first.
    pub modules: Vec<ModuleId>,
    /// The entry module this chunk serves; `None` for the shared chunk.
    pub entry: Option<ModuleId>,
    /// File stem for the output name, before extension mapping.
    pub name: String,
}

pub fn plan_chunks(graph: &ModuleGraph, included: &[bool], mode: ChunkMode) -> Vec<Chunk> {
    match mode {
        ChunkMode::Single => graph
            .entries
            .iter()
            .map(|&entry| {
                let mut reach = reachable_from(graph, entry, included);
                // injected modules ride along with every entry
                for &injected in &graph.injected {
                    reach.extend(reachable_from(graph, injected, included));
                }
                Chunk {
                    modules: order_modules(graph, &reach),
                    entry: Some(entry),
                    name: chunk_stem(graph, entry),
                }
            })
            .collect(),
        ChunkMode::Split => {
            let per_entry: Vec<AHashSet<ModuleId>> = graph
                .entries
                .iter()
                .map(|&entry| {
                    let mut reach = reachable_from(graph, entry, included);
                    for &injected in &graph.injected {
                        reach.extend(reachable_from(graph, injected, included));
                    }
                    reach
                })
                .collect();

            let mut shared: AHashSet<ModuleId> = AHashSet::default();
            for (i, set) in per_entry.iter().enumerate() {
                for &module in set {
                    if per_entry[i + 1..].iter().any(|other| other.contains(&module)) {
                        shared.insert(module);
                    }
                }
            }

            let mut chunks = Vec::new();
            if !shared.is_empty() {
                chunks.push(Chunk {
                    modules: order_modules(graph, &shared),
                    entry: None,
                    name: "shared".to_string(),
                });
            }
            for (set, &entry) in per_entry.iter().zip(graph.entries.iter()) {
                let own: AHashSet<ModuleId> =
                    set.iter().copied().filter(|m| !shared.contains(m)).collect();
                chunks.push(Chunk {
                    modules: order_modules(graph, &own),
                    entry: Some(entry),
                    name: chunk_stem(graph, entry),
                });
            }
            chunks
        }
    }
}

fn chunk_stem(graph: &ModuleGraph, entry: ModuleId) -> String {
    graph
        .get(entry)
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out")
        .to_string()
}

fn reachable_from(graph: &ModuleGraph, entry: ModuleId, included: &[bool]) -> AHashSet<ModuleId> {
    let mut seen: AHashSet<ModuleId> = AHashSet::default();
    let mut stack = vec![entry];
    while let Some(id) = stack.pop() {
        if !included[id as usize] || !seen.insert(id) {
            continue;
        }
        for import in &graph.get(id).imports {
            if let Some(ModuleRef::Module(target)) = &import.resolved {
                stack.push(*target);
            }
        }
    }
    seen
}

/// Dependencies-first order: DFS postorder over the import graph
/// restricted to the chunk's members. Wrapped modules hoist to the front
/// (their factories must exist before any `__require` runs), inlined
/// modules follow.
fn order_modules(graph: &ModuleGraph, members: &AHashSet<ModuleId>) -> Vec<ModuleId> {
    let mut roots: Vec<ModuleId> = members.iter().copied().collect();
    roots.sort_unstable();

    let mut post: Vec<ModuleId> = Vec::new();
    let mut state: ahashmap::AHashMap<ModuleId, bool> = ahashmap::AHashMap::default();
    for root in roots {
        // 0-sized state map doubles as the visited set; value marks "done"
        visit(graph, root, members, &mut state, &mut post);
    }

    let mut wrapped: Vec<ModuleId> = post
        .iter()
        .copied()
        .filter(|&m| graph.get(m).representation == Representation::Wrapped)
        .collect();
    let inlined: Vec<ModuleId> = post
        .into_iter()
        .filter(|&m| graph.get(m).representation == Representation::Inlined)
        .collect();
    wrapped.extend(inlined);
    wrapped
}

fn visit(
    graph: &ModuleGraph,
    id: ModuleId,
    members: &AHashSet<ModuleId>,
    state: &mut ahashmap::AHashMap<ModuleId, bool>,
    post: &mut Vec<ModuleId>,
) {
    if !members.contains(&id) || state.contains_key(&id) {
        return;
    }
    state.insert(id, false);

    // iterative DFS; children in source order so output order is stable
    let mut stack: Vec<(ModuleId, usize)> = vec![(id, 0)];
    while let Some((node, cursor)) = stack.pop() {
        let children: Vec<ModuleId> = graph
            .get(node)
            .imports
            .iter()
            .filter_map(|import| match &import.resolved {
                Some(ModuleRef::Module(target)) => Some(*target),
                _ => None,
            })
            .collect();

        let mut advanced = false;
        for (offset, child) in children.iter().enumerate().skip(cursor) {
            if members.contains(child) && !state.contains_key(child) {
                state.insert(*child, false);
                stack.push((node, offset + 1));
                stack.push((*child, 0));
                advanced = true;
                break;
            }
        }
        if !advanced {
            if !state.get(&node).copied().unwrap_or(false) {
                state.insert(node, true);
                post.push(node);
            }
        }
    }
}
