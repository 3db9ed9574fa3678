//! Module classification and wrap propagation.
//!
//! A module must be wrapped when it is CommonJS-like, when it is the
//! target of a dynamic import or a `require()` call, or when it sits in a
//! strongly-connected component of the import graph that contains a
//! CommonJS-like module.

use module_graph::{ModuleGraph, ModuleId, ModuleRef};

pub fn classify(graph: &mut ModuleGraph) {
    let count = graph.len();

    let mut wrap = vec![false; count];
    for module in graph.modules.iter() {
        if module.commonjs_markers {
            wrap[module.id as usize] = true;
        }
        for import in &module.imports {
            if let Some(ModuleRef::Module(target)) = &import.resolved {
                if import.is_dynamic_import || import.is_require {
                    wrap[*target as usize] = true;
                }
            }
        }
    }

    // propagate through cycles: every member of an SCC containing a
    // CommonJS-like module is wrapped
    for component in strongly_connected_components(graph) {
        if component.len() < 2 {
            continue;
        }
        if component
            .iter()
            .any(|&m| graph.get(m).commonjs_markers)
        {
            for m in component {
                wrap[m as usize] = true;
            }
        }
    }

    for module in graph.modules.iter_mut() {
        module.must_wrap = wrap[module.id as usize];
    }
}

/// Iterative Tarjan over the internal import edges. Modules reference each
/// other freely, so indices stand in for references throughout.
fn strongly_connected_components(graph: &ModuleGraph) -> Vec<Vec<ModuleId>> {
    #[derive(Clone, Copy)]
    struct NodeState {
        index: u32,
        low: u32,
        on_stack: bool,
        visited: bool,
    }

    let count = graph.len();
    let mut state = vec![
        NodeState {
            index: 0,
            low: 0,
            on_stack: false,
            visited: false,
        };
        count
    ];
    let mut stack: Vec<ModuleId> = Vec::new();
    let mut components: Vec<Vec<ModuleId>> = Vec::new();
    let mut counter: u32 = 0;

    let successors = |id: ModuleId| -> Vec<ModuleId> {
        graph
            .get(id)
            .imports
            .iter()
            .filter_map(|import| match &import.resolved {
                Some(ModuleRef::Module(target)) => Some(*target),
                _ => None,
            })
            .collect()
    };

    for root in 0..count as ModuleId {
        if state[root as usize].visited {
            continue;
        }
        // explicit DFS frame stack, to keep arbitrary graph depth off the
        // call stack
        let mut frames: Vec<(ModuleId, Vec<ModuleId>, usize)> =
            vec![(root, successors(root), 0)];
        state[root as usize] = NodeState {
            index: counter,
            low: counter,
            on_stack: true,
            visited: true,
        };
        stack.push(root);
        counter += 1;

        while let Some((node, succs, mut cursor)) = frames.pop() {
            let mut descended = false;
            while cursor < succs.len() {
                let next = succs[cursor];
                cursor += 1;
                if !state[next as usize].visited {
                    state[next as usize] = NodeState {
                        index: counter,
                        low: counter,
                        on_stack: true,
                        visited: true,
                    };
                    counter += 1;
                    stack.push(next);
                    frames.push((node, succs, cursor));
                    frames.push((next, successors(next), 0));
                    descended = true;
                    break;
                } else if state[next as usize].on_stack {
                    let next_index = state[next as usize].index;
                    let low = &mut state[node as usize].low;
                    *low = (*low).min(next_index);
                }
            }
            if descended {
                continue;
            }

            // node finished
            if state[node as usize].low == state[node as usize].index {
                let mut component = Vec::new();
                while let Some(top) = stack.pop() {
                    state[top as usize].on_stack = false;
                    component.push(top);
                    if top == node {
                        break;
                    }
                }
                components.push(component);
            }
            if let Some((parent, _, _)) = frames.last() {
                let node_low = state[node as usize].low;
                let parent_low = &mut state[*parent as usize].low;
                *parent_low = (*parent_low).min(node_low);
            }
        }
    }

    components
}
