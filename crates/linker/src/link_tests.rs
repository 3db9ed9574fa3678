use import_resolver::{FsLoader, FsResolver};
use logger::NullLogger;
use module_graph::{
    build_graph, BuildGraphOptions, ModuleGraph, Representation, SymbolId,
};
use pretty_assertions::assert_eq;
use test_tmpdir::{test_tmpdir, TmpDir};

use crate::{link, rename, ImportTarget, LinkOptions, LinkOutput, NsMember};

fn build(tmp: &TmpDir, entries: &[&str]) -> ModuleGraph {
    let resolver = FsResolver::new(Default::default());
    let loader = FsLoader::default();
    let options = BuildGraphOptions {
        entries: entries.iter().map(|e| tmp.root_join(e)).collect(),
        ..Default::default()
    };
    let (graph, log) = build_graph(options, &resolver, &loader, NullLogger);
    assert!(!log.has_errors(), "graph errors: {}", log.render_all(false));
    graph
}

fn build_and_link(tmp: &TmpDir, entries: &[&str]) -> (ModuleGraph, LinkOutput) {
    let mut graph = build(tmp, entries);
    let (output, log) = link(&mut graph, &LinkOptions::default(), NullLogger);
    assert!(!log.has_errors(), "link errors: {}", log.render_all(false));
    (graph, output)
}

fn module_by_suffix(graph: &ModuleGraph, suffix: &str) -> module_graph::ModuleId {
    graph
        .modules
        .iter()
        .find(|m| m.path.to_string_lossy().ends_with(suffix))
        .map(|m| m.id)
        .unwrap_or_else(|| panic!("no module ending in {}", suffix))
}

#[test]
fn first_entry_module_has_id_zero() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { a } from './a'; console.log(a);",
        "src/a.ts" => "export const a = 1;"
    );
    let graph = build(&tmp, &["src/entry.ts"]);
    assert_eq!(graph.entries, vec![0]);
    assert_eq!(module_by_suffix(&graph, "entry.ts"), 0);
}

#[test]
fn commonjs_importer_target_is_wrapped() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as ns from './legacy'; console.log(ns, ns.foo);",
        "src/legacy.ts" => "exports.foo = 123;"
    );
    let (graph, _) = build_and_link(&tmp, &["src/entry.ts"]);
    let legacy = module_by_suffix(&graph, "legacy.ts");
    assert!(graph.get(legacy).must_wrap);
    assert_eq!(graph.get(legacy).representation, Representation::Wrapped);
    // the esm entry stays inlined
    assert_eq!(graph.get(0).representation, Representation::Inlined);
}

#[test]
fn dynamic_import_target_is_wrapped() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import('./lazy').then((m) => console.log(m));",
        "src/lazy.ts" => "export const lazy = 1;"
    );
    let (graph, _) = build_and_link(&tmp, &["src/entry.ts"]);
    let lazy = module_by_suffix(&graph, "lazy.ts");
    assert!(graph.get(lazy).must_wrap);
}

#[test]
fn named_import_links_to_ground_symbol() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { value } from './middle'; console.log(value);",
        "src/middle.ts" => "export { value } from './origin';",
        "src/origin.ts" => "export const value = 42;"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.ts"]);
    let origin = module_by_suffix(&graph, "origin.ts");

    // the entry's binding resolves through the re-export to the origin
    let entry = graph.get(0);
    let (binding_index, _) = entry
        .symbols
        .iter()
        .find(|(_, s)| s.name == "value")
        .unwrap();
    match output
        .import_targets
        .get(&SymbolId::new(0, binding_index))
        .unwrap()
    {
        ImportTarget::Symbol(target) => assert_eq!(target.module, origin),
        other => panic!("expected direct symbol link, got {:?}", other),
    }
}

#[test]
fn symbol_links_terminate() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { value } from './a'; console.log(value);",
        "src/a.ts" => "export { value } from './b';",
        "src/b.ts" => "export const value = 1;"
    );
    let (graph, _) = build_and_link(&tmp, &["src/entry.ts"]);
    // following link targets must terminate within the module count
    for module in graph.modules.iter() {
        for (index, _) in module.symbols.iter() {
            let mut current = SymbolId::new(module.id, index);
            for _ in 0..=graph.len() {
                match graph.get(current.module).symbols.get(current.index).link {
                    Some(next) => current = next,
                    None => break,
                }
            }
            assert!(
                graph.get(current.module).symbols.get(current.index).link.is_none(),
                "link chain did not terminate"
            );
        }
    }
}

#[test]
fn missing_export_from_esm_is_an_error() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { nope } from './a'; console.log(nope);",
        "src/a.ts" => "export const yep = 1;"
    );
    let mut graph = build(&tmp, &["src/entry.ts"]);
    let (_, log) = link(&mut graph, &LinkOptions::default(), NullLogger);
    assert!(log.has_errors());
    assert!(log.render_all(false).contains("No matching export"));
}

#[test]
fn star_export_conflicts_drop_the_ambiguous_name() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as ns from './bar'; console.log(ns);",
        "src/bar.ts" => "export * from './a'; export * from './b'; export const own = 0;",
        "src/a.ts" => "export const shared = 1; export const onlyA = 2; export default 3;",
        "src/b.ts" => "export const shared = 4;"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.ts"]);
    let bar = module_by_suffix(&graph, "bar.ts");
    let names: Vec<&str> = output.ns_members[bar as usize]
        .keys()
        .map(|k| k.as_str())
        .collect();
    // `shared` is ambiguous and dropped; `default` never travels stars
    assert_eq!(names, vec!["onlyA", "own"]);
}

#[test]
fn local_declaration_shadows_star_export() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as ns from './bar'; console.log(ns);",
        "src/bar.ts" => "export * from './a'; export const shared = 'local';",
        "src/a.ts" => "export const shared = 'starred';"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.ts"]);
    let bar = module_by_suffix(&graph, "bar.ts");
    match output.ns_members[bar as usize].get("shared").unwrap() {
        NsMember::Direct(symbol) => assert_eq!(symbol.module, bar),
        other => panic!("expected local symbol, got {:?}", other),
    }
}

#[test]
fn unused_namespace_import_elides_the_target() {
    // plain .js input so the import survives to the linker; the target is
    // walked for side effects, finds none live, and drops out of the chunk
    let tmp = test_tmpdir!(
        "src/entry.js" => "import * as ns from './foo'; let foo = 234; console.log(foo);",
        "src/foo.js" => "export const foo = 123;"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.js"]);
    let foo = module_by_suffix(&graph, "foo.js");
    assert!(output.stmt_live[foo as usize].iter().all(|&live| !live));
    assert_eq!(graph.get(foo).representation, Representation::Dropped);
}

#[test]
fn side_effects_survive_an_unused_named_import() {
    // the binding is dead, the import is not: module-level side effects
    // of the target still run
    let tmp = test_tmpdir!(
        "src/entry.js" => "import { unused } from './loud'; console.log('entry');",
        "src/loud.js" => "console.log('loud'); export const unused = 1;"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.js"]);
    let loud = module_by_suffix(&graph, "loud.js");
    assert!(output.included[loud as usize]);
    assert_eq!(output.stmt_live[loud as usize], vec![true, false]);
    assert_eq!(graph.get(loud).representation, Representation::Inlined);
}

#[test]
fn missing_reexport_from_esm_is_an_error() {
    // the bad name is never imported downstream; the re-export site alone
    // must raise the error
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import './middle';",
        "src/middle.ts" => "export { nope } from './origin';",
        "src/origin.ts" => "export const yep = 1;"
    );
    let mut graph = build(&tmp, &["src/entry.ts"]);
    let (_, log) = link(&mut graph, &LinkOptions::default(), NullLogger);
    assert!(log.has_errors());
    let rendered = log.render_all(false);
    assert!(rendered.contains("No matching export"), "{}", rendered);
    assert!(rendered.contains("\"nope\""), "{}", rendered);
}

#[test]
fn namespace_captured_by_value_materializes() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as ns from './foo'; console.log(ns, ns.foo);",
        "src/foo.ts" => "export const foo = 123;"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.ts"]);
    let foo = module_by_suffix(&graph, "foo.ts");
    assert!(output.materialize_ns[foo as usize]);
    assert!(output.ns_symbol[foo as usize].is_some());
}

#[test]
fn property_only_namespace_access_stays_virtual() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as ns from './foo'; console.log(ns.foo, ns.foo);",
        "src/foo.ts" => "export const foo = 123;"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.ts"]);
    let foo = module_by_suffix(&graph, "foo.ts");
    assert!(!output.materialize_ns[foo as usize]);
    // ... but the accessed symbol is live
    let foo_module = graph.get(foo);
    let (index, _) = foo_module
        .symbols
        .iter()
        .find(|(_, s)| s.name == "foo")
        .unwrap();
    assert!(output.is_symbol_live(SymbolId::new(foo, index)));
}

#[test]
fn side_effect_statement_retained_iff_module_is_imported() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import './loud'; const quiet = 1;",
        "src/loud.ts" => "console.log('side effect'); export const unused = 2;",
        "src/silent.ts" => "console.log('never imported');"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.ts"]);
    let loud = module_by_suffix(&graph, "loud.ts");
    assert!(output.included[loud as usize]);
    // the console.log statement is live, the unused export is not
    let live = &output.stmt_live[loud as usize];
    assert_eq!(live, &vec![true, false]);
    // silent.ts was never discovered at all
    assert!(graph
        .modules
        .iter()
        .all(|m| !m.path.to_string_lossy().ends_with("silent.ts")));
}

#[test]
fn renamer_keeps_unique_names_and_suffixes_collisions() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { foo } from './foo'; let value = 1; console.log(foo, value);",
        "src/foo.ts" => "export const foo = 123; const value = 2; console.log(value);"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.ts"]);
    let chunk: Vec<_> = (0..graph.len() as u32).collect();
    let names = rename::assign_names(&graph, &output, &chunk, &Default::default());

    // no two live symbols share an emitted identifier
    let mut seen = std::collections::HashSet::new();
    for name in names.values() {
        assert!(seen.insert(name.clone()), "duplicate output name {}", name);
    }
    // the colliding `value` got a numeric suffix
    let values: Vec<&String> = names
        .iter()
        .filter(|(symbol, _)| {
            graph
                .get(symbol.module)
                .symbols
                .get(symbol.index)
                .name
                == "value"
        })
        .map(|(_, name)| name)
        .collect();
    assert_eq!(values.len(), 2);
    assert!(values.iter().any(|n| n.as_str() == "value2"));
}

#[test]
fn minified_names_are_frequency_ordered_and_unique() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => r#"
            import { often } from './lib';
            const rare = 1;
            console.log(often(), often(), often(), rare);
        "#,
        "src/lib.ts" => "export function often() { return 1; }"
    );
    let (graph, output) = build_and_link(&tmp, &["src/entry.ts"]);
    let chunk: Vec<_> = (0..graph.len() as u32).collect();
    let names = rename::assign_names(
        &graph,
        &output,
        &chunk,
        &rename::RenameOptions {
            minify_identifiers: true,
            keep_names: false,
        },
    );
    let mut seen = std::collections::HashSet::new();
    for name in names.values() {
        assert!(name.len() <= 2, "expected short name, got {}", name);
        assert!(seen.insert(name.clone()));
    }
}
