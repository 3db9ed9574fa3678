use ahashmap::AHashSet;
use pretty_assertions::assert_eq;
use swc_common::FileName;
use swc_utils_parse::{parse_module, LoaderKind};

use crate::parse::{scan_module, ScanOptions, ScanOutput};
use crate::record::{ExportKindTag, ExportTarget, ImportRecordKind};

fn scan(src: &str) -> ScanOutput {
    let parsed = parse_module(
        FileName::Custom("test.ts".to_string()),
        src.to_string(),
        LoaderKind::Ts,
    )
    .unwrap();
    scan_module(&parsed, &ScanOptions::default())
}

fn scan_with_pure(src: &str, pure_fns: &[&str]) -> ScanOutput {
    let parsed = parse_module(
        FileName::Custom("test.ts".to_string()),
        src.to_string(),
        LoaderKind::Ts,
    )
    .unwrap();
    scan_module(
        &parsed,
        &ScanOptions {
            pure_fns: pure_fns
                .iter()
                .map(|s| s.to_string())
                .collect::<AHashSet<String>>(),
        },
    )
}

#[test]
fn collects_import_records() {
    let out = scan(
        r#"
        import def from './a';
        import { one, two as alias } from './b';
        import * as ns from './c';
        import './effects';
        console.log(def, one, alias, ns.member);
        "#,
    );
    let kinds: Vec<_> = out.imports.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ImportRecordKind::Default,
            ImportRecordKind::Named,
            ImportRecordKind::Named,
            ImportRecordKind::Namespace,
            ImportRecordKind::SideEffect,
        ]
    );
    assert_eq!(out.imports[1].imported_name.as_deref(), Some("one"));
    assert_eq!(out.imports[2].imported_name.as_deref(), Some("two"));
    assert_eq!(out.export_kind, ExportKindTag::Esm);
}

#[test]
fn collects_export_records() {
    let out = scan(
        r#"
        export const foo = 1;
        const hidden = 2;
        export { hidden as renamed };
        export default function main() {}
        export { one } from './a';
        export * from './b';
        export * as ns from './c';
        "#,
    );
    let names: Vec<&str> = out.exports.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["foo", "default", "one", "ns", "renamed"]);
    assert_eq!(out.star_exports.len(), 1);
    // the local export names resolve to local symbols
    for export in &out.exports {
        match export.name.as_str() {
            "foo" | "renamed" | "default" => {
                assert!(matches!(export.target, ExportTarget::Local(_)))
            }
            "one" | "ns" => assert!(matches!(export.target, ExportTarget::ReExport { .. })),
            other => panic!("unexpected export {}", other),
        }
    }
}

#[test]
fn classifies_commonjs_markers() {
    assert_eq!(
        scan("exports.foo = 123;").export_kind,
        ExportKindTag::CommonJs
    );
    assert_eq!(
        scan("module.exports = { foo: 123 };").export_kind,
        ExportKindTag::CommonJs
    );
    assert_eq!(
        scan("const path = 'x'; require(path);").export_kind,
        ExportKindTag::CommonJs
    );
    assert_eq!(
        scan("import './a'; exports.foo = 1;").export_kind,
        ExportKindTag::Mixed
    );
    assert_eq!(scan("const local = 1;").export_kind, ExportKindTag::None);
}

#[test]
fn dynamic_require_inside_function_is_not_a_marker() {
    let out = scan("function load(name) { return require(name); }");
    assert_eq!(out.export_kind, ExportKindTag::None);
    assert!(!out.warnings.is_empty());
}

#[test]
fn static_require_becomes_an_import_record() {
    let out = scan("const fs = require('./fs-shim');");
    assert_eq!(out.imports.len(), 1);
    assert!(out.imports[0].is_require);
    assert_eq!(out.imports[0].specifier, "./fs-shim");
}

#[test]
fn dynamic_import_becomes_an_import_record() {
    let out = scan("import('./lazy').then((m) => m.run());");
    assert_eq!(out.imports.len(), 1);
    assert!(out.imports[0].is_dynamic_import);
}

#[test]
fn namespace_property_access_collects_static_keys() {
    let out = scan(
        r#"
        import * as ns from './foo';
        console.log(ns.foo, ns["bar"]);
        "#,
    );
    let record = &out.imports[0];
    assert!(!record.ns_value_observed);
    let keys: Vec<&str> = record
        .ns_static_keys
        .iter()
        .map(|(k, _)| k.as_str())
        .collect();
    assert_eq!(keys, vec!["foo", "bar"]);
}

#[test]
fn namespace_passed_as_value_is_observed() {
    let out = scan(
        r#"
        import * as ns from './foo';
        console.log(ns, ns.foo);
        "#,
    );
    assert!(out.imports[0].ns_value_observed);
}

#[test]
fn namespace_dynamic_key_is_observed() {
    let out = scan(
        r#"
        import * as ns from './foo';
        function pick(key) { return ns[key]; }
        "#,
    );
    assert!(out.imports[0].ns_value_observed);
}

#[test]
fn side_effect_analysis_keeps_calls_and_drops_pure_decls() {
    let out = scan(
        r#"
        const pure = 1;
        const alsoPure = { a: [1, 2], b: pure };
        console.log(pure);
        const fromCall = compute();
        const annotated = /* @__PURE__ */ compute();
        "#,
    );
    let effects: Vec<bool> = out.stmts.iter().map(|s| s.side_effects).collect();
    assert_eq!(effects, vec![false, false, true, true, false]);
    assert!(out.has_side_effects);
}

#[test]
fn pure_fn_option_marks_calls_pure() {
    let out = scan_with_pure("console.log('hi');", &["console.log"]);
    assert_eq!(out.stmts[0].side_effects, false);
}

#[test]
fn unbound_names_are_collected() {
    let out = scan("const x = window.innerWidth + globalThing;");
    assert!(out.unbound_names.contains("window"));
    assert!(out.unbound_names.contains("globalThing"));
    assert!(!out.unbound_names.contains("x"));
}

#[test]
fn statements_reference_hoisted_symbols() {
    let out = scan(
        r#"
        console.log(helper());
        function helper() { return 1; }
        "#,
    );
    // stmt 0 references the symbol declared by stmt 1
    assert_eq!(out.stmts[0].referenced, out.stmts[1].declared);
}

#[test]
fn typeof_require_in_esm_warns() {
    let out = scan("export const kind = typeof require;");
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].message.contains("typeof require"));
}

#[test]
fn duplicate_case_labels_warn() {
    let out = scan(
        r#"
        switch (value) {
            case 1: break;
            case 1: break;
        }
        "#,
    );
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].message.contains("duplicate case"));
}

#[test]
fn mutation_is_tracked() {
    let out = scan("let counter = 0; counter += 1;");
    let (_, symbol) = out
        .symbols
        .iter()
        .find(|(_, s)| s.name == "counter")
        .unwrap();
    assert!(symbol.mutated);
}
