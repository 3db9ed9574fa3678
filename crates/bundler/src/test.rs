use std::path::PathBuf;

use chunk_emit::OutputFormat;
use logger::NullLogger;
use pretty_assertions::assert_eq;
use test_tmpdir::{test_tmpdir, TmpDir};

use crate::cfg::{BundleOptions, SourceMapMode};
use crate::driver::{analyse, build, transform, BuildResult};

fn options_for(tmp: &TmpDir, entries: &[&str]) -> BundleOptions {
    BundleOptions {
        entries: entries.iter().map(|e| tmp.root_join(e)).collect(),
        format: OutputFormat::Esm,
        write: false,
        ..Default::default()
    }
}

fn bundle_with(tmp: &TmpDir, entries: &[&str], patch: impl FnOnce(&mut BundleOptions)) -> BuildResult {
    let mut options = options_for(tmp, entries);
    patch(&mut options);
    build(&options, NullLogger)
}

fn bundle_code(tmp: &TmpDir, entries: &[&str]) -> String {
    let result = bundle_with(tmp, entries, |_| {});
    assert!(
        !result.has_errors(),
        "unexpected errors: {}",
        result.diagnostics.render_all(false)
    );
    assert_eq!(result.outputs.len(), 1);
    String::from_utf8(result.outputs[0].contents.clone()).unwrap()
}

#[test]
fn s1_unused_namespace_import_elides_the_import() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as ns from './foo'; let foo = 234; console.log(foo);",
        "src/foo.ts" => "export const foo = 123;"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(code.contains("234"), "entry body survives: {}", code);
    assert!(code.contains("console.log(foo"), "local foo keeps its name: {}", code);
    assert!(!code.contains("123"), "foo.ts must be dropped: {}", code);
    assert!(!code.contains("foo.ts"), "no banner for a dropped module: {}", code);
}

#[test]
fn s2_namespace_captured_by_value_materializes_an_exports_object() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as ns from './foo'; console.log(ns, ns.foo);",
        "src/foo.ts" => "export const foo = 123;"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(code.contains("123"));
    assert!(
        code.contains("__export({}"),
        "namespace object literal expected: {}",
        code
    );
    assert!(code.contains("foo: () =>"), "accessor for foo: {}", code);
}

#[test]
fn s3_property_access_without_capture_rewrites_to_direct_reference() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as ns from './foo'; console.log(ns.foo, ns.foo);",
        "src/foo.ts" => "export const foo = 123;"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(code.contains("console.log(foo, foo)"), "direct refs: {}", code);
    assert!(
        !code.contains("__export"),
        "no namespace object for property-only access: {}",
        code
    );
}

#[test]
fn s4_commonjs_import_materializes_a_wrapper() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as ns from './foo'; console.log(ns, ns.foo);",
        "src/foo.ts" => "exports.foo = 123;"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(
        code.contains("(exports, module) {"),
        "factory with exports/module params: {}",
        code
    );
    assert!(code.contains("exports.foo = 123"), "body kept verbatim: {}", code);
    assert!(code.contains("= __import("), "namespace bound via __import: {}", code);
}

#[test]
fn s5_star_exports_flatten_into_observed_namespace() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import * as bar from './bar'; console.log(bar);",
        "src/bar.ts" => "export * from './a'; export const own = 1;",
        "src/a.ts" => "export const starred = 2;"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(code.contains("own: () =>"), "own export in namespace: {}", code);
    assert!(
        code.contains("starred: () =>"),
        "star-contributed name in namespace: {}",
        code
    );
}

#[test]
fn s5_unobserved_namespace_emits_no_object() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { starred } from './bar'; console.log(starred);",
        "src/bar.ts" => "export * from './a';",
        "src/a.ts" => "export const starred = 2;"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(!code.contains("__export"), "no namespace literal: {}", code);
    assert!(code.contains("console.log(starred)"));
}

#[test]
fn s6_two_entries_sharing_a_module_split_into_three_chunks() {
    let tmp = test_tmpdir!(
        "src/one.ts" => "import { shared } from './shared'; console.log('one', shared);",
        "src/two.ts" => "import { shared } from './shared'; console.log('two', shared);",
        "src/shared.ts" => "export const shared = 'both';"
    );
    let result = bundle_with(&tmp, &["src/one.ts", "src/two.ts"], |options| {
        options.splitting = true;
    });
    assert!(
        !result.has_errors(),
        "unexpected errors: {}",
        result.diagnostics.render_all(false)
    );
    assert_eq!(result.outputs.len(), 3);

    let by_name = |stem: &str| -> String {
        let output = result
            .outputs
            .iter()
            .find(|o| o.path.file_name().and_then(|n| n.to_str()) == Some(stem))
            .unwrap_or_else(|| panic!("missing output {}", stem));
        String::from_utf8(output.contents.clone()).unwrap()
    };

    let shared = by_name("shared.js");
    assert!(shared.contains("export {"), "shared chunk exports: {}", shared);
    assert!(shared.contains("both"));

    for entry in ["one.js", "two.js"] {
        let code = by_name(entry);
        assert!(
            code.contains("from \"./shared.js\""),
            "{} imports the shared chunk: {}",
            entry,
            code
        );
        assert!(!code.contains("'both'"), "shared module not duplicated: {}", code);
    }
}

#[test]
fn identical_inputs_produce_identical_outputs() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => r#"
            import { a } from './a';
            import * as b from './b';
            console.log(a, b, b.value);
        "#,
        "src/a.ts" => "export const a = 1; export const unused = 2;",
        "src/b.ts" => "export const value = 3;"
    );
    let first = bundle_code(&tmp, &["src/entry.ts"]);
    let second = bundle_code(&tmp, &["src/entry.ts"]);
    assert_eq!(first, second);
}

#[test]
fn iife_format_wraps_and_optionally_assigns_a_global() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "export const answer = 42; console.log(answer);"
    );
    let plain = bundle_with(&tmp, &["src/entry.ts"], |options| {
        options.format = OutputFormat::Iife;
    });
    let code = String::from_utf8(plain.outputs[0].contents.clone()).unwrap();
    assert!(code.starts_with("(() => {"), "iife open: {}", code);
    assert!(code.trim_end().ends_with("})();"), "iife close: {}", code);

    let named = bundle_with(&tmp, &["src/entry.ts"], |options| {
        options.format = OutputFormat::Iife;
        options.global_name = Some("MyLib".to_string());
    });
    let code = String::from_utf8(named.outputs[0].contents.clone()).unwrap();
    assert!(code.starts_with("var MyLib = (() => {"), "global assignment: {}", code);
    assert!(code.contains("return "), "entry namespace returned: {}", code);
}

#[test]
fn cjs_format_assigns_module_exports() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "export const answer = 42;"
    );
    let result = bundle_with(&tmp, &["src/entry.ts"], |options| {
        options.format = OutputFormat::Cjs;
    });
    let code = String::from_utf8(result.outputs[0].contents.clone()).unwrap();
    assert!(code.contains("module.exports ="), "cjs epilogue: {}", code);
    assert!(code.contains("answer: () => answer"), "exports accessor: {}", code);
}

#[test]
fn umd_format_emits_the_preamble() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "export const answer = 42;"
    );
    let result = bundle_with(&tmp, &["src/entry.ts"], |options| {
        options.format = OutputFormat::Umd;
        options.global_name = Some("Answer".to_string());
    });
    let code = String::from_utf8(result.outputs[0].contents.clone()).unwrap();
    assert!(code.contains("typeof define === \"function\" && define.amd"));
    assert!(code.contains("root.Answer = factory()"));
}

#[test]
fn esm_format_exports_entry_names() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "export const answer = 42; export default answer;"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(code.contains("export {"), "export statement: {}", code);
    assert!(code.contains("answer"), "named export: {}", code);
    assert!(code.contains("as default"), "default export alias: {}", code);
}

#[test]
fn banner_and_footer_surround_the_output() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "console.log(1);"
    );
    let result = bundle_with(&tmp, &["src/entry.ts"], |options| {
        options.banner = Some("/* bundled */".to_string());
        options.footer = Some("/* end */".to_string());
    });
    let code = String::from_utf8(result.outputs[0].contents.clone()).unwrap();
    assert!(code.starts_with("/* bundled */"));
    assert!(code.trim_end().ends_with("/* end */"));
}

#[test]
fn external_imports_stay_verbatim() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { render } from 'preact'; render();"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(
        code.contains("from \"preact\""),
        "external specifier kept verbatim: {}",
        code
    );
}

#[test]
fn json_import_synthesizes_a_commonjs_module() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import config from './config.json'; console.log(config.port);",
        "src/config.json" => "{\"port\": 8080}"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(code.contains("8080"));
    assert!(code.contains("module.exports ="), "json factory body: {}", code);
}

#[test]
fn define_replaces_dotted_members() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "if (process.env.NODE_ENV === 'production') { console.log('prod'); }"
    );
    let result = bundle_with(&tmp, &["src/entry.ts"], |options| {
        options.defines = vec![("process.env.NODE_ENV".to_string(), "\"production\"".to_string())];
    });
    let code = String::from_utf8(result.outputs[0].contents.clone()).unwrap();
    assert!(code.contains("\"production\" === 'production'") || code.contains("\"production\" === \"production\""),
        "define substituted: {}", code);
    assert!(!code.contains("process.env"), "original member gone: {}", code);
}

#[test]
fn minified_identifiers_shorten_names() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { longHelperName } from './lib'; console.log(longHelperName());",
        "src/lib.ts" => "export function longHelperName() { return 7; }"
    );
    let result = bundle_with(&tmp, &["src/entry.ts"], |options| {
        options.minify_identifiers = true;
    });
    let code = String::from_utf8(result.outputs[0].contents.clone()).unwrap();
    assert!(!code.contains("longHelperName"), "name minified: {}", code);
}

#[test]
fn inline_sourcemap_appends_a_data_url() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "console.log(1);"
    );
    let result = bundle_with(&tmp, &["src/entry.ts"], |options| {
        options.sourcemap = SourceMapMode::Inline;
    });
    let code = String::from_utf8(result.outputs[0].contents.clone()).unwrap();
    assert!(code.contains("//# sourceMappingURL=data:application/json;base64,"));
}

#[test]
fn metafile_reports_inputs_and_outputs() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { a } from './a'; console.log(a);",
        "src/a.ts" => "export const a = 1;"
    );
    let result = bundle_with(&tmp, &["src/entry.ts"], |options| {
        options.metafile = Some(PathBuf::from("meta.json"));
    });
    let meta: serde_json::Value = serde_json::from_str(result.metafile.as_ref().unwrap()).unwrap();
    let inputs = meta["inputs"].as_object().unwrap();
    assert_eq!(inputs.len(), 2);
    let entry_key = inputs
        .keys()
        .find(|k| k.ends_with("entry.ts"))
        .expect("entry listed in inputs");
    assert_eq!(
        inputs[entry_key]["imports"][0]["kind"],
        "import-statement"
    );
    let outputs = meta["outputs"].as_object().unwrap();
    assert_eq!(outputs.len(), 1);
    let (_, output) = outputs.iter().next().unwrap();
    assert!(output["bytes"].as_u64().unwrap() > 0);
    assert!(output["entryPoint"].as_str().unwrap().ends_with("entry.ts"));
    assert_eq!(output["inputs"].as_object().unwrap().len(), 2);
}

#[test]
fn analyse_returns_metadata_without_outputs() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "console.log(1);"
    );
    let result = analyse(&options_for(&tmp, &["src/entry.ts"]), NullLogger);
    assert!(!result.has_errors());
    assert!(result.outputs.is_empty());
    assert!(result.metafile.is_some());
}

#[test]
fn transform_is_single_file_and_resolves_nothing() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { missing } from './nope'; const x: number = 1; console.log(x);"
    );
    let result = transform(
        &BundleOptions {
            entries: vec![tmp.root_join("src/entry.ts")],
            write: false,
            ..Default::default()
        },
        NullLogger,
    );
    assert!(!result.has_errors());
    let code = String::from_utf8(result.outputs[0].contents.clone()).unwrap();
    // imports survive untouched, type annotations do not
    assert!(code.contains("./nope"));
    assert!(!code.contains(": number"));
}

#[test]
fn missing_import_fails_the_build_with_a_located_error() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { a } from './absent';\nconsole.log(a);"
    );
    let result = bundle_with(&tmp, &["src/entry.ts"], |_| {});
    assert!(result.has_errors());
    assert!(result.outputs.is_empty());
    let rendered = result.diagnostics.render_all(false);
    assert!(rendered.contains("Could not resolve"), "{}", rendered);
    assert!(rendered.contains("entry.ts:1:"), "{}", rendered);
}

#[test]
fn parse_error_disables_emit_but_reports_location() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "const = broken;"
    );
    let result = bundle_with(&tmp, &["src/entry.ts"], |_| {});
    assert!(result.has_errors());
    assert!(result.outputs.is_empty());
}

#[test]
fn circular_esm_function_imports_resolve() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "import { ping } from './a'; console.log(ping(2));",
        "src/a.ts" => "import { pong } from './b'; export function ping(n) { return n > 0 ? pong(n - 1) : 'a'; }",
        "src/b.ts" => "import { ping } from './a'; export function pong(n) { return n > 0 ? ping(n - 1) : 'b'; }"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(code.contains("function ping"));
    assert!(code.contains("function pong"));
    // dependency-ordered: both bodies appear before the entry's call
    let call = code.find("console.log(ping").unwrap();
    assert!(code.find("function ping").unwrap() < call);
}

#[test]
fn unused_named_import_keeps_the_targets_side_effects() {
    // plain .js so the import reaches the linker with its dead binding
    let tmp = test_tmpdir!(
        "src/entry.js" => "import { unused } from './loud'; console.log('entry');",
        "src/loud.js" => "console.log('loud'); export const unused = 1;"
    );
    let code = bundle_code(&tmp, &["src/entry.js"]);
    assert!(code.contains("'loud'"), "side effect retained: {}", code);
    assert!(!code.contains("unused = 1"), "dead export dropped: {}", code);
}

#[test]
fn require_call_rewrites_to_the_runtime() {
    let tmp = test_tmpdir!(
        "src/entry.ts" => "const shim = require('./shim'); console.log(shim.value);",
        "src/shim.ts" => "exports.value = 5;"
    );
    let code = bundle_code(&tmp, &["src/entry.ts"]);
    assert!(code.contains("__require("), "require goes through the runtime: {}", code);
    assert!(!code.contains("require('./shim')"), "specifier gone: {}", code);
}
