//! Parser boundary.
//!
//! Everything downstream of this crate works on SWC ASTs that have already
//! been through the hygiene resolver, so `Id`s (atom + syntax context) are
//! unique per binding within a file. Non-JavaScript loaders synthesize a
//! CommonJS module here so the rest of the pipeline only ever sees one kind
//! of input.

use std::fmt::{self, Display};
use std::str::FromStr;

use logger_srcfile::Diagnostic;
use serde::Deserialize;
use swc_common::comments::SingleThreadedComments;
use swc_common::sync::Lrc;
use swc_common::{FileName, Globals, Mark, SourceMap, Spanned, SyntaxContext, GLOBALS};
use swc_ecma_ast::Module;
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
use swc_ecma_transforms::resolver;
use swc_ecma_visit::FoldWith;

/// How a loaded file's bytes become a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LoaderKind {
    #[default]
    Js,
    Jsx,
    Ts,
    Tsx,
    Json,
    Css,
    Text,
    Base64,
    DataUrl,
    Binary,
    File,
}

impl LoaderKind {
    /// Loaders whose input is parsed as-is rather than synthesized.
    pub fn is_javascript(&self) -> bool {
        matches!(
            self,
            LoaderKind::Js | LoaderKind::Jsx | LoaderKind::Ts | LoaderKind::Tsx
        )
    }

    /// The default loader for a file extension, before `--loader:` overrides.
    pub fn from_extension(ext: &str) -> LoaderKind {
        match ext {
            "js" | "mjs" | "cjs" => LoaderKind::Js,
            "jsx" => LoaderKind::Jsx,
            "ts" | "mts" | "cts" => LoaderKind::Ts,
            "tsx" => LoaderKind::Tsx,
            "json" => LoaderKind::Json,
            "css" => LoaderKind::Css,
            "txt" => LoaderKind::Text,
            _ => LoaderKind::File,
        }
    }

    fn syntax(&self) -> Syntax {
        match self {
            LoaderKind::Ts | LoaderKind::Tsx => Syntax::Typescript(TsSyntax {
                tsx: *self == LoaderKind::Tsx,
                decorators: true,
                ..Default::default()
            }),
            _ => Syntax::Es(EsSyntax {
                jsx: *self == LoaderKind::Jsx,
                ..Default::default()
            }),
        }
    }
}

impl Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoaderKind::Js => "js",
            LoaderKind::Jsx => "jsx",
            LoaderKind::Ts => "ts",
            LoaderKind::Tsx => "tsx",
            LoaderKind::Json => "json",
            LoaderKind::Css => "css",
            LoaderKind::Text => "text",
            LoaderKind::Base64 => "base64",
            LoaderKind::DataUrl => "data-url",
            LoaderKind::Binary => "binary",
            LoaderKind::File => "file",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LoaderKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "js" => Ok(LoaderKind::Js),
            "jsx" => Ok(LoaderKind::Jsx),
            "ts" => Ok(LoaderKind::Ts),
            "tsx" => Ok(LoaderKind::Tsx),
            "json" => Ok(LoaderKind::Json),
            "css" => Ok(LoaderKind::Css),
            "text" => Ok(LoaderKind::Text),
            "base64" => Ok(LoaderKind::Base64),
            "dataurl" | "data-url" => Ok(LoaderKind::DataUrl),
            "binary" => Ok(LoaderKind::Binary),
            "file" => Ok(LoaderKind::File),
            other => Err(format!("invalid loader: {:?}", other)),
        }
    }
}

/// One file after parsing and hygiene resolution.
pub struct ParsedModule {
    pub cm: Lrc<SourceMap>,
    pub comments: SingleThreadedComments,
    pub module: Module,
    /// Context carried by references that resolved to no binding in the
    /// file (host globals).
    pub unresolved_ctxt: SyntaxContext,
    /// Context carried by top-level bindings of the file.
    pub top_level_ctxt: SyntaxContext,
}

impl fmt::Debug for ParsedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedModule")
            .field("unresolved_ctxt", &self.unresolved_ctxt)
            .field("top_level_ctxt", &self.top_level_ctxt)
            .finish_non_exhaustive()
    }
}

pub fn create_lexer<'a>(
    fm: &'a swc_common::SourceFile,
    kind: LoaderKind,
    comments: Option<&'a dyn swc_common::comments::Comments>,
) -> Lexer<'a> {
    Lexer::new(
        kind.syntax(),
        Default::default(),
        StringInput::from(fm),
        comments,
    )
}

/// Parses `src` and runs the hygiene resolver over the result.
///
/// Parse errors are returned as diagnostics against `file_name`; the AST is
/// withheld when any occur (a half-parsed module would poison the linker).
pub fn parse_module(
    file_name: FileName,
    src: String,
    kind: LoaderKind,
) -> Result<ParsedModule, Vec<Diagnostic>> {
    let cm = Lrc::<SourceMap>::default();
    let fm = cm.new_source_file(Lrc::new(file_name), src);
    let comments = SingleThreadedComments::default();

    let lexer = create_lexer(&fm, kind, Some(&comments));
    let mut parser = Parser::new_from(lexer);

    let parsed = parser.parse_module();
    let mut errors = parser.take_errors();
    let module = match parsed {
        Ok(module) => module,
        Err(err) => {
            errors.push(err);
            Module {
                span: Default::default(),
                body: vec![],
                shebang: None,
            }
        }
    };
    if !errors.is_empty() {
        return Err(errors
            .into_iter()
            .map(|err| {
                let span = err.span();
                Diagnostic::error(err.into_kind().msg().to_string()).with_span(&cm, span)
            })
            .collect());
    }

    // Hygiene: tag every binding with a unique syntax context. Each file
    // gets its own Globals; contexts are only ever compared within a file.
    // TypeScript inputs lose their type-level syntax here as well, so the
    // printer only ever sees JavaScript.
    let globals = Globals::new();
    let (module, unresolved_ctxt, top_level_ctxt) = GLOBALS.set(&globals, || {
        let unresolved_mark = Mark::fresh(Mark::root());
        let top_level_mark = Mark::fresh(Mark::root());
        let mut module = module.fold_with(&mut resolver(unresolved_mark, top_level_mark, true));
        if matches!(kind, LoaderKind::Ts | LoaderKind::Tsx) {
            let program = swc_ecma_ast::Program::Module(module).fold_with(
                &mut swc_ecma_transforms::typescript::strip(unresolved_mark, top_level_mark),
            );
            module = match program {
                swc_ecma_ast::Program::Module(module) => module,
                swc_ecma_ast::Program::Script(_) => {
                    unreachable!("strip preserves the Module/Script variant")
                }
            };
        }
        (
            module,
            SyntaxContext::empty().apply_mark(unresolved_mark),
            SyntaxContext::empty().apply_mark(top_level_mark),
        )
    });

    Ok(ParsedModule {
        cm,
        comments,
        module,
        unresolved_ctxt,
        top_level_ctxt,
    })
}

/// Produces the JavaScript stand-in for a non-JS loader, or `None` for
/// loaders that parse their input directly.
///
/// The stand-ins are CommonJS on purpose: namespace imports of a JSON or
/// text module then flow through the same interop path as any other
/// CommonJS module.
pub fn synthesize_module_source(
    kind: LoaderKind,
    bytes: &[u8],
    public_url: Option<&str>,
) -> Option<Result<String, String>> {
    match kind {
        LoaderKind::Js | LoaderKind::Jsx | LoaderKind::Ts | LoaderKind::Tsx => None,
        LoaderKind::Json => Some(synthesize_json(bytes)),
        LoaderKind::Css | LoaderKind::Text => Some(synthesize_text(bytes)),
        LoaderKind::Base64 => Some(Ok(format!(
            "module.exports = {};\n",
            quote(&data_encoding::BASE64.encode(bytes))
        ))),
        LoaderKind::DataUrl => Some(Ok(format!(
            "module.exports = {};\n",
            quote(&format!(
                "data:application/octet-stream;base64,{}",
                data_encoding::BASE64.encode(bytes)
            ))
        ))),
        LoaderKind::Binary => Some(Ok(format!(
            "module.exports = /* base64 */ {};\n",
            quote(&data_encoding::BASE64.encode(bytes))
        ))),
        LoaderKind::File => {
            let url = public_url.unwrap_or_default();
            Some(Ok(format!("module.exports = {};\n", quote(url))))
        }
    }
}

fn synthesize_json(bytes: &[u8]) -> Result<String, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))?;
    // Validate; the raw JSON text is a valid JS expression once it parses.
    let _: serde_json::Value =
        serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
    Ok(format!("module.exports = {};\n", text.trim()))
}

fn synthesize_text(bytes: &[u8]) -> Result<String, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))?;
    Ok(format!("module.exports = {};\n", quote(text)))
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).expect("string serialization is infallible")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_ts_module() {
        let parsed = parse_module(
            FileName::Custom("test.ts".to_string()),
            "export const foo: number = 1;".to_string(),
            LoaderKind::Ts,
        )
        .unwrap();
        assert_eq!(parsed.module.body.len(), 1);
    }

    #[test]
    fn reports_parse_errors_with_location() {
        let errs = parse_module(
            FileName::Custom("bad.ts".to_string()),
            "const = 1;".to_string(),
            LoaderKind::Ts,
        )
        .unwrap_err();
        assert!(!errs.is_empty());
        assert!(errs[0].location.is_some());
    }

    #[test]
    fn hygiene_distinguishes_shadowed_names() {
        let parsed = parse_module(
            FileName::Custom("shadow.js".to_string()),
            "let x = 1; { let x = 2; }".to_string(),
            LoaderKind::Js,
        )
        .unwrap();
        // the two `x` bindings must not share a syntax context
        use swc_ecma_ast::{Decl, ModuleItem, Stmt};
        let mut ctxts = vec![];
        fn var_ctxt(stmt: &Stmt, ctxts: &mut Vec<swc_common::SyntaxContext>) {
            match stmt {
                Stmt::Decl(Decl::Var(var)) => {
                    if let Some(ident) = var.decls[0].name.as_ident() {
                        ctxts.push(ident.ctxt);
                    }
                }
                Stmt::Block(block) => {
                    for s in &block.stmts {
                        var_ctxt(s, ctxts);
                    }
                }
                _ => {}
            }
        }
        for item in &parsed.module.body {
            if let ModuleItem::Stmt(stmt) = item {
                var_ctxt(stmt, &mut ctxts);
            }
        }
        assert_eq!(ctxts.len(), 2);
        assert_ne!(ctxts[0], ctxts[1]);
    }

    #[test]
    fn json_loader_synthesizes_commonjs() {
        let src = synthesize_module_source(LoaderKind::Json, b"{\"a\": 1}", None)
            .unwrap()
            .unwrap();
        assert_eq!(src, "module.exports = {\"a\": 1};\n");
    }

    #[test]
    fn text_loader_quotes_contents() {
        let src = synthesize_module_source(LoaderKind::Text, b"hello\nworld", None)
            .unwrap()
            .unwrap();
        assert_eq!(src, "module.exports = \"hello\\nworld\";\n");
    }
}
