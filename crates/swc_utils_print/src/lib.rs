//! Printer boundary: SWC AST to JavaScript text.
//!
//! The chunk printer emits one top-level item at a time so it knows which
//! output lines belong to which original statement; that is where the
//! source-map segments come from.

use swc_common::comments::Comments;
use swc_common::sync::Lrc;
use swc_common::{SourceMap, DUMMY_SP};
use swc_compiler_base::PrintArgs;
use swc_ecma_ast::{Module, ModuleItem};

pub fn ast_to_str(
    cm: &Lrc<SourceMap>,
    module: &Module,
    comments: Option<&dyn Comments>,
) -> anyhow::Result<String> {
    let out = swc_compiler_base::print(
        cm.clone(),
        module,
        PrintArgs {
            comments,
            ..Default::default()
        },
    )?;
    Ok(out.code)
}

/// Prints a single top-level item. The item is wrapped in a throwaway
/// one-statement module because the printer is rooted at modules.
pub fn module_item_to_str(
    cm: &Lrc<SourceMap>,
    item: &ModuleItem,
    comments: Option<&dyn Comments>,
) -> anyhow::Result<String> {
    let wrapper = Module {
        span: DUMMY_SP,
        body: vec![item.clone()],
        shebang: None,
    };
    ast_to_str(cm, &wrapper, comments)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use swc_common::FileName;
    use swc_utils_parse::{parse_module, LoaderKind};

    #[test]
    fn prints_items_separately() {
        let parsed = parse_module(
            FileName::Custom("t.ts".to_string()),
            "const a = 1;\nconst b = a + 1;".to_string(),
            LoaderKind::Ts,
        )
        .unwrap();
        let first = module_item_to_str(&parsed.cm, &parsed.module.body[0], None).unwrap();
        let second = module_item_to_str(&parsed.cm, &parsed.module.body[1], None).unwrap();
        assert_eq!(first, "const a = 1;\n");
        assert_eq!(second, "const b = a + 1;\n");
    }

    #[test]
    fn keeps_comments_when_asked() {
        let parsed = parse_module(
            FileName::Custom("t.ts".to_string()),
            "// note\nconst a = 1;".to_string(),
            LoaderKind::Ts,
        )
        .unwrap();
        let code =
            module_item_to_str(&parsed.cm, &parsed.module.body[0], Some(&parsed.comments)).unwrap();
        assert_eq!(code, "// note\nconst a = 1;\n");
    }
}
