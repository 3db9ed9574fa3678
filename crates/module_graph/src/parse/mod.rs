//! Per-file analysis: symbol collection, import/export records, statement
//! side-effect facts.

mod define;
mod scan;
mod side_effects;

pub use define::{apply_defines, DefineMap};
pub use scan::{scan_module, ScanOptions, ScanOutput};
pub use side_effects::{callee_dotted_name, expr_is_pure, stmt_has_side_effects, PureCtx};

#[cfg(test)]
mod scan_tests;
