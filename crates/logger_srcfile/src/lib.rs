//! Source-located diagnostics.
//!
//! A [`Diagnostic`] records a message against a position in an input file,
//! together with the text of the offending line so it can be rendered with
//! a caret without re-reading the file.

use std::fmt::{self, Display};
use std::path::PathBuf;

use logger::Logger;
use serde::Serialize;
use swc_common::{SourceMap, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Location of a diagnostic within an input file. Lines and columns are
/// 1-based; column 0 means "whole line".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SrcLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    /// Text of the source line, used for the caret excerpt.
    #[serde(skip)]
    pub line_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SrcLocation>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: SrcLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Attaches the location of `span` within `cm`, capturing the source
    /// line for the excerpt.
    pub fn with_span(self, cm: &SourceMap, span: Span) -> Self {
        let loc = cm.lookup_char_pos(span.lo);
        let line_text = loc
            .file
            .get_line(loc.line.saturating_sub(1))
            .map(|l| l.trim_end().to_string())
            .unwrap_or_default();
        self.with_location(SrcLocation {
            file: PathBuf::from(loc.file.name.to_string()),
            line: loc.line,
            column: loc.col_display + 1,
            line_text,
        })
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Renders the diagnostic the way the CLI prints it: a `file:line:col`
    /// header followed by the source excerpt and a caret.
    pub fn render(&self, color: bool) -> String {
        let (sev_on, off) = match (color, self.severity) {
            (true, Severity::Error) => ("\x1b[31m", "\x1b[0m"),
            (true, Severity::Warning) => ("\x1b[33m", "\x1b[0m"),
            (false, _) => ("", ""),
        };
        match &self.location {
            Some(loc) => {
                let mut out = format!(
                    "{}:{}:{}: {}{}{}: {}",
                    loc.file.display(),
                    loc.line,
                    loc.column,
                    sev_on,
                    self.severity,
                    off,
                    self.message
                );
                if !loc.line_text.is_empty() {
                    out.push('\n');
                    out.push_str(&loc.line_text);
                    out.push('\n');
                    // column is 1-based
                    for _ in 1..loc.column {
                        out.push(' ');
                    }
                    out.push('^');
                }
                out
            }
            None => format!("{}{}{}: {}", sev_on, self.severity, off, self.message),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}

pub trait HasSourceMap {
    fn source_map(&self) -> &SourceMap;
}

/// Logger that can report messages against spans of the file it wraps.
pub trait SrcFileLogger: Logger + HasSourceMap {
    fn src_warn(&self, location: Span, message: impl Into<String>) {
        self.warn(
            Diagnostic::warning(message)
                .with_span(self.source_map(), location)
                .to_string(),
        );
    }
    fn src_error(&self, location: Span, message: impl Into<String>) {
        self.error(
            Diagnostic::error(message)
                .with_span(self.source_map(), location)
                .to_string(),
        );
    }
}

#[derive(Clone)]
pub struct WrapFileLogger<'a, TLogger: Logger> {
    source_map: &'a SourceMap,
    inner_logger: TLogger,
}
impl<'a, TLogger: Logger> WrapFileLogger<'a, TLogger> {
    pub fn new(source_map: &'a SourceMap, inner_logger: TLogger) -> Self {
        Self {
            source_map,
            inner_logger,
        }
    }
}
impl<TLogger: Logger> Logger for WrapFileLogger<'_, TLogger> {
    fn log(&self, message: impl Into<String>) {
        self.inner_logger.log(message);
    }
    fn error(&self, message: impl Into<String>) {
        self.inner_logger.error(message);
    }
    fn warn(&self, message: impl Into<String>) {
        self.inner_logger.warn(message);
    }
}
impl<TLogger: Logger> HasSourceMap for WrapFileLogger<'_, TLogger> {
    fn source_map(&self) -> &SourceMap {
        self.source_map
    }
}
impl<TLogger: Logger> SrcFileLogger for WrapFileLogger<'_, TLogger> {}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_caret_under_column() {
        let diag = Diagnostic::error("could not resolve \"./missing\"").with_location(SrcLocation {
            file: PathBuf::from("/src/entry.ts"),
            line: 3,
            column: 8,
            line_text: "import './missing';".to_string(),
        });
        assert_eq!(
            diag.render(false),
            "/src/entry.ts:3:8: error: could not resolve \"./missing\"\n\
             import './missing';\n       ^"
        );
    }

    #[test]
    fn renders_without_location() {
        let diag = Diagnostic::warning("splitting is only supported for esm");
        assert_eq!(diag.render(false), "warning: splitting is only supported for esm");
    }
}
