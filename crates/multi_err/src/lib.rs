use std::fmt::Debug;

use logger_srcfile::Diagnostic;

/// Accumulator for independent per-file errors.
///
/// Pipeline stages report everything they find instead of stopping at the
/// first failure; the driver checks the accumulated state between stages.
/// A limit bounds the collection: further entries are counted but dropped,
/// and surface as a trailing "N more errors" note.
pub struct MultiErr<TErr> {
    errs: Vec<TErr>,
    limit: Option<usize>,
    dropped: usize,
}

pub struct MultiResult<TRes, TErr>(TRes, MultiErr<TErr>);

impl<TErr> MultiErr<TErr> {
    pub fn new() -> Self {
        Self {
            errs: Vec::new(),
            limit: None,
            dropped: 0,
        }
    }

    /// An accumulator that keeps at most `limit` entries. A limit of 0
    /// means unbounded.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            errs: Vec::new(),
            limit: if limit == 0 { None } else { Some(limit) },
            dropped: 0,
        }
    }

    pub fn add_single(&mut self, err: TErr) {
        match self.limit {
            Some(limit) if self.errs.len() >= limit => self.dropped += 1,
            _ => self.errs.push(err),
        }
    }

    pub fn add_iter(&mut self, errs: impl IntoIterator<Item = TErr>) {
        for err in errs {
            self.add_single(err);
        }
    }

    pub fn add_multi(&mut self, other: MultiErr<TErr>) {
        self.dropped += other.dropped;
        self.add_iter(other.errs);
    }

    // Convenience wrapper for add_multi for unpacking a result tuple
    pub fn extract<T>(&mut self, other: MultiResult<T, TErr>) -> T {
        self.add_multi(other.1);
        other.0
    }

    pub fn with_value<T>(self, val: T) -> MultiResult<T, TErr> {
        MultiResult::with_errs(val, self)
    }

    pub fn is_empty(&self) -> bool {
        self.errs.is_empty() && self.dropped == 0
    }

    pub fn len(&self) -> usize {
        self.errs.len() + self.dropped
    }

    /// Count of entries dropped after the limit was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &TErr> {
        self.errs.iter()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<TErr> Default for MultiErr<TErr> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<MultiErr<T>> for Vec<T> {
    fn from(other: MultiErr<T>) -> Self {
        other.errs
    }
}

impl<T: Debug> MultiErr<T> {
    fn into_anyhow(self) -> anyhow::Error {
        let mut rendered = self
            .errs
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}: {:?}", i, e))
            .collect::<Vec<String>>()
            .join(", ");
        if self.dropped > 0 {
            rendered.push_str(&format!(", {} more errors", self.dropped));
        }
        anyhow::anyhow!("{} errors: {}", self.len(), rendered)
    }
}

impl<T: Debug> From<MultiErr<T>> for anyhow::Error {
    fn from(other: MultiErr<T>) -> Self {
        other.into_anyhow()
    }
}

impl MultiErr<Diagnostic> {
    /// True if any collected diagnostic is an error (warnings alone do not
    /// block emit).
    pub fn has_errors(&self) -> bool {
        self.dropped > 0 || self.errs.iter().any(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.dropped + self.errs.iter().filter(|d| d.is_error()).count()
    }

    /// Renders every diagnostic, with the trailing truncation note if the
    /// limit was hit.
    pub fn render_all(&self, color: bool) -> String {
        let mut lines = self
            .errs
            .iter()
            .map(|d| d.render(color))
            .collect::<Vec<_>>();
        if self.dropped > 0 {
            lines.push(format!("{} more errors", self.dropped));
        }
        lines.join("\n")
    }
}

impl<TRes, TErr> MultiResult<TRes, TErr> {
    pub fn from(val: TRes) -> Self {
        Self(val, MultiErr::new())
    }
    pub fn with_errs(val: TRes, errs: MultiErr<TErr>) -> Self {
        Self(val, errs)
    }
}

impl<TRes, TErr: Debug> MultiResult<TRes, TErr> {
    pub fn into_anyhow(self) -> Result<TRes, anyhow::Error> {
        if self.1.is_empty() {
            Ok(self.0)
        } else {
            Err(self.1.into_anyhow())
        }
    }
}

impl<TRes, TErr> From<MultiResult<TRes, TErr>> for Result<TRes, MultiErr<TErr>> {
    fn from(multi_result: MultiResult<TRes, TErr>) -> Self {
        let (val, multi_errs) = (multi_result.0, multi_result.1);
        multi_errs.into_result().map(|_| val)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn limit_drops_and_counts() {
        let mut errs: MultiErr<Diagnostic> = MultiErr::with_limit(2);
        for i in 0..5 {
            errs.add_single(Diagnostic::error(format!("error {}", i)));
        }
        assert_eq!(errs.len(), 5);
        assert_eq!(errs.dropped(), 3);
        assert_eq!(
            errs.render_all(false),
            "error: error 0\nerror: error 1\n3 more errors"
        );
    }

    #[test]
    fn warnings_alone_are_not_errors() {
        let mut errs: MultiErr<Diagnostic> = MultiErr::new();
        errs.add_single(Diagnostic::warning("suspicious"));
        assert!(!errs.has_errors());
        errs.add_single(Diagnostic::error("broken"));
        assert!(errs.has_errors());
        assert_eq!(errs.error_count(), 1);
    }
}
