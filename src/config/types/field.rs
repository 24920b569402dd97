//! Typed config field paths.

use std::fmt;

/// Dotted path of a config field, as used in diagnostics.
///
/// Each section exposes its paths through a `FIELDS` constant:
///
/// ```ignore
/// diag.error(DispatchConfig::FIELDS.max_concurrent, "must be at least 1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath(&'static str);

impl FieldPath {
    #[inline]
    pub const fn new(path: &'static str) -> Self {
        Self(path)
    }

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
