//! Byte spans into fragment and query sources.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Byte offsets `start..end` into a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[must_use]
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Span of a node built in code rather than parsed from text.
    ///
    /// Generated fragments and the compiled listing queries are made of
    /// such nodes; the printer never looks at spans.
    #[must_use]
    #[inline]
    pub const fn synthetic() -> Self {
        Self { start: 0, end: 0 }
    }

    /// 1-based line and column of the span start, clamped to `source`.
    #[must_use]
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let offset = (self.start as usize).min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(newline) => before.len() - newline,
            None => before.len() + 1,
        };
        (line, column)
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        let length = span.end.saturating_sub(span.start) as usize;
        miette::SourceSpan::new((span.start as usize).into(), length)
    }
}
