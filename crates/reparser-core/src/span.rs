//! Source location tracking for fragments.
//!
//! Every [`Fragment`](crate::Fragment) records the byte range of the
//! preprocessed input it was produced from, so renderers can map styled
//! output back onto the source.

/// A byte range in the (preprocessed) source text.
///
/// Spans use byte offsets, not character offsets, and are half-open:
/// `[start, end)`.
///
/// # Example
///
/// ```rust
/// use reparser_core::span::Span;
///
/// let span = Span::new(2, 10);
/// assert_eq!(span.len(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Starting byte offset (inclusive).
    pub start: usize,
    /// Ending byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span from byte offsets.
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Get the length of this span in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if this span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Slice `source` by this span.
    ///
    /// Returns `None` if the span is out of bounds or does not fall on
    /// character boundaries.
    #[inline]
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start..self.end)
    }
}
