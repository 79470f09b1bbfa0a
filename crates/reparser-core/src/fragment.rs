//! Parser output.

use std::collections::BTreeMap;

use crate::span::Span;
use crate::token::AttrValue;

/// Resolved attribute mapping of a fragment.
pub type Attributes = BTreeMap<String, AttrValue>;

/// One unit of parser output: text plus the attributes in effect for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Resolved text (postprocessed plain text, or a single token's text).
    pub text: String,
    /// Union of the attributes of every token covering this text.
    pub attributes: Attributes,
    /// Byte range of the preprocessed input this fragment came from.
    pub span: Span,
}

impl Fragment {
    pub fn new(text: impl Into<String>, attributes: Attributes, span: Span) -> Self {
        Self {
            text: text.into(),
            attributes,
            span,
        }
    }

    /// Look up one attribute.
    #[inline]
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Whether no token contributed attributes.
    #[inline]
    pub fn is_plain(&self) -> bool {
        self.attributes.is_empty()
    }
}
