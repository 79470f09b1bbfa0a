//! Token definitions: the caller-supplied markup rules.
//!
//! A [`TokenDefinition`] pairs one or two pattern fragments with the
//! attributes that text inside the token receives. Attribute values are
//! either literals or [`CaptureRef`]s, which are resolved against the match
//! that opened (or, for single tokens, produced) the token.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Function applied to a captured substring before it becomes an attribute value.
pub type Transform = Arc<dyn Fn(&str) -> AttrValue + Send + Sync>;

/// Role of an outer capture group in the composite automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Opening delimiter of a paired token.
    Start,
    /// Closing delimiter of a paired token.
    End,
    /// The whole of a self-contained token.
    Single,
}

impl Role {
    /// Suffix used for the outer capture group of this role.
    pub(crate) const fn group_suffix(self) -> &'static str {
        match self {
            Role::Start | Role::Single => "start",
            Role::End => "end",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Start => f.write_str("start"),
            Role::End => f.write_str("end"),
            Role::Single => f.write_str("single"),
        }
    }
}

/// Typed attribute values carried by fragments.
///
/// Captured substrings resolve to `Str` unless a transform says otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// String value.
    Str(String),
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// Nested list of values.
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// The string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(x) => write!(f, "{}", x),
            AttrValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        AttrValue::Int(i64::from(i))
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        AttrValue::Float(x)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(items: Vec<AttrValue>) -> Self {
        AttrValue::List(items)
    }
}

/// Deferred reference to a named capture of the owning token's pattern.
///
/// The group name is written as it appears in the token's own pattern
/// (`url` for `(?P<url>...)`). A group that did not take part in the match
/// resolves to the empty string, which is still passed through the
/// transform.
#[derive(Clone)]
pub struct CaptureRef {
    group: String,
    transform: Option<Transform>,
}

impl CaptureRef {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            transform: None,
        }
    }

    /// Attach a transform applied to the captured substring.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> AttrValue + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Attach an already shared transform.
    pub fn with_shared_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Group name as written in the token's pattern.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Resolve against a captured substring (`None` = group did not participate).
    pub fn resolve(&self, captured: Option<&str>) -> AttrValue {
        let value = captured.unwrap_or("");
        match &self.transform {
            Some(transform) => transform(value),
            None => AttrValue::Str(value.to_owned()),
        }
    }
}

impl fmt::Debug for CaptureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRef")
            .field("group", &self.group)
            .field("transform", &self.transform.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Attribute or text value of a token definition.
#[derive(Debug, Clone)]
pub enum ValueSource {
    /// Fixed value.
    Literal(AttrValue),
    /// Value taken from the match.
    Capture(CaptureRef),
}

impl From<CaptureRef> for ValueSource {
    fn from(capture: CaptureRef) -> Self {
        ValueSource::Capture(capture)
    }
}

impl From<AttrValue> for ValueSource {
    fn from(value: AttrValue) -> Self {
        ValueSource::Literal(value)
    }
}

macro_rules! literal_source {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ValueSource {
                fn from(value: $ty) -> Self {
                    ValueSource::Literal(AttrValue::from(value))
                }
            }
        )*
    };
}

literal_source!(&str, String, bool, i64, i32, f64, Vec<AttrValue>);

/// One markup rule.
///
/// # Example
///
/// ```rust
/// use reparser_core::{CaptureRef, TokenDefinition};
///
/// let bold = TokenDefinition::paired("bold", r"\*\*", r"\*\*").with_attr("weight", "bold");
/// let link = TokenDefinition::single("link", r"\[(?P<label>[^\]]+)\]\((?P<url>[^)]+)\)")
///     .with_text(CaptureRef::new("label"))
///     .with_attr("href", CaptureRef::new("url"));
/// assert!(bold.is_paired());
/// assert!(!link.is_paired());
/// ```
#[derive(Debug, Clone)]
pub struct TokenDefinition {
    /// Unique name; also the prefix of every capture group of this token.
    pub name: String,
    /// Pattern of the opening delimiter, or of the whole single token.
    pub start: String,
    /// Pattern of the closing delimiter (`None` for single tokens).
    pub end: Option<String>,
    /// Replacement text for single tokens (`None` = matched substring).
    pub text: Option<ValueSource>,
    /// Whether nested markup is left uninterpreted while this token is open.
    pub skip: bool,
    /// Attributes applied to text inside (or produced by) this token.
    pub attributes: BTreeMap<String, ValueSource>,
}

impl TokenDefinition {
    /// A token with opening and closing delimiters.
    pub fn paired(name: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            end: Some(end.into()),
            text: None,
            skip: false,
            attributes: BTreeMap::new(),
        }
    }

    /// A self-contained token.
    pub fn single(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: pattern.into(),
            end: None,
            text: None,
            skip: false,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<ValueSource>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Leave nested markup uninterpreted while this token is open.
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<ValueSource>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn is_paired(&self) -> bool {
        self.end.is_some()
    }
}
