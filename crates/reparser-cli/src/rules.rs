//! JSON rule files.
//!
//! ```json
//! {
//!   "options": { "case_insensitive": false },
//!   "tokens": [
//!     { "name": "bold", "start": "\\*\\*", "end": "\\*\\*", "attributes": { "bold": true } },
//!     { "name": "link", "start": "\\[(?P<label>[^\\]]+)\\]\\((?P<url>[^)]+)\\)",
//!       "text": { "capture": "label" },
//!       "attributes": { "href": { "capture": "url", "transform": "trim" } } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use reparser_core::{AttrValue, CaptureRef, ParserOptions, TokenDefinition, Transform, ValueSource};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rule file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token `{token}`: unknown transform `{name}`")]
    UnknownTransform { token: String, name: String },

    #[error("token `{token}`: `{key}` must be a string, number, boolean, list or capture")]
    UnsupportedValue { token: String, key: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    #[serde(default)]
    pub options: OptionsSpec,
    pub tokens: Vec<TokenSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsSpec {
    pub dot_matches_newline: Option<bool>,
    pub multi_line: Option<bool>,
    pub case_insensitive: Option<bool>,
    pub size_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSpec {
    pub name: String,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub text: Option<ValueSpec>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, ValueSpec>,
}

/// A literal JSON value, or `{"capture": "group", "transform": "name"}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    Capture {
        capture: String,
        #[serde(default)]
        transform: Option<String>,
    },
    Literal(serde_json::Value),
}

impl RuleFile {
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let json = fs::read_to_string(path).map_err(|source| RulesError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, RulesError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn options(&self) -> ParserOptions {
        let defaults = ParserOptions::default();
        let set = &self.options;
        ParserOptions {
            dot_matches_newline: set.dot_matches_newline.unwrap_or(defaults.dot_matches_newline),
            multi_line: set.multi_line.unwrap_or(defaults.multi_line),
            case_insensitive: set.case_insensitive.unwrap_or(defaults.case_insensitive),
            size_limit: set.size_limit.or(defaults.size_limit),
        }
    }

    pub fn token_definitions(&self) -> Result<Vec<TokenDefinition>, RulesError> {
        self.tokens.iter().map(TokenSpec::to_definition).collect()
    }
}

impl TokenSpec {
    fn to_definition(&self) -> Result<TokenDefinition, RulesError> {
        let mut def = match &self.end {
            Some(end) => TokenDefinition::paired(&self.name, &self.start, end),
            None => TokenDefinition::single(&self.name, &self.start),
        }
        .with_skip(self.skip);

        if let Some(text) = &self.text {
            def = def.with_text(text.to_source(&self.name, "text")?);
        }
        for (key, value) in &self.attributes {
            def = def.with_attr(key, value.to_source(&self.name, key)?);
        }
        Ok(def)
    }
}

impl ValueSpec {
    fn to_source(&self, token: &str, key: &str) -> Result<ValueSource, RulesError> {
        match self {
            ValueSpec::Capture { capture, transform } => {
                let mut capture_ref = CaptureRef::new(capture);
                if let Some(name) = transform {
                    let transform = named_transform(name).ok_or_else(|| RulesError::UnknownTransform {
                        token: token.to_owned(),
                        name: name.clone(),
                    })?;
                    capture_ref = capture_ref.with_shared_transform(transform);
                }
                Ok(ValueSource::Capture(capture_ref))
            }
            ValueSpec::Literal(value) => json_to_attr(value)
                .map(ValueSource::Literal)
                .ok_or_else(|| RulesError::UnsupportedValue {
                    token: token.to_owned(),
                    key: key.to_owned(),
                }),
        }
    }
}

fn json_to_attr(value: &serde_json::Value) -> Option<AttrValue> {
    use serde_json::Value;

    match value {
        Value::String(s) => Some(AttrValue::Str(s.clone())),
        Value::Bool(b) => Some(AttrValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(AttrValue::Int)
            .or_else(|| n.as_f64().map(AttrValue::Float)),
        Value::Array(items) => items
            .iter()
            .map(json_to_attr)
            .collect::<Option<Vec<_>>>()
            .map(AttrValue::List),
        Value::Null | Value::Object(_) => None,
    }
}

/// Transforms that rule files can name.
pub fn named_transform(name: &str) -> Option<Transform> {
    let transform: Transform = match name {
        "lowercase" => Arc::new(|s: &str| AttrValue::Str(s.to_lowercase())),
        "uppercase" => Arc::new(|s: &str| AttrValue::Str(s.to_uppercase())),
        "trim" => Arc::new(|s: &str| AttrValue::from(s.trim())),
        "len" => Arc::new(|s: &str| AttrValue::Int(s.chars().count() as i64)),
        "int" => Arc::new(|s: &str| {
            s.trim()
                .parse::<i64>()
                .map_or_else(|_| AttrValue::from(s), AttrValue::Int)
        }),
        "float" => Arc::new(|s: &str| {
            s.trim()
                .parse::<f64>()
                .map_or_else(|_| AttrValue::from(s), AttrValue::Float)
        }),
        _ => return None,
    };
    Some(transform)
}
