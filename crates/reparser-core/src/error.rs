use std::fmt;

use thiserror::Error;

use crate::token::Role;

/// Error type returned by user-supplied hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for engine construction and parsing.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Which hook raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// The whole-input hook run before scanning.
    Preprocess,
    /// The per-span hook run on plain text.
    Postprocess,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::Preprocess => f.write_str("preprocess"),
            HookStage::Postprocess => f.write_str("postprocess"),
        }
    }
}

/// Configuration errors.
///
/// Raised while compiling token definitions, or propagated from `parse`
/// when a hook fails. Malformed markup in the input is never an error.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate token name `{0}`")]
    DuplicateName(String),

    #[error("invalid token name `{0}`: expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidName(String),

    #[error("token `{token}` repeats the start pattern of token `{existing}`")]
    DuplicatePattern { token: String, existing: String },

    #[error("token `{token}` has an invalid {role} pattern: {source}")]
    InvalidPattern {
        token: String,
        role: Role,
        #[source]
        source: regex::Error,
    },

    #[error("composite pattern failed to compile: {0}")]
    Composite(#[source] regex::Error),

    #[error("{stage} hook failed: {source}")]
    Hook {
        stage: HookStage,
        #[source]
        source: HookError,
    },
}

impl ConfigError {
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName(name.into())
    }

    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName(name.into())
    }

    pub fn invalid_pattern(token: impl Into<String>, role: Role, source: regex::Error) -> Self {
        Self::InvalidPattern {
            token: token.into(),
            role,
            source,
        }
    }

    pub fn hook(stage: HookStage, source: HookError) -> Self {
        Self::Hook { stage, source }
    }

    /// The hook stage, if this error came from a hook.
    pub fn hook_stage(&self) -> Option<HookStage> {
        match self {
            Self::Hook { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
