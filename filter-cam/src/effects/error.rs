//! Effect construction and application errors

use std::path::PathBuf;

/// Errors raised while building or running an effect
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    /// No effect is registered under this name
    #[error("unknown effect type: {0}")]
    UnknownEffect(String),

    /// A required construction argument was not supplied
    #[error("{effect}: missing argument `{name}`")]
    MissingArgument { effect: String, name: String },

    /// A construction argument has the wrong type or is out of range
    #[error("{effect}: invalid argument `{name}`: {reason}")]
    InvalidArgument {
        effect: String,
        name: String,
        reason: String,
    },

    /// Priority level outside -2..=2
    #[error("invalid priority {0}, expected -2..=2")]
    InvalidPriority(i64),

    /// A backing resource (image, video) could not be opened
    #[error("failed to open {}: {reason}", path.display())]
    ResourceUnavailable { path: PathBuf, reason: String },

    /// A backing stream failed mid-way
    #[error("decode failed: {0}")]
    Decode(String),

    /// The effect needs a feature this build does not include
    #[error("{0}")]
    Unsupported(&'static str),
}

impl EffectError {
    pub(crate) fn invalid(effect: &str, name: &str, reason: impl Into<String>) -> Self {
        EffectError::InvalidArgument {
            effect: effect.to_string(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(effect: &str, name: &str) -> Self {
        EffectError::MissingArgument {
            effect: effect.to_string(),
            name: name.to_string(),
        }
    }
}
