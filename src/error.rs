// ============================================================================
// ERRORS - action validation and file I/O failures
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn an action into an image.
///
/// All variants are local and non-retryable: they describe bad input, not a
/// transient condition. The caller shows the message and keeps its state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// No strategy is registered for the action's tag.
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),
    /// A required parameter is absent from an untyped parameter set.
    #[error("action does not contain parameter \"{0}\"")]
    MissingParameter(String),
    /// A parameter is present but has the wrong type, arity or range.
    #[error("invalid parameter \"{name}\": {reason}")]
    InvalidParameter { name: String, reason: String },
}

impl ActionError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ActionError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(name: &str) -> Self {
        ActionError::MissingParameter(name.to_string())
    }
}

/// Failure while reading or writing images and recipe files.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("could not read image '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not write image '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("recipe '{path}' is not valid JSON: {source}")]
    Recipe {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Fs(#[from] std::io::Error),
}
