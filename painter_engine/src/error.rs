//! Error types for the painter engine.
//!
//! The per-frame loop has no error path: weak detections, missing keypoints
//! and tracking jumps all degrade to "painter stays inactive" or "keep the
//! previous state". Errors only surface while building a session.

use thiserror::Error;

/// A specialized `Result` type for engine setup operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EngineError {
    /// A configuration value is outside the range the engine can work with.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        message: String,
    },

    /// A palette entry could not be parsed as a `#RRGGBB` color.
    #[error("invalid color '{value}': expected #RRGGBB")]
    InvalidColor {
        /// The offending palette entry.
        value: String,
    },

    /// The pose producer went away; no further skeletons will arrive.
    #[error("pose feed closed")]
    FeedClosed,
}

impl EngineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
