//! Error types for snapshot sharing.

use thiserror::Error;

pub type ShareResult<T> = Result<T, ShareError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ShareError {
    /// The composed frame could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] image::ImageError),

    /// The snapshot payload could not be serialized.
    #[error("failed to serialize snapshot payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The viewer behind a sink has gone away.
    #[error("viewer {viewer} is closed")]
    SinkClosed {
        /// Id of the closed viewer.
        viewer: String,
    },

    /// The peer transport rejected a send.
    #[error("transport error: {message}")]
    Transport {
        /// Description from the transport layer.
        message: String,
    },

    /// A share link did not carry a peer id.
    #[error("no peer id in '{url}'")]
    MissingPeerId {
        /// The link that was inspected.
        url: String,
    },
}

impl ShareError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether the sink that produced this error should be dropped.
    pub fn is_closed(&self) -> bool {
        matches!(self, ShareError::SinkClosed { .. })
    }
}
