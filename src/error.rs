//! Error types for the transcription gateway.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AsrError {
    /// A recognition collaborator raised or returned an abnormal result.
    #[error("{collaborator} call failed: {message}")]
    CollaboratorFailure {
        collaborator: String,
        message: String,
    },

    /// The resource guard refused a chunk of audio.
    #[error("Insufficient accelerator memory for {bytes} bytes of audio")]
    ResourceExhausted { bytes: usize },

    /// Malformed control frame or unrecognized value.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The peer went away while we were sending.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Client-side problem with an uploaded file.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AsrError {
    pub fn collaborator(collaborator: &str, message: impl ToString) -> Self {
        Self::CollaboratorFailure {
            collaborator: collaborator.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AsrError>;
