//! Error types for chatify-core

use thiserror::Error;

use crate::device::Capability;

/// Result type alias using chatify-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in chatify-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The user denied a platform capability
    #[error("Permission denied for {0}")]
    PermissionDenied(Capability),

    /// Remote log transport or permission failure
    #[error("Network error: {0}")]
    Network(String),

    /// Blob upload failed before a message could be built
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Local cache read/write failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Audio capture failure
    #[error("Recording failed: {0}")]
    Recording(String),

    /// A recording session is already live
    #[error("A recording is already in progress")]
    RecordingActive,

    /// Composing is disabled while the conversation is served from cache
    #[error("Messages cannot be sent while offline")]
    Offline,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Media/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Text to show the user for failures that surface as alerts.
    ///
    /// Returns `None` for failures that are only logged.
    pub fn user_alert(&self) -> Option<String> {
        match self {
            Self::PermissionDenied(capability) => {
                Some(format!("Permissions not granted for {capability}."))
            }
            Self::Upload(_) | Self::Storage(_) => Some("Error uploading attachment.".to_string()),
            Self::Recording(_) => Some("Failed to record!".to_string()),
            Self::RecordingActive => Some("You are already recording.".to_string()),
            Self::Offline => {
                Some("You are offline. Messages can be sent once you reconnect.".to_string())
            }
            _ => None,
        }
    }
}
