//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Storage-related errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open database '{path}': {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Schema setup failed: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Platform API errors (Telegram and MAX transport).
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Attachment still processing after {attempts} attempts")]
    AttachmentNotReady { attempts: u32 },

    #[error("Upload failed: {message}")]
    Upload { message: String },

    #[error("Unexpected response shape: {message}")]
    BadResponse { message: String },

    #[error("Shutting down")]
    Cancelled,
}

impl PlatformError {
    /// True when the MAX API rejected a send because the attachment is
    /// still being transcoded server-side. Only this error is retried.
    pub fn is_attachment_not_ready(&self) -> bool {
        matches!(self, PlatformError::Api { status: 400, body } if body.contains("attachment.not.ready"))
    }
}

/// Result type alias for platform operations.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
