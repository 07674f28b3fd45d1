//! Common error types for drivepicker.

use thiserror::Error;

/// Generic message used when a transfer fails without telling us why.
pub const DEFAULT_DOWNLOAD_FAILURE: &str = "Failed to download file";

/// Sign-in and token failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The user aborted the interactive sign-in flow.
    #[error("Sign-in cancelled")]
    Cancelled,

    /// Another sign-in is already running.
    #[error("Sign-in already in progress")]
    InProgress,

    /// The platform sign-in backend is unreachable or outdated.
    #[error("Sign-in service unavailable")]
    ServiceUnavailable,

    /// No session exists, or its token can no longer be retrieved.
    #[error("Not signed in")]
    NotSignedIn,

    /// Any other provider failure, with the provider's message.
    #[error("Authentication failed: {0}")]
    Unknown(String),
}

/// Listing request failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ListError {
    /// The API answered with a non-success status.
    ///
    /// `payload` is the parsed error body, left untouched so callers can
    /// inspect the upstream `error.code` / `error.message` shape.
    #[error("Drive API error ({status}): {payload}")]
    Http {
        status: u16,
        payload: serde_json::Value,
    },

    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Transport(String),

    /// A success response whose body could not be decoded.
    #[error("Invalid listing response: {0}")]
    Decode(String),
}

/// Content download failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("Download failed: {0}")]
    TransferFailed(String),
}

impl DownloadError {
    /// Build a transfer failure, substituting the generic message when the
    /// underlying failure carried none.
    pub fn transfer_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            Self::TransferFailed(DEFAULT_DOWNLOAD_FAILURE.to_string())
        } else {
            Self::TransferFailed(message)
        }
    }
}

/// Top-level error type for drivepicker operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    List(#[from] ListError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or is incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
