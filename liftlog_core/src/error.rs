//! Error types for the liftlog_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for liftlog_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sign-in failed or produced an unusable identity
    #[error("Identity error: {0}")]
    Identity(String),

    /// Document store read/write error
    #[error("Store error: {0}")]
    Store(String),

    /// Session operation addressed something that does not exist
    #[error("Session error: {0}")]
    Session(String),

    /// The completion endpoint answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The completion endpoint could not be reached
    #[error("Transport error: {0}")]
    Transport(String),

    /// Every completion attempt failed
    #[error("Completion failed after {attempts} attempts: {last}")]
    CompletionFailed { attempts: u32, last: String },

    /// Model output could not be decoded into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the completion client should retry after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http { .. } | Error::Transport(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
