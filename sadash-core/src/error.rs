//! Error types for sadash-core

use thiserror::Error;

/// Main error type for the sadash-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level HTTP failure (connection, timeout, TLS)
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status returned by the index or queue service
    #[error("API error ({status}) from {url}: {body}")]
    Api {
        status: u16,
        url: String,
        body: String,
    },

    /// One or more report downloads of a statistics batch failed
    #[error("report batch {step} failed ({failed} of {size} reports): {source}")]
    ReportBatch {
        step: usize,
        failed: usize,
        size: usize,
        #[source]
        source: Box<Error>,
    },

    /// Payload did not match the expected schema
    #[error("parse error in {what}: {message}")]
    Parse { what: String, message: String },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Preference storage error
    #[error("preferences error: {0}")]
    Preferences(String),

    /// Unknown channel name
    #[error("unknown channel: {0}")]
    InvalidChannel(String),
}

impl Error {
    /// True for failures a later attempt may not hit (network, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http { source, .. } => source.is_timeout() || source.is_connect(),
            Error::Api { status, .. } => *status >= 500,
            Error::ReportBatch { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for sadash-core
pub type Result<T> = std::result::Result<T, Error>;
