//! Errors raised by table backends.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    /// Transport-level failure talking to the remote service.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered with a non-success status.
    #[error("table service returned {status} ({kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("record {0} not found")]
    NotFound(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid client configuration: {0}")]
    Config(String),

    /// Only produced by the in-memory backend when told to fail.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}
