//! Error types for dispatch calls.

use thiserror::Error;

/// Errors from the external collaborators.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A required key or address was never configured. Fatal for the
    /// affected call path.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// Transport-level failure (connect, timeout, malformed body).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The collaborator answered with a non-success status.
    #[error("{service} request failed ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },
}
