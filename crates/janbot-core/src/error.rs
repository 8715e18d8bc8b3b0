//! Error types for the JanBot core.

use thiserror::Error;

/// Errors that can occur in the core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The todo backend could not be reached (connect failure, timeout).
    #[error("todo backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The todo backend answered with an error status or an `error` body.
    #[error("todo backend error: {0}")]
    BackendError(String),

    /// A display number is not part of the most recent list render.
    #[error("task #{0} is not on the list you are viewing")]
    ResolutionNotFound(u32),

    /// No list has been rendered for this user yet.
    #[error("no task list has been shown yet")]
    StateNotFound,

    /// User input was rejected before any state was touched.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// Summarization API error.
    #[error("summarization error: {0}")]
    Summarization(String),

    /// Web page could not be fetched.
    #[error("page fetch error: {0}")]
    PageFetch(String),

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Maps a transport-level reqwest failure onto the backend error kinds.
    ///
    /// Failures that never produced a response (connect, timeout) count as
    /// unavailability; everything else is a backend error.
    pub(crate) fn from_backend_transport(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            CoreError::BackendUnavailable(e.to_string())
        } else {
            CoreError::BackendError(e.to_string())
        }
    }
}
