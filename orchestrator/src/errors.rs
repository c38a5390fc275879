//! Error types for the hubflow orchestrator

use thiserror::Error;

/// Transport-level failure talking to the hub.
///
/// Structured errors returned *by* the hub are not `HubError`s; each call
/// has its own error enum and the two are kept apart by [`CallError`].
#[derive(Error, Debug)]
pub enum HubError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hub returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for HubError {
    fn from(err: anyhow::Error) -> Self {
        HubError::Internal(err.to_string())
    }
}

/// Failure of a single hub call: either the hub answered with a structured
/// error, or the call never produced an answer at all.
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The hub processed the request and rejected it
    #[error("hub response error: {0}")]
    Response(E),

    /// The request failed below the protocol: timeout, connectivity, decode
    #[error("transport error: {0}")]
    Transport(#[from] HubError),
}

impl<E> CallError<E> {
    /// Structured hub error, if this is one
    pub fn response(&self) -> Option<&E> {
        match self {
            CallError::Response(err) => Some(err),
            CallError::Transport(_) => None,
        }
    }
}

/// Result of a single hub call
pub type CallResult<T, E> = Result<T, CallError<E>>;
