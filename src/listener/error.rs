//! Listener error types.

use reqwest::StatusCode;
use std::time::SystemTime;
use thiserror::Error;

/// Listener error type.
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The configured endpoint is not a usable URL
    #[error("invalid stream URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Transport-level failure establishing the stream
    #[error("connection failed: {0}")]
    Connection(#[source] reqwest::Error),

    /// Credential rejected or expired
    #[error("credential rejected with HTTP {status}")]
    Authentication {
        status: StatusCode,
        /// Expiry of the presented token, when it carries one.
        expired_at: Option<SystemTime>,
    },

    /// Non-success status other than an authentication failure
    #[error("remote rejected the stream with HTTP {status}")]
    RemoteRejected { status: StatusCode },

    /// Connection dropped, closed or went idle mid-read
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Unparseable or oversized event block
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Retry budget spent
    #[error("gave up after {attempts} connection attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ListenerError>,
    },

    /// The background task panicked or was aborted
    #[error("listener task ended abnormally: {0}")]
    TaskAborted(String),
}

impl ListenerError {
    /// Whether reconnecting may help.
    ///
    /// Transport failures, interruptions, malformed frames and transient
    /// statuses (5xx, 408, 429) are retried. Credential rejections and other
    /// client errors are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::StreamInterrupted(_) | Self::MalformedFrame(_) => true,
            Self::RemoteRejected { status } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidUrl { .. }
            | Self::Authentication { .. }
            | Self::RetriesExhausted { .. }
            | Self::TaskAborted(_) => false,
        }
    }
}

/// Result type alias using ListenerError.
pub type ListenerResult<T> = Result<T, ListenerError>;
