//! Status server answering a single informational route.
//!
//! Exists so the process has a foreground liveness signal while the
//! listener runs in the background. Listener health is exposed separately on
//! `/health`.

mod status;

pub use status::{router, serve_on, StatusServer};

use thiserror::Error;

/// Status server error type.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Serving failed after binding
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Result type alias using ServerError.
pub type ServerResult<T> = Result<T, ServerError>;
