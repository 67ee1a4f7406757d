//! SSE Sentinel - background event stream listener with a status server.
//!
//! This crate provides the pieces of a small long-running process:
//!
//! - **listener**: Streaming SSE client with bounded reconnection and cancellation
//! - **server**: Status server with a constant root route and listener health
//! - **config**: Configuration management with environment variable support
//! - **bootstrap**: Tracing initialization utilities
//!
//! # Features
//!
//! - `config` - Configuration utilities (enabled by default)
//! - `listener` - Event stream listener (enabled by default)
//! - `server` - Status server (enabled by default)
//! - `bootstrap` - Tracing setup (enabled by default)
//! - `cli` - Command line parsing for the binary (enabled by default)
//! - `full` - All features
//!
//! # Example
//!
//! ```rust,ignore
//! use sse_sentinel::{init_tracing, Config, EventListener, StatusServer, TracingSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_tracing("sse_sentinel=info");
//!     let config = Config::from_env();
//!
//!     let listener = EventListener::new(config.listener.clone(), TracingSink)?.spawn();
//!     StatusServer::new(&config, listener.state())
//!         .serve(async { let _ = tokio::signal::ctrl_c().await; })
//!         .await?;
//!
//!     listener.shutdown().await?;
//!     Ok(())
//! }
//! ```

#[cfg(feature = "config")]
pub mod config;

#[cfg(feature = "listener")]
pub mod listener;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "bootstrap")]
pub mod bootstrap;

// Re-exports for convenience
#[cfg(feature = "config")]
pub use config::{BearerToken, Config, ListenerConfig};

#[cfg(feature = "listener")]
pub use listener::{
    EventListener, EventSink, ListenerError, ListenerHandle, ListenerState, StreamEvent,
    TracingSink,
};

#[cfg(feature = "server")]
pub use server::{ServerError, StatusServer};

#[cfg(feature = "bootstrap")]
pub use bootstrap::init_tracing;
