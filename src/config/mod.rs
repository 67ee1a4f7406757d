//! Configuration management with environment variable support.

mod base;
mod token;

pub use base::{Config, ListenerConfig, DEFAULT_STATUS_BODY, DEFAULT_STREAM_URL};
pub use token::{unix_seconds, BearerToken};
