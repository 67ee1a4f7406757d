//! Background listener for a server-sent-events endpoint.
//!
//! The listener keeps one streaming `GET` open against the configured URL,
//! parses the body as `text/event-stream`, and hands every dispatched event
//! to an [`EventSink`]. Lost connections are retried with bounded
//! exponential backoff; rejected credentials stop the listener for good.

mod backoff;
mod client;
mod decode;
mod error;
mod event;
mod sink;
mod state;

pub use backoff::{Backoff, MIN_RETRY_HINT};
pub use client::{EventListener, ListenerHandle};
pub use decode::{event_stream, DEFAULT_MAX_FRAME_BYTES};
pub use error::{ListenerError, ListenerResult};
pub use event::StreamEvent;
pub use sink::{EventSink, TracingSink};
pub use state::ListenerState;
