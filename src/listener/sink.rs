//! Destinations for dispatched events.

use super::event::StreamEvent;

/// Receives every event the listener dispatches, in stream order.
pub trait EventSink: Send + Sync {
    /// Consume one event.
    fn deliver(&self, event: StreamEvent);
}

impl<F> EventSink for F
where
    F: Fn(StreamEvent) + Send + Sync,
{
    fn deliver(&self, event: StreamEvent) {
        self(event)
    }
}

/// Writes each event as a structured `info` record under the `sse_event`
/// target, so event output shares the process's single log channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn deliver(&self, event: StreamEvent) {
        tracing::info!(
            target: "sse_event",
            event = event.event_type(),
            id = event.id.as_deref(),
            data = %event.data,
            "received event"
        );
    }
}
