//! A single dispatched server-sent event.

use std::time::Duration;

/// Event received over the stream.
///
/// Built by [`event_stream`](super::event_stream) when a blank line closes an
/// event block, handed to the sink, then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEvent {
    /// `event:` label, if the block carried one.
    pub event: Option<String>,
    /// Accumulated `data:` lines joined with `\n`.
    pub data: String,
    /// Last event id in effect when the event was dispatched.
    pub id: Option<String>,
    /// Reconnection delay requested by the remote in this block.
    pub retry: Option<Duration>,
}

impl StreamEvent {
    /// Event with only a data payload.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Event type, `message` when no label was sent.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

impl From<eventsource_stream::Event> for StreamEvent {
    fn from(event: eventsource_stream::Event) -> Self {
        let labelled = !event.event.is_empty() && event.event != "message";
        Self {
            event: labelled.then_some(event.event),
            data: event.data,
            id: (!event.id.is_empty()).then_some(event.id),
            retry: event.retry,
        }
    }
}
