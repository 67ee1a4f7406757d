//! `text/event-stream` decoding on top of `eventsource-stream`.

use super::error::{ListenerError, ListenerResult};
use super::event::StreamEvent;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};

/// Default limit for a single event block: 1 MiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Decode a byte stream into events.
///
/// Chunk boundaries are irrelevant; an unterminated trailing block is dropped
/// when `body` ends. Transport errors from `body` are passed through as-is.
/// Once the field lines of one event block exceed `max_frame_bytes` the
/// stream yields [`ListenerError::MalformedFrame`].
pub fn event_stream<S, B>(
    body: S,
    max_frame_bytes: usize,
) -> impl Stream<Item = ListenerResult<StreamEvent>>
where
    S: Stream<Item = ListenerResult<B>>,
    B: AsRef<[u8]>,
{
    let mut guard = FrameGuard::new(max_frame_bytes);

    body.map(move |chunk: ListenerResult<B>| -> ListenerResult<B> {
        let chunk = chunk?;
        guard.check(chunk.as_ref())?;
        Ok(chunk)
    })
    .eventsource()
    .map(|item| match item {
        Ok(event) => Ok(StreamEvent::from(event)),
        Err(EventStreamError::Transport(err)) => Err(err),
        Err(other) => Err(ListenerError::MalformedFrame(other.to_string())),
    })
}

/// Byte budget for the event block currently being assembled.
///
/// Counts field-line bytes since the last blank line. Comment lines are
/// free so keep-alives never trip the limit.
#[derive(Debug)]
struct FrameGuard {
    limit: usize,
    pending: usize,
    line_len: usize,
    in_comment: bool,
    after_cr: bool,
}

impl FrameGuard {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            pending: 0,
            line_len: 0,
            in_comment: false,
            after_cr: false,
        }
    }

    fn check(&mut self, chunk: &[u8]) -> ListenerResult<()> {
        for &byte in chunk {
            match byte {
                // second half of a CRLF terminator
                b'\n' if self.after_cr => self.after_cr = false,
                b'\r' | b'\n' => {
                    if self.line_len == 0 {
                        self.pending = 0;
                    }
                    self.line_len = 0;
                    self.in_comment = false;
                    self.after_cr = byte == b'\r';
                }
                _ => {
                    self.after_cr = false;
                    if self.line_len == 0 && byte == b':' {
                        self.in_comment = true;
                    }
                    self.line_len += 1;
                    if !self.in_comment {
                        self.pending += 1;
                    }
                    if self.pending > self.limit {
                        return Err(ListenerError::MalformedFrame(format!(
                            "event block exceeds {} bytes",
                            self.limit
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
