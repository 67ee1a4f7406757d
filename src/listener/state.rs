//! Listener lifecycle states.

use serde::Serialize;

/// Where the listener is in its connection lifecycle.
///
/// Transitions: `Connecting` → `Streaming` on a successful response;
/// any retryable failure → `Retrying` while budget remains, else `Failed`;
/// credential rejection → `Failed` immediately; cancellation → `Stopped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ListenerState {
    /// Request in flight; `attempt` counts from 1 since the last reset.
    Connecting { attempt: u32 },
    /// Response accepted, reading events.
    Streaming,
    /// Waiting `delay_ms` before retry number `attempt`.
    Retrying { attempt: u32, delay_ms: u64 },
    /// Gave up; `reason` is the terminal error's message.
    Failed { reason: String },
    /// Cancelled through the handle.
    Stopped,
}

impl ListenerState {
    /// Whether the listener will never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Stopped)
    }
}
