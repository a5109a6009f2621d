//! Observability sink: a bounded, most-recent-first list of event lines.
//!
//! Each recorded event is also emitted through `tracing`, so hosts without a
//! presentation layer still see them in their subscriber.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::frame::{ClientId, FrameId};

/// Default number of retained lines.
pub const DEFAULT_LOG_CAPACITY: usize = 51;

/// Something worth telling an operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connecting { url: String },
    Connected,
    Sent { frame_id: FrameId },
    /// A send was skipped because the link was not open.
    Dropped { frame_id: FrameId },
    Retry { frame_id: FrameId, attempt: u32 },
    Acked { frame_id: FrameId },
    /// Ack for a frame that is not pending (duplicate, late or unknown).
    LateAck { frame_id: FrameId },
    /// Ack addressed to another client instance.
    MisroutedAck { frame_id: FrameId, client_id: ClientId },
    GaveUp { frame_id: FrameId, attempts: u32 },
    Malformed { raw: String },
    Error { message: String },
    Disconnected { abandoned: usize },
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEvent::Connecting { url } => write!(f, "connecting to {url}"),
            ClientEvent::Connected => write!(f, "connected"),
            ClientEvent::Sent { frame_id } => write!(f, "sent frame {frame_id}"),
            ClientEvent::Dropped { frame_id } => {
                write!(f, "link not open, frame {frame_id} not sent")
            }
            ClientEvent::Retry { frame_id, attempt } => {
                write!(f, "retry frame {frame_id} (attempt {attempt})")
            }
            ClientEvent::Acked { frame_id } => write!(f, "ack received for frame {frame_id}"),
            ClientEvent::LateAck { frame_id } => {
                write!(f, "ack for unknown or already acked frame {frame_id}")
            }
            ClientEvent::MisroutedAck {
                frame_id,
                client_id,
            } => write!(f, "ignored ack for frame {frame_id} of client {client_id}"),
            ClientEvent::GaveUp { frame_id, attempts } => {
                write!(f, "gave up on frame {frame_id} after {attempts} retries")
            }
            ClientEvent::Malformed { raw } => write!(f, "invalid message: {raw}"),
            ClientEvent::Error { message } => write!(f, "connection error: {message}"),
            ClientEvent::Disconnected { abandoned } => {
                write!(f, "disconnected, {abandoned} pending frames abandoned")
            }
        }
    }
}

/// Shared handle to a bounded event list. Cloning shares the same list.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Record an event, tagging it with the client index when in a group.
    pub fn record(&self, client: Option<ClientId>, event: &ClientEvent) {
        trace_event(client, event);

        let line = match client {
            Some(id) => format!("[client {id}] {event}"),
            None => event.to_string(),
        };
        let mut lines = self.inner.lock();
        lines.push_front(line);
        lines.truncate(self.capacity);
    }

    /// Retained lines, newest first.
    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether any retained line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.inner.lock().iter().any(|line| line.contains(needle))
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

fn trace_event(client: Option<ClientId>, event: &ClientEvent) {
    match event {
        ClientEvent::Connecting { .. }
        | ClientEvent::Connected
        | ClientEvent::Disconnected { .. } => info!(?client, "{event}"),
        ClientEvent::Sent { frame_id }
        | ClientEvent::Acked { frame_id }
        | ClientEvent::LateAck { frame_id } => debug!(?client, frame_id, "{event}"),
        ClientEvent::Retry { frame_id, attempt } => warn!(?client, frame_id, attempt, "{event}"),
        _ => warn!(?client, "{event}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first() {
        let log = EventLog::new();
        log.record(None, &ClientEvent::Connected);
        log.record(None, &ClientEvent::Sent { frame_id: 1 });
        assert_eq!(log.lines(), vec!["sent frame 1", "connected"]);
    }

    #[test]
    fn bounded_to_capacity() {
        let log = EventLog::new();
        for frame_id in 0..200 {
            log.record(None, &ClientEvent::Sent { frame_id });
        }
        assert_eq!(log.len(), DEFAULT_LOG_CAPACITY);
        assert_eq!(log.lines()[0], "sent frame 199");
    }

    #[test]
    fn group_lines_are_tagged() {
        let log = EventLog::with_capacity(4);
        log.record(Some(2), &ClientEvent::Acked { frame_id: 9 });
        assert_eq!(log.lines(), vec!["[client 2] ack received for frame 9"]);
    }

    #[test]
    fn clones_share_storage() {
        let log = EventLog::new();
        let other = log.clone();
        other.record(None, &ClientEvent::Connected);
        assert!(log.contains("connected"));
    }
}
