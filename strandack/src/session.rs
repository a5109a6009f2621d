//! Per-client frame session.
//!
//! Owns the sequencer, the pending table, the retry scheduler and the
//! injected link of one client instance, and implements its reactions to
//! send ticks, retry expiries, inbound messages and link lifecycle:
//!
//! Disconnected -> Connecting -> Connected -> Disconnected.
//!
//! Every method runs to completion synchronously. The client event loop is
//! the only caller, so there is never concurrent mutation of the table.

use std::fmt;

use tracing::debug;

use crate::error::{Result, StrandAckError};
use crate::event_log::{ClientEvent, EventLog};
use crate::frame::{ClientId, Frame, FrameId, Inbound};
use crate::link::Link;
use crate::pending::{PendingEntry, PendingTable};
use crate::retry::{RetryExpired, RetryPolicy, RetryScheduler};
use crate::sequencer::FrameSequencer;

/// Lifecycle of one client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No link, or the link has closed.
    Disconnected,
    /// Link requested, waiting for it to open.
    Connecting,
    /// Link open; sending and retrying are active.
    Connected,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Disconnected => write!(f, "Disconnected"),
            ClientState::Connecting => write!(f, "Connecting"),
            ClientState::Connected => write!(f, "Connected"),
        }
    }
}

/// What became of a retry expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The frame was resent (or the resend skipped because the link was
    /// down) and its timer re-armed.
    Resent { attempt: u32 },
    /// The attempt cap was reached; the frame was removed.
    GaveUp,
    /// The frame is no longer pending or the timer was superseded.
    Stale,
}

/// Frame session of one client instance.
pub struct FrameSession<L: Link> {
    client_id: Option<ClientId>,
    state: ClientState,
    link: L,
    sequencer: FrameSequencer,
    pending: PendingTable,
    scheduler: RetryScheduler,
    log: EventLog,
}

impl<L: Link> FrameSession<L> {
    /// Create a session around a link that has been asked to open.
    ///
    /// The session starts in `Connecting`; `on_open` moves it to `Connected`.
    pub fn new(
        link: L,
        client_id: Option<ClientId>,
        scheduler: RetryScheduler,
        log: EventLog,
    ) -> Self {
        Self {
            client_id,
            state: ClientState::Connecting,
            link,
            sequencer: FrameSequencer::new(),
            pending: PendingTable::new(),
            scheduler,
            log,
        }
    }

    fn record(&self, event: ClientEvent) {
        self.log.record(self.client_id, &event);
    }

    /// The link reported it is open.
    pub fn on_open(&mut self) -> Result<()> {
        match self.state {
            ClientState::Connecting => {
                self.state = ClientState::Connected;
                self.record(ClientEvent::Connected);
                Ok(())
            }
            _ => Err(StrandAckError::InvalidStateTransition {
                from: self.state.to_string(),
                to: ClientState::Connected.to_string(),
            }),
        }
    }

    /// Produce, submit and register the next frame.
    ///
    /// The frame becomes pending even if the link is not open at this
    /// instant; its retry timer will send it later.
    pub fn send_next(&mut self) -> Result<FrameId> {
        let id = self.sequencer.next();
        let frame = Frame::new(id, self.client_id);
        let raw = frame.encode()?;

        if self.link.is_open() {
            self.link.send(&raw);
            self.record(ClientEvent::Sent { frame_id: id });
        } else {
            self.record(ClientEvent::Dropped { frame_id: id });
        }

        let retry = self.scheduler.arm(id, 0);
        self.pending.insert(PendingEntry::new(frame, retry))?;
        Ok(id)
    }

    /// React to a fired retry timer.
    ///
    /// The expiry is acted on only if the frame is still pending under the
    /// same timer generation; anything else is a timer that lost a race with
    /// an ack, a re-arm or a teardown.
    pub fn on_retry_expired(&mut self, expired: RetryExpired) -> Result<RetryOutcome> {
        let (raw, attempts) = match self.pending.get(expired.frame_id) {
            Some(entry) if entry.retry.generation() == expired.generation => {
                (entry.frame.encode()?, entry.attempts)
            }
            _ => {
                debug!(client = ?self.client_id, frame_id = expired.frame_id, "stale retry timer");
                return Ok(RetryOutcome::Stale);
            }
        };

        if self.scheduler.policy().exhausted(attempts) {
            self.pending.cancel_and_remove(expired.frame_id);
            self.record(ClientEvent::GaveUp {
                frame_id: expired.frame_id,
                attempts,
            });
            return Ok(RetryOutcome::GaveUp);
        }

        let attempt = attempts + 1;
        self.record(ClientEvent::Retry {
            frame_id: expired.frame_id,
            attempt,
        });
        if self.link.is_open() {
            self.link.send(&raw);
        }
        let retry = self.scheduler.arm(expired.frame_id, attempt);
        self.pending.rearm(expired.frame_id, retry);
        Ok(RetryOutcome::Resent { attempt })
    }

    /// Handle one inbound text message.
    ///
    /// Returns `true` if it retired a pending frame. Malformed input,
    /// unknown ids and duplicates are logged and otherwise ignored.
    pub fn on_message(&mut self, raw: &str) -> bool {
        let ack = match Inbound::decode(raw) {
            Ok(Inbound::Ack(ack)) => ack,
            Ok(Inbound::Other(kind)) => {
                debug!(client = ?self.client_id, %kind, "ignoring message");
                return false;
            }
            Err(_) => {
                self.record(ClientEvent::Malformed {
                    raw: raw.to_string(),
                });
                return false;
            }
        };

        if let (Some(addressed), Some(own)) = (ack.client_id, self.client_id) {
            if addressed != own {
                self.record(ClientEvent::MisroutedAck {
                    frame_id: ack.frame_id,
                    client_id: addressed,
                });
                return false;
            }
        }

        if self.pending.cancel_and_remove(ack.frame_id) {
            self.record(ClientEvent::Acked {
                frame_id: ack.frame_id,
            });
            true
        } else {
            self.record(ClientEvent::LateAck {
                frame_id: ack.frame_id,
            });
            false
        }
    }

    /// The link reported an error. Tears the session down.
    pub fn on_error(&mut self, message: &str) -> usize {
        self.record(ClientEvent::Error {
            message: message.to_string(),
        });
        self.teardown()
    }

    /// The link closed. Tears the session down.
    pub fn on_close(&mut self) -> usize {
        self.teardown()
    }

    /// Close the link, cancel every retry timer and empty the table.
    ///
    /// Returns the number of abandoned frames. Idempotent.
    pub fn teardown(&mut self) -> usize {
        if self.state == ClientState::Disconnected {
            return 0;
        }
        self.state = ClientState::Disconnected;
        self.link.close();
        let abandoned = self.pending.drain_all().count();
        self.record(ClientEvent::Disconnected { abandoned });
        abandoned
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.scheduler.policy()
    }

    /// Id the next sent frame will carry.
    pub fn next_frame_id(&self) -> FrameId {
        self.sequencer.peek()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }
}
