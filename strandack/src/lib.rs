//! StrandAck -- at-least-once frame delivery over a duplex link.
//!
//! A client produces frames on a fixed (optionally jittered) cadence, keeps
//! every unacknowledged frame in a pending table with its own retransmission
//! timer, resends it verbatim whenever the timer fires and retires it when
//! the peer acknowledges it.
//!
//! - **Session**: per-client state machine owning sequencer, pending table,
//!   retry scheduler and link
//! - **Client**: one tokio task per instance driving its session
//! - **Group**: N isolated clients with staggered starts
//! - **Link**: pluggable connection adapter (in-memory, WebSocket)

pub mod client;
pub mod error;
pub mod event_log;
pub mod frame;
pub mod group;
pub mod link;
pub mod pending;
pub mod retry;
pub mod send_loop;
pub mod sequencer;
pub mod session;

// Re-export key public types at crate root.
pub use client::{ClientConfig, ClientHandle, ClientSnapshot};
pub use error::{Result, StrandAckError};
pub use event_log::{ClientEvent, EventLog};
pub use frame::{Ack, ClientId, Frame, FrameId, Inbound};
pub use group::{ClientGroup, GroupConfig};
pub use link::{Connector, Link, LinkEvent};
pub use pending::{PendingEntry, PendingTable};
pub use retry::{RetryHandle, RetryPolicy, RetryScheduler};
pub use send_loop::SendLoop;
pub use sequencer::FrameSequencer;
pub use session::{ClientState, FrameSession, RetryOutcome};
