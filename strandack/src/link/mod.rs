//! Connection adapter traits.
//!
//! A `Connector` opens a `Link` to a URL and reports the link's lifecycle and
//! inbound traffic as `LinkEvent`s on a channel supplied by the caller. The
//! client core only ever talks to the peer through these two traits, so a
//! different transport can be plugged in without touching the retry logic.
//!
//! - `memory`: in-process loopback, the far end is driven by the caller
//! - `websocket`: text frames over a WebSocket connection

pub mod memory;
pub mod websocket;

use tokio::sync::mpsc;

/// Lifecycle and inbound traffic of one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link is ready to send.
    Opened,
    /// An inbound text message.
    Message(String),
    /// The transport reported an error.
    Error(String),
    /// The link is closed; no further events follow.
    Closed,
}

/// Sender half handed to a connector for reporting `LinkEvent`s.
pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;

/// Receiver half the client event loop consumes.
pub type LinkEventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// The sending side of an open (or opening) duplex connection.
pub trait Link: Send {
    /// Send a text message. Silently does nothing if the link is not open.
    fn send(&self, raw: &str);
    /// Whether the link is currently able to send.
    fn is_open(&self) -> bool;
    /// Start a graceful shutdown. Idempotent.
    fn close(&self);
}

/// Opens links. One connector may open many independent links.
pub trait Connector: Send + Sync + 'static {
    type Link: Link + 'static;

    /// Begin opening a link to `url`. Lifecycle and inbound messages are
    /// reported on `events`; `LinkEvent::Opened` marks readiness.
    fn open(&self, url: &str, events: LinkEventSender) -> Self::Link;
}
