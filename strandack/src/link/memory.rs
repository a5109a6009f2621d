//! In-process loopback link.
//!
//! `MemoryConnector::new` returns the connector together with a
//! `MemoryListener`. Every link the connector opens shows up on the listener
//! as a `MemoryPeer`, which plays the remote side: it observes what the
//! client sent and injects acks, arbitrary text, errors and closes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::frame::{Ack, ClientId, Frame, FrameId};
use crate::link::{Connector, Link, LinkEvent, LinkEventSender};

/// Opens in-memory links.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    /// Report `Opened` as soon as a link is created.
    auto_open: bool,
    accepted: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Create a connector and the listener its peers are delivered on.
    pub fn new(auto_open: bool) -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            auto_open,
            accepted: tx,
        };
        (connector, MemoryListener { incoming: rx })
    }
}

impl Connector for MemoryConnector {
    type Link = MemoryLink;

    fn open(&self, url: &str, events: LinkEventSender) -> MemoryLink {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        let peer = MemoryPeer {
            url: url.to_string(),
            outbound: outbound_rx,
            events: events.clone(),
            open: Arc::clone(&open),
        };
        if self.auto_open {
            peer.open();
        }
        // Nobody listening is fine; the link just never hears back.
        let _ = self.accepted.send(peer);

        MemoryLink {
            outbound: outbound_tx,
            events,
            open,
        }
    }
}

/// Client side of an in-memory link.
#[derive(Debug)]
pub struct MemoryLink {
    outbound: mpsc::UnboundedSender<String>,
    events: LinkEventSender,
    open: Arc<AtomicBool>,
}

impl Link for MemoryLink {
    fn send(&self, raw: &str) {
        if self.open.load(Ordering::Acquire) {
            let _ = self.outbound.send(raw.to_string());
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.events.send(LinkEvent::Closed);
        }
    }
}

/// Receives the peers of links opened by a `MemoryConnector`.
#[derive(Debug)]
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Wait for the next opened link.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.recv().await
    }
}

/// Remote side of an in-memory link.
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    outbound: mpsc::UnboundedReceiver<String>,
    events: LinkEventSender,
    open: Arc<AtomicBool>,
}

impl MemoryPeer {
    /// URL the client asked for.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Complete the connection.
    pub fn open(&self) {
        self.open.store(true, Ordering::Release);
        let _ = self.events.send(LinkEvent::Opened);
    }

    /// Deliver a raw text message to the client.
    pub fn send_text(&self, raw: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Message(raw.into()));
    }

    /// Acknowledge `frame_id`.
    pub fn ack(&self, frame_id: FrameId) {
        if let Ok(raw) = Ack::new(frame_id).encode() {
            self.send_text(raw);
        }
    }

    /// Acknowledge `frame_id` on behalf of a group member.
    pub fn ack_for(&self, frame_id: FrameId, client_id: ClientId) {
        if let Ok(raw) = Ack::for_client(frame_id, client_id).encode() {
            self.send_text(raw);
        }
    }

    /// Report a transport error. The link stops accepting sends.
    pub fn fail(&self, message: impl Into<String>) {
        self.open.store(false, Ordering::Release);
        let _ = self.events.send(LinkEvent::Error(message.into()));
    }

    /// Close the link from the remote side.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        let _ = self.events.send(LinkEvent::Closed);
    }

    /// Next raw message the client sent, waiting if none is buffered.
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Next decoded frame the client sent, skipping undecodable text.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        while let Some(raw) = self.outbound.recv().await {
            if let Ok(frame) = Frame::decode(&raw) {
                return Some(frame);
            }
        }
        None
    }

    /// A buffered message, if any.
    pub fn try_recv(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Every buffered message, decoded. Undecodable text is skipped.
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(raw) = self.outbound.try_recv() {
            if let Ok(frame) = Frame::decode(&raw) {
                frames.push(frame);
            }
        }
        frames
    }
}
