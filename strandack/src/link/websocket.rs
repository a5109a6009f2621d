//! WebSocket link using tokio-tungstenite.
//!
//! Each link runs one background task that owns the socket. Outbound text is
//! handed to the task over a channel so `Link::send` stays synchronous and
//! never blocks the client event loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::link::{Connector, Link, LinkEvent, LinkEventSender};

/// Opens WebSocket links, e.g. to `ws://localhost:8080/ws`.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    type Link = WebSocketLink;

    fn open(&self, url: &str, events: LinkEventSender) -> WebSocketLink {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        tokio::spawn(run_socket(
            url.to_string(),
            events,
            commands_rx,
            Arc::clone(&open),
        ));
        WebSocketLink {
            commands: commands_tx,
            open,
        }
    }
}

enum Command {
    Send(String),
    Close,
}

/// Client side of a WebSocket link.
#[derive(Debug)]
pub struct WebSocketLink {
    commands: mpsc::UnboundedSender<Command>,
    open: Arc<AtomicBool>,
}

impl Link for WebSocketLink {
    fn send(&self, raw: &str) {
        if self.open.load(Ordering::Acquire) {
            let _ = self.commands.send(Command::Send(raw.to_string()));
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

async fn run_socket(
    url: String,
    events: LinkEventSender,
    mut commands: mpsc::UnboundedReceiver<Command>,
    open: Arc<AtomicBool>,
) {
    let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!(%url, error = %e, "websocket connect failed");
            let _ = events.send(LinkEvent::Error(e.to_string()));
            let _ = events.send(LinkEvent::Closed);
            return;
        }
    };
    let (mut sink, mut stream) = ws.split();

    open.store(true, Ordering::Release);
    let _ = events.send(LinkEvent::Opened);
    debug!(%url, "websocket open");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        let _ = events.send(LinkEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    open.store(false, Ordering::Release);
                    let _ = sink.close().await;
                    break;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(LinkEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong are answered by tungstenite; binary is not part of
                // the protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(LinkEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }

    open.store(false, Ordering::Release);
    let _ = events.send(LinkEvent::Closed);
    debug!(%url, "websocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_peer_reports_error_then_closed() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        // Port 9 (discard) on localhost is not expected to speak WebSocket.
        let link = WebSocketConnector::new().open("ws://127.0.0.1:9/ws", events_tx);
        assert!(!link.is_open());

        assert!(matches!(events_rx.recv().await, Some(LinkEvent::Error(_))));
        assert_eq!(events_rx.recv().await, Some(LinkEvent::Closed));
        assert!(!link.is_open());
    }

    #[tokio::test]
    async fn invalid_url_reports_error() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let _link = WebSocketConnector::new().open("not a url", events_tx);
        assert!(matches!(events_rx.recv().await, Some(LinkEvent::Error(_))));
    }
}
