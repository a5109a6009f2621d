//! Client event loop.
//!
//! Each client instance runs as one tokio task that owns its `FrameSession`
//! and `SendLoop`. The task multiplexes four sources with `tokio::select!`:
//! control commands from the `ClientHandle`, link events, retry expiries and
//! the send tick. Only this task touches the session, so reactions never
//! interleave.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::warn;

use crate::error::{Result, StrandAckError};
use crate::event_log::{ClientEvent, EventLog, DEFAULT_LOG_CAPACITY};
use crate::frame::{ClientId, FrameId};
use crate::link::{Connector, Link, LinkEvent, LinkEventReceiver};
use crate::retry::{RetryExpired, RetryPolicy, RetryScheduler};
use crate::send_loop::SendLoop;
use crate::session::{ClientState, FrameSession};

/// Default peer endpoint.
pub const DEFAULT_URL: &str = "ws://localhost:8080/ws";

/// Configuration for one client instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint handed to the connector.
    pub url: String,
    /// Interval between new frames.
    pub cadence: Duration,
    /// Upper bound of the random delay added to each interval.
    pub jitter: Duration,
    /// Seed for the jitter RNG. `None` seeds randomly.
    pub jitter_seed: Option<u64>,
    /// Extra delay before the first frame once connected.
    pub start_delay: Duration,
    /// Retransmission policy.
    pub retry: RetryPolicy,
    /// Lines retained by the event log.
    pub log_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            cadence: Duration::from_secs(1),
            jitter: Duration::ZERO,
            jitter_seed: None,
            start_delay: Duration::ZERO,
            retry: RetryPolicy::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Point-in-time view of a client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSnapshot {
    pub client_id: Option<ClientId>,
    pub state: ClientState,
    /// Whether the send loop is producing frames.
    pub sending: bool,
    /// Pending frame ids, ascending.
    pub pending: Vec<FrameId>,
    pub next_frame_id: FrameId,
}

enum Command {
    StopSending,
    Snapshot(oneshot::Sender<ClientSnapshot>),
    Teardown(oneshot::Sender<usize>),
}

/// Control handle for a running client instance.
///
/// Dropping the handle tears the instance down and ends its task.
pub struct ClientHandle {
    client_id: Option<ClientId>,
    commands: mpsc::UnboundedSender<Command>,
    log: EventLog,
    task: JoinHandle<()>,
}

impl ClientHandle {
    /// Open a link and start a standalone client. Must be called from within
    /// a tokio runtime.
    pub fn spawn<C: Connector>(connector: &C, config: ClientConfig) -> Self {
        let log = EventLog::with_capacity(config.log_capacity);
        Self::spawn_with(connector, config, None, log)
    }

    /// Open a link and start a client that tags its frames with `client_id`
    /// and records into `log`.
    pub fn spawn_with<C: Connector>(
        connector: &C,
        config: ClientConfig,
        client_id: Option<ClientId>,
        log: EventLog,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        log.record(
            client_id,
            &ClientEvent::Connecting {
                url: config.url.clone(),
            },
        );
        let link = connector.open(&config.url, events_tx);
        let (scheduler, expiries) = RetryScheduler::new(config.retry.clone());
        let session = FrameSession::new(link, client_id, scheduler, log.clone());
        let send_loop = SendLoop::new(config.cadence, config.jitter, config.jitter_seed);

        let task = tokio::spawn(run(
            session,
            send_loop,
            config.start_delay,
            commands_rx,
            events_rx,
            expiries,
        ));

        Self {
            client_id,
            commands: commands_tx,
            log,
            task,
        }
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    /// Event log this client records into.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Stop producing new frames. Pending frames keep retrying.
    pub fn stop_sending(&self) -> Result<()> {
        self.commands
            .send(Command::StopSending)
            .map_err(|_| StrandAckError::ClientStopped)
    }

    pub async fn snapshot(&self) -> Result<ClientSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .map_err(|_| StrandAckError::ClientStopped)?;
        rx.await.map_err(|_| StrandAckError::ClientStopped)
    }

    /// Close the link, stop sending and abandon every pending frame.
    ///
    /// Returns the number of abandoned frames once teardown is complete. The
    /// task keeps answering `snapshot` until the handle is dropped.
    pub async fn teardown(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Teardown(tx))
            .map_err(|_| StrandAckError::ClientStopped)?;
        rx.await.map_err(|_| StrandAckError::ClientStopped)
    }

    /// Tear down and wait for the task to finish.
    pub async fn shutdown(self) -> Result<usize> {
        let abandoned = self.teardown().await?;
        let Self { commands, task, .. } = self;
        drop(commands);
        task.await
            .map_err(|e| StrandAckError::Io(std::io::Error::other(e)))?;
        Ok(abandoned)
    }
}

fn snapshot<L: Link>(session: &FrameSession<L>, send_loop: &SendLoop) -> ClientSnapshot {
    ClientSnapshot {
        client_id: session.client_id(),
        state: session.state(),
        sending: send_loop.is_running(),
        pending: session.pending().ids(),
        next_frame_id: session.next_frame_id(),
    }
}

async fn run<L: Link>(
    mut session: FrameSession<L>,
    mut send_loop: SendLoop,
    start_delay: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: LinkEventReceiver,
    mut expiries: mpsc::UnboundedReceiver<RetryExpired>,
) {
    let client = session.client_id();
    let mut next_tick: Option<Instant> = None;
    let mut events_open = true;

    loop {
        let tick_at = next_tick;
        tokio::select! {
            biased;

            event = events.recv(), if events_open => match event {
                Some(LinkEvent::Opened) => match session.on_open() {
                    Ok(()) => {
                        send_loop.start();
                        next_tick = Some(Instant::now() + start_delay + send_loop.next_delay());
                    }
                    Err(e) => warn!(?client, error = %e, "unexpected open"),
                },
                Some(LinkEvent::Message(raw)) => {
                    session.on_message(&raw);
                }
                Some(LinkEvent::Error(message)) => {
                    send_loop.stop();
                    next_tick = None;
                    session.on_error(&message);
                }
                Some(LinkEvent::Closed) => {
                    send_loop.stop();
                    next_tick = None;
                    session.on_close();
                }
                None => {
                    events_open = false;
                    send_loop.stop();
                    next_tick = None;
                    session.on_close();
                }
            },

            command = commands.recv() => match command {
                Some(Command::StopSending) => {
                    send_loop.stop();
                    next_tick = None;
                }
                Some(Command::Snapshot(reply)) => {
                    let _ = reply.send(snapshot(&session, &send_loop));
                }
                Some(Command::Teardown(reply)) => {
                    send_loop.stop();
                    next_tick = None;
                    let _ = reply.send(session.teardown());
                }
                None => {
                    session.teardown();
                    return;
                }
            },

            Some(expired) = expiries.recv() => {
                if let Err(e) = session.on_retry_expired(expired) {
                    warn!(?client, frame_id = expired.frame_id, error = %e, "retry failed");
                }
            }

            _ = sleep_until(tick_at.unwrap_or_else(Instant::now)), if tick_at.is_some() => {
                if let Err(e) = session.send_next() {
                    warn!(?client, error = %e, "send tick failed");
                }
                if let Some(at) = tick_at {
                    next_tick = Some(at + send_loop.next_delay());
                }
            }
        }
    }
}
