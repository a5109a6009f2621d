//! Group of independent client instances.
//!
//! Each member opens its own link and owns its own sequencer, pending table
//! and timers. Members share nothing but the connector and the event log.
//! Member `i` tags its frames with `clientId = i` and starts sending
//! `i * stagger` after it connects.

use std::time::Duration;

use crate::client::{ClientConfig, ClientHandle, ClientSnapshot};
use crate::error::Result;
use crate::event_log::EventLog;
use crate::frame::ClientId;
use crate::link::Connector;

/// Default number of members.
const DEFAULT_CLIENTS: usize = 3;
/// Default start offset between consecutive members.
const DEFAULT_STAGGER: Duration = Duration::from_millis(500);
/// Default per-member send jitter.
const DEFAULT_GROUP_JITTER: Duration = Duration::from_millis(500);

/// Configuration for a client group.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Number of members.
    pub clients: usize,
    /// Start offset between consecutive members.
    pub stagger: Duration,
    /// Template for every member. `start_delay` is overridden per member and
    /// `jitter_seed`, when set, is offset by the member index.
    pub client: ClientConfig,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            clients: DEFAULT_CLIENTS,
            stagger: DEFAULT_STAGGER,
            client: ClientConfig {
                jitter: DEFAULT_GROUP_JITTER,
                ..ClientConfig::default()
            },
        }
    }
}

/// A set of isolated client instances managed together.
pub struct ClientGroup {
    members: Vec<ClientHandle>,
    log: EventLog,
}

impl ClientGroup {
    /// Open one link per member and start them. Must be called from within a
    /// tokio runtime.
    pub fn spawn<C: Connector>(connector: &C, config: GroupConfig) -> Self {
        let log = EventLog::with_capacity(config.client.log_capacity);
        let members = (0..config.clients)
            .map(|index| {
                let client_id = index as ClientId;
                let member = ClientConfig {
                    start_delay: config.stagger * client_id,
                    jitter_seed: config
                        .client
                        .jitter_seed
                        .map(|seed| seed.wrapping_add(index as u64)),
                    ..config.client.clone()
                };
                ClientHandle::spawn_with(connector, member, Some(client_id), log.clone())
            })
            .collect();
        Self { members, log }
    }

    pub fn member(&self, index: usize) -> Option<&ClientHandle> {
        self.members.get(index)
    }

    pub fn members(&self) -> &[ClientHandle] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Event log shared by all members.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub async fn snapshots(&self) -> Result<Vec<ClientSnapshot>> {
        let mut snapshots = Vec::with_capacity(self.members.len());
        for member in &self.members {
            snapshots.push(member.snapshot().await?);
        }
        Ok(snapshots)
    }

    /// Close every link and drain every pending table.
    ///
    /// Every member is torn down even if an earlier one fails; the first
    /// failure is returned. On success, returns the total number of
    /// abandoned frames.
    pub async fn teardown_all(&self) -> Result<usize> {
        let mut abandoned = 0;
        let mut first_err = None;
        for member in &self.members {
            match member.teardown().await {
                Ok(count) => abandoned += count,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(abandoned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::memory::MemoryConnector;
    use crate::session::ClientState;

    fn config(clients: usize) -> GroupConfig {
        GroupConfig {
            clients,
            client: ClientConfig {
                url: "mem://group".into(),
                jitter_seed: Some(11),
                ..GroupConfig::default().client
            },
            ..GroupConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spawns_one_link_per_member() {
        let (connector, mut listener) = MemoryConnector::new(true);
        let group = ClientGroup::spawn(&connector, config(3));
        assert_eq!(group.len(), 3);
        for _ in 0..3 {
            let peer = listener.accept().await.unwrap();
            assert_eq!(peer.url(), "mem://group");
        }
        group.teardown_all().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn members_tag_frames_with_index() {
        let (connector, mut listener) = MemoryConnector::new(true);
        let group = ClientGroup::spawn(&connector, config(2));
        let mut p0 = listener.accept().await.unwrap();
        let mut p1 = listener.accept().await.unwrap();

        let f0 = p0.recv_frame().await.unwrap();
        let f1 = p1.recv_frame().await.unwrap();
        assert_eq!((f0.client_id, f0.id), (Some(0), 1));
        assert_eq!((f1.client_id, f1.id), (Some(1), 1));
        group.teardown_all().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_all_empties_every_member() {
        let (connector, mut listener) = MemoryConnector::new(true);
        let group = ClientGroup::spawn(&connector, config(2));
        let mut p0 = listener.accept().await.unwrap();
        let mut p1 = listener.accept().await.unwrap();
        p0.recv_frame().await.unwrap();
        p1.recv_frame().await.unwrap();

        let abandoned = group.teardown_all().await.unwrap();
        assert!(abandoned >= 2);
        for snap in group.snapshots().await.unwrap() {
            assert_eq!(snap.state, ClientState::Disconnected);
            assert!(snap.pending.is_empty());
        }
    }
}
