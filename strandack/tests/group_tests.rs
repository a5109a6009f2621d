//! Client group tests: isolation, staggering and collective teardown.

use std::time::Duration;

use strandack::link::memory::{MemoryConnector, MemoryPeer};
use strandack::{ClientConfig, ClientGroup, ClientState, GroupConfig};
use tokio::time::Instant;

fn config(clients: usize) -> GroupConfig {
    GroupConfig {
        clients,
        stagger: Duration::from_millis(500),
        client: ClientConfig {
            url: "mem://group".into(),
            jitter: Duration::from_millis(500),
            jitter_seed: Some(2024),
            ..ClientConfig::default()
        },
    }
}

async fn spawn(clients: usize) -> (ClientGroup, Vec<MemoryPeer>) {
    let (connector, mut listener) = MemoryConnector::new(true);
    let group = ClientGroup::spawn(&connector, config(clients));
    let mut peers = Vec::new();
    for _ in 0..clients {
        peers.push(listener.accept().await.unwrap());
    }
    (group, peers)
}

#[tokio::test(start_paused = true)]
async fn ack_for_one_member_leaves_other_pending() {
    let (group, mut peers) = spawn(2).await;

    let f0 = peers[0].recv_frame().await.unwrap();
    let f1 = peers[1].recv_frame().await.unwrap();
    for member in group.members() {
        member.stop_sending().unwrap();
    }
    assert_eq!(f0.id, 1);
    assert_eq!(f1.id, 1);

    peers[0].ack_for(1, 0);

    let snaps = group.snapshots().await.unwrap();
    assert!(snaps[0].pending.is_empty());
    assert_eq!(snaps[1].pending, vec![1]);

    // Member 1 keeps retrying its own frame 1.
    let retried = peers[1].recv_frame().await.unwrap();
    assert_eq!((retried.client_id, retried.id), (Some(1), 1));
    assert!(peers[0].try_recv().is_none());
    group.teardown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn ack_addressed_to_another_member_is_ignored() {
    let (group, mut peers) = spawn(2).await;
    peers[0].recv_frame().await.unwrap();
    peers[1].recv_frame().await.unwrap();
    for member in group.members() {
        member.stop_sending().unwrap();
    }

    // Member 1's ack delivered on member 0's link.
    peers[0].ack_for(1, 1);

    let snaps = group.snapshots().await.unwrap();
    assert_eq!(snaps[0].pending, vec![1]);
    assert_eq!(snaps[1].pending, vec![1]);
    assert!(group.log().contains("[client 0] ignored ack for frame 1 of client 1"));
}

#[tokio::test(start_paused = true)]
async fn members_start_staggered() {
    let (group, mut peers) = spawn(3).await;
    let start = Instant::now();

    let mut first_at = Vec::new();
    for peer in peers.iter_mut() {
        peer.recv_frame().await.unwrap();
        first_at.push(start.elapsed());
    }

    // Cadence 1s, jitter up to 0.5s, stagger 0.5s per index.
    for (index, at) in first_at.iter().enumerate() {
        let earliest = Duration::from_secs(1) + Duration::from_millis(500) * index as u32;
        let latest = earliest + Duration::from_millis(500);
        assert!(*at >= earliest && *at <= latest + Duration::from_millis(1), "member {index} at {at:?}");
    }
    group.teardown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn member_failure_does_not_affect_others() {
    let (group, mut peers) = spawn(2).await;
    peers[0].recv_frame().await.unwrap();
    peers[1].recv_frame().await.unwrap();

    peers[0].fail("connection reset");
    tokio::time::sleep(Duration::from_millis(10)).await;

    let snaps = group.snapshots().await.unwrap();
    assert_eq!(snaps[0].state, ClientState::Disconnected);
    assert!(snaps[0].pending.is_empty());
    assert_eq!(snaps[1].state, ClientState::Connected);
    assert!(snaps[1].sending);

    // Member 1 keeps producing frames.
    assert!(peers[1].recv_frame().await.is_some());
    group.teardown_all().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn teardown_all_is_exhaustive() {
    let (group, mut peers) = spawn(3).await;
    for peer in peers.iter_mut() {
        peer.recv_frame().await.unwrap();
    }

    let abandoned = group.teardown_all().await.unwrap();
    assert!(abandoned >= 3);

    tokio::time::sleep(Duration::from_secs(20)).await;
    for peer in peers.iter_mut() {
        assert!(!peer.is_open());
        peer.drain_frames();
        assert!(peer.try_recv().is_none());
    }
    for snap in group.snapshots().await.unwrap() {
        assert_eq!(snap.state, ClientState::Disconnected);
        assert!(snap.pending.is_empty());
        assert!(!snap.sending);
    }
}
