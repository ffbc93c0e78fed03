//! End-to-end: a fraud proof broadcast by one node halts another, and the
//! halted node refuses to restart.

mod common;

use common::{
    faulty_proof, false_proof, local_config, memory_store, registry, start_tcp_node, trusted_addr, wait_topic_peer,
    MemoryNetwork, Syncer,
};
use fraud_core::ProofKind;
use fraud_p2p::{
    FileStore, FraudConfig, FraudP2pError, GossipTransport, Ingested, ProofStore, SyncState, ValidationOutcome,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const KIND: ProofKind = ProofKind::BadEncoding;

#[tokio::test]
async fn test_broadcast_halts_peer_and_blocks_restart() {
    let net = MemoryNetwork::new();
    let dir = tempfile::tempdir().unwrap();

    let a = net.add_node(memory_store());
    let store_b: Arc<dyn ProofStore> = Arc::new(FileStore::open(dir.path(), registry()).unwrap());
    let b = net.add_node(store_b);

    assert_eq!(a.service.start_with_peers(&[]).await.unwrap().state, SyncState::Ready);
    assert_eq!(b.service.start_with_peers(&[a.id]).await.unwrap().state, SyncState::Ready);

    let mut sub = b.service.subscribe(KIND).unwrap();
    let syncer = Syncer::spawn(&b.service);
    syncer.advance(3).await;

    assert_eq!(a.service.broadcast(faulty_proof(20)).await.unwrap(), Ingested::Accepted);

    // B receives the proof and sees the accused height.
    let received = tokio::time::timeout(Duration::from_secs(1), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.height(), 20);
    assert_eq!(net.delivered(), vec![(b.id, ValidationOutcome::Accept)]);

    // B's syncer stops and makes no further progress.
    assert!(syncer.wait_stopped().await);
    let stopped_at = syncer.height();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(syncer.height(), stopped_at);
    assert_eq!(b.service.guard().halt_notice(KIND).unwrap().height, 20);

    // Restart B on the same store.
    net.remove(&b.id);
    drop(b);
    let reopened: Arc<dyn ProofStore> = Arc::new(FileStore::open(dir.path(), registry()).unwrap());
    let b2 = net.add_node(reopened);

    let err = b2.service.start_with_peers(&[a.id]).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, FraudP2pError::AlreadyProven { kind: KIND, height: 20, .. }));

    let proofs = b2.service.get(KIND).unwrap();
    assert_eq!(proofs.len(), 1);
    assert_eq!(proofs[0].height(), 20);
    assert_eq!(proofs[0].digest(), faulty_proof(20).digest());
}

#[tokio::test]
async fn test_subscribers_each_receive_one_copy() {
    let net = MemoryNetwork::new();
    let a = net.add_node(memory_store());
    let b = net.add_node(memory_store());

    let mut first = b.service.subscribe(KIND).unwrap();
    let mut second = b.service.subscribe(KIND).unwrap();

    a.service.broadcast(faulty_proof(20)).await.unwrap();
    // Same proof again: stored already, not re-published, not re-delivered.
    assert_eq!(a.service.broadcast(faulty_proof(20)).await.unwrap(), Ingested::AlreadyPresent);
    a.service.broadcast(faulty_proof(21)).await.unwrap();

    for sub in [&mut first, &mut second] {
        assert_eq!(sub.next().await.unwrap().height(), 20);
        assert_eq!(sub.next().await.unwrap().height(), 21);
        assert!(tokio::time::timeout(Duration::from_millis(20), sub.next()).await.is_err());
    }
}

#[tokio::test]
async fn test_halt_fires_once() {
    let net = MemoryNetwork::new();
    let a = net.add_node(memory_store());
    let b = net.add_node(memory_store());
    b.service.start_with_peers(&[]).await.unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    b.service
        .on_halt(KIND, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    a.service.broadcast(faulty_proof(20)).await.unwrap();
    a.service.broadcast(faulty_proof(21)).await.unwrap();

    let notice = tokio::time::timeout(Duration::from_secs(1), b.service.guard().wait_halted(KIND))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice.height, 20);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_false_proof_never_propagates() {
    let net = MemoryNetwork::new();
    let a = net.add_node(memory_store());
    let b = net.add_node(memory_store());

    // Rejected at the source: nothing is stored or published.
    assert!(a.service.broadcast(false_proof(20)).await.is_err());
    assert!(net.delivered().is_empty());

    // Injected straight onto B's wire: rejected, and again from the cache.
    let topic = KIND.topic();
    let data = false_proof(20).encode();
    assert_eq!(b.service.on_gossip(&topic, &data).await, ValidationOutcome::Reject);
    assert_eq!(b.service.on_gossip(&topic, &data).await, ValidationOutcome::Reject);
    assert_eq!(b.service.on_gossip(&topic, &[0xde, 0xad]).await, ValidationOutcome::Reject);
    assert_eq!(b.service.on_gossip("/fraud/other/v0", &data).await, ValidationOutcome::Reject);

    assert!(b.service.get(KIND).unwrap().is_empty());
    assert!(!b.service.guard().is_halted(KIND));
}

#[tokio::test]
async fn test_unknown_height_is_ignored_not_rejected() {
    let net = MemoryNetwork::new();
    let b = net.add_node(memory_store());

    // No header past the local head; the proof may become checkable later.
    let data = faulty_proof(common::HEAD + 100).encode();
    assert_eq!(b.service.on_gossip(&KIND.topic(), &data).await, ValidationOutcome::Ignore);
    assert!(b.service.get(KIND).unwrap().is_empty());
}

#[tokio::test]
async fn test_gossip_over_tcp_relays_only_valid_proofs() {
    common::init_tracing();
    let topic = KIND.topic();

    // A and C only know B, so anything C hears from A went through B.
    let (b, handle_b) = start_tcp_node(&local_config(), memory_store()).await;
    let config = FraudConfig {
        trusted_peers: vec![trusted_addr(&handle_b).await],
        ..local_config()
    };
    let (a, handle_a) = start_tcp_node(&config, memory_store()).await;
    let (c, handle_c) = start_tcp_node(&config, memory_store()).await;

    let (a_id, b_id, c_id) = (handle_a.local_peer_id(), handle_b.local_peer_id(), handle_c.local_peer_id());
    wait_topic_peer(&handle_a, &topic, b_id).await;
    wait_topic_peer(&handle_c, &topic, b_id).await;
    wait_topic_peer(&handle_b, &topic, a_id).await;
    wait_topic_peer(&handle_b, &topic, c_id).await;

    for node in [&a, &b, &c] {
        assert_eq!(node.start().await.unwrap().state, SyncState::Ready);
    }
    let mut sub = c.subscribe(KIND).unwrap();

    // Published raw, bypassing A's own verification.
    let lie = false_proof(20);
    handle_a.publish(topic.clone(), lie.encode()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !b.gossip().is_rejected(&lie.digest()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let proof = faulty_proof(20);
    assert_eq!(a.broadcast(proof.clone()).await.unwrap(), Ingested::Accepted);

    let received = tokio::time::timeout(Duration::from_secs(10), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.digest(), proof.digest());

    let none = tokio::time::timeout(Duration::from_millis(300), sub.next()).await;
    assert!(none.is_err());
    assert!(!c.gossip().is_rejected(&lie.digest()));
    assert_eq!(c.get(KIND).unwrap().len(), 1);
    assert!(b.guard().is_halted(KIND));
    assert!(!b.get(KIND).unwrap().iter().any(|p| p.digest() == lie.digest()));

    for handle in [&handle_a, &handle_b, &handle_c] {
        handle.shutdown().await;
    }
}
