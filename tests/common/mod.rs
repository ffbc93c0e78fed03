//! In-memory network and node fixtures for end-to-end fraud scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use fraud_core::{Axis, BadEncodingProof, ExtendedHeader, ExtendedSquare, ProofRegistry, SharedProof};
use fraud_core::ProofKind;
use fraud_p2p::{
    serve_inbound, FraudConfig, FraudNetwork, FraudP2pError, FraudService, FraudSyncRequest,
    FraudSyncResponse, GossipTransport, MemoryStore, NetworkHandle, PeerRequestChannel, ProofStore, Result,
    ValidationOutcome,
};
use fraud_verifier::MemoryHeaderStore;
use libp2p::PeerId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Height of the last header every node knows.
pub const HEAD: u64 = 40;

/// A 4x4 block whose row 1 parity was tampered with.
pub fn faulty_square() -> ExtendedSquare {
    let shares = (0u8..16).map(|i| vec![i; 16]).collect();
    let mut square = ExtendedSquare::from_original(shares).unwrap();
    square.share_mut(1, 6).unwrap()[0] ^= 0xAA;
    square
}

/// Valid bad-encoding proof at `height`.
pub fn faulty_proof(height: u64) -> SharedProof {
    Arc::new(BadEncodingProof::new(height, &faulty_square(), Axis::Row, 1).unwrap())
}

/// Accusation against a correctly encoded row.
pub fn false_proof(height: u64) -> SharedProof {
    Arc::new(BadEncodingProof::new(height, &faulty_square(), Axis::Row, 0).unwrap())
}

/// Headers 1..=HEAD, all committing to [`faulty_square`].
pub fn chain_headers() -> Arc<MemoryHeaderStore> {
    let headers = Arc::new(MemoryHeaderStore::new());
    let square = faulty_square();
    for height in 1..=HEAD {
        headers.insert(ExtendedHeader::from_square(height, &square));
    }
    headers
}

/// Route logs to the test harness; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn registry() -> Arc<ProofRegistry> {
    Arc::new(ProofRegistry::with_defaults())
}

pub fn test_config() -> FraudConfig {
    FraudConfig {
        header_timeout_ms: 200,
        sync_request_timeout_ms: 500,
        sync_timeout_ms: 1_000,
        ..FraudConfig::default()
    }
}

pub fn memory_store() -> Arc<dyn ProofStore> {
    Arc::new(MemoryStore::new())
}

/// Config for a node listening on a loopback port.
pub fn local_config() -> FraudConfig {
    FraudConfig {
        listen_addr: "/ip4/127.0.0.1/tcp/0".to_string(),
        sync_request_timeout_ms: 5_000,
        sync_timeout_ms: 10_000,
        ..test_config()
    }
}

/// A service wired to a real libp2p node on loopback.
pub async fn start_tcp_node(config: &FraudConfig, store: Arc<dyn ProofStore>) -> (FraudService, NetworkHandle) {
    let registry = registry();
    let topics: Vec<String> = registry.kinds().iter().map(ProofKind::topic).collect();
    let (network, handle, inbound) = FraudNetwork::new(config, &topics).unwrap();
    network.spawn();

    let service = FraudService::new(
        config,
        registry,
        store,
        chain_headers(),
        Arc::new(handle.clone()),
        Arc::new(handle.clone()),
    )
    .unwrap();
    tokio::spawn(serve_inbound(service.clone(), handle.clone(), inbound));
    (service, handle)
}

/// `handle`'s listen address with its peer id, as a trusted peer entry.
pub async fn trusted_addr(handle: &NetworkHandle) -> String {
    let addr = tokio::time::timeout(Duration::from_secs(5), handle.listen_addr())
        .await
        .unwrap()
        .unwrap();
    format!("{}/p2p/{}", addr, handle.local_peer_id())
}

/// Wait until `handle` connects to `peer`.
pub async fn wait_connected(handle: &NetworkHandle, peer: PeerId) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !handle.connected_peers().await.unwrap().contains(&peer) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

/// Wait until `handle` sees `peer` subscribed to `topic`.
pub async fn wait_topic_peer(handle: &NetworkHandle, topic: &str, peer: PeerId) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !handle.topic_peers(topic).await.unwrap().contains(&peer) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

/// Fully connected in-memory network: every publish reaches every other node.
#[derive(Default)]
pub struct MemoryNetwork {
    nodes: Mutex<HashMap<PeerId, FraudService>>,
    delivered: Mutex<Vec<(PeerId, ValidationOutcome)>>,
}

pub struct Node {
    pub id: PeerId,
    pub service: FraudService,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a node backed by `store`.
    pub fn add_node(self: &Arc<Self>, store: Arc<dyn ProofStore>) -> Node {
        let id = PeerId::random();
        let link = Arc::new(MemoryLink {
            network: self.clone(),
            local: id,
        });
        let service = FraudService::new(&test_config(), registry(), store, chain_headers(), link.clone(), link)
            .unwrap();
        self.nodes.lock().unwrap().insert(id, service.clone());
        Node { id, service }
    }

    /// Take a node off the network and stop it.
    pub fn remove(&self, id: &PeerId) {
        if let Some(service) = self.nodes.lock().unwrap().remove(id) {
            service.stop();
        }
    }

    /// Validation outcomes reported by receiving nodes, in delivery order.
    pub fn delivered(&self) -> Vec<(PeerId, ValidationOutcome)> {
        self.delivered.lock().unwrap().clone()
    }

    fn others(&self, local: &PeerId) -> Vec<(PeerId, FraudService)> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id != local)
            .map(|(id, service)| (*id, service.clone()))
            .collect()
    }

    fn node(&self, id: &PeerId) -> Option<FraudService> {
        self.nodes.lock().unwrap().get(id).cloned()
    }
}

/// One node's view of the [`MemoryNetwork`].
struct MemoryLink {
    network: Arc<MemoryNetwork>,
    local: PeerId,
}

#[async_trait]
impl GossipTransport for MemoryLink {
    async fn publish(&self, topic: String, data: Vec<u8>) -> Result<()> {
        for (id, service) in self.network.others(&self.local) {
            let outcome = service.on_gossip(&topic, &data).await;
            self.network.delivered.lock().unwrap().push((id, outcome));
        }
        Ok(())
    }
}

#[async_trait]
impl PeerRequestChannel for MemoryLink {
    async fn request_proofs(&self, peer: PeerId, request: FraudSyncRequest) -> Result<FraudSyncResponse> {
        match self.network.node(&peer) {
            Some(service) => service.sync_response(&request),
            None => Err(FraudP2pError::NetworkError(format!("{} unreachable", peer))),
        }
    }
}

/// Stand-in header syncer: advances one height per tick until the node halts.
pub struct Syncer {
    height: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl Syncer {
    pub fn spawn(service: &FraudService) -> Self {
        let height = Arc::new(AtomicU64::new(0));
        let guard = service.guard().clone();
        let progress = height.clone();

        let task = tokio::spawn(async move {
            loop {
                if guard.any_halted() {
                    return;
                }
                progress.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });
        Self { height, task }
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the syncer has made `steps` of progress.
    pub async fn advance(&self, steps: u64) {
        while self.height() < steps {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    /// Wait up to two seconds for the syncer task to exit.
    pub async fn wait_stopped(&self) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !self.is_stopped() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        self.is_stopped()
    }
}
