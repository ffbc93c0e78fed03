//! # Fraud P2P
//!
//! **Layer 2: Proof Storage, Propagation and Lifecycle**
//!
//! This crate accepts fraud proofs from the network, from local detectors and
//! from peers at startup, and turns the first valid proof of a kind into a
//! halt signal.
//!
//! ## Features
//!
//! - **Proof Store**: memory or append-only file store, deduplicated by digest
//! - **Subscriptions**: bounded per-subscriber queues in acceptance order
//! - **Gossip Validation**: decode, verify and store before re-propagation
//! - **Halt Guard**: set-once per-kind halt flag with callbacks
//! - **Fraud Sync**: ask trusted peers for known proofs before resuming
//! - **Libp2p Driver**: gossipsub topics per kind plus a CBOR sync protocol
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fraud_core::{ProofKind, ProofRegistry};
//! use fraud_p2p::{serve_inbound, FraudConfig, FraudNetwork, FraudService};
//! use fraud_verifier::MemoryHeaderStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FraudConfig::load("fraud.toml")?;
//!     let registry = Arc::new(ProofRegistry::with_defaults());
//!     let store = FraudService::open_store(&config, registry.clone())?;
//!     let headers = Arc::new(MemoryHeaderStore::new());
//!
//!     let topics: Vec<String> = registry.kinds().iter().map(ProofKind::topic).collect();
//!     let (network, handle, inbound) = FraudNetwork::new(&config, &topics)?;
//!     network.spawn();
//!
//!     let service = FraudService::new(
//!         &config,
//!         registry,
//!         store,
//!         headers,
//!         Arc::new(handle.clone()),
//!         Arc::new(handle.clone()),
//!     )?;
//!     tokio::spawn(serve_inbound(service.clone(), handle, inbound));
//!
//!     // Fails with AlreadyProven if this node has seen fraud before.
//!     let outcome = service.start().await?;
//!     println!("Fraud sync: {}", outcome.state);
//!
//!     service.on_halt(ProofKind::BadEncoding, |notice| {
//!         println!("Bad encoding proven at height {}", notice.height);
//!     })?;
//!     Ok(())
//! }
//! ```

pub mod behavior;
pub mod cache;
pub mod config;
pub mod error;
pub mod gossip;
pub mod guard;
pub mod hub;
pub mod ingest;
pub mod network;
pub mod protocol;
pub mod service;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export main types
pub use cache::{RejectedCache, RejectedProof};
pub use config::FraudConfig;
pub use error::{FraudP2pError, Result};
pub use gossip::{GossipAdapter, GossipTransport, ValidationOutcome};
pub use guard::{HaltCallback, HaltGuard, HaltNotice};
pub use hub::{Subscription, SubscriptionHub, DEFAULT_SUBSCRIBER_BUFFER};
pub use ingest::{Ingested, Ingestor};
pub use network::{serve_inbound, FraudNetwork, InboundEvent, NetworkHandle};
pub use protocol::{FraudSyncRequest, FraudSyncResponse, WireProof, SYNC_PROTOCOL};
pub use service::FraudService;
pub use store::{FileStore, MemoryStore, ProofStore, PutOutcome};
pub use sync::{check_store, serve_request, FraudSync, PeerRequestChannel, SyncOutcome, SyncState};
