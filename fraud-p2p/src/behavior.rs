//! Libp2p network behavior combining identify, gossipsub and fraud sync.

use fraud_core::befp::MAX_PROOF_BYTES;
use fraud_core::ProofDigest;
use libp2p::{
    gossipsub, identify,
    identity::Keypair,
    request_response::{self, ProtocolSupport},
    swarm::NetworkBehaviour,
    StreamProtocol,
};
use std::time::Duration;

use crate::error::FraudP2pError;
use crate::protocol::{FraudSyncRequest, FraudSyncResponse, SYNC_PROTOCOL};

/// Identify protocol version announced to peers.
pub const IDENTIFY_PROTOCOL: &str = "/fraud/id/0.0.1";

/// Protocol identifier for fraud sync.
pub fn sync_protocol() -> StreamProtocol {
    StreamProtocol::new(SYNC_PROTOCOL)
}

/// Combined network behavior for the fraud service.
#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "FraudBehaviourEvent")]
pub struct FraudBehaviour {
    /// Identify protocol for address exchange
    pub identify: identify::Behaviour,
    /// Gossipsub for proof propagation, one topic per kind
    pub gossipsub: gossipsub::Behaviour,
    /// Request-response for fraud sync
    pub sync: request_response::cbor::Behaviour<FraudSyncRequest, FraudSyncResponse>,
}

/// Events emitted by the fraud behavior.
#[derive(Debug)]
pub enum FraudBehaviourEvent {
    /// Identify event
    Identify(identify::Event),
    /// Gossipsub event
    Gossipsub(gossipsub::Event),
    /// Fraud sync event
    Sync(request_response::Event<FraudSyncRequest, FraudSyncResponse>),
}

impl From<identify::Event> for FraudBehaviourEvent {
    fn from(event: identify::Event) -> Self {
        FraudBehaviourEvent::Identify(event)
    }
}

impl From<gossipsub::Event> for FraudBehaviourEvent {
    fn from(event: gossipsub::Event) -> Self {
        FraudBehaviourEvent::Gossipsub(event)
    }
}

impl From<request_response::Event<FraudSyncRequest, FraudSyncResponse>> for FraudBehaviourEvent {
    fn from(event: request_response::Event<FraudSyncRequest, FraudSyncResponse>) -> Self {
        FraudBehaviourEvent::Sync(event)
    }
}

impl FraudBehaviour {
    /// Create the behavior for `keypair`, bounding each sync request by `request_timeout`.
    pub fn new(keypair: &Keypair, request_timeout: Duration) -> crate::error::Result<Self> {
        let identify = identify::Behaviour::new(identify::Config::new(
            IDENTIFY_PROTOCOL.to_string(),
            keypair.public(),
        ));

        // Messages stay pending until the gossip adapter reports a verdict.
        // Ids are proof digests so the same proof from two publishers is one message.
        let config = gossipsub::ConfigBuilder::default()
            .validation_mode(gossipsub::ValidationMode::Strict)
            .validate_messages()
            .max_transmit_size(MAX_PROOF_BYTES as usize)
            .message_id_fn(|message: &gossipsub::Message| {
                gossipsub::MessageId::from(ProofDigest::of(&message.data).to_hex())
            })
            .build()
            .map_err(|e| FraudP2pError::Config(format!("gossipsub: {}", e)))?;

        let gossipsub =
            gossipsub::Behaviour::new(gossipsub::MessageAuthenticity::Signed(keypair.clone()), config)
                .map_err(|e| FraudP2pError::NetworkError(format!("gossipsub: {}", e)))?;

        let sync = request_response::cbor::Behaviour::new(
            [(sync_protocol(), ProtocolSupport::Full)],
            request_response::Config::default().with_request_timeout(request_timeout),
        );

        Ok(Self {
            identify,
            gossipsub,
            sync,
        })
    }
}
