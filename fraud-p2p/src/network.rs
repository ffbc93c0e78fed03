//! Libp2p swarm driver.
//!
//! [`FraudNetwork`] owns the swarm and runs its event loop on a task.
//! [`NetworkHandle`] talks to that task over a command channel and implements
//! both the gossip transport and the peer request channel. Inbound gossip and
//! sync requests come out as [`InboundEvent`]s, which [`serve_inbound`] routes
//! into a [`FraudService`].

use async_trait::async_trait;
use futures::StreamExt;
use libp2p::{
    gossipsub, identify,
    identity::Keypair,
    request_response::{self, OutboundRequestId, ResponseChannel},
    swarm::{Swarm, SwarmEvent},
    Multiaddr, PeerId,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::behavior::{FraudBehaviour, FraudBehaviourEvent};
use crate::config::FraudConfig;
use crate::error::{FraudP2pError, Result};
use crate::gossip::{GossipTransport, ValidationOutcome};
use crate::protocol::{FraudSyncRequest, FraudSyncResponse};
use crate::service::FraudService;
use crate::sync::PeerRequestChannel;

/// Depth of the command and inbound event queues.
const CHANNEL_CAPACITY: usize = 256;

/// Connections are kept open this long without traffic.
const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Something the network needs the service to handle.
#[derive(Debug)]
pub enum InboundEvent {
    /// A gossip message awaiting validation.
    Gossip {
        /// Gossipsub message id
        message_id: gossipsub::MessageId,
        /// Peer that forwarded the message
        source: PeerId,
        /// Topic the message arrived on
        topic: String,
        /// Encoded proof
        data: Vec<u8>,
    },
    /// A peer asked for our proofs.
    SyncRequest {
        /// Requesting peer
        peer: PeerId,
        /// The request
        request: FraudSyncRequest,
        /// Where to send the answer
        channel: ResponseChannel<FraudSyncResponse>,
    },
}

enum Command {
    Dial {
        addr: Multiaddr,
        reply: oneshot::Sender<Result<()>>,
    },
    ListenAddr {
        reply: oneshot::Sender<Multiaddr>,
    },
    ConnectedPeers {
        reply: oneshot::Sender<Vec<PeerId>>,
    },
    TopicPeers {
        topic: String,
        reply: oneshot::Sender<Vec<PeerId>>,
    },
    Publish {
        topic: String,
        data: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    Request {
        peer: PeerId,
        request: FraudSyncRequest,
        reply: oneshot::Sender<Result<FraudSyncResponse>>,
    },
    Respond {
        channel: ResponseChannel<FraudSyncResponse>,
        response: FraudSyncResponse,
    },
    Report {
        message_id: gossipsub::MessageId,
        source: PeerId,
        outcome: ValidationOutcome,
    },
    Shutdown,
}

/// Owns the swarm; consumed by [`FraudNetwork::spawn`].
pub struct FraudNetwork {
    swarm: Swarm<FraudBehaviour>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<InboundEvent>,
    pending_requests: HashMap<OutboundRequestId, oneshot::Sender<Result<FraudSyncResponse>>>,
    listen_addrs: Vec<Multiaddr>,
    listen_waiters: Vec<oneshot::Sender<Multiaddr>>,
}

impl FraudNetwork {
    /// Build the swarm, start listening and join `topics`.
    ///
    /// Trusted peers from `config` are dialed so gossip reaches them.
    pub fn new(
        config: &FraudConfig,
        topics: &[String],
    ) -> Result<(Self, NetworkHandle, mpsc::Receiver<InboundEvent>)> {
        Self::with_keypair(config, topics, Keypair::generate_ed25519())
    }

    /// Like [`FraudNetwork::new`], with a fixed identity.
    pub fn with_keypair(
        config: &FraudConfig,
        topics: &[String],
        keypair: Keypair,
    ) -> Result<(Self, NetworkHandle, mpsc::Receiver<InboundEvent>)> {
        config.validate()?;
        let local_peer_id = PeerId::from(keypair.public());
        let request_timeout = config.sync_request_timeout();

        let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                libp2p::tcp::Config::default(),
                libp2p::noise::Config::new,
                libp2p::yamux::Config::default,
            )
            .map_err(|e| FraudP2pError::NetworkError(format!("TCP error: {}", e)))?
            .with_behaviour(|key| -> std::result::Result<FraudBehaviour, Box<dyn std::error::Error + Send + Sync>> {
                Ok(FraudBehaviour::new(key, request_timeout)?)
            })
            .map_err(|e| FraudP2pError::NetworkError(format!("Behaviour error: {}", e)))?
            .with_swarm_config(|c| c.with_idle_connection_timeout(IDLE_CONNECTION_TIMEOUT))
            .build();

        for topic in topics {
            swarm
                .behaviour_mut()
                .gossipsub
                .subscribe(&gossipsub::IdentTopic::new(topic.clone()))
                .map_err(|e| FraudP2pError::NetworkError(format!("Subscription error: {:?}", e)))?;
        }

        swarm
            .listen_on(config.listen_multiaddr()?)
            .map_err(|e| FraudP2pError::NetworkError(format!("Listen error: {}", e)))?;

        for (peer, addr) in config.trusted_peer_addrs()? {
            swarm.add_peer_address(peer, addr.clone());
            if let Err(e) = swarm.dial(addr.clone()) {
                warn!(%peer, %addr, error = %e, "Failed to dial trusted peer");
            }
        }

        info!(peer_id = %local_peer_id, topics = topics.len(), "Created fraud network");

        let (command_tx, commands) = mpsc::channel(CHANNEL_CAPACITY);
        let (events, inbound) = mpsc::channel(CHANNEL_CAPACITY);

        let network = Self {
            swarm,
            commands,
            events,
            pending_requests: HashMap::new(),
            listen_addrs: Vec::new(),
            listen_waiters: Vec::new(),
        };
        let handle = NetworkHandle {
            local_peer_id,
            commands: command_tx,
        };
        Ok((network, handle, inbound))
    }

    /// Run the event loop on a new task until shut down.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the event loop until shut down or every handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.swarm.select_next_some() => self.handle_swarm_event(event),
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
            }
        }

        for (_, reply) in self.pending_requests.drain() {
            let _ = reply.send(Err(FraudP2pError::NetworkError("network shut down".into())));
        }
        info!("Fraud network stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Dial { addr, reply } => {
                info!("Dialing {}", addr);
                let result = self
                    .swarm
                    .dial(addr)
                    .map_err(|e| FraudP2pError::NetworkError(format!("Dial error: {}", e)));
                let _ = reply.send(result);
            }
            Command::ListenAddr { reply } => match self.listen_addrs.first() {
                Some(addr) => {
                    let _ = reply.send(addr.clone());
                }
                None => self.listen_waiters.push(reply),
            },
            Command::ConnectedPeers { reply } => {
                let _ = reply.send(self.swarm.connected_peers().copied().collect());
            }
            Command::TopicPeers { topic, reply } => {
                let hash = gossipsub::IdentTopic::new(topic).hash();
                let peers = self
                    .swarm
                    .behaviour()
                    .gossipsub
                    .all_peers()
                    .filter(|(_, topics)| topics.contains(&&hash))
                    .map(|(peer, _)| *peer)
                    .collect();
                let _ = reply.send(peers);
            }
            Command::Publish { topic, data, reply } => {
                let _ = reply.send(self.publish(topic, data));
            }
            Command::Request {
                peer,
                request,
                reply,
            } => {
                let request_id = self.swarm.behaviour_mut().sync.send_request(&peer, request);
                self.pending_requests.insert(request_id, reply);
            }
            Command::Respond { channel, response } => {
                if let Err(response) = self.swarm.behaviour_mut().sync.send_response(channel, response) {
                    warn!(proofs = response.proofs.len(), "Failed to send sync response");
                }
            }
            Command::Report {
                message_id,
                source,
                outcome,
            } => {
                let acceptance = match outcome {
                    ValidationOutcome::Accept => gossipsub::MessageAcceptance::Accept,
                    ValidationOutcome::Reject => gossipsub::MessageAcceptance::Reject,
                    ValidationOutcome::Ignore => gossipsub::MessageAcceptance::Ignore,
                };
                // The message may already have left the cache; nothing to do then.
                let _ = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .report_message_validation_result(&message_id, &source, acceptance);
            }
            Command::Shutdown => {}
        }
    }

    fn publish(&mut self, topic: String, data: Vec<u8>) -> Result<()> {
        match self
            .swarm
            .behaviour_mut()
            .gossipsub
            .publish(gossipsub::IdentTopic::new(topic.clone()), data)
        {
            Ok(_) => Ok(()),
            // Stored locally either way; late peers pick it up through fraud sync.
            Err(gossipsub::PublishError::InsufficientPeers) => {
                warn!(topic, "No gossip peers for proof");
                Ok(())
            }
            Err(gossipsub::PublishError::Duplicate) => {
                debug!(topic, "Proof already published");
                Ok(())
            }
            Err(e) => Err(FraudP2pError::NetworkError(format!("Publish error: {:?}", e))),
        }
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<FraudBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!("Listening on {}", address);
                for waiter in self.listen_waiters.drain(..) {
                    let _ = waiter.send(address.clone());
                }
                self.listen_addrs.push(address);
            }
            SwarmEvent::Behaviour(FraudBehaviourEvent::Identify(event)) => {
                self.handle_identify_event(event);
            }
            SwarmEvent::Behaviour(FraudBehaviourEvent::Gossipsub(event)) => {
                self.handle_gossip_event(event);
            }
            SwarmEvent::Behaviour(FraudBehaviourEvent::Sync(event)) => {
                self.handle_sync_event(event);
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!("Connected to peer: {}", peer_id);
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                debug!("Disconnected from peer: {}", peer_id);
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                warn!(peer = ?peer_id, error = %error, "Outgoing connection failed");
            }
            _ => {}
        }
    }

    fn handle_identify_event(&mut self, event: identify::Event) {
        match event {
            identify::Event::Received { peer_id, info, .. } => {
                debug!(
                    "Identified peer {} running {} with {} addresses",
                    peer_id,
                    info.agent_version,
                    info.listen_addrs.len()
                );
                for addr in info.listen_addrs {
                    self.swarm.add_peer_address(peer_id, addr);
                }
            }
            identify::Event::Error { peer_id, error, .. } => {
                warn!("Identify error with {}: {:?}", peer_id, error);
            }
            _ => {}
        }
    }

    fn handle_gossip_event(&mut self, event: gossipsub::Event) {
        match event {
            gossipsub::Event::Message {
                propagation_source,
                message_id,
                message,
            } => {
                let inbound = InboundEvent::Gossip {
                    message_id: message_id.clone(),
                    source: propagation_source,
                    topic: message.topic.as_str().to_string(),
                    data: message.data,
                };
                if self.events.try_send(inbound).is_err() {
                    warn!(source = %propagation_source, "Inbound queue full, ignoring gossip message");
                    let _ = self.swarm.behaviour_mut().gossipsub.report_message_validation_result(
                        &message_id,
                        &propagation_source,
                        gossipsub::MessageAcceptance::Ignore,
                    );
                }
            }
            gossipsub::Event::Subscribed { peer_id, topic } => {
                debug!(%peer_id, topic = topic.as_str(), "Peer joined topic");
            }
            _ => {}
        }
    }

    fn handle_sync_event(&mut self, event: request_response::Event<FraudSyncRequest, FraudSyncResponse>) {
        use request_response::Event;

        match event {
            Event::Message { peer, message, .. } => match message {
                request_response::Message::Request {
                    request, channel, ..
                } => {
                    debug!(%peer, kinds = ?request.kinds, "Fraud sync request");
                    let inbound = InboundEvent::SyncRequest {
                        peer,
                        request,
                        channel,
                    };
                    if self.events.try_send(inbound).is_err() {
                        warn!(%peer, "Inbound queue full, dropping sync request");
                    }
                }
                request_response::Message::Response {
                    request_id,
                    response,
                } => {
                    if let Some(reply) = self.pending_requests.remove(&request_id) {
                        let _ = reply.send(Ok(response));
                    }
                }
            },
            Event::OutboundFailure {
                peer,
                request_id,
                error,
                ..
            } => {
                warn!("Outbound failure to {}: {:?}", peer, error);
                if let Some(reply) = self.pending_requests.remove(&request_id) {
                    let _ = reply.send(Err(FraudP2pError::NetworkError(error.to_string())));
                }
            }
            Event::InboundFailure { peer, error, .. } => {
                warn!("Inbound failure from {}: {:?}", peer, error);
            }
            Event::ResponseSent { peer, .. } => {
                debug!("Response sent to {}", peer);
            }
        }
    }
}

/// Cloneable handle to a running [`FraudNetwork`].
#[derive(Clone)]
pub struct NetworkHandle {
    local_peer_id: PeerId,
    commands: mpsc::Sender<Command>,
}

impl NetworkHandle {
    /// Get the local peer ID.
    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    /// First address the swarm listens on; waits until one is bound.
    pub async fn listen_addr(&self) -> Result<Multiaddr> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ListenAddr { reply }).await?;
        rx.await.map_err(|_| stopped())
    }

    /// Peers with an open connection.
    pub async fn connected_peers(&self) -> Result<Vec<PeerId>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ConnectedPeers { reply }).await?;
        rx.await.map_err(|_| stopped())
    }

    /// Peers known to be subscribed to gossip `topic`.
    pub async fn topic_peers(&self, topic: &str) -> Result<Vec<PeerId>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::TopicPeers {
            topic: topic.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| stopped())
    }

    /// Dial `addr`.
    pub async fn dial(&self, addr: Multiaddr) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Dial { addr, reply }).await?;
        rx.await.map_err(|_| stopped())?
    }

    /// Answer a sync request.
    pub async fn respond(
        &self,
        channel: ResponseChannel<FraudSyncResponse>,
        response: FraudSyncResponse,
    ) -> Result<()> {
        self.send(Command::Respond { channel, response }).await
    }

    /// Report the verdict on a gossip message back to gossipsub.
    pub async fn report_validation(
        &self,
        message_id: gossipsub::MessageId,
        source: PeerId,
        outcome: ValidationOutcome,
    ) -> Result<()> {
        self.send(Command::Report {
            message_id,
            source,
            outcome,
        })
        .await
    }

    /// Stop the event loop.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| stopped())
    }
}

fn stopped() -> FraudP2pError {
    FraudP2pError::NetworkError("network task stopped".into())
}

#[async_trait]
impl GossipTransport for NetworkHandle {
    async fn publish(&self, topic: String, data: Vec<u8>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Publish { topic, data, reply }).await?;
        rx.await.map_err(|_| stopped())?
    }
}

#[async_trait]
impl PeerRequestChannel for NetworkHandle {
    async fn request_proofs(&self, peer: PeerId, request: FraudSyncRequest) -> Result<FraudSyncResponse> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Request {
            peer,
            request,
            reply,
        })
        .await?;
        rx.await.map_err(|_| stopped())?
    }
}

/// Route inbound network events into `service` until the network stops.
///
/// Each gossip message is validated on its own task so a slow header fetch
/// does not hold up the rest.
pub async fn serve_inbound(
    service: FraudService,
    handle: NetworkHandle,
    mut events: mpsc::Receiver<InboundEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            InboundEvent::Gossip {
                message_id,
                source,
                topic,
                data,
            } => {
                let service = service.clone();
                let handle = handle.clone();
                tokio::spawn(async move {
                    let outcome = service.on_gossip(&topic, &data).await;
                    debug!(%source, topic, ?outcome, "Gossip message validated");
                    if let Err(e) = handle.report_validation(message_id, source, outcome).await {
                        debug!(error = %e, "Could not report validation result");
                    }
                });
            }
            InboundEvent::SyncRequest {
                peer,
                request,
                channel,
            } => match service.sync_response(&request) {
                Ok(response) => {
                    if let Err(e) = handle.respond(channel, response).await {
                        warn!(%peer, error = %e, "Could not answer sync request");
                    }
                }
                // Dropping the channel fails the request on the peer's side.
                Err(e) => error!(%peer, error = %e, "Failed to read proofs for sync request"),
            },
        }
    }
    debug!("Inbound event stream ended");
}
