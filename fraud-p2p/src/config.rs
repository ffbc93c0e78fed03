//! Fraud service configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration.

use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, PeerId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FraudP2pError, Result};

/// Configuration for the fraud service and its network.
///
/// # Example
///
/// ```rust
/// use fraud_p2p::FraudConfig;
///
/// let config = FraudConfig::from_toml_str(r#"
///     header_timeout_ms = 2000
///     store_path = "/var/lib/fraud"
/// "#).unwrap();
///
/// assert_eq!(config.header_timeout_ms, 2000);
/// assert_eq!(config.subscriber_buffer, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    /// Bound on the wait for the accused header, in milliseconds
    pub header_timeout_ms: u64,
    /// Bound on each fraud-sync request, in milliseconds
    pub sync_request_timeout_ms: u64,
    /// Overall fraud-sync deadline, in milliseconds
    pub sync_timeout_ms: u64,
    /// Queue depth per subscriber before it is disconnected
    pub subscriber_buffer: usize,
    /// Number of rejected proof digests remembered
    pub rejected_cache_size: usize,
    /// Directory of the durable proof store; in-memory when absent
    pub store_path: Option<PathBuf>,
    /// Address the network listens on
    pub listen_addr: String,
    /// Peers asked for proofs at startup, as multiaddrs ending in `/p2p/<id>`
    pub trusted_peers: Vec<String>,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            header_timeout_ms: 5_000,
            sync_request_timeout_ms: 10_000,
            sync_timeout_ms: 30_000,
            subscriber_buffer: 32,
            rejected_cache_size: 1024,
            store_path: None,
            listen_addr: "/ip4/0.0.0.0/tcp/0".to_string(),
            trusted_peers: Vec::new(),
        }
    }
}

impl FraudConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| FraudP2pError::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FraudP2pError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject zero timeouts and buffers, and unparsable addresses.
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("header_timeout_ms", self.header_timeout_ms == 0),
            ("sync_request_timeout_ms", self.sync_request_timeout_ms == 0),
            ("sync_timeout_ms", self.sync_timeout_ms == 0),
            ("subscriber_buffer", self.subscriber_buffer == 0),
            ("rejected_cache_size", self.rejected_cache_size == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(FraudP2pError::Config(format!("{} must be greater than zero", name)));
        }

        self.listen_multiaddr()?;
        self.trusted_peer_addrs()?;
        Ok(())
    }

    /// Header wait bound.
    pub fn header_timeout(&self) -> Duration {
        Duration::from_millis(self.header_timeout_ms)
    }

    /// Per-request fraud-sync bound.
    pub fn sync_request_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_request_timeout_ms)
    }

    /// Overall fraud-sync deadline.
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    /// Parsed listen address.
    pub fn listen_multiaddr(&self) -> Result<Multiaddr> {
        self.listen_addr.parse().map_err(|e| {
            FraudP2pError::Config(format!("Invalid listen_addr '{}': {}", self.listen_addr, e))
        })
    }

    /// Trusted peers with the peer id split off each address.
    pub fn trusted_peer_addrs(&self) -> Result<Vec<(PeerId, Multiaddr)>> {
        self.trusted_peers
            .iter()
            .map(|raw| {
                let addr: Multiaddr = raw.parse().map_err(|e| {
                    FraudP2pError::Config(format!("Invalid trusted peer '{}': {}", raw, e))
                })?;
                let peer = addr
                    .iter()
                    .find_map(|p| match p {
                        Protocol::P2p(peer) => Some(peer),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        FraudP2pError::Config(format!("Trusted peer '{}' has no /p2p/ id", raw))
                    })?;
                Ok((peer, addr))
            })
            .collect()
    }
}
