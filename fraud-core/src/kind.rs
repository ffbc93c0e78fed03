//! Proof kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FraudError;

/// Version suffix shared by every gossip topic.
const TOPIC_VERSION: &str = "v0.0.1";

/// A family of fraud proofs.
///
/// Each kind owns a wire schema and a verification rule. The set is closed:
/// adding a kind means adding a variant and registering its decoder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProofKind {
    /// The erasure-coded data of a block does not match its committed root.
    BadEncoding,
}

impl ProofKind {
    /// Every kind this crate knows about.
    pub const ALL: &'static [ProofKind] = &[ProofKind::BadEncoding];

    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadEncoding => "badencoding",
        }
    }

    /// Gossip topic carrying proofs of this kind.
    pub fn topic(&self) -> String {
        format!("/fraud/{}/{}", self.as_str(), TOPIC_VERSION)
    }

    /// Kind carried by a gossip topic, if the topic belongs to a known kind.
    pub fn from_topic(topic: &str) -> Option<ProofKind> {
        ProofKind::ALL.iter().copied().find(|k| k.topic() == topic)
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofKind {
    type Err = FraudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProofKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| FraudError::UnknownKind(s.to_string()))
    }
}
