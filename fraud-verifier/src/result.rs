//! Verification result structure.
//!
//! A successful verification means the accusation holds. Failures are
//! reported through [`FraudVerifierError`](crate::FraudVerifierError).

use fraud_core::{ProofDigest, ProofKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A proof whose accusation was confirmed against its header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verified {
    /// Kind of the proof
    pub kind: ProofKind,

    /// Height the proof accuses
    pub height: u64,

    /// Digest of the proof
    pub digest: ProofDigest,

    /// Time spent waiting for the header.
    #[serde(with = "duration_millis")]
    pub header_wait: Duration,

    /// Time spent re-checking the accusation.
    #[serde(with = "duration_millis")]
    pub verification_time: Duration,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl std::fmt::Display for Verified {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} proof {} VERIFIED at height {} (header wait {:?}, check {:?})",
            self.kind, self.digest, self.height, self.header_wait, self.verification_time
        )
    }
}
