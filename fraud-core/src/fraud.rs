//! The fraud proof abstraction shared by every proof kind.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::header::ExtendedHeader;
use crate::kind::ProofKind;

/// Content digest uniquely identifying a proof.
///
/// Two proofs with the same digest are the same proof.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProofDigest(pub [u8; 32]);

impl ProofDigest {
    /// SHA-256 of an encoded proof.
    pub fn of(encoded: &[u8]) -> Self {
        Self(Sha256::digest(encoded).into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lower-case hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ProofDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ProofDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProofDigest({})", self.to_hex())
    }
}

/// A fraud proof of some kind.
///
/// Implementors are immutable once built. The registry decodes payloads into
/// `Arc<dyn FraudProof>`; everything downstream works through this trait.
pub trait FraudProof: fmt::Debug + Send + Sync + 'static {
    /// Kind of this proof.
    fn kind(&self) -> ProofKind;

    /// Height of the block this proof accuses.
    fn height(&self) -> u64;

    /// Canonical wire encoding.
    fn encode(&self) -> Vec<u8>;

    /// Digest of the canonical encoding.
    fn digest(&self) -> ProofDigest {
        ProofDigest::of(&self.encode())
    }

    /// Structural checks that need no header.
    fn validate_basic(&self) -> Result<()>;

    /// Recheck the accusation against the header at [`FraudProof::height`].
    ///
    /// `Ok(())` means the fraud is real. `FalseAccusation` means the header's
    /// committed values are correct; any other error means the witness is bad.
    fn verify(&self, header: &ExtendedHeader) -> Result<()>;
}

/// A decoded proof shared between the store, subscribers and the network.
pub type SharedProof = Arc<dyn FraudProof>;
