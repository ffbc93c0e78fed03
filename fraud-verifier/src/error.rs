//! Error types for the fraud verifier.
//!
//! This module defines all error types that can occur while
//! checking a decoded proof against the header it accuses.

use fraud_core::{FraudError, ProofKind};
use thiserror::Error;

/// Errors reported by a [`HeaderProvider`](crate::HeaderProvider).
#[derive(Debug, Clone, Error)]
pub enum HeaderError {
    /// No header is known at this height.
    #[error("no header at height {0}")]
    NotFound(u64),

    /// The provider failed to fetch the header.
    #[error("header fetch failed: {0}")]
    Fetch(String),
}

/// Errors that can occur during verification operations.
#[derive(Debug, Error)]
pub enum FraudVerifierError {
    /// The proof failed its structural checks.
    #[error("Malformed proof: {0}")]
    Malformed(String),

    /// The proof kind is not registered.
    #[error("Unknown proof kind: '{0}'")]
    UnknownKind(String),

    /// The header at the accused height could not be obtained in time.
    #[error("Header at height {height} unavailable: {reason}")]
    HeaderUnavailable {
        /// The accused height
        height: u64,
        /// Why the header could not be obtained
        reason: String,
    },

    /// The header's committed values are correct; the accusation is false.
    #[error("False accusation: {kind} proof at height {height} does not hold")]
    FalseAccusation {
        /// Kind of the rejected proof
        kind: ProofKind,
        /// Height the proof accused
        height: u64,
    },

    /// The witness does not open against the header.
    #[error("Invalid witness: {0}")]
    InvalidWitness(String),
}

impl FraudVerifierError {
    /// Whether the same proof may verify later.
    ///
    /// Only a missing header is recoverable; every other failure is a property
    /// of the proof itself.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::HeaderUnavailable { .. })
    }
}

impl From<FraudError> for FraudVerifierError {
    fn from(err: FraudError) -> Self {
        match err {
            FraudError::UnknownKind(kind) => Self::UnknownKind(kind),
            FraudError::FalseAccusation { kind, height } => Self::FalseAccusation { kind, height },
            FraudError::InvalidWitness(msg) | FraudError::InvalidSquare(msg) => {
                Self::InvalidWitness(msg)
            }
            FraudError::MalformedPayload(msg) => Self::Malformed(msg),
            other @ FraudError::DuplicateKind(_) => Self::Malformed(other.to_string()),
        }
    }
}

/// Result type alias for verifier operations.
pub type Result<T> = std::result::Result<T, FraudVerifierError>;
