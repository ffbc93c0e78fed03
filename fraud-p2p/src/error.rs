//! Error types for fraud P2P operations.

use fraud_core::{FraudError, ProofKind};
use fraud_verifier::FraudVerifierError;
use thiserror::Error;

/// Errors that can occur during P2P operations.
#[derive(Debug, Error)]
pub enum FraudP2pError {
    /// The local store already holds a proof; the node must not resume.
    #[error("Fraud already proven: {kind} proof {digest} at height {height}")]
    AlreadyProven {
        /// Kind of the stored proof
        kind: ProofKind,
        /// Height the stored proof accuses
        height: u64,
        /// Hex digest of the stored proof
        digest: String,
    },

    /// Network transport error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Protocol encoding/decoding error.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The service was stopped while waiting on it.
    #[error("Fraud service stopped")]
    ServiceStopped,

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Proof store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Error from fraud-core.
    #[error("Core error: {0}")]
    Core(#[from] FraudError),

    /// Error from fraud-verifier.
    #[error("Verifier error: {0}")]
    Verifier(#[from] FraudVerifierError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FraudP2pError {
    /// Whether this error must stop the node from starting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AlreadyProven { .. } | Self::Core(FraudError::DuplicateKind(_)) | Self::Config(_)
        )
    }
}

/// Result type alias for P2P operations.
pub type Result<T> = std::result::Result<T, FraudP2pError>;
