//! Error types for the fraud core library.
//!
//! This module defines all error types that can occur during
//! proof decoding, structural validation, and verification against a header.

use thiserror::Error;

use crate::kind::ProofKind;

/// Errors that can occur in fraud core operations.
#[derive(Debug, Error)]
pub enum FraudError {
    /// The proof kind is not known or not registered.
    #[error("Unknown proof kind: '{0}'")]
    UnknownKind(String),

    /// A decoder was registered twice for the same kind.
    #[error("Proof kind '{0}' is already registered")]
    DuplicateKind(ProofKind),

    /// The payload could not be decoded or is structurally invalid.
    #[error("Malformed proof payload: {0}")]
    MalformedPayload(String),

    /// The witness does not open against the committed header values.
    #[error("Invalid witness: {0}")]
    InvalidWitness(String),

    /// The accusation does not hold: the committed values are correct.
    #[error("False accusation: {kind} proof at height {height} does not hold")]
    FalseAccusation {
        /// Kind of the rejected proof
        kind: ProofKind,
        /// Height the proof accused
        height: u64,
    },

    /// A data square could not be built or extended.
    #[error("Invalid data square: {0}")]
    InvalidSquare(String),
}

/// Result type alias for fraud core operations.
pub type Result<T> = std::result::Result<T, FraudError>;
