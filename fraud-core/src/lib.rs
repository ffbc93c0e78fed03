//! # Fraud Core
//!
//! **Fraud proofs for data-availability light clients**
//!
//! This crate implements Layer 0 of the fraud-proof subsystem: the proof
//! model. It defines proof kinds, the [`FraudProof`] trait every kind
//! implements, the registry that decodes wire payloads into proofs, and the
//! bad-encoding proof together with the share trees and erasure extension it
//! is checked against.
//!
//! ## Features
//!
//! - **Deterministic**: the same proof always encodes to the same bytes and digest
//! - **Minimal**: no network I/O, no async, no storage
//! - **Self-checking**: a proof is verified against nothing but the header it accuses
//!
//! ## Quick Start
//!
//! ```rust
//! use fraud_core::{Axis, BadEncodingProof, ExtendedHeader, ExtendedSquare, FraudProof, ProofKind, ProofRegistry};
//!
//! // A producer publishes a square whose row 0 parity was tampered with
//! let shares = (0u8..4).map(|i| vec![i; 8]).collect();
//! let mut square = ExtendedSquare::from_original(shares).unwrap();
//! square.share_mut(0, 3).unwrap()[0] ^= 1;
//! let header = ExtendedHeader::from_square(7, &square);
//!
//! // A light client builds a proof and ships its encoding
//! let proof = BadEncodingProof::detect(7, &square).unwrap().unwrap();
//! let payload = proof.encode();
//!
//! // Anyone holding the header can check it
//! let registry = ProofRegistry::with_defaults();
//! let decoded = registry.decode(ProofKind::BadEncoding, &payload).unwrap();
//! registry.validate(&decoded).unwrap();
//! assert!(decoded.verify(&header).is_ok());
//! ```

pub mod befp;
pub mod codec;
pub mod error;
pub mod fraud;
pub mod header;
pub mod kind;
pub mod proof;
pub mod registry;
pub mod tree;

// Re-export main types for convenience
pub use befp::{BadEncodingProof, ShareWithProof};
pub use codec::{extend_shares, Axis, ExtendedSquare};
pub use error::{FraudError, Result};
pub use fraud::{FraudProof, ProofDigest, SharedProof};
pub use header::{DataAvailabilityHeader, ExtendedHeader};
pub use kind::ProofKind;
pub use proof::InclusionProof;
pub use registry::ProofRegistry;
pub use tree::ShareTree;
