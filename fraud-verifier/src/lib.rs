//! # Fraud Verifier
//!
//! **Layer 1: Local verification of fraud proofs**
//!
//! This crate checks decoded fraud proofs against the extended header of the
//! block they accuse. Headers come from a [`HeaderProvider`], which may still be
//! syncing; the verifier bounds how long it waits.
//!
//! ## Features
//!
//! - **Local**: no consensus round, only the accused header is needed
//! - **Bounded**: a missing header becomes a recoverable error, never a hang
//! - **Stateless**: verification never touches a proof store
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fraud_core::{ProofKind, ProofRegistry};
//! use fraud_verifier::{MemoryHeaderStore, ProofVerifier};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(ProofRegistry::with_defaults());
//!     let headers = Arc::new(MemoryHeaderStore::new());
//!     let verifier = ProofVerifier::new(registry.clone(), headers)
//!         .with_header_timeout(Duration::from_secs(5));
//!
//!     # let payload: Vec<u8> = Vec::new();
//!     let proof = registry.decode(ProofKind::BadEncoding, &payload)?;
//!     match verifier.verify(&proof).await {
//!         Ok(verified) => println!("{}", verified),
//!         Err(e) if e.is_recoverable() => println!("retry later: {}", e),
//!         Err(e) => println!("rejected: {}", e),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod header;
pub mod result;
pub mod verifier;

// Re-export main types for convenience
pub use error::{FraudVerifierError, HeaderError};
pub use header::{HeaderProvider, MemoryHeaderStore};
pub use result::Verified;
pub use verifier::{ProofVerifier, DEFAULT_HEADER_TIMEOUT};
