//! Proof kind registry.
//!
//! Maps each [`ProofKind`] to the decoder that turns its wire payload into a
//! [`SharedProof`]. Decoding goes through the registry so that every consumer
//! sees the same set of supported kinds.

use std::collections::BTreeMap;

use crate::befp::BadEncodingProof;
use crate::error::{FraudError, Result};
use crate::fraud::SharedProof;
use crate::kind::ProofKind;

/// Decoder for one proof kind.
pub type DecodeFn = fn(&[u8]) -> Result<SharedProof>;

/// Registry of proof decoders, keyed by kind.
///
/// # Example
///
/// ```rust
/// use fraud_core::{ProofKind, ProofRegistry};
///
/// let registry = ProofRegistry::with_defaults();
/// assert!(registry.contains(ProofKind::BadEncoding));
/// assert!(registry.decode(ProofKind::BadEncoding, &[0xff]).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProofRegistry {
    decoders: BTreeMap<ProofKind, DecodeFn>,
}

impl ProofRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in kind registered.
    pub fn with_defaults() -> Self {
        let mut decoders: BTreeMap<ProofKind, DecodeFn> = BTreeMap::new();
        decoders.insert(ProofKind::BadEncoding, BadEncodingProof::decode_shared);
        Self { decoders }
    }

    /// Register a decoder for `kind`.
    ///
    /// # Errors
    ///
    /// `DuplicateKind` if `kind` already has a decoder.
    pub fn register(&mut self, kind: ProofKind, decode: DecodeFn) -> Result<()> {
        if self.decoders.contains_key(&kind) {
            return Err(FraudError::DuplicateKind(kind));
        }
        self.decoders.insert(kind, decode);
        Ok(())
    }

    /// Decode `payload` as a proof of `kind`.
    ///
    /// # Errors
    ///
    /// - `UnknownKind` if nothing is registered for `kind`
    /// - `MalformedPayload` if the payload does not decode, or decodes to another kind
    pub fn decode(&self, kind: ProofKind, payload: &[u8]) -> Result<SharedProof> {
        let decode = self
            .decoders
            .get(&kind)
            .ok_or_else(|| FraudError::UnknownKind(kind.to_string()))?;

        let proof = decode(payload)?;
        if proof.kind() != kind {
            return Err(FraudError::MalformedPayload(format!(
                "decoder for {} produced a {} proof",
                kind,
                proof.kind()
            )));
        }
        Ok(proof)
    }

    /// Decode a payload whose kind arrives as a string, e.g. from a topic or request.
    pub fn decode_named(&self, kind: &str, payload: &[u8]) -> Result<SharedProof> {
        self.decode(kind.parse()?, payload)
    }

    /// Run the structural checks for a decoded proof.
    ///
    /// # Errors
    ///
    /// `UnknownKind` if the proof's kind is not registered, otherwise whatever
    /// the proof's own checks report.
    pub fn validate(&self, proof: &SharedProof) -> Result<()> {
        if !self.contains(proof.kind()) {
            return Err(FraudError::UnknownKind(proof.kind().to_string()));
        }
        proof.validate_basic()
    }

    /// Registered kinds, in a stable order.
    pub fn kinds(&self) -> Vec<ProofKind> {
        self.decoders.keys().copied().collect()
    }

    /// Whether `kind` has a decoder.
    pub fn contains(&self, kind: ProofKind) -> bool {
        self.decoders.contains_key(&kind)
    }
}
