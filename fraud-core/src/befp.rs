//! Bad-encoding fraud proofs.
//!
//! A bad-encoding proof accuses one row or column of a block's extended data
//! square of not being the erasure extension of its own first half. It carries
//! that first half, each share with an inclusion proof against the committed
//! root. Anyone holding the header can re-extend the half, rebuild the root
//! and see that it differs from the commitment.

use bincode::Options;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::codec::{extend_shares, Axis, ExtendedSquare, MAX_ORIGINAL_WIDTH};
use crate::error::{FraudError, Result};
use crate::fraud::{FraudProof, SharedProof};
use crate::header::ExtendedHeader;
use crate::kind::ProofKind;
use crate::proof::InclusionProof;
use crate::tree::{tree_depth, ShareTree};

/// Upper bound on an encoded proof, checked while decoding.
pub const MAX_PROOF_BYTES: u64 = 4 * 1024 * 1024;

/// A share together with its inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareWithProof {
    /// Raw share bytes
    pub share: Vec<u8>,
    /// Inclusion proof against the committed axis root
    pub proof: InclusionProof,
}

/// Proof that a row or column of the square at `height` is badly encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadEncodingProof {
    /// Accused block height
    pub height: u64,
    /// Whether `index` names a row or a column
    pub axis: Axis,
    /// Row or column index in the extended square
    pub index: u32,
    /// First half of the accused line, in order
    pub shares: Vec<ShareWithProof>,
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

fn decode_options() -> impl Options {
    wire_options().with_limit(MAX_PROOF_BYTES)
}

impl BadEncodingProof {
    /// Build a proof for the line along `axis` at `index` of `square`.
    ///
    /// The inclusion proofs open against the roots `square` currently commits to,
    /// so the caller is expected to pass the square as published.
    pub fn new(height: u64, square: &ExtendedSquare, axis: Axis, index: usize) -> Result<Self> {
        let line = square.axis(axis, index).ok_or_else(|| {
            FraudError::InvalidSquare(format!(
                "{} {} outside square of width {}",
                axis,
                index,
                square.width()
            ))
        })?;

        let tree = ShareTree::new(&line);
        let half = square.original_width();

        let shares = line[..half]
            .iter()
            .enumerate()
            .map(|(i, share)| {
                let proof = tree.prove(i).ok_or_else(|| {
                    FraudError::InvalidSquare(format!("no inclusion proof for share {}", i))
                })?;
                Ok(ShareWithProof {
                    share: share.to_vec(),
                    proof,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let proof = Self {
            height,
            axis,
            index: index as u32,
            shares,
        };
        proof.check_size()?;
        Ok(proof)
    }

    /// Scan `square` for a line that is not the extension of its first half.
    ///
    /// Rows are checked before columns. Returns `Ok(None)` for a correctly
    /// encoded square.
    pub fn detect(height: u64, square: &ExtendedSquare) -> Result<Option<Self>> {
        let half = square.original_width();

        for axis in [Axis::Row, Axis::Column] {
            for index in 0..square.width() {
                let Some(line) = square.axis(axis, index) else {
                    continue;
                };
                let parity = extend_shares(&line[..half])?;
                let matches = parity
                    .iter()
                    .zip(&line[half..])
                    .all(|(expected, actual)| expected.as_slice() == *actual);
                if !matches {
                    return Self::new(height, square, axis, index).map(Some);
                }
            }
        }

        Ok(None)
    }

    /// Decode a proof from its wire encoding.
    ///
    /// # Errors
    ///
    /// Returns `FraudError::MalformedPayload` if the data is malformed or too large.
    pub fn decode(data: &[u8]) -> Result<Self> {
        decode_options()
            .deserialize(data)
            .map_err(|e| FraudError::MalformedPayload(e.to_string()))
    }

    /// Registry decoder for [`ProofKind::BadEncoding`].
    pub fn decode_shared(data: &[u8]) -> Result<SharedProof> {
        Ok(Arc::new(Self::decode(data)?))
    }

    /// Size of the wire encoding in bytes.
    pub fn encoded_len(&self) -> Result<u64> {
        wire_options()
            .serialized_size(self)
            .map_err(|e| FraudError::MalformedPayload(e.to_string()))
    }

    /// Every proof that passes this check can be decoded again by its peers.
    fn check_size(&self) -> Result<()> {
        let size = self.encoded_len()?;
        if size > MAX_PROOF_BYTES {
            return Err(FraudError::MalformedPayload(format!(
                "encoded proof is {} bytes, limit is {}",
                size, MAX_PROOF_BYTES
            )));
        }
        Ok(())
    }

    fn witness_error(&self, msg: impl Into<String>) -> FraudError {
        FraudError::InvalidWitness(format!(
            "{} {} at height {}: {}",
            self.axis,
            self.index,
            self.height,
            msg.into()
        ))
    }
}

impl FraudProof for BadEncodingProof {
    fn kind(&self) -> ProofKind {
        ProofKind::BadEncoding
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn encode(&self) -> Vec<u8> {
        // Unbounded options: serialising plain integers and byte vectors cannot fail.
        wire_options().serialize(self).unwrap_or_default()
    }

    fn validate_basic(&self) -> Result<()> {
        if self.shares.is_empty() {
            return Err(FraudError::MalformedPayload("proof carries no shares".into()));
        }
        if self.shares.len() > MAX_ORIGINAL_WIDTH {
            return Err(FraudError::MalformedPayload(format!(
                "{} shares exceed the maximum of {}",
                self.shares.len(),
                MAX_ORIGINAL_WIDTH
            )));
        }
        if self.index as usize >= 2 * MAX_ORIGINAL_WIDTH {
            return Err(FraudError::MalformedPayload(format!(
                "index {} outside any supported square",
                self.index
            )));
        }

        let share_len = self.shares[0].share.len();
        if share_len == 0 {
            return Err(FraudError::MalformedPayload("empty share".into()));
        }

        for (i, item) in self.shares.iter().enumerate() {
            if item.share.len() != share_len {
                return Err(FraudError::MalformedPayload(format!(
                    "share {} has length {}, expected {}",
                    i,
                    item.share.len(),
                    share_len
                )));
            }
            if item.proof.index as usize != i {
                return Err(FraudError::MalformedPayload(format!(
                    "share {} carries a proof for leaf {}",
                    i, item.proof.index
                )));
            }
        }

        self.check_size()
    }

    fn verify(&self, header: &ExtendedHeader) -> Result<()> {
        if header.height != self.height {
            return Err(self.witness_error(format!("header is for height {}", header.height)));
        }
        header
            .dah
            .validate_basic()
            .map_err(|e| self.witness_error(e.to_string()))?;

        let width = header.dah.square_width();
        let root = header
            .dah
            .root(self.axis, self.index as usize)
            .ok_or_else(|| self.witness_error(format!("outside square of width {}", width)))?;

        if self.shares.len() * 2 != width {
            return Err(self.witness_error(format!(
                "{} shares for a square of width {}",
                self.shares.len(),
                width
            )));
        }

        let depth = tree_depth(width);
        for (i, item) in self.shares.iter().enumerate() {
            if item.proof.depth() != depth || !item.proof.verify(&item.share, &root) {
                return Err(self.witness_error(format!("share {} does not open against the root", i)));
            }
        }

        let original: Vec<&[u8]> = self.shares.iter().map(|s| s.share.as_slice()).collect();
        let parity = extend_shares(&original)
            .map_err(|e| FraudError::MalformedPayload(e.to_string()))?;

        let mut line = original;
        line.extend(parity.iter().map(Vec::as_slice));

        if ShareTree::new(&line).root() == root {
            return Err(FraudError::FalseAccusation {
                kind: self.kind(),
                height: self.height,
            });
        }

        Ok(())
    }
}
