//! Extended headers and data availability headers.
//!
//! A block's extended header commits to the row and column roots of its
//! erasure-extended data square. Fraud proofs are checked against these roots.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::{Axis, ExtendedSquare};
use crate::error::{FraudError, Result};

/// Row and column roots of an extended data square.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAvailabilityHeader {
    /// One root per row of the extended square
    pub row_roots: Vec<[u8; 32]>,
    /// One root per column of the extended square
    pub column_roots: Vec<[u8; 32]>,
}

impl DataAvailabilityHeader {
    /// Compute the header for a square as it currently is.
    pub fn from_square(square: &ExtendedSquare) -> Self {
        Self {
            row_roots: square.roots(Axis::Row),
            column_roots: square.roots(Axis::Column),
        }
    }

    /// Width of the extended square this header commits to.
    pub fn square_width(&self) -> usize {
        self.row_roots.len()
    }

    /// Committed root of the line along `axis` at `index`.
    pub fn root(&self, axis: Axis, index: usize) -> Option<[u8; 32]> {
        match axis {
            Axis::Row => self.row_roots.get(index).copied(),
            Axis::Column => self.column_roots.get(index).copied(),
        }
    }

    /// Commitment over all roots: `SHA256(rows || columns)`.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for root in self.row_roots.iter().chain(self.column_roots.iter()) {
            hasher.update(root);
        }
        hasher.finalize().into()
    }

    /// Check the header describes an even, square layout.
    pub fn validate_basic(&self) -> Result<()> {
        let width = self.row_roots.len();
        if width == 0 || width % 2 != 0 {
            return Err(FraudError::InvalidSquare(format!(
                "extended width {} is not a positive even number",
                width
            )));
        }
        if self.column_roots.len() != width {
            return Err(FraudError::InvalidSquare(format!(
                "{} row roots but {} column roots",
                width,
                self.column_roots.len()
            )));
        }
        Ok(())
    }
}

/// A block header extended with its data availability commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedHeader {
    /// Block height
    pub height: u64,
    /// Row and column roots
    pub dah: DataAvailabilityHeader,
    /// Commitment to `dah`, as carried by the raw header
    pub data_hash: [u8; 32],
}

impl ExtendedHeader {
    /// Build a header committing to `dah`.
    pub fn new(height: u64, dah: DataAvailabilityHeader) -> Self {
        let data_hash = dah.hash();
        Self {
            height,
            dah,
            data_hash,
        }
    }

    /// Build a header committing to the current contents of `square`.
    pub fn from_square(height: u64, square: &ExtendedSquare) -> Self {
        Self::new(height, DataAvailabilityHeader::from_square(square))
    }

    /// Check that the raw header's data hash matches the roots.
    pub fn validate(&self) -> Result<()> {
        self.dah.validate_basic()?;
        if self.dah.hash() != self.data_hash {
            return Err(FraudError::InvalidSquare(format!(
                "data hash mismatch at height {}",
                self.height
            )));
        }
        Ok(())
    }
}
