//! Erasure extension of data squares.
//!
//! A `k × k` square of equal-length shares is extended to `2k × 2k` with a
//! systematic Cauchy code over GF(2^8). Parity share `j` of a row or column is
//! `Σ_i c(j, i) · share_i` where `c(j, i) = 1 / ((k + j) ⊕ i)`.
//!
//! Extension is linear, so extending rows then columns yields the same
//! bottom-right quadrant as extending columns then rows.

use crate::error::{FraudError, Result};
use crate::tree::ShareTree;

/// Largest original width the field supports (`2k` evaluation points must fit in a byte).
pub const MAX_ORIGINAL_WIDTH: usize = 128;

/// Reduction polynomial `x^8 + x^4 + x^3 + x^2 + 1`, without the top bit.
const GF_POLY: u8 = 0x1d;

/// Multiply two field elements.
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= GF_POLY;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse, `a^254`. `a` must be non-zero.
fn gf_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp > 0 {
        if exp & 1 == 1 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

/// Cauchy coefficient for parity `j` over original share `i` with width `k`.
fn coefficient(k: usize, j: usize, i: usize) -> u8 {
    // k + j >= k > i, so the XOR is never zero.
    gf_inv(((k + j) as u8) ^ (i as u8))
}

/// Compute the `k` parity shares for `k` original shares.
///
/// # Errors
///
/// `InvalidSquare` if there are no shares, more than [`MAX_ORIGINAL_WIDTH`],
/// or the shares differ in length.
pub fn extend_shares<S: AsRef<[u8]>>(original: &[S]) -> Result<Vec<Vec<u8>>> {
    let k = original.len();
    if k == 0 || k > MAX_ORIGINAL_WIDTH {
        return Err(FraudError::InvalidSquare(format!(
            "width {} outside 1..={}",
            k, MAX_ORIGINAL_WIDTH
        )));
    }

    let share_len = original[0].as_ref().len();
    if original.iter().any(|s| s.as_ref().len() != share_len) {
        return Err(FraudError::InvalidSquare("shares differ in length".into()));
    }

    let parity = (0..k)
        .map(|j| {
            let mut out = vec![0u8; share_len];
            for (i, share) in original.iter().enumerate() {
                let c = coefficient(k, j, i);
                for (o, b) in out.iter_mut().zip(share.as_ref()) {
                    *o ^= gf_mul(c, *b);
                }
            }
            out
        })
        .collect();

    Ok(parity)
}

/// Row or column of a square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// A row of the square
    Row,
    /// A column of the square
    Column,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Row => f.write_str("row"),
            Self::Column => f.write_str("column"),
        }
    }
}

/// An erasure-extended `2k × 2k` data square, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedSquare {
    width: usize,
    shares: Vec<Vec<u8>>,
}

impl ExtendedSquare {
    /// Extend a `k × k` original square given as `k * k` row-major shares.
    pub fn from_original(shares: Vec<Vec<u8>>) -> Result<Self> {
        let k = (shares.len() as f64).sqrt() as usize;
        if k == 0 || k * k != shares.len() {
            return Err(FraudError::InvalidSquare(format!(
                "{} shares do not form a square",
                shares.len()
            )));
        }

        let width = 2 * k;
        let mut grid: Vec<Vec<Vec<u8>>> = vec![Vec::with_capacity(width); width];

        // Q0 -> Q1: extend the original rows.
        for (r, row) in shares.chunks(k).enumerate() {
            let parity = extend_shares(row)?;
            grid[r].extend(row.iter().cloned());
            grid[r].extend(parity);
        }

        // Q0|Q1 -> Q2|Q3: extend every column of the top half.
        for c in 0..width {
            let column: Vec<&[u8]> = (0..k).map(|r| grid[r][c].as_slice()).collect();
            let parity = extend_shares(&column)?;
            for (j, share) in parity.into_iter().enumerate() {
                grid[k + j].push(share);
            }
        }

        Ok(Self {
            width,
            shares: grid.into_iter().flatten().collect(),
        })
    }

    /// Width of the extended square (`2k`).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Width of the original square (`k`).
    pub fn original_width(&self) -> usize {
        self.width / 2
    }

    /// Share at `(row, col)`.
    pub fn share(&self, row: usize, col: usize) -> Option<&[u8]> {
        if row >= self.width || col >= self.width {
            return None;
        }
        self.shares.get(row * self.width + col).map(Vec::as_slice)
    }

    /// Mutable share at `(row, col)`. Used to build faulty squares.
    pub fn share_mut(&mut self, row: usize, col: usize) -> Option<&mut Vec<u8>> {
        if row >= self.width || col >= self.width {
            return None;
        }
        self.shares.get_mut(row * self.width + col)
    }

    /// All shares along `axis` at `index`.
    pub fn axis(&self, axis: Axis, index: usize) -> Option<Vec<&[u8]>> {
        if index >= self.width {
            return None;
        }
        let line = (0..self.width)
            .filter_map(|i| match axis {
                Axis::Row => self.share(index, i),
                Axis::Column => self.share(i, index),
            })
            .collect();
        Some(line)
    }

    /// Roots of every line along `axis`, as committed by the square's current contents.
    pub fn roots(&self, axis: Axis) -> Vec<[u8; 32]> {
        (0..self.width)
            .filter_map(|i| self.axis(axis, i))
            .map(|line| ShareTree::new(&line).root())
            .collect()
    }
}
