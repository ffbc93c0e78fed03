//! CLI command implementations.

pub mod check;
pub mod kinds;
pub mod proofs;

/// Process exit code when fraud is already proven.
pub const EXIT_ALREADY_PROVEN: i32 = 2;
