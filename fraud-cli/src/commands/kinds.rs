//! Kinds command implementation.

use colored::Colorize;
use fraud_core::ProofRegistry;

use crate::output;

/// Run the kinds command.
pub fn run() -> i32 {
    let registry = ProofRegistry::with_defaults();

    output::header("Registered Proof Kinds");

    println!();
    println!("{:<14} {}", "Kind".bold(), "Gossip topic".bold());
    println!("{}", "─".repeat(44).dimmed());

    for kind in registry.kinds() {
        println!("{:<14} {}", kind.to_string().green().bold(), kind.topic().dimmed());
    }

    println!();
    output::hint("Inspect a store with: fraud proofs --store <DIR>");

    0
}
