//! Proofs command implementation.

use clap::Args;
use colored::Colorize;
use fraud_core::{ProofKind, ProofRegistry, SharedProof};
use fraud_p2p::{FraudConfig, ProofStore};
use serde::Serialize;
use std::path::PathBuf;

use crate::config;
use crate::output;

/// Arguments for the proofs command.
#[derive(Args)]
pub struct ProofsArgs {
    /// Proof store directory (defaults to store_path from the config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Only list proofs of this kind (e.g., badencoding)
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// One stored proof, as printed.
#[derive(Serialize)]
struct ProofEntry {
    kind: String,
    height: u64,
    digest: String,
    size_bytes: usize,
}

impl From<&SharedProof> for ProofEntry {
    fn from(proof: &SharedProof) -> Self {
        Self {
            kind: proof.kind().to_string(),
            height: proof.height(),
            digest: proof.digest().to_hex(),
            size_bytes: proof.encode().len(),
        }
    }
}

/// Run the proofs command.
pub fn run(args: ProofsArgs, config: &FraudConfig) -> i32 {
    let kinds = match &args.kind {
        Some(name) => match name.parse::<ProofKind>() {
            Ok(kind) => vec![kind],
            Err(_) => {
                output::error(&format!("Proof kind '{}' not supported.", name));
                output::info("Run `fraud kinds` for registered kinds.");
                return 1;
            }
        },
        None => ProofRegistry::with_defaults().kinds(),
    };

    let (dir, store) = match config::open_store(args.store.as_deref(), config) {
        Ok(opened) => opened,
        Err(e) => {
            output::error(&e);
            return 1;
        }
    };

    let mut entries = Vec::new();
    for kind in kinds {
        match store.get(kind) {
            Ok(proofs) => entries.extend(proofs.iter().map(ProofEntry::from)),
            Err(e) => {
                output::error(&format!("Failed to read {} proofs: {}", kind, e));
                return 1;
            }
        }
    }

    if args.json {
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                output::error(&format!("Failed to encode JSON: {}", e));
                return 1;
            }
        }
        return 0;
    }

    output::header(&format!("Proofs in {}", dir.display()));
    println!();
    if entries.is_empty() {
        output::info("No fraud proofs stored.");
        return 0;
    }

    println!(
        "{:<14} {:<10} {:<10} {}",
        "Kind".bold(),
        "Height".bold(),
        "Bytes".bold(),
        "Digest".bold()
    );
    println!("{}", "─".repeat(100).dimmed());
    for entry in &entries {
        println!(
            "{:<14} {:<10} {:<10} {}",
            entry.kind.red().bold(),
            entry.height,
            entry.size_bytes,
            entry.digest.dimmed()
        );
    }
    println!();

    0
}
