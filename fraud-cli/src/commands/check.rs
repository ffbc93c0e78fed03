//! Check command: the restart check a node runs before resuming.

use clap::Args;
use fraud_core::ProofRegistry;
use fraud_p2p::{check_store, FraudConfig, FraudP2pError, ProofStore};
use std::path::PathBuf;

use super::EXIT_ALREADY_PROVEN;
use crate::config;
use crate::output;

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Proof store directory (defaults to store_path from the config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,
}

/// Run the check command.
///
/// Exits `2` if any kind has a stored proof.
pub fn run(args: CheckArgs, config: &FraudConfig) -> i32 {
    let (dir, store) = match config::open_store(args.store.as_deref(), config) {
        Ok(opened) => opened,
        Err(e) => {
            output::error(&e);
            return 1;
        }
    };

    match check_store(&ProofRegistry::with_defaults(), &store) {
        Ok(()) => {
            output::success(&format!("No fraud proofs in {}", dir.display()));
            0
        }
        Err(err @ FraudP2pError::AlreadyProven { kind, height, .. }) => {
            output::error(&err.to_string());
            output::ekv("Store", &dir.display().to_string());
            if let Ok(proofs) = store.get(kind) {
                output::ekv("Proofs", &proofs.len().to_string());
            }
            tracing::warn!(%kind, height, "Node must not resume");
            EXIT_ALREADY_PROVEN
        }
        Err(e) => {
            output::error(&format!("Failed to read {}: {}", dir.display(), e));
            1
        }
    }
}
