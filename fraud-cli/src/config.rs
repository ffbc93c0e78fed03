//! Config file handling and store resolution.

use fraud_core::ProofRegistry;
use fraud_p2p::{FileStore, FraudConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Load the config at `path`, or the defaults when none is given.
pub fn load(path: Option<&Path>) -> Result<FraudConfig, String> {
    match path {
        Some(path) => FraudConfig::load(path)
            .map_err(|e| format!("Failed to load config {}: {}", path.display(), e)),
        None => Ok(FraudConfig::default()),
    }
}

/// Open the store named on the command line, falling back to the config.
///
/// The directory must already exist. The store is opened read-only, so
/// inspecting never creates or repairs anything.
pub fn open_store(arg: Option<&Path>, config: &FraudConfig) -> Result<(PathBuf, FileStore), String> {
    let dir = arg
        .map(Path::to_path_buf)
        .or_else(|| config.store_path.clone())
        .ok_or_else(|| "No store given: pass --store or set store_path in the config".to_string())?;

    if !dir.is_dir() {
        return Err(format!("Store directory not found: {}", dir.display()));
    }

    let registry = Arc::new(ProofRegistry::with_defaults());
    let store = FileStore::open_read_only(&dir, registry)
        .map_err(|e| format!("Failed to open store {}: {}", dir.display(), e))?;
    Ok((dir, store))
}
