//! Durable proof store backed by one append-only log per kind.
//!
//! Layout: `<dir>/<kind>.proofs`, a sequence of `[u32 LE length][payload]`
//! records where the payload is the proof's wire encoding. Each append is
//! synced before `put` returns. On open, logs are replayed through the
//! registry; a torn tail record is truncated away. A read-only open skips
//! the repair and refuses puts.

use fraud_core::{ProofDigest, ProofKind, ProofRegistry, SharedProof};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::{ProofIndex, ProofStore, PutOutcome};
use crate::error::{FraudP2pError, Result};

const LOG_EXTENSION: &str = "proofs";
const LEN_PREFIX: usize = 4;

struct LogFile {
    file: File,
    len: u64,
    /// Set when a failed append could not be rolled back.
    broken: bool,
}

#[derive(Default)]
struct Inner {
    index: ProofIndex,
    logs: HashMap<ProofKind, LogFile>,
}

/// Proof store that survives restarts.
pub struct FileStore {
    dir: PathBuf,
    read_only: bool,
    inner: Mutex<Inner>,
}

impl FileStore {
    /// Open (or create) a store in `dir`, replaying every registered kind's log.
    ///
    /// # Errors
    ///
    /// `Io` if the directory cannot be read or created; `Store` if a complete
    /// record fails to decode.
    pub fn open(dir: impl AsRef<Path>, registry: Arc<ProofRegistry>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut inner = Inner::default();
        for kind in registry.kinds() {
            let path = log_path(&dir, kind);
            if !path.exists() {
                continue;
            }
            let len = replay(&path, kind, &registry, &mut inner.index, true)?;
            let file = OpenOptions::new().append(true).open(&path)?;
            inner.logs.insert(
                kind,
                LogFile {
                    file,
                    len,
                    broken: false,
                },
            );
        }

        info!(dir = %dir.display(), "Opened proof store");
        Ok(Self {
            dir,
            read_only: false,
            inner: Mutex::new(inner),
        })
    }

    /// Open an existing store for inspection.
    ///
    /// Nothing on disk is created or changed: a torn tail is skipped, not
    /// truncated, and `put` fails.
    pub fn open_read_only(dir: impl AsRef<Path>, registry: Arc<ProofRegistry>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(FraudP2pError::Store(format!("{} is not a directory", dir.display())));
        }

        let mut inner = Inner::default();
        for kind in registry.kinds() {
            let path = log_path(&dir, kind);
            if path.exists() {
                replay(&path, kind, &registry, &mut inner.index, false)?;
            }
        }

        debug!(dir = %dir.display(), "Opened proof store read-only");
        Ok(Self {
            dir,
            read_only: true,
            inner: Mutex::new(inner),
        })
    }

    /// Directory holding the logs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| FraudP2pError::Store("store lock poisoned".into()))
    }
}

fn log_path(dir: &Path, kind: ProofKind) -> PathBuf {
    dir.join(format!("{}.{}", kind, LOG_EXTENSION))
}

/// Load every complete record of one log into `index`; returns the valid length.
///
/// With `repair`, a torn tail is truncated away.
fn replay(
    path: &Path,
    kind: ProofKind,
    registry: &ProofRegistry,
    index: &mut ProofIndex,
    repair: bool,
) -> Result<u64> {
    let data = fs::read(path)?;
    let mut pos = 0usize;

    while pos < data.len() {
        let Some(prefix) = data.get(pos..pos + LEN_PREFIX) else {
            break;
        };
        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(prefix);
        let len = u32::from_le_bytes(len_bytes) as usize;

        let start = pos + LEN_PREFIX;
        let Some(payload) = data.get(start..start + len) else {
            break;
        };

        let proof = registry.decode(kind, payload).map_err(|e| {
            FraudP2pError::Store(format!(
                "corrupt record at offset {} of {}: {}",
                pos,
                path.display(),
                e
            ))
        })?;
        let digest = ProofDigest::of(payload);
        index.insert(proof, digest);
        pos = start + len;
    }

    if pos < data.len() && repair {
        warn!(
            path = %path.display(),
            valid = pos,
            total = data.len(),
            "Truncating torn tail record"
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(pos as u64)?;
        file.sync_all()?;
    } else if pos < data.len() {
        warn!(
            path = %path.display(),
            valid = pos,
            total = data.len(),
            "Ignoring torn tail record"
        );
    }

    debug!(%kind, path = %path.display(), bytes = pos, "Replayed proof log");
    Ok(pos as u64)
}

impl ProofStore for FileStore {
    fn put(&self, proof: SharedProof) -> Result<PutOutcome> {
        if self.read_only {
            return Err(FraudP2pError::Store(format!(
                "{} is open read-only",
                self.dir.display()
            )));
        }
        let kind = proof.kind();
        let payload = proof.encode();
        let digest = ProofDigest::of(&payload);

        let mut inner = self.lock()?;
        if inner.index.contains(kind, &digest) {
            return Ok(PutOutcome::AlreadyPresent);
        }

        let len = u32::try_from(payload.len())
            .map_err(|_| FraudP2pError::Store(format!("proof of {} bytes too large", payload.len())))?;
        let mut record = Vec::with_capacity(LEN_PREFIX + payload.len());
        record.extend_from_slice(&len.to_le_bytes());
        record.extend_from_slice(&payload);

        if !inner.logs.contains_key(&kind) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path(&self.dir, kind))?;
            inner.logs.insert(
                kind,
                LogFile {
                    file,
                    len: 0,
                    broken: false,
                },
            );
        }
        let log = inner
            .logs
            .get_mut(&kind)
            .ok_or_else(|| FraudP2pError::Store(format!("no log for {}", kind)))?;
        if log.broken {
            return Err(FraudP2pError::Store(format!(
                "{} log may end in a partial record; reopen the store to repair it",
                kind
            )));
        }

        let written = log.file.write_all(&record).and_then(|_| log.file.sync_data());
        if let Err(e) = written {
            // Drop the partial record so later appends stay aligned.
            if let Err(rollback) = log.file.set_len(log.len) {
                warn!(%kind, error = %rollback, "Could not roll back failed append");
                log.broken = true;
            }
            return Err(e.into());
        }
        log.len += record.len() as u64;

        inner.index.insert(proof, digest);
        debug!(%kind, %digest, "Stored proof durably");
        Ok(PutOutcome::Accepted)
    }

    fn get(&self, kind: ProofKind) -> Result<Vec<SharedProof>> {
        Ok(self.lock()?.index.get(kind))
    }

    fn contains(&self, kind: ProofKind, digest: &ProofDigest) -> Result<bool> {
        Ok(self.lock()?.index.contains(kind, digest))
    }

    fn has(&self, kind: ProofKind) -> Result<bool> {
        Ok(self.lock()?.index.has(kind))
    }
}
