//! The Header Provider port.
//!
//! Verification needs the extended header at the accused height. Headers come
//! from the node's header service, which may not have reached that height yet,
//! so a provider is allowed to wait; the verifier bounds the wait.

use async_trait::async_trait;
use fraud_core::ExtendedHeader;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tokio::sync::Notify;

use crate::error::HeaderError;

/// Source of extended headers by height.
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    /// Fetch the header at `height`, waiting for it if the provider can.
    async fn get_by_height(&self, height: u64) -> Result<ExtendedHeader, HeaderError>;
}

/// In-process header store.
///
/// `get_by_height` parks until the height is inserted, which mirrors a header
/// service that is still syncing.
///
/// # Example
///
/// ```rust
/// use fraud_core::{ExtendedHeader, ExtendedSquare};
/// use fraud_verifier::{HeaderProvider, MemoryHeaderStore};
///
/// #[tokio::main]
/// async fn main() {
///     let shares = (0u8..4).map(|i| vec![i; 8]).collect();
///     let square = ExtendedSquare::from_original(shares).unwrap();
///
///     let headers = MemoryHeaderStore::new();
///     headers.insert(ExtendedHeader::from_square(20, &square));
///     assert_eq!(headers.get_by_height(20).await.unwrap().height, 20);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MemoryHeaderStore {
    headers: RwLock<BTreeMap<u64, ExtendedHeader>>,
    inserted: Notify,
}

impl MemoryHeaderStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the header at its height and wake waiting readers.
    pub fn insert(&self, header: ExtendedHeader) {
        if let Ok(mut headers) = self.headers.write() {
            headers.insert(header.height, header);
        }
        self.inserted.notify_waiters();
    }

    /// Header at `height`, if present now.
    pub fn get(&self, height: u64) -> Option<ExtendedHeader> {
        self.headers
            .read()
            .ok()
            .and_then(|headers| headers.get(&height).cloned())
    }

    /// Highest stored height.
    pub fn head(&self) -> Option<u64> {
        self.headers
            .read()
            .ok()
            .and_then(|headers| headers.keys().next_back().copied())
    }
}

#[async_trait]
impl HeaderProvider for MemoryHeaderStore {
    async fn get_by_height(&self, height: u64) -> Result<ExtendedHeader, HeaderError> {
        loop {
            // Register interest before checking, so an insert in between is not missed.
            let inserted = self.inserted.notified();
            if let Some(header) = self.get(height) {
                return Ok(header);
            }
            inserted.await;
        }
    }
}
