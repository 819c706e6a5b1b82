//! Per-document serialization
//!
//! The ledger only rejects redeliveries of the same transaction. Two distinct
//! transactions for one document can still arrive together, and since the
//! final patch replaces the whole track list the later patch would drop the
//! earlier one's durations. Holding a per-document lock across
//! extraction-and-patch serializes them; different documents run in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-document async locks
///
/// Entries exist only while some task holds or waits on them.
#[derive(Clone, Default)]
pub struct DocumentLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document_id`
    pub async fn acquire(&self, document_id: &str) -> DocumentGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(document_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = lock.lock_owned().await;

        DocumentGuard {
            guard: Some(guard),
            document_id: document_id.to_string(),
            registry: self.inner.clone(),
        }
    }

    /// Documents currently locked or awaited
    pub fn active(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Exclusive access to one document; released on drop
pub struct DocumentGuard {
    guard: Option<OwnedMutexGuard<()>>,
    document_id: String,
    registry: Arc<Mutex<LockMap>>,
}

impl DocumentGuard {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        // Release the async lock before inspecting the registry so the
        // strong count reflects only the map entry and any waiters.
        self.guard.take();

        let mut map = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = map.get(&self.document_id) {
            if Arc::strong_count(lock) == 1 {
                map.remove(&self.document_id);
            }
        }
    }
}
