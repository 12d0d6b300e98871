use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Default bounded wait for lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Exclusive hold on one named resource. Dropping releases the lock.
pub struct ResourceGuard {
    _guard: ArcMutexGuard<RawMutex, ()>,
}

/// Named per-resource locks with a bounded wait.
///
/// Resources are keyed by path (a log file, a document, a record
/// container). Acquisition blocks up to the configured timeout, then fails
/// with [`StoreError::LockTimeout`] rather than hanging. Locks are
/// process-local: exactly one process is assumed to hold write ownership
/// of a storage root, and concurrent readers never take locks because
/// reads never mutate state.
///
/// Critical sections are short and bounded by construction; no operation
/// supports mid-flight cancellation.
pub struct LockTable {
    timeout: Duration,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl LockTable {
    /// Create a lock table with the given acquisition timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `resource`, waiting at most the configured
    /// timeout.
    pub fn acquire(&self, resource: &Path) -> StoreResult<ResourceGuard> {
        let lock = {
            let mut table = self.locks.lock();
            Arc::clone(table.entry(resource.to_path_buf()).or_default())
        };
        match lock.try_lock_arc_for(self.timeout) {
            Some(guard) => {
                debug!(resource = %resource.display(), "lock acquired");
                Ok(ResourceGuard { _guard: guard })
            }
            None => Err(StoreError::LockTimeout {
                resource: resource.display().to_string(),
            }),
        }
    }

    /// The configured acquisition timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}
