use std::time::Duration;

use memvault_store::{container, DEFAULT_LOCK_TIMEOUT};

/// Tunables for a vault. `Default` matches production use.
#[derive(Clone, Debug)]
pub struct VaultConfig {
    /// Bounded wait for per-resource lock acquisition.
    pub lock_timeout: Duration,
    /// zstd level for record containers.
    pub compression_level: i32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            compression_level: container::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl VaultConfig {
    /// Override the lock acquisition timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Override the container compression level.
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }
}
