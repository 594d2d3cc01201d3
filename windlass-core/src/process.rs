//! Process-wide configuration, set once before any worker starts.
//!
//! Workers read these values at construction time. Setting a value after
//! the first read is an error, which keeps every worker in the process
//! seeing the same configuration.

use std::sync::OnceLock;
use thiserror::Error;

/// Default bound on the sticky execution cache.
pub const DEFAULT_STICKY_CACHE_SIZE: usize = 10_000;

static STICKY_CACHE_SIZE: OnceLock<usize> = OnceLock::new();
static BINARY_CHECKSUM: OnceLock<String> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessConfigError {
    #[error("sticky workflow cache size was already set or read")]
    StickyCacheSizeAlreadySet,
    #[error("binary checksum was already set or read")]
    BinaryChecksumAlreadySet,
}

/// Set the bound of the shared sticky execution cache. Must be called
/// before any worker starts.
pub fn set_sticky_workflow_cache_size(size: usize) -> Result<(), ProcessConfigError> {
    STICKY_CACHE_SIZE
        .set(size)
        .map_err(|_| ProcessConfigError::StickyCacheSizeAlreadySet)
}

/// Current sticky cache bound. Pins the default on first read.
pub fn sticky_workflow_cache_size() -> usize {
    *STICKY_CACHE_SIZE.get_or_init(|| DEFAULT_STICKY_CACHE_SIZE)
}

/// Identify this binary for reset-point tracking. Must be called before
/// any worker starts.
pub fn set_binary_checksum(checksum: impl Into<String>) -> Result<(), ProcessConfigError> {
    BINARY_CHECKSUM
        .set(checksum.into())
        .map_err(|_| ProcessConfigError::BinaryChecksumAlreadySet)
}

/// The configured binary checksum, empty when never set.
pub fn binary_checksum() -> String {
    BINARY_CHECKSUM.get_or_init(String::new).clone()
}
