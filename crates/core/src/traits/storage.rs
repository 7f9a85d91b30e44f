//! Persistent beacon mirror trait.

use spore_types::{EpochId, Hash32};
use thiserror::Error;

/// Errors returned by the persistent beacon store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The underlying store failed.
    #[error("storage error: {0}")]
    Internal(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Optional persistent mirror of computed beacons.
///
/// The in-memory beacon map is authoritative within the process; the mirror
/// only adds durability across restarts. Mirror failures are logged and
/// never abort the protocol.
pub trait BeaconMirror: Send + Sync {
    /// Read the beacon recorded for an epoch, if any.
    fn get(&self, epoch: EpochId) -> StorageResult<Option<Hash32>>;

    /// Record the beacon for an epoch.
    fn set(&self, epoch: EpochId, beacon: Hash32) -> StorageResult<()>;
}
