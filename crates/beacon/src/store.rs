//! Beacon storage: in-memory map with an optional persistent mirror.
//!
//! The in-memory map is authoritative within the process; the mirror only
//! adds durability across restarts. Each epoch's beacon is written at most
//! once, and `get` follows the protocol convention that the beacon *for*
//! epoch `E` is the one produced *during* `E - 1`.

use parking_lot::RwLock;
use spore_core::BeaconMirror;
use spore_types::{EpochId, Hash32, epoch::GENESIS_EPOCHS};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Errors returned by beacon lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BeaconError {
    /// Epoch zero has no previous epoch to look up.
    #[error("zero epoch provided")]
    ZeroEpoch,

    /// The protocol has not produced a beacon for the requested epoch.
    #[error("beacon is not calculated for this epoch")]
    NotCalculated,
}

/// The fixed beacon of the genesis epochs: `sha256("genesis")`.
pub fn genesis_beacon() -> Hash32 {
    Hash32::sha256(b"genesis")
}

/// In-memory beacon map with an optional persistent mirror.
pub struct BeaconStore {
    beacons: RwLock<HashMap<EpochId, Hash32>>,
    mirror: Option<Arc<dyn BeaconMirror>>,
}

impl BeaconStore {
    /// Create a store, optionally backed by a persistent mirror.
    pub fn new(mirror: Option<Arc<dyn BeaconMirror>>) -> Self {
        Self {
            beacons: RwLock::new(HashMap::new()),
            mirror,
        }
    }

    /// Record the fixed constant for every genesis epoch.
    ///
    /// Mirror failures are logged and do not abort; the in-memory map is
    /// authoritative within the process.
    pub fn init_genesis(&self) {
        let genesis = genesis_beacon();
        let mut beacons = self.beacons.write();
        for epoch in 0..GENESIS_EPOCHS {
            let epoch = EpochId::new(epoch);
            beacons.insert(epoch, genesis);
            if let Some(mirror) = &self.mirror {
                if let Err(e) = mirror.set(epoch, genesis) {
                    error!(%epoch, beacon = %genesis, error = %e, "failed to mirror genesis beacon");
                }
            }
        }
    }

    /// Record the beacon produced during an epoch.
    ///
    /// Writing a different value for an epoch that already has one is an
    /// invariant violation and panics; re-writing the same value is a no-op.
    pub fn set(&self, epoch: EpochId, beacon: Hash32) {
        {
            let mut beacons = self.beacons.write();
            if let Some(existing) = beacons.get(&epoch) {
                if *existing != beacon {
                    error!(%epoch, existing = %existing, new = %beacon, "conflicting beacon write");
                    panic!("beacon for epoch {epoch} written twice with different values");
                }
                return;
            }
            beacons.insert(epoch, beacon);
        }
        debug!(%epoch, beacon = %beacon, "recorded beacon");

        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.set(epoch, beacon) {
                error!(%epoch, beacon = %beacon, error = %e, "failed to mirror beacon");
            }
        }
    }

    /// Look up the beacon for `target_epoch`, i.e. the one produced during
    /// `target_epoch - 1`.
    ///
    /// The mirror is consulted first, then the genesis range, then the
    /// in-memory map. Mirror failures are logged and the lookup falls
    /// through to memory.
    pub fn get(&self, target_epoch: EpochId) -> Result<Hash32, BeaconError> {
        let beacon_epoch = target_epoch.prev().ok_or(BeaconError::ZeroEpoch)?;

        if let Some(mirror) = &self.mirror {
            match mirror.get(beacon_epoch) {
                Ok(Some(beacon)) => return Ok(beacon),
                Ok(None) => {}
                Err(e) => {
                    error!(epoch = %beacon_epoch, error = %e, "failed to read beacon mirror");
                }
            }
        }

        if beacon_epoch.is_genesis() {
            return Ok(genesis_beacon());
        }

        match self.beacons.read().get(&beacon_epoch) {
            Some(beacon) => Ok(*beacon),
            None => {
                debug!(
                    target_epoch = %target_epoch,
                    beacon_epoch = %beacon_epoch,
                    "beacon is not calculated"
                );
                Err(BeaconError::NotCalculated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_constant_value() {
        assert_eq!(
            genesis_beacon().to_hex(),
            "0xaeebad4a796fcc2e15dc4c6061b45ed9b373f26adfc798ca7d2d8cc58182718e"
        );
    }

    #[test]
    fn zero_epoch_is_an_error() {
        let store = BeaconStore::new(None);
        assert_eq!(store.get(EpochId::new(0)), Err(BeaconError::ZeroEpoch));
    }

    #[test]
    fn get_returns_previous_epoch_beacon() {
        let store = BeaconStore::new(None);
        let beacon = Hash32::sha256(b"epoch five");
        store.set(EpochId::new(5), beacon);

        assert_eq!(store.get(EpochId::new(6)), Ok(beacon));
        assert_eq!(store.get(EpochId::new(5)), Err(BeaconError::NotCalculated));
    }

    #[test]
    fn genesis_range_passes_through() {
        let store = BeaconStore::new(None);
        // target 1 and 2 look up epochs 0 and 1, both genesis
        assert_eq!(store.get(EpochId::new(1)), Ok(genesis_beacon()));
        assert_eq!(store.get(EpochId::new(2)), Ok(genesis_beacon()));
        assert_eq!(store.get(EpochId::new(3)), Err(BeaconError::NotCalculated));
    }

    #[test]
    fn idempotent_rewrite_is_allowed() {
        let store = BeaconStore::new(None);
        let beacon = Hash32::sha256(b"same");
        store.set(EpochId::new(4), beacon);
        store.set(EpochId::new(4), beacon);
        assert_eq!(store.get(EpochId::new(5)), Ok(beacon));
    }

    #[test]
    #[should_panic(expected = "written twice")]
    fn conflicting_write_panics() {
        let store = BeaconStore::new(None);
        store.set(EpochId::new(4), Hash32::sha256(b"one"));
        store.set(EpochId::new(4), Hash32::sha256(b"two"));
    }
}
