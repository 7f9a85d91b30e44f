//! Integration tests for the beacon store and its persistent mirror.

use parking_lot::Mutex;
use spore_beacon::{genesis_beacon, BeaconError, BeaconStore};
use spore_core::{BeaconMirror, StorageError, StorageResult};
use spore_types::{EpochId, Hash32};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct MemMirror {
    map: Mutex<HashMap<EpochId, Hash32>>,
    fail_reads: bool,
}

impl MemMirror {
    fn failing() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            fail_reads: true,
        }
    }
}

impl BeaconMirror for MemMirror {
    fn get(&self, epoch: EpochId) -> StorageResult<Option<Hash32>> {
        if self.fail_reads {
            return Err(StorageError::Internal("disk on fire".into()));
        }
        Ok(self.map.lock().get(&epoch).copied())
    }

    fn set(&self, epoch: EpochId, beacon: Hash32) -> StorageResult<()> {
        self.map.lock().insert(epoch, beacon);
        Ok(())
    }
}

#[test]
fn init_genesis_populates_memory_and_mirror() {
    let mirror = Arc::new(MemMirror::default());
    let store = BeaconStore::new(Some(mirror.clone()));
    store.init_genesis();

    assert_eq!(store.get(EpochId::new(1)), Ok(genesis_beacon()));
    assert_eq!(store.get(EpochId::new(2)), Ok(genesis_beacon()));
    assert_eq!(
        mirror.map.lock().get(&EpochId::new(0)),
        Some(&genesis_beacon())
    );
    assert_eq!(
        mirror.map.lock().get(&EpochId::new(1)),
        Some(&genesis_beacon())
    );
}

#[test]
fn mirror_is_consulted_before_memory() {
    let mirror = Arc::new(MemMirror::default());
    let store = BeaconStore::new(Some(mirror.clone()));

    // A value present only in the mirror (e.g. from a previous process run)
    // is served without the protocol having run in this process.
    let persisted = Hash32::sha256(b"from last run");
    mirror.set(EpochId::new(7), persisted).unwrap();

    assert_eq!(store.get(EpochId::new(8)), Ok(persisted));
}

#[test]
fn set_writes_through_to_the_mirror() {
    let mirror = Arc::new(MemMirror::default());
    let store = BeaconStore::new(Some(mirror.clone()));

    let beacon = Hash32::sha256(b"epoch nine");
    store.set(EpochId::new(9), beacon);

    assert_eq!(mirror.map.lock().get(&EpochId::new(9)), Some(&beacon));
    assert_eq!(store.get(EpochId::new(10)), Ok(beacon));
}

#[test]
fn mirror_read_failures_fall_through_to_memory() {
    let mirror = Arc::new(MemMirror::failing());
    let store = BeaconStore::new(Some(mirror));

    let beacon = Hash32::sha256(b"still here");
    store.set(EpochId::new(5), beacon);

    // The in-memory value remains authoritative when the mirror errors.
    assert_eq!(store.get(EpochId::new(6)), Ok(beacon));
    // Genesis lookups survive a broken mirror too.
    assert_eq!(store.get(EpochId::new(1)), Ok(genesis_beacon()));
}

#[test]
fn missing_epochs_report_not_calculated() {
    let store = BeaconStore::new(None);
    assert_eq!(store.get(EpochId::new(0)), Err(BeaconError::ZeroEpoch));
    assert_eq!(store.get(EpochId::new(42)), Err(BeaconError::NotCalculated));
}
