//! Protocol time units: epochs, layers, and voting rounds.
//!
//! The network clock ticks in layers; a fixed number of consecutive layers
//! forms an epoch. The beacon protocol runs once per epoch and its voting
//! phase is subdivided into rounds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bootstrap epochs during which the protocol does not run.
///
/// Epochs in the genesis range use a fixed beacon constant instead of the
/// protocol output.
pub const GENESIS_EPOCHS: u32 = 2;

/// Identifier of a voting round within an epoch. Round 0 is the proposal
/// phase; rounds `1..=K` are voting rounds.
pub type RoundId = u32;

/// Monotonically increasing epoch counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct EpochId(u32);

impl EpochId {
    /// Creates an epoch id from a raw counter value.
    #[inline]
    pub const fn new(epoch: u32) -> Self {
        Self(epoch)
    }

    /// Returns the raw counter value.
    #[inline]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Whether this epoch is in the genesis range.
    #[inline]
    pub const fn is_genesis(&self) -> bool {
        self.0 < GENESIS_EPOCHS
    }

    /// The preceding epoch. Returns `None` for epoch 0.
    pub fn prev(&self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    /// The following epoch.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// The first layer of this epoch given the network's layers-per-epoch.
    pub fn first_layer(&self, layers_per_epoch: u32) -> LayerId {
        LayerId(self.0 * layers_per_epoch)
    }
}

impl From<u32> for EpochId {
    fn from(epoch: u32) -> Self {
        Self(epoch)
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single layer, the smallest unit of the network clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct LayerId(u32);

impl LayerId {
    /// Creates a layer id from a raw counter value.
    #[inline]
    pub const fn new(layer: u32) -> Self {
        Self(layer)
    }

    /// Returns the raw counter value.
    #[inline]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// The epoch this layer belongs to.
    pub fn epoch(&self, layers_per_epoch: u32) -> EpochId {
        EpochId(self.0 / layers_per_epoch)
    }

    /// Whether this layer is the first layer of its epoch.
    pub fn first_in_epoch(&self, layers_per_epoch: u32) -> bool {
        self.0 % layers_per_epoch == 0
    }
}

impl From<u32> for LayerId {
    fn from(layer: u32) -> Self {
        Self(layer)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_range() {
        assert!(EpochId::new(0).is_genesis());
        assert!(EpochId::new(1).is_genesis());
        assert!(!EpochId::new(2).is_genesis());
    }

    #[test]
    fn layer_to_epoch() {
        assert_eq!(LayerId::new(0).epoch(4), EpochId::new(0));
        assert_eq!(LayerId::new(3).epoch(4), EpochId::new(0));
        assert_eq!(LayerId::new(4).epoch(4), EpochId::new(1));
        assert_eq!(LayerId::new(11).epoch(4), EpochId::new(2));
    }

    #[test]
    fn first_in_epoch() {
        assert!(LayerId::new(0).first_in_epoch(4));
        assert!(!LayerId::new(1).first_in_epoch(4));
        assert!(LayerId::new(8).first_in_epoch(4));
    }

    #[test]
    fn epoch_navigation() {
        assert_eq!(EpochId::new(0).prev(), None);
        assert_eq!(EpochId::new(3).prev(), Some(EpochId::new(2)));
        assert_eq!(EpochId::new(3).next(), EpochId::new(4));
        assert_eq!(EpochId::new(2).first_layer(4), LayerId::new(8));
    }
}
