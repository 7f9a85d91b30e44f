//! Layer clock trait.

use spore_types::LayerId;
use std::time::SystemTime;
use tokio::sync::mpsc;

/// The node's layer tick source.
///
/// The beacon engine subscribes once at start and reacts to the first layer
/// of every epoch. Dropping the returned receiver unsubscribes.
pub trait LayerClock: Send + Sync {
    /// Subscribe to layer ticks.
    fn subscribe(&self) -> mpsc::Receiver<LayerId>;

    /// The wall-clock time at which a layer starts.
    fn layer_to_time(&self, layer: LayerId) -> SystemTime;
}
