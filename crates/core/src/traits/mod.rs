//! Capability trait definitions.
//!
//! Each submodule defines the contract for one external collaborator of the
//! beacon engine. The engine holds these as trait objects and never depends
//! on concrete node components.

pub mod activation;
pub mod clock;
pub mod coin;
pub mod crypto;
pub mod storage;
pub mod sync;
pub mod transport;

pub use activation::{ActivationDb, ActivationError, ActivationResult};
pub use clock::LayerClock;
pub use coin::{CoinError, UnitAllowances, WeakCoin};
pub use crypto::{
    CryptoError, CryptoResult, PublicKey, Signature, Signer, VerifyExtractor, VrfSigner,
    VrfVerifier,
};
pub use storage::{BeaconMirror, StorageError, StorageResult};
pub use sync::SyncState;
pub use transport::{Broadcaster, TransportError, TransportResult};
