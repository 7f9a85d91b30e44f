//! # Spore Core - Capability Abstractions
//!
//! This crate provides the capability traits through which the beacon engine
//! reaches the rest of the node. It defines interfaces for:
//!
//! - **Crypto**: message signing/extraction and VRF signing/verification
//! - **Clock**: the layer tick source
//! - **Activation**: the ATX database supplying epoch weights
//! - **Transport**: gossip broadcasting
//! - **Storage**: the optional persistent beacon mirror
//! - **Sync**: the node's sync-state probe
//! - **Coin**: the weak-coin subprotocol contract
//!
//! # Design Philosophy
//!
//! 1. **Trait-based abstractions**: every heavy collaborator is reached
//!    through a method handle, never a back-pointer, so the beacon engine,
//!    the ATX database and the gossip layer form no reference cycles.
//!
//! 2. **Minimal dependencies**: this crate has few dependencies to avoid
//!    pulling in large libraries transitively.
//!
//! 3. **Thread safety**: all traits require `Send + Sync` for safe
//!    concurrent use.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod traits;

// Re-export commonly used types
pub use traits::{
    // Activation
    ActivationDb, ActivationError, ActivationResult,
    // Clock
    LayerClock,
    // Coin
    CoinError, UnitAllowances, WeakCoin,
    // Crypto
    CryptoError, CryptoResult, PublicKey, Signature, Signer, VerifyExtractor, VrfSigner,
    VrfVerifier,
    // Storage
    BeaconMirror, StorageError, StorageResult,
    // Sync
    SyncState,
    // Transport
    Broadcaster, TransportError, TransportResult,
};
