//! # Spore Types
//!
//! Core type definitions for the Spore network.
//!
//! This crate provides the fundamental types used throughout Spore:
//! - [`Hash32`] - 32-byte hashes with SHA-256 support
//! - [`EpochId`], [`LayerId`], [`RoundId`] - protocol time units
//! - [`NodeId`] - node identity (signing key + VRF key)
//! - [`AtxId`] and [`AtxHeader`] - activation transaction references
//!
//! ## Example
//!
//! ```rust
//! use spore_types::{EpochId, Hash32, LayerId};
//!
//! // The beacon protocol skips genesis epochs entirely.
//! assert!(EpochId::new(1).is_genesis());
//! assert!(!EpochId::new(2).is_genesis());
//!
//! // Layers map onto epochs by a fixed layers-per-epoch ratio.
//! let layer = LayerId::new(8);
//! assert_eq!(layer.epoch(4), EpochId::new(2));
//! assert!(layer.first_in_epoch(4));
//!
//! let hash = Hash32::sha256(b"hello world");
//! assert_ne!(hash, Hash32::ZERO);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod atx;
pub mod epoch;
pub mod hash;

// Re-export main types at crate root
pub use atx::{AtxHeader, AtxId, NodeId};
pub use epoch::{EpochId, LayerId, RoundId};
pub use hash::Hash32;

/// Result type alias for Spore types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with Spore types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
}
