//! Weak-coin subprotocol contract.
//!
//! The weak coin produces one unpredictable bit per voting round, identical
//! across honest observers before they must act on it in the following
//! round. This trait captures only the externally observable contract; the
//! engine is agnostic to how the coin is realised.

use async_trait::async_trait;
use spore_types::{EpochId, RoundId};
use std::collections::HashMap;
use thiserror::Error;

/// Per-node spacetime unit allowances for one epoch, keyed by VRF public
/// key bytes.
pub type UnitAllowances = HashMap<Vec<u8>, u64>;

/// Errors returned by the weak-coin subprotocol.
#[derive(Error, Debug)]
pub enum CoinError {
    /// The round's coin message could not be published.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The round was started outside an active epoch.
    #[error("no epoch in progress")]
    NoEpoch,

    /// Generic weak-coin error.
    #[error("weak coin error: {0}")]
    Internal(String),
}

/// The weak-coin round contract.
///
/// Call ordering per epoch: `start_epoch`, then for each round
/// `start_round` followed by `finish_round`, then `finish_epoch`. The coin
/// value for `(epoch, round)` is stable once `finish_round` has returned
/// for that round.
#[async_trait]
pub trait WeakCoin: Send + Sync {
    /// Fix the per-node unit allowances for an epoch. Must be called before
    /// any round of that epoch is started.
    fn start_epoch(&self, epoch: EpochId, allowances: UnitAllowances);

    /// Begin one round. May publish one gossip message; returns after the
    /// publish, not after consensus.
    async fn start_round(&self, round: RoundId) -> Result<(), CoinError>;

    /// Close the current round. The coin's value for the round is available
    /// immediately afterwards.
    fn finish_round(&self);

    /// The coin value for a finished round.
    fn get(&self, epoch: EpochId, round: RoundId) -> bool;

    /// Release per-epoch resources.
    fn finish_epoch(&self);

    /// Inbound gossip sink; the coin is responsible for its own validation.
    async fn handle_serialized_message(&self, data: &[u8]);
}
