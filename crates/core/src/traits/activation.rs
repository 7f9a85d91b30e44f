//! Activation (ATX) database trait.
//!
//! The ATX database is the source of per-epoch voting weight. The beacon
//! engine reads it exactly once per epoch, at epoch start, to fix the weight
//! and allowance tables for the whole protocol run.

use spore_types::{AtxHeader, AtxId, EpochId};
use thiserror::Error;

/// Errors returned by the activation database.
#[derive(Error, Debug)]
pub enum ActivationError {
    /// No ATX data is available for the requested epoch.
    #[error("no activation data for epoch {0}")]
    EpochNotFound(EpochId),

    /// The requested ATX header does not exist.
    #[error("atx header not found: {0}")]
    HeaderNotFound(AtxId),

    /// Generic database error.
    #[error("activation db error: {0}")]
    Internal(String),
}

/// Result type for activation database operations.
pub type ActivationResult<T> = Result<T, ActivationError>;

/// Read access to the activation transaction set of an epoch.
pub trait ActivationDb: Send + Sync {
    /// Total weight of the epoch (sum of all committed units) together with
    /// the ids of the ATXs that contribute to it.
    fn get_epoch_weight(&self, epoch: EpochId) -> ActivationResult<(u64, Vec<AtxId>)>;

    /// The header of a single ATX.
    fn get_atx_header(&self, id: &AtxId) -> ActivationResult<AtxHeader>;
}
