//! Gossip broadcasting trait.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when publishing to gossip.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The message could not be sent.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The network is not running.
    #[error("network not running")]
    NotRunning,

    /// Generic network error.
    #[error("network error: {0}")]
    Internal(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Publish access to the gossip network.
///
/// Implementations deliver broadcast messages back to local subscribers as
/// well; the beacon engine counts its own votes through the same inbound
/// path as everyone else's.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Broadcast a serialized message on a named gossip channel.
    async fn broadcast(&self, channel: &str, data: &[u8]) -> TransportResult<()>;
}
