//! Node identity and activation transaction references.
//!
//! An activation transaction (ATX) is a miner's evidence of committed storage
//! units. The beacon engine only consumes ATX headers: the identity of the
//! miner and the number of units it committed, which becomes its voting
//! weight for the epoch.

use crate::Hash32;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node identity: the message-signing public key together with the VRF
/// public key used for proposal eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NodeId {
    /// Public key used for signing and verifying protocol messages.
    pub key: Vec<u8>,
    /// Public key the node's VRF signatures verify against.
    pub vrf_public_key: Vec<u8>,
}

impl NodeId {
    /// Creates a node id from its two public keys.
    pub fn new(key: Vec<u8>, vrf_public_key: Vec<u8>) -> Self {
        Self {
            key,
            vrf_public_key,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.key[..self.key.len().min(8)];
        write!(f, "{}", hex::encode(shown))
    }
}

/// Identifier of an activation transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct AtxId(pub Hash32);

impl AtxId {
    /// Creates an ATX id from its hash.
    pub const fn new(hash: Hash32) -> Self {
        Self(hash)
    }
}

impl fmt::Display for AtxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Header fields of an activation transaction consumed by the beacon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtxHeader {
    /// The miner that published the ATX.
    pub node_id: NodeId,
    /// Committed storage units; summed per miner into its epoch weight.
    pub num_units: u32,
}
