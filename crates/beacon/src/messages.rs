//! Gossip wire messages of the beacon protocol.
//!
//! Three channels carry the protocol:
//! - [`PROPOSAL_CHANNEL`] carries [`ProposalMessage`]
//! - [`FIRST_VOTING_CHANNEL`] carries [`FirstVotingMessage`]
//! - [`FOLLOWING_VOTING_CHANNEL`] carries [`FollowingVotingMessage`]
//!
//! Every message is serialized with bincode, the network's canonical
//! deterministic encoding. Voting messages sign the encoded message body,
//! excluding the signature itself.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use spore_types::{EpochId, NodeId, RoundId};
use std::fmt;
use thiserror::Error;

/// Name of the protocol, used in logs and for gossip registration.
pub const PROTOCOL_NAME: &str = "TORTOISE_BEACON_PROTOCOL";

/// Gossip channel for proposal messages.
pub const PROPOSAL_CHANNEL: &str = "TBProposalProtocol";

/// Gossip channel for first-round voting messages.
pub const FIRST_VOTING_CHANNEL: &str = "TBFirstVotingProtocol";

/// Gossip channel for following-round voting messages.
pub const FOLLOWING_VOTING_CHANNEL: &str = "TBFollowingVotingProtocol";

/// Domain prefix of the VRF input a proposal signs.
pub const PROPOSAL_PREFIX: &[u8] = b"TBP";

/// Errors produced when encoding or decoding wire messages.
#[derive(Error, Debug)]
pub enum MessageError {
    /// The payload does not decode to the expected message shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] bincode::Error),
}

/// The VRF input of a proposal for an epoch: the `TBP` prefix followed by
/// the epoch number in network byte order.
pub fn proposal_vrf_input(epoch: EpochId) -> Vec<u8> {
    let mut input = Vec::with_capacity(PROPOSAL_PREFIX.len() + 4);
    input.extend_from_slice(PROPOSAL_PREFIX);
    input.extend_from_slice(&epoch.get().to_be_bytes());
    input
}

/// Serialize a message with the canonical wire encoding.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, MessageError> {
    Ok(bincode::serialize(message)?)
}

/// Deserialize a message from the canonical wire encoding.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, MessageError> {
    Ok(bincode::deserialize(data)?)
}

/// A proposal: the sender's VRF signature over the epoch's proposal input.
///
/// The signature bytes are also the proposal's identity within the epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMessage {
    /// Epoch the proposal belongs to.
    pub epoch_id: EpochId,
    /// Identity of the proposing node.
    pub node_id: NodeId,
    /// VRF signature over [`proposal_vrf_input`].
    pub vrf_signature: Vec<u8>,
}

impl fmt::Display for ProposalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.vrf_signature[..self.vrf_signature.len().min(8)];
        write!(
            f,
            "proposal(epoch={}, node={}, sig={})",
            self.epoch_id,
            self.node_id,
            hex::encode(shown)
        )
    }
}

/// Signed body of a first-round voting message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstVotingMessageBody {
    /// Epoch the vote belongs to.
    pub epoch_id: EpochId,
    /// Proposals the sender classified as valid.
    pub valid_proposals: Vec<Vec<u8>>,
    /// Proposals the sender classified as potentially valid.
    pub potentially_valid_proposals: Vec<Vec<u8>>,
}

/// First-round voting message: the sender's proposal classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstVotingMessage {
    /// The signed body.
    pub body: FirstVotingMessageBody,
    /// Signature over the encoded body; the sender's public key is
    /// recovered from it.
    pub signature: Vec<u8>,
}

impl fmt::Display for FirstVotingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "first_vote(epoch={}, valid={}, potentially_valid={})",
            self.body.epoch_id,
            self.body.valid_proposals.len(),
            self.body.potentially_valid_proposals.len()
        )
    }
}

/// Signed body of a following-round voting message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowingVotingMessageBody {
    /// Epoch the vote belongs to.
    pub epoch_id: EpochId,
    /// Voting round the vote belongs to.
    pub round_id: RoundId,
    /// One bit per proposal in the epoch's reference order; bit set means a
    /// vote for, clear means a vote against.
    pub votes_bit_vector: Vec<u8>,
}

/// Following-round voting message: a bit-vector diff over the reference
/// proposal ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowingVotingMessage {
    /// The signed body.
    pub body: FollowingVotingMessageBody,
    /// Signature over the encoded body; the sender's public key is
    /// recovered from it.
    pub signature: Vec<u8>,
}

impl fmt::Display for FollowingVotingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "following_vote(epoch={}, round={}, bits={})",
            self.body.epoch_id,
            self.body.round_id,
            hex::encode(&self.body.votes_bit_vector)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_input_layout() {
        let input = proposal_vrf_input(EpochId::new(7));
        assert_eq!(&input[..3], b"TBP");
        assert_eq!(&input[3..], &7u32.to_be_bytes());
    }

    #[test]
    fn decode_rejects_garbage() {
        // A truncated buffer cannot decode to any of the message shapes.
        assert!(decode::<ProposalMessage>(&[0x01]).is_err());
        assert!(decode::<FirstVotingMessage>(&[]).is_err());
    }

    #[test]
    fn encoding_is_deterministic() {
        let body = FirstVotingMessageBody {
            epoch_id: EpochId::new(3),
            valid_proposals: vec![vec![1, 2, 3]],
            potentially_valid_proposals: vec![],
        };
        assert_eq!(encode(&body).unwrap(), encode(&body.clone()).unwrap());
    }
}
