//! Inbound gossip validation and admission.
//!
//! A received message is admitted iff, in order: it wire-decodes to the
//! expected shape, its signature verifies, it belongs to the epoch in
//! progress, it passes the message-specific gates (eligibility and timing
//! for proposals, round and dedup for votes), and its sender has not been
//! counted yet.
//!
//! The gossip layer calls these handlers and re-broadcasts a message only
//! when the handler returns `Ok`. Failures are logged and counted; they
//! never abort the epoch.

use std::sync::atomic::Ordering;
use std::time::Instant;

use spore_core::{PublicKey, Signature};
use spore_types::{EpochId, RoundId};
use tracing::debug;

use crate::engine::{new_proposal_channel, BeaconEngine, ProposalEnvelope};
use crate::messages::{self, FirstVotingMessage, FollowingVotingMessage, ProposalMessage};
use crate::proposals::ProposalClass;
use crate::thresholds;

/// Reasons an inbound message is dropped.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The payload does not decode to the expected message shape.
    #[error(transparent)]
    Malformed(#[from] messages::MessageError),

    /// The signature does not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// The message belongs to a different epoch than the one in progress.
    #[error("message epoch {message} does not match epoch in progress {current}")]
    EpochMismatch {
        /// Epoch named by the message.
        message: EpochId,
        /// Epoch currently in progress (0 when none).
        current: EpochId,
    },

    /// A following vote named a round other than the current one.
    #[error("vote round {message} does not match current round {current}")]
    RoundMismatch {
        /// Round named by the message.
        message: RoundId,
        /// Round currently in progress.
        current: RoundId,
    },

    /// The proposal's VRF output is above the eligibility threshold.
    #[error("proposal does not pass the eligibility threshold")]
    NotEligible,

    /// The proposal arrived after the grace window.
    #[error("proposal received too late")]
    LateProposal,

    /// The same proposal bytes were already recorded this epoch.
    #[error("duplicate proposal")]
    DuplicateProposal,

    /// The per-epoch proposal queue is full.
    #[error("proposal queue full")]
    QueueFull,

    /// The sender has no ATX-derived weight this epoch, so its vote cannot
    /// move any margin.
    #[error("sender has no voting weight this epoch")]
    UnknownSender,

    /// The vote was rejected by the ledger (dedup or bit-vector shape).
    #[error(transparent)]
    Ledger(#[from] crate::ledger::LedgerError),

    /// Threshold math failed while gating the proposal.
    #[error(transparent)]
    Threshold(#[from] thresholds::ThresholdError),

    /// The activation database failed while gating the proposal.
    #[error(transparent)]
    Activation(#[from] spore_core::ActivationError),
}

impl BeaconEngine {
    /// Inbound sink for the proposal gossip channel.
    ///
    /// Decodes the payload and queues it, stamped with its receipt time, on
    /// the per-epoch proposal channel; full validation happens in the
    /// epoch's pump. A full queue drops the proposal.
    pub fn handle_serialized_proposal(&self, data: &[u8]) -> Result<(), HandlerError> {
        let received_at = Instant::now();
        let message: ProposalMessage = match messages::decode(data) {
            Ok(m) => m,
            Err(e) => {
                self.counters
                    .proposals_dropped
                    .fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "malformed proposal message");
                return Err(e.into());
            }
        };

        let tx = {
            let mut state = self.state.write();
            state
                .proposal_chans
                .entry(message.epoch_id)
                .or_insert_with(|| new_proposal_channel(self.config.proposal_chan_capacity))
                .tx
                .clone()
        };

        if tx
            .try_send(ProposalEnvelope {
                message,
                received_at,
            })
            .is_err()
        {
            self.counters
                .proposals_dropped
                .fetch_add(1, Ordering::Relaxed);
            debug!("proposal queue full, dropping message");
            return Err(HandlerError::QueueFull);
        }
        Ok(())
    }

    /// Validate and record one queued proposal.
    ///
    /// Checks, in order: epoch, VRF signature, eligibility threshold,
    /// arrival-time classification with duplicate detection.
    pub(crate) fn handle_proposal_message(
        &self,
        message: ProposalMessage,
        received_at: Instant,
    ) -> Result<(), HandlerError> {
        let epoch = message.epoch_id;

        let vrf_key = PublicKey::from_bytes(message.node_id.vrf_public_key.clone());
        let signature = Signature::from_bytes(message.vrf_signature.clone());
        let input = messages::proposal_vrf_input(epoch);
        if !self.vrf_verifier.verify(&vrf_key, &input, &signature) {
            return Err(HandlerError::InvalidSignature);
        }

        {
            let state = self.state.read();
            let current = state.epoch_in_progress.unwrap_or_default();
            if current != epoch {
                return Err(HandlerError::EpochMismatch {
                    message: epoch,
                    current,
                });
            }
        }

        let (epoch_weight, _) = self.activation.get_epoch_weight(epoch)?;
        let threshold =
            thresholds::atx_threshold(self.config.kappa, self.config.q, epoch_weight)?;
        if !thresholds::proposal_passes_threshold(&message.vrf_signature, &threshold) {
            return Err(HandlerError::NotEligible);
        }

        let class = self
            .state
            .write()
            .proposals
            .insert(message.vrf_signature, received_at);
        match class {
            ProposalClass::Valid | ProposalClass::PotentiallyValid => {
                debug!(%epoch, ?class, "recorded proposal");
                Ok(())
            }
            ProposalClass::Rejected => Err(HandlerError::LateProposal),
            ProposalClass::Duplicate => Err(HandlerError::DuplicateProposal),
        }
    }

    /// Inbound sink for the first-round voting gossip channel.
    ///
    /// Extracts the sender from the signature, fixes its weight from the
    /// epoch's table, and credits its classification to the ledger. The
    /// first message per sender wins; repeats are dropped.
    pub fn handle_serialized_first_vote(&self, data: &[u8]) -> Result<(), HandlerError> {
        let result = self.admit_first_vote(data);
        if let Err(e) = &result {
            self.counters
                .first_votes_dropped
                .fetch_add(1, Ordering::Relaxed);
            debug!(error = %e, "dropped first round vote");
        }
        result
    }

    fn admit_first_vote(&self, data: &[u8]) -> Result<(), HandlerError> {
        let message: FirstVotingMessage = messages::decode(data)?;
        let body = messages::encode(&message.body)?;
        let signature = Signature::from_bytes(message.signature.clone());
        let sender = self
            .verifier
            .extract(&body, &signature)
            .map_err(|_| HandlerError::InvalidSignature)?;

        let mut state = self.state.write();
        let current = state.epoch_in_progress.unwrap_or_default();
        if current != message.body.epoch_id {
            return Err(HandlerError::EpochMismatch {
                message: message.body.epoch_id,
                current,
            });
        }
        let weight = *state
            .weights
            .get(sender.as_bytes())
            .ok_or(HandlerError::UnknownSender)?;
        state.ledger.admit_first(
            sender.as_bytes(),
            weight,
            &message.body.valid_proposals,
            &message.body.potentially_valid_proposals,
        )?;
        debug!(epoch = %current, weight, "counted first round vote");
        Ok(())
    }

    /// Inbound sink for the following-round voting gossip channel.
    ///
    /// The vote must name the round in progress at the moment of admission;
    /// its bit vector is decoded against the epoch's sealed reference order.
    pub fn handle_serialized_following_vote(&self, data: &[u8]) -> Result<(), HandlerError> {
        let result = self.admit_following_vote(data);
        if let Err(e) = &result {
            self.counters
                .following_votes_dropped
                .fetch_add(1, Ordering::Relaxed);
            debug!(error = %e, "dropped following round vote");
        }
        result
    }

    fn admit_following_vote(&self, data: &[u8]) -> Result<(), HandlerError> {
        let message: FollowingVotingMessage = messages::decode(data)?;
        let body = messages::encode(&message.body)?;
        let signature = Signature::from_bytes(message.signature.clone());
        let sender = self
            .verifier
            .extract(&body, &signature)
            .map_err(|_| HandlerError::InvalidSignature)?;

        let mut state = self.state.write();
        let current = state.epoch_in_progress.unwrap_or_default();
        if current != message.body.epoch_id {
            return Err(HandlerError::EpochMismatch {
                message: message.body.epoch_id,
                current,
            });
        }
        if state.current_round != message.body.round_id {
            return Err(HandlerError::RoundMismatch {
                message: message.body.round_id,
                current: state.current_round,
            });
        }
        let weight = *state
            .weights
            .get(sender.as_bytes())
            .ok_or(HandlerError::UnknownSender)?;
        let order = state.reference_order.clone().unwrap_or_default();
        state.ledger.admit_following(
            message.body.round_id,
            sender.as_bytes(),
            weight,
            &message.body.votes_bit_vector,
            &order,
        )?;
        debug!(
            epoch = %current,
            round = message.body.round_id,
            weight,
            "counted following round vote"
        );
        Ok(())
    }
}
