//! Weighted vote accumulation.
//!
//! This module handles:
//! - Accumulating signed, weighted vote margins per proposal
//! - Enforcing one counted vote per `(round, sender)` pair
//! - Encoding and decoding following-round bit vectors against the epoch's
//!   reference proposal order
//!
//! Margins are arbitrary-precision: weights are sums of committed storage
//! units across many ATXs and can exceed any fixed-width integer over an
//! epoch.

use num_bigint::BigInt;
use spore_types::RoundId;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Error types for vote ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The sender was already counted for this round.
    #[error("sender already voted in round {0}")]
    AlreadyVoted(RoundId),

    /// The round is outside the epoch's configured range.
    #[error("round {round} out of range 1..={rounds}")]
    RoundOutOfRange {
        /// The offending round.
        round: RoundId,
        /// The configured number of voting rounds.
        rounds: RoundId,
    },

    /// The bit vector does not match the reference order's length.
    #[error("bit vector of {got} bytes does not cover {proposals} proposals")]
    BitVectorLength {
        /// Received bit-vector length in bytes.
        got: usize,
        /// Number of proposals in the reference order.
        proposals: usize,
    },
}

/// Encode an opinion set as a bit vector over the reference order.
///
/// Bit `i` is set iff proposal `i` of `reference_order` is in `votes_for`.
/// Bits are packed least-significant first within each byte.
pub fn encode_bit_vector(votes_for: &BTreeSet<Vec<u8>>, reference_order: &[Vec<u8>]) -> Vec<u8> {
    let mut bits = vec![0u8; reference_order.len().div_ceil(8)];
    for (i, proposal) in reference_order.iter().enumerate() {
        if votes_for.contains(proposal) {
            bits[i / 8] |= 1 << (i % 8);
        }
    }
    bits
}

/// Signed accumulator of weighted votes for one epoch.
#[derive(Debug)]
pub struct VoteLedger {
    /// Signed margin per proposal, keyed by the proposal's signature bytes.
    margins: HashMap<Vec<u8>, BigInt>,
    /// Senders counted per round; index is `round - 1`.
    has_voted: Vec<HashSet<Vec<u8>>>,
    rounds: RoundId,
}

impl VoteLedger {
    /// Create an empty ledger for an epoch with `rounds` voting rounds.
    pub fn new(rounds: RoundId) -> Self {
        Self {
            margins: HashMap::new(),
            has_voted: vec![HashSet::new(); rounds as usize],
            rounds,
        }
    }

    /// Count a first-round vote.
    ///
    /// Every proposal in the sender's valid set is credited `+weight`; the
    /// potentially-valid set contributes zero but makes the proposals known
    /// to the ledger.
    pub fn admit_first(
        &mut self,
        sender: &[u8],
        weight: u64,
        valid: &[Vec<u8>],
        potentially_valid: &[Vec<u8>],
    ) -> Result<(), LedgerError> {
        self.mark_voted(1, sender)?;

        let weight = BigInt::from(weight);
        for proposal in valid {
            *self.margins.entry(proposal.clone()).or_default() += &weight;
        }
        for proposal in potentially_valid {
            self.margins.entry(proposal.clone()).or_default();
        }
        Ok(())
    }

    /// Count a following-round vote.
    ///
    /// Each bit of `bit_vector` is interpreted against `reference_order`:
    /// set contributes `+weight`, clear contributes `-weight`. The vector
    /// must cover the reference order exactly; padding bits past the last
    /// proposal must be zero.
    pub fn admit_following(
        &mut self,
        round: RoundId,
        sender: &[u8],
        weight: u64,
        bit_vector: &[u8],
        reference_order: &[Vec<u8>],
    ) -> Result<(), LedgerError> {
        if round < 2 || round > self.rounds {
            return Err(LedgerError::RoundOutOfRange {
                round,
                rounds: self.rounds,
            });
        }

        let proposals = reference_order.len();
        if bit_vector.len() != proposals.div_ceil(8) || !padding_is_zero(bit_vector, proposals) {
            return Err(LedgerError::BitVectorLength {
                got: bit_vector.len(),
                proposals,
            });
        }

        self.mark_voted(round, sender)?;

        let weight = BigInt::from(weight);
        for (i, proposal) in reference_order.iter().enumerate() {
            let margin = self.margins.entry(proposal.clone()).or_default();
            if bit_vector[i / 8] & (1 << (i % 8)) != 0 {
                *margin += &weight;
            } else {
                *margin -= &weight;
            }
        }
        Ok(())
    }

    /// The signed margin of a proposal, if the ledger knows it.
    pub fn margin(&self, proposal: &[u8]) -> Option<&BigInt> {
        self.margins.get(proposal)
    }

    /// Iterate over all `(proposal, margin)` pairs.
    pub fn margins(&self) -> impl Iterator<Item = (&Vec<u8>, &BigInt)> {
        self.margins.iter()
    }

    /// Whether a sender has been counted for a round.
    pub fn has_voted(&self, round: RoundId, sender: &[u8]) -> bool {
        round >= 1
            && round <= self.rounds
            && self.has_voted[(round - 1) as usize].contains(sender)
    }

    fn mark_voted(&mut self, round: RoundId, sender: &[u8]) -> Result<(), LedgerError> {
        let counted = &mut self.has_voted[(round - 1) as usize];
        if !counted.insert(sender.to_vec()) {
            return Err(LedgerError::AlreadyVoted(round));
        }
        Ok(())
    }
}

fn padding_is_zero(bit_vector: &[u8], proposals: usize) -> bool {
    let used = proposals % 8;
    if used == 0 {
        return true;
    }
    match bit_vector.last() {
        Some(last) => last >> used == 0,
        None => true,
    }
}
