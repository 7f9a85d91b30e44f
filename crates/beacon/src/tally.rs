//! Per-round opinion calculation and beacon derivation.
//!
//! At the start of every round after the first, a node collapses the margins
//! accumulated so far into its own opinion set; the weak coin breaks
//! indecision deterministically across nodes. After the last round, the
//! valid side of the final opinion set is hashed into the epoch beacon.

use crate::ledger::VoteLedger;
use num_bigint::BigInt;
use spore_types::Hash32;
use std::collections::BTreeSet;

/// A node's own opinion set for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllVotes {
    /// Proposals the node votes for this round.
    pub valid: BTreeSet<Vec<u8>>,
    /// Proposals the node votes against this round.
    pub invalid: BTreeSet<Vec<u8>>,
}

/// Derive the caller's opinion set from the ledger margins.
///
/// A proposal with `margin >= threshold` is voted for, one with
/// `margin <= -threshold` is voted against, and anything in between follows
/// `previous_coin`: `true` votes for, `false` against. The coin's only role
/// in the protocol is breaking this indecision identically across honest
/// nodes.
pub fn calc_votes(ledger: &VoteLedger, threshold: &BigInt, previous_coin: bool) -> AllVotes {
    let mut votes = AllVotes::default();
    let negative_threshold = -threshold.clone();

    for (proposal, margin) in ledger.margins() {
        let decided_for = if *margin >= *threshold {
            true
        } else if *margin <= negative_threshold {
            false
        } else {
            previous_coin
        };

        if decided_for {
            votes.valid.insert(proposal.clone());
        } else {
            votes.invalid.insert(proposal.clone());
        }
    }
    votes
}

/// Derive the epoch beacon from the winning proposal set.
///
/// The beacon is the SHA-256 digest of the winning proposals' bytes
/// concatenated in ascending lexicographic order. The empty set is legal
/// and hashes the empty string.
pub fn derive_beacon(winning: &BTreeSet<Vec<u8>>) -> Hash32 {
    let parts: Vec<&[u8]> = winning.iter().map(|p| p.as_slice()).collect();
    Hash32::sha256_concat(&parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(margins: &[(&[u8], i64)]) -> VoteLedger {
        // Drive the ledger through its public API: one weighted first vote
        // per sender for positives, following votes against for negatives.
        let mut ledger = VoteLedger::new(3);
        for (i, (proposal, margin)) in margins.iter().enumerate() {
            let sender = [i as u8, 0xaa];
            if *margin >= 0 {
                ledger
                    .admit_first(&sender, *margin as u64, &[proposal.to_vec()], &[])
                    .unwrap();
            } else {
                let reference = vec![proposal.to_vec()];
                ledger
                    .admit_following(2, &sender, margin.unsigned_abs(), &[0], &reference)
                    .unwrap();
            }
        }
        ledger
    }

    #[test]
    fn threshold_decides_clear_margins() {
        let ledger = ledger_with(&[(b"strong", 100), (b"weak", -100)]);
        let votes = calc_votes(&ledger, &BigInt::from(50), false);

        assert!(votes.valid.contains(b"strong".as_slice()));
        assert!(votes.invalid.contains(b"weak".as_slice()));
    }

    #[test]
    fn coin_breaks_indecision() {
        let ledger = ledger_with(&[(b"border", 10)]);
        let threshold = BigInt::from(50);

        let heads = calc_votes(&ledger, &threshold, true);
        assert!(heads.valid.contains(b"border".as_slice()));

        let tails = calc_votes(&ledger, &threshold, false);
        assert!(tails.invalid.contains(b"border".as_slice()));
    }

    #[test]
    fn exact_threshold_is_decided() {
        let ledger = ledger_with(&[(b"on-edge", 50)]);
        // margin == threshold counts as a definite "for", the coin is not
        // consulted
        let votes = calc_votes(&ledger, &BigInt::from(50), false);
        assert!(votes.valid.contains(b"on-edge".as_slice()));
    }

    #[test]
    fn empty_winning_set_hashes_empty_string() {
        let beacon = derive_beacon(&BTreeSet::new());
        assert_eq!(
            beacon.to_hex(),
            "0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn beacon_is_order_independent() {
        let mut forward = BTreeSet::new();
        forward.insert(b"aaa".to_vec());
        forward.insert(b"zzz".to_vec());

        let mut backward = BTreeSet::new();
        backward.insert(b"zzz".to_vec());
        backward.insert(b"aaa".to_vec());

        // BTreeSet iteration is lexicographic regardless of insert order, so
        // two honest nodes with the same winning set derive the same bytes.
        assert_eq!(derive_beacon(&forward), derive_beacon(&backward));
        assert_eq!(
            derive_beacon(&forward),
            Hash32::sha256_concat(&[b"aaa", b"zzz"])
        );
    }

    #[test]
    fn single_proposal_beacon() {
        let mut winning = BTreeSet::new();
        winning.insert(vec![0xde, 0xad]);
        assert_eq!(
            derive_beacon(&winning),
            Hash32::sha256(&[0xde, 0xad])
        );
    }
}
