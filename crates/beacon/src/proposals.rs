//! Per-epoch proposal bookkeeping.
//!
//! This module handles:
//! - Classifying incoming proposals by arrival time relative to the
//!   proposal-phase deadline
//! - Deduplicating proposals by their signature bytes
//! - Producing the lexicographically ordered snapshots every vote encoding
//!   depends on
//!
//! Signature and eligibility checks happen in the message validator before a
//! proposal reaches this store.

use std::collections::{BTreeSet, HashSet};
use std::time::{Duration, Instant};

/// Outcome of inserting a proposal into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalClass {
    /// Received strictly before the proposal-phase deadline.
    Valid,
    /// Received after the deadline but within the grace window.
    PotentiallyValid,
    /// Received after the grace window.
    Rejected,
    /// The same proposal bytes were already recorded this epoch.
    Duplicate,
}

/// A snapshot of the store's classification, each list sorted
/// lexicographically over the proposal bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proposals {
    /// Proposals received in time.
    pub valid: Vec<Vec<u8>>,
    /// Proposals received within the grace window.
    pub potentially_valid: Vec<Vec<u8>>,
}

/// Per-epoch set of admitted proposals.
///
/// The sets are kept in [`BTreeSet`]s so every snapshot and the bit-vector
/// reference order come out in the canonical lexicographic order without an
/// explicit sort.
#[derive(Debug)]
pub struct ProposalStore {
    valid: BTreeSet<Vec<u8>>,
    potentially_valid: BTreeSet<Vec<u8>>,
    seen: HashSet<Vec<u8>>,
    phase_finished_at: Option<Instant>,
    grace_period: Duration,
}

impl ProposalStore {
    /// Create an empty store for one epoch.
    pub fn new(grace_period: Duration) -> Self {
        Self {
            valid: BTreeSet::new(),
            potentially_valid: BTreeSet::new(),
            seen: HashSet::new(),
            phase_finished_at: None,
            grace_period,
        }
    }

    /// Record the local node's own proposal as valid, bypassing gossip
    /// receipt. Returns `false` if the proposal was already recorded.
    pub fn insert_own(&mut self, proposal: Vec<u8>) -> bool {
        if !self.seen.insert(proposal.clone()) {
            return false;
        }
        self.valid.insert(proposal)
    }

    /// Classify an arrival time against the proposal-phase deadline.
    ///
    /// While the phase is still open every arrival is valid; afterwards the
    /// grace window decides between potentially valid and rejected.
    pub fn classify(&self, received_at: Instant) -> ProposalClass {
        match self.phase_finished_at {
            None => ProposalClass::Valid,
            Some(finished_at) if received_at < finished_at => ProposalClass::Valid,
            Some(finished_at) if received_at <= finished_at + self.grace_period => {
                ProposalClass::PotentiallyValid
            }
            Some(_) => ProposalClass::Rejected,
        }
    }

    /// Insert a gossip-received proposal, classifying it by arrival time.
    pub fn insert(&mut self, proposal: Vec<u8>, received_at: Instant) -> ProposalClass {
        if self.seen.contains(&proposal) {
            return ProposalClass::Duplicate;
        }
        let class = self.classify(received_at);
        match class {
            ProposalClass::Valid => {
                self.seen.insert(proposal.clone());
                self.valid.insert(proposal);
            }
            ProposalClass::PotentiallyValid => {
                self.seen.insert(proposal.clone());
                self.potentially_valid.insert(proposal);
            }
            ProposalClass::Rejected | ProposalClass::Duplicate => {}
        }
        class
    }

    /// Mark the proposal phase finished. Later arrivals fall into the grace
    /// window or are rejected.
    pub fn mark_phase_finished(&mut self, at: Instant) {
        self.phase_finished_at = Some(at);
    }

    /// When the proposal phase finished, if it has.
    pub fn phase_finished_at(&self) -> Option<Instant> {
        self.phase_finished_at
    }

    /// A sorted snapshot of both classification sets.
    pub fn snapshot(&self) -> Proposals {
        Proposals {
            valid: self.valid.iter().cloned().collect(),
            potentially_valid: self.potentially_valid.iter().cloned().collect(),
        }
    }

    /// The canonical bit-vector reference order: the union of valid and
    /// potentially-valid proposals, ascending lexicographically over the
    /// signature bytes.
    pub fn reference_order(&self) -> Vec<Vec<u8>> {
        self.valid
            .union(&self.potentially_valid)
            .cloned()
            .collect()
    }

    /// Number of proposals recorded in either set.
    pub fn len(&self) -> usize {
        self.valid.len() + self.potentially_valid.len()
    }

    /// Whether no proposal has been recorded.
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty() && self.potentially_valid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_phase_admits_as_valid() {
        let mut store = ProposalStore::new(Duration::from_secs(1));
        assert_eq!(
            store.insert(vec![3], Instant::now()),
            ProposalClass::Valid
        );
        assert_eq!(store.snapshot().valid, vec![vec![3]]);
    }

    #[test]
    fn grace_window_classification() {
        let mut store = ProposalStore::new(Duration::from_secs(10));
        let deadline = Instant::now();
        store.mark_phase_finished(deadline);

        assert_eq!(
            store.insert(vec![1], deadline - Duration::from_secs(1)),
            ProposalClass::Valid
        );
        assert_eq!(
            store.insert(vec![2], deadline + Duration::from_secs(5)),
            ProposalClass::PotentiallyValid
        );
        assert_eq!(
            store.insert(vec![3], deadline + Duration::from_secs(11)),
            ProposalClass::Rejected
        );

        let snapshot = store.snapshot();
        assert_eq!(snapshot.valid, vec![vec![1]]);
        assert_eq!(snapshot.potentially_valid, vec![vec![2]]);
    }

    #[test]
    fn duplicates_are_reported() {
        let mut store = ProposalStore::new(Duration::from_secs(1));
        let now = Instant::now();
        assert_eq!(store.insert(vec![7, 7], now), ProposalClass::Valid);
        assert_eq!(store.insert(vec![7, 7], now), ProposalClass::Duplicate);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn own_proposal_bypasses_timing() {
        let mut store = ProposalStore::new(Duration::from_secs(1));
        store.mark_phase_finished(Instant::now() - Duration::from_secs(60));
        assert!(store.insert_own(vec![9]));
        assert!(!store.insert_own(vec![9]));
        assert_eq!(store.snapshot().valid, vec![vec![9]]);
    }

    #[test]
    fn reference_order_is_lexicographic_union() {
        let mut store = ProposalStore::new(Duration::from_secs(10));
        let deadline = Instant::now();
        store.insert(vec![9, 0], deadline);
        store.insert(vec![1, 2], deadline);
        store.mark_phase_finished(deadline);
        store.insert(vec![5], deadline + Duration::from_secs(1));

        assert_eq!(
            store.reference_order(),
            vec![vec![1, 2], vec![5], vec![9, 0]]
        );
    }
}
