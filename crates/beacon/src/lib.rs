//! # Spore Beacon
//!
//! Per-epoch randomness beacon engine for the Spore proof-of-space-time
//! network.
//!
//! Every honest participant that completes the protocol for epoch `E`
//! derives the same 32-byte beacon for `E`; the value seeds leader election
//! and committee selection in epoch `E + 1`.
//!
//! ## Protocol Flow
//!
//! ```text
//! Epoch E, first layer tick:
//!
//! ┌────────────────┐
//! │ WAIT_STABILISE │  sleep WaitAfterEpochStart
//! └───────┬────────┘
//!         ▼
//! ┌────────────────┐
//! │   PROPOSING    │  broadcast own VRF proposal if it passes the
//! │                │  eligibility threshold; admit incoming proposals
//! └───────┬────────┘
//!         ▼
//! ┌────────────────┐
//! │   ROUND 1..K   │  round 1 broadcasts the local classification;
//! │                │  rounds 2..K broadcast bit-vector diffs; every
//! │                │  round runs one weak-coin round whose value breaks
//! │                │  the next round's undecided margins
//! └───────┬────────┘
//!         ▼
//! ┌────────────────┐
//! │     TALLY      │  beacon = sha256(lex-sorted winning proposals)
//! └────────────────┘
//! ```
//!
//! ## Safety Properties
//!
//! - **At-most-once**: exactly one beacon is ever recorded per epoch;
//!   conflicting writes are an invariant violation.
//! - **Determinism**: given the same final ledger state and the same coin
//!   values, two honest nodes derive the same 32 bytes.
//! - **Byzantine tolerance**: one counted vote per `(round, sender)`;
//!   vote weight comes from the ATX set fixed at epoch start, not from the
//!   message.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spore_beacon::{BeaconConfig, BeaconEngine};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(BeaconEngine::new(
//!     BeaconConfig::default(),
//!     node_id,
//!     broadcaster,
//!     activation_db,
//!     signer,
//!     verifier,
//!     vrf_signer,
//!     vrf_verifier,
//!     weak_coin,
//!     clock,
//!     Some(mirror),
//! ));
//! engine.set_sync_state(sync);
//! engine.start();
//!
//! // ... layers tick, epochs complete ...
//!
//! let beacon = engine.get_beacon(epoch)?; // beacon produced during epoch - 1
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod handlers;
pub mod ledger;
pub mod messages;
pub mod proposals;
pub mod store;
pub mod tally;
pub mod thresholds;

// Re-export main types at crate root for convenience
pub use config::{BeaconConfig, ConfigError};
pub use engine::{BeaconEngine, EngineError, EngineStats};
pub use handlers::HandlerError;
pub use ledger::{encode_bit_vector, LedgerError, VoteLedger};
pub use messages::{
    FirstVotingMessage, FirstVotingMessageBody, FollowingVotingMessage,
    FollowingVotingMessageBody, MessageError, ProposalMessage, FIRST_VOTING_CHANNEL,
    FOLLOWING_VOTING_CHANNEL, PROPOSAL_CHANNEL, PROTOCOL_NAME,
};
pub use proposals::{ProposalClass, ProposalStore, Proposals};
pub use store::{genesis_beacon, BeaconError, BeaconStore};
pub use tally::{calc_votes, derive_beacon, AllVotes};
pub use thresholds::{
    atx_threshold, atx_threshold_fraction, proposal_passes_threshold, voting_threshold,
    ThresholdError,
};
