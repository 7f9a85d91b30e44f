//! The beacon engine: epoch lifecycle and round driver.
//!
//! One engine instance runs the whole protocol. Per epoch it proceeds
//! through:
//!
//! ```text
//! idle -> wait_stabilise -> proposing -> round(1) .. round(K) -> tally -> done
//! ```
//!
//! Transitions are driven exclusively by timers and by cancellation. During
//! every voting round the driver concurrently emits its own vote, runs one
//! weak-coin round, and admits incoming votes (see `handlers`); at the round
//! deadline it finishes the weak-coin round and carries the coin value into
//! the next round's tie-breaking.
//!
//! Cancellation anywhere between the proposal phase and round K unwinds the
//! epoch cleanly: timers stop, the weak-coin epoch is finished, the ledger
//! and proposal store are discarded, and no beacon is produced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use spore_core::{
    ActivationDb, BeaconMirror, Broadcaster, LayerClock, Signer, SyncState, UnitAllowances,
    VerifyExtractor, VrfSigner, VrfVerifier, WeakCoin,
};
use spore_types::{EpochId, Hash32, LayerId, NodeId, RoundId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BeaconConfig;
use crate::ledger::{encode_bit_vector, VoteLedger};
use crate::messages::{
    self, FirstVotingMessage, FirstVotingMessageBody, FollowingVotingMessage,
    FollowingVotingMessageBody, ProposalMessage, FIRST_VOTING_CHANNEL, FOLLOWING_VOTING_CHANNEL,
    PROPOSAL_CHANNEL, PROTOCOL_NAME,
};
use crate::proposals::ProposalStore;
use crate::store::{BeaconError, BeaconStore};
use crate::tally::{self, AllVotes};
use crate::thresholds;

/// Errors that can occur while driving the protocol.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The activation database failed.
    #[error("activation db: {0}")]
    Activation(#[from] spore_core::ActivationError),

    /// Threshold math failed (zero epoch weight).
    #[error("threshold: {0}")]
    Threshold(#[from] crate::thresholds::ThresholdError),

    /// A wire message could not be encoded.
    #[error("message: {0}")]
    Message(#[from] crate::messages::MessageError),

    /// Broadcasting to gossip failed.
    #[error("broadcast: {0}")]
    Transport(#[from] spore_core::TransportError),
}

/// Counters for dropped inbound messages and failed broadcasts.
#[derive(Debug, Default)]
pub(crate) struct EngineCounters {
    pub(crate) proposals_dropped: AtomicU64,
    pub(crate) first_votes_dropped: AtomicU64,
    pub(crate) following_votes_dropped: AtomicU64,
    pub(crate) broadcast_failures: AtomicU64,
}

/// A point-in-time snapshot of the engine's drop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Inbound proposals dropped by validation or queue overflow.
    pub proposals_dropped: u64,
    /// Inbound first-round votes dropped by validation.
    pub first_votes_dropped: u64,
    /// Inbound following-round votes dropped by validation.
    pub following_votes_dropped: u64,
    /// Own messages that failed to broadcast.
    pub broadcast_failures: u64,
}

/// A proposal message together with the instant gossip delivered it.
pub(crate) struct ProposalEnvelope {
    pub(crate) message: ProposalMessage,
    pub(crate) received_at: Instant,
}

/// Per-epoch proposal queue; the receiving half is taken by the epoch's
/// pump task when the epoch starts.
pub(crate) struct ProposalChannel {
    pub(crate) tx: mpsc::Sender<ProposalEnvelope>,
    pub(crate) rx: Option<mpsc::Receiver<ProposalEnvelope>>,
}

/// All per-epoch mutable state, guarded by one RwLock.
///
/// Validators and the tally read it in shared mode; the round driver and
/// the inbound handlers write it exclusively.
pub(crate) struct EpochState {
    pub(crate) epoch_in_progress: Option<EpochId>,
    pub(crate) current_round: RoundId,
    pub(crate) proposals: ProposalStore,
    pub(crate) ledger: VoteLedger,
    /// Canonical bit-vector ordering, sealed when round 1 ends.
    pub(crate) reference_order: Option<Arc<Vec<Vec<u8>>>>,
    /// Per-sender voting weight, fixed at epoch start from the ATX set.
    pub(crate) weights: HashMap<Vec<u8>, u64>,
    pub(crate) epoch_weight: u64,
    pub(crate) proposal_chans: HashMap<EpochId, ProposalChannel>,
    pub(crate) epoch_cancel: CancellationToken,
}

impl EpochState {
    fn new(config: &BeaconConfig) -> Self {
        Self {
            epoch_in_progress: None,
            current_round: 0,
            proposals: ProposalStore::new(config.grace_period),
            ledger: VoteLedger::new(config.rounds),
            reference_order: None,
            weights: HashMap::new(),
            epoch_weight: 0,
            proposal_chans: HashMap::new(),
            epoch_cancel: CancellationToken::new(),
        }
    }
}

// running flag values for the start/close CAS
const STOPPED: u64 = 0;
const RUNNING: u64 = 1;

/// The beacon protocol engine.
///
/// All collaborators are capability traits; the engine never holds
/// back-pointers into the node. `start`/`close` bracket every worker the
/// engine spawns.
pub struct BeaconEngine {
    pub(crate) config: BeaconConfig,
    node_id: NodeId,

    broadcaster: Arc<dyn Broadcaster>,
    pub(crate) activation: Arc<dyn ActivationDb>,
    signer: Arc<dyn Signer>,
    pub(crate) verifier: Arc<dyn VerifyExtractor>,
    vrf_signer: Arc<dyn VrfSigner>,
    pub(crate) vrf_verifier: Arc<dyn VrfVerifier>,
    weak_coin: Arc<dyn WeakCoin>,
    clock: Arc<dyn LayerClock>,
    sync: RwLock<Option<Arc<dyn SyncState>>>,

    store: BeaconStore,
    pub(crate) state: RwLock<EpochState>,
    pub(crate) counters: EngineCounters,

    cancel: CancellationToken,
    running: AtomicU64,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl BeaconEngine {
    /// Create a new engine. The sync-state provider is installed separately
    /// with [`set_sync_state`](Self::set_sync_state) before [`start`](Self::start).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BeaconConfig,
        node_id: NodeId,
        broadcaster: Arc<dyn Broadcaster>,
        activation: Arc<dyn ActivationDb>,
        signer: Arc<dyn Signer>,
        verifier: Arc<dyn VerifyExtractor>,
        vrf_signer: Arc<dyn VrfSigner>,
        vrf_verifier: Arc<dyn VrfVerifier>,
        weak_coin: Arc<dyn WeakCoin>,
        clock: Arc<dyn LayerClock>,
        mirror: Option<Arc<dyn BeaconMirror>>,
    ) -> Self {
        let state = EpochState::new(&config);
        Self {
            config,
            node_id,
            broadcaster,
            activation,
            signer,
            verifier,
            vrf_signer,
            vrf_verifier,
            weak_coin,
            clock,
            sync: RwLock::new(None),
            store: BeaconStore::new(mirror),
            state: RwLock::new(state),
            counters: EngineCounters::default(),
            cancel: CancellationToken::new(),
            running: AtomicU64::new(STOPPED),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Install the sync-state provider. Must be called exactly once before
    /// [`start`](Self::start); a second call panics.
    pub fn set_sync_state(&self, sync: Arc<dyn SyncState>) {
        let mut slot = self.sync.write();
        if slot.is_some() {
            panic!("sync state provider can be installed only once");
        }
        *slot = Some(sync);
    }

    /// Start listening for layers.
    ///
    /// Idempotent: a second call while running logs a warning and returns.
    /// Panics if the sync-state provider was never installed.
    pub fn start(self: &Arc<Self>) {
        if self
            .running
            .compare_exchange(STOPPED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("attempt to start the beacon engine more than once");
            return;
        }
        info!(config = ?self.config, "starting {PROTOCOL_NAME}");
        if self.sync.read().is_none() {
            panic!("sync state provider must be installed before start");
        }

        self.store.init_genesis();

        let engine = Arc::clone(self);
        let ticker = self.clock.subscribe();
        self.spawn_worker(async move { engine.listen_layers(ticker).await });
    }

    /// Cancel and join all workers.
    ///
    /// A second call is a no-op. Beacons computed before the close remain
    /// readable through [`get_beacon`](Self::get_beacon).
    pub async fn close(&self) {
        if self
            .running
            .compare_exchange(RUNNING, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        info!("closing {PROTOCOL_NAME}");
        self.cancel.cancel();

        // Workers can spawn short-lived siblings while unwinding; keep
        // draining until the list stays empty.
        loop {
            let workers = std::mem::take(&mut *self.workers.lock());
            if workers.is_empty() {
                break;
            }
            debug!(workers = workers.len(), "waiting for beacon workers to finish");
            for handle in workers {
                if let Err(e) = handle.await {
                    warn!(error = %e, "beacon worker ended abnormally");
                }
            }
        }
        info!("beacon workers finished");
    }

    /// Whether background workers are not running.
    pub fn is_closed(&self) -> bool {
        self.running.load(Ordering::SeqCst) == STOPPED
    }

    /// The beacon for `target_epoch`, i.e. the value produced during
    /// `target_epoch - 1`. See [`BeaconStore::get`] for lookup order.
    pub fn get_beacon(&self, target_epoch: EpochId) -> Result<Hash32, BeaconError> {
        self.store.get(target_epoch)
    }

    /// A snapshot of the engine's drop counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            proposals_dropped: self.counters.proposals_dropped.load(Ordering::Relaxed),
            first_votes_dropped: self.counters.first_votes_dropped.load(Ordering::Relaxed),
            following_votes_dropped: self
                .counters
                .following_votes_dropped
                .load(Ordering::Relaxed),
            broadcast_failures: self.counters.broadcast_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn spawn_worker<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.workers.lock().push(tokio::spawn(future));
    }

    async fn listen_layers(self: Arc<Self>, mut ticker: mpsc::Receiver<LayerId>) {
        info!("starting listening layers");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                layer = ticker.recv() => {
                    let Some(layer) = layer else { return };
                    debug!(%layer, "received tick");
                    let engine = Arc::clone(&self);
                    self.spawn_worker(async move { engine.handle_layer(layer).await });
                }
            }
        }
    }

    /// React to a layer tick: the first layer of an epoch starts the
    /// protocol for that epoch after the stabilisation delay.
    async fn handle_layer(self: Arc<Self>, layer: LayerId) {
        let epoch = layer.epoch(self.config.layers_per_epoch);
        if !layer.first_in_epoch(self.config.layers_per_epoch) {
            debug!(%layer, %epoch, "not first layer in epoch, skipping");
            return;
        }
        info!(%layer, %epoch, "first layer in epoch, proceeding");

        let epoch_cancel = {
            let mut state = self.state.write();
            if let Some(current) = state.epoch_in_progress {
                if epoch <= current {
                    error!(%epoch, %current, "epoch ticked twice");
                    panic!("epoch {epoch} ticked twice");
                }
            }
            // late work of the previous epoch is abandoned, not promoted
            state.epoch_cancel.cancel();
            state.epoch_cancel = self.cancel.child_token();
            state.epoch_in_progress = Some(epoch);
            state.epoch_cancel.clone()
        };

        debug!(
            %epoch,
            wait = ?self.config.wait_after_epoch_start,
            "waiting until other nodes have the same epoch"
        );
        tokio::select! {
            _ = epoch_cancel.cancelled() => return,
            _ = sleep(self.config.wait_after_epoch_start) => {}
        }

        self.handle_epoch(epoch, epoch_cancel).await;
    }

    async fn handle_epoch(self: &Arc<Self>, epoch: EpochId, cancel: CancellationToken) {
        if epoch.is_genesis() {
            debug!(%epoch, "not running the beacon protocol in a genesis epoch");
            return;
        }
        let synced = {
            let sync = self.sync.read();
            sync.as_ref().map(|s| s.is_synced()).unwrap_or(false)
        };
        if !synced {
            info!(%epoch, "beacon protocol is skipped while the node is not synced");
            return;
        }

        info!(%epoch, "handling epoch");

        let rx = {
            let mut state = self.state.write();
            if let Some(previous) = epoch.prev() {
                // closing the previous channel drops its late proposals
                state.proposal_chans.remove(&previous);
            }
            let capacity = self.config.proposal_chan_capacity;
            let channel = state
                .proposal_chans
                .entry(epoch)
                .or_insert_with(|| new_proposal_channel(capacity));
            channel.rx.take()
        };
        if let Some(rx) = rx {
            let engine = Arc::clone(self);
            let pump_cancel = cancel.clone();
            self.spawn_worker(async move {
                engine.read_proposal_messages_loop(rx, pump_cancel).await;
            });
        }

        self.run_proposal_phase(epoch, &cancel).await;
        match self.run_consensus_phase(epoch, &cancel).await {
            None => warn!(%epoch, "consensus phase cancelled"),
            Some(last_round_votes) => self.calc_beacon(epoch, last_round_votes),
        }

        self.cleanup_votes();
        debug!(%epoch, "finished handling epoch");
    }

    async fn read_proposal_messages_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<ProposalEnvelope>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else { return };
                    let message = envelope.message.to_string();
                    if let Err(e) =
                        self.handle_proposal_message(envelope.message, envelope.received_at)
                    {
                        self.counters
                            .proposals_dropped
                            .fetch_add(1, Ordering::Relaxed);
                        debug!(%message, error = %e, "dropped proposal message");
                    }
                }
            }
        }
    }

    async fn run_proposal_phase(self: &Arc<Self>, epoch: EpochId, cancel: &CancellationToken) {
        debug!(%epoch, "starting proposal phase");

        let engine = Arc::clone(self);
        self.spawn_worker(async move {
            debug!(%epoch, "starting proposal message sender");
            if let Err(e) = engine.send_own_proposal(epoch).await {
                engine
                    .counters
                    .broadcast_failures
                    .fetch_add(1, Ordering::Relaxed);
                error!(%epoch, error = %e, "failed to send proposal message");
            }
            debug!(%epoch, "proposal message sender finished");
        });

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = sleep(self.config.proposal_duration) => {}
        }

        let finished_at = Instant::now();
        self.state.write().proposals.mark_phase_finished(finished_at);
        debug!(%epoch, "proposal phase finished");
    }

    /// Build, gate, and broadcast the local node's proposal.
    ///
    /// A proposal below the eligibility threshold is silently withheld; an
    /// eligible one is recorded as valid directly, without waiting for the
    /// gossip loop-back.
    async fn send_own_proposal(&self, epoch: EpochId) -> Result<(), EngineError> {
        let input = messages::proposal_vrf_input(epoch);
        let signature = self.vrf_signer.sign(&input);
        debug!(
            %epoch,
            signature = %hex::encode(&signature.as_bytes()[..signature.as_bytes().len().min(8)]),
            "calculated proposal signature"
        );

        let (epoch_weight, _) = self.activation.get_epoch_weight(epoch)?;
        let threshold = thresholds::atx_threshold(self.config.kappa, self.config.q, epoch_weight)?;
        if !thresholds::proposal_passes_threshold(signature.as_bytes(), &threshold) {
            debug!(%epoch, weight = epoch_weight, "own proposal does not pass threshold");
            return Ok(());
        }

        let message = ProposalMessage {
            epoch_id: epoch,
            node_id: self.node_id.clone(),
            vrf_signature: signature.as_bytes().to_vec(),
        };
        debug!(%message, "going to send proposal");
        let data = messages::encode(&message)?;
        self.broadcaster.broadcast(PROPOSAL_CHANNEL, &data).await?;
        info!(%message, "sent proposal");

        self.state
            .write()
            .proposals
            .insert_own(message.vrf_signature);
        Ok(())
    }

    /// Run the K voting rounds. Returns the node's own last-round opinion
    /// set, or `None` when the epoch was cancelled.
    async fn run_consensus_phase(
        self: &Arc<Self>,
        epoch: EpochId,
        cancel: &CancellationToken,
    ) -> Option<AllVotes> {
        debug!(%epoch, "starting consensus phase");
        self.start_weak_coin_epoch(epoch);

        let mut coin_flip = false;
        let mut last_round_votes = AllVotes::default();

        // Round 1 runs with previous_coin = false by convention; every later
        // round carries the coin from the round before it.
        for round in 1..=self.config.rounds {
            self.state.write().current_round = round;
            let previous_coin = coin_flip;

            let own_votes = (round > 1).then(|| self.calc_own_votes(previous_coin));
            if round == self.config.rounds {
                last_round_votes = own_votes.clone().unwrap_or_default();
            }

            let engine = Arc::clone(self);
            self.spawn_worker(async move {
                let result = match own_votes {
                    None => engine.send_first_round_vote(epoch).await,
                    Some(votes) => engine.send_following_vote(epoch, round, votes).await,
                };
                if let Err(e) = result {
                    engine
                        .counters
                        .broadcast_failures
                        .fetch_add(1, Ordering::Relaxed);
                    error!(%epoch, round, error = %e, "failed to send vote");
                }
            });

            let engine = Arc::clone(self);
            let coin_cancel = cancel.clone();
            self.spawn_worker(async move {
                engine.run_weak_coin_round(epoch, round, coin_cancel).await;
            });

            let voting = if round == 1 {
                self.config.first_voting_round_duration
            } else {
                self.config.voting_round_duration
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.weak_coin.finish_epoch();
                    return None;
                }
                _ = sleep(voting + self.config.weak_coin_round_duration) => {}
            }

            self.weak_coin.finish_round();
            coin_flip = self.weak_coin.get(epoch, round);

            if round == 1 {
                // The grace window has closed; fix the bit-vector ordering
                // every following-round vote is encoded and decoded against.
                let mut state = self.state.write();
                let order = Arc::new(state.proposals.reference_order());
                debug!(%epoch, proposals = order.len(), "sealed proposal reference order");
                state.reference_order = Some(order);
            }
        }

        self.weak_coin.finish_epoch();
        debug!(%epoch, "consensus phase finished");
        Some(last_round_votes)
    }

    /// Fix the per-sender weight table and the weak coin's unit allowances
    /// from the epoch's ATX set.
    ///
    /// Inability to load the ATX set at epoch start is an invariant
    /// violation and panics.
    fn start_weak_coin_epoch(&self, epoch: EpochId) {
        let (epoch_weight, atxs) = match self.activation.get_epoch_weight(epoch) {
            Ok(v) => v,
            Err(e) => {
                error!(%epoch, error = %e, "unable to load the epoch's atx set");
                panic!("unable to load the atx set for epoch {epoch}");
            }
        };

        let mut allowances = UnitAllowances::new();
        let mut weights: HashMap<Vec<u8>, u64> = HashMap::new();
        for id in &atxs {
            let header = match self.activation.get_atx_header(id) {
                Ok(h) => h,
                Err(e) => {
                    error!(%epoch, atx = %id, error = %e, "unable to load atx header");
                    panic!("unable to load atx header {id}");
                }
            };
            *allowances
                .entry(header.node_id.vrf_public_key.clone())
                .or_default() += u64::from(header.num_units);
            *weights.entry(header.node_id.key.clone()).or_default() +=
                u64::from(header.num_units);
        }

        debug!(%epoch, weight = epoch_weight, miners = weights.len(), "fixed epoch weight table");
        {
            let mut state = self.state.write();
            state.epoch_weight = epoch_weight;
            state.weights = weights;
        }
        self.weak_coin.start_epoch(epoch, allowances);
    }

    async fn run_weak_coin_round(&self, epoch: EpochId, round: RoundId, cancel: CancellationToken) {
        let voting = if round == 1 {
            self.config.first_voting_round_duration
        } else {
            self.config.voting_round_duration
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(voting) => {}
        }

        if let Err(e) = self.weak_coin.start_round(round).await {
            error!(%epoch, round, error = %e, "failed to publish weak coin proposal");
        }
    }

    /// The node's own opinion set for a round, from the margins accumulated
    /// by the end of the previous round.
    fn calc_own_votes(&self, previous_coin: bool) -> AllVotes {
        let state = self.state.read();
        let threshold = thresholds::voting_threshold(self.config.theta, state.epoch_weight);
        tally::calc_votes(&state.ledger, &threshold, previous_coin)
    }

    async fn send_first_round_vote(&self, epoch: EpochId) -> Result<(), EngineError> {
        let snapshot = self.state.read().proposals.snapshot();
        let body = FirstVotingMessageBody {
            epoch_id: epoch,
            valid_proposals: snapshot.valid,
            potentially_valid_proposals: snapshot.potentially_valid,
        };
        let signature = self.signer.sign(&messages::encode(&body)?);
        let message = FirstVotingMessage {
            body,
            signature: signature.as_bytes().to_vec(),
        };

        debug!(%epoch, %message, "sending first round vote");
        let data = messages::encode(&message)?;
        self.broadcaster
            .broadcast(FIRST_VOTING_CHANNEL, &data)
            .await?;
        Ok(())
    }

    async fn send_following_vote(
        &self,
        epoch: EpochId,
        round: RoundId,
        own_votes: AllVotes,
    ) -> Result<(), EngineError> {
        let bit_vector = {
            let state = self.state.read();
            let order = state.reference_order.clone().unwrap_or_default();
            encode_bit_vector(&own_votes.valid, &order)
        };
        let body = FollowingVotingMessageBody {
            epoch_id: epoch,
            round_id: round,
            votes_bit_vector: bit_vector,
        };
        let signature = self.signer.sign(&messages::encode(&body)?);
        let message = FollowingVotingMessage {
            body,
            signature: signature.as_bytes().to_vec(),
        };

        debug!(%epoch, %message, "sending following round vote");
        let data = messages::encode(&message)?;
        self.broadcaster
            .broadcast(FOLLOWING_VOTING_CHANNEL, &data)
            .await?;
        Ok(())
    }

    /// Collapse the last round's own opinion set into the epoch beacon and
    /// publish it through the store.
    fn calc_beacon(&self, epoch: EpochId, last_round_votes: AllVotes) {
        let beacon = tally::derive_beacon(&last_round_votes.valid);
        info!(
            %epoch,
            beacon = %beacon,
            winning = last_round_votes.valid.len(),
            "calculated beacon"
        );
        self.store.set(epoch, beacon);
    }

    /// Discard all per-epoch mutable state, success or failure.
    fn cleanup_votes(&self) {
        let mut state = self.state.write();
        state.proposals = ProposalStore::new(self.config.grace_period);
        state.ledger = VoteLedger::new(self.config.rounds);
        state.reference_order = None;
        state.weights.clear();
        state.epoch_weight = 0;
        state.current_round = 0;
    }
}

pub(crate) fn new_proposal_channel(capacity: usize) -> ProposalChannel {
    let (tx, rx) = mpsc::channel(capacity);
    ProposalChannel { tx, rx: Some(rx) }
}
