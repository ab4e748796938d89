//! The dispute-resolution engine.
//!
//! [ChannelEngine] adjudicates which of possibly-conflicting off-chain
//! states is authoritative when a channel closes. The security property it
//! enforces is that the highest-nonce, dual-signed state always wins: a
//! party closing with a stale state can be overridden by the counterparty
//! during the challenge window, and nothing else can change the outcome.
//!
//! All four dependencies (store, escrow ledger, signature verifier, clock)
//! are injected at construction so each can be replaced by a test double.
//! The engine itself keeps no channel state in memory; after a crash it is
//! reconstructed over the same [ChannelStore] and continues where the
//! durable records left off.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::channel::{Channel, ChannelParams, ChannelStatus, SignedState};
use crate::clock::DisputeClock;
use crate::codec::{
    self,
    types::{Address, ChannelId, TokenId},
};
use crate::ledger::{EscrowLedger, LedgerError};
use crate::sig::SignatureVerifier;
use crate::store::{ChannelStore, StoreError};


/// Default challenge window: 24 hours.
pub const DEFAULT_CHALLENGE_PERIOD: u64 = 24 * 60 * 60;

/// Everything that can go wrong with an engine call.
///
/// Validation failures (every variant up to and including `NotClosing`)
/// are detected before any mutation or external call; retrying them
/// without changing the input is pointless.
/// [Ledger][EngineError::Ledger] and [Store][EngineError::Store] wrap
/// infrastructure failures and are safe to retry: a failed open leaves no
/// locked funds and a failed finalize leaves the status unchanged.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A channel with the same parties, token and open nonce already exists.
    #[error("channel already exists")]
    DuplicateChannel,
    /// Open called with `party_a == party_b`.
    #[error("channel parties must differ")]
    IdenticalParties,
    /// Open called with both deposits zero.
    #[error("both deposits are zero")]
    ZeroDeposits,
    /// The deposit sum does not fit in u64.
    #[error("deposit sum overflows u64")]
    DepositOverflow,
    /// A party's free balance does not cover its deposit.
    #[error("insufficient funds for deposit")]
    InsufficientFunds,
    /// No channel with the given ID.
    #[error("channel not found")]
    NotFound,
    /// The state's balance sum does not equal the channel's deposit sum.
    #[error("malformed state: balance sum does not match channel deposits")]
    MalformedState,
    /// One of the two signatures does not verify for the named party.
    #[error("invalid signature for party {0:?}")]
    InvalidSignature(Address),
    /// The submitted nonce does not beat the recorded one.
    #[error("stale state: nonce does not supersede the recorded state")]
    StaleState,
    /// Challenge submitted at or after the deadline. Rejected even if
    /// otherwise correct, to keep finalize time-bounded.
    #[error("challenge window has expired")]
    ChallengeWindowExpired,
    /// Finalize called before the deadline.
    #[error("challenge window has not elapsed yet")]
    TooEarly,
    /// Mutating call on a closed channel.
    #[error("channel is already closed")]
    AlreadyClosed,
    /// InitiateClose on a channel that is already closing or disputed.
    #[error("close already initiated")]
    AlreadyClosing,
    /// Challenge or Finalize on a channel that is still open.
    #[error("channel is not closing")]
    NotClosing,
    /// Escrow ledger failure outside the validation taxonomy; retryable.
    #[error(transparent)]
    Ledger(LedgerError),
    /// Store failure; retryable.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Canonical encoding failure (a bug in the payload types, not input).
    #[error("encoding: {0}")]
    Encoding(#[from] codec::Error),
}

/// Orchestrates the channel lifecycle over injected dependencies.
///
/// Calls for different channels run fully in parallel; calls against the
/// same channel are serialized by a per-channel mutex held across
/// validate → external call → persist. Reads bypass the channel locks.
#[derive(Debug)]
pub struct ChannelEngine<S, L, V, C> {
    store: S,
    ledger: L,
    verifier: V,
    clock: C,
    challenge_period: u64,
    chan_locks: Mutex<HashMap<ChannelId, Arc<Mutex<()>>>>,
}

impl<S, L, V, C> ChannelEngine<S, L, V, C>
where
    S: ChannelStore,
    L: EscrowLedger,
    V: SignatureVerifier,
    C: DisputeClock,
{
    /// Engine with the default 24h challenge period.
    pub fn new(store: S, ledger: L, verifier: V, clock: C) -> Self {
        Self::with_challenge_period(store, ledger, verifier, clock, DEFAULT_CHALLENGE_PERIOD)
    }

    pub fn with_challenge_period(
        store: S,
        ledger: L,
        verifier: V,
        clock: C,
        challenge_period: u64,
    ) -> Self {
        ChannelEngine {
            store,
            ledger,
            verifier,
            clock,
            challenge_period,
            chan_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn challenge_period(&self) -> u64 {
        self.challenge_period
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Open a channel: derive its ID, lock both deposits in escrow and
    /// persist the record. Atomic: on any failure every lock taken so far
    /// is released again and nothing is stored.
    pub fn open(
        &self,
        party_a: Address,
        party_b: Address,
        token: TokenId,
        amount_a: u64,
        amount_b: u64,
        nonce: u64,
    ) -> Result<ChannelId, EngineError> {
        if party_a == party_b {
            return Err(EngineError::IdenticalParties);
        }
        if amount_a == 0 && amount_b == 0 {
            return Err(EngineError::ZeroDeposits);
        }
        if amount_a.checked_add(amount_b).is_none() {
            return Err(EngineError::DepositOverflow);
        }

        let id = ChannelParams {
            party_a,
            party_b,
            token,
            nonce,
        }
        .channel_id()?;

        // Taking the channel lock before the duplicate check makes two
        // racing opens with equal parameters resolve deterministically.
        let guard = self.channel_guard(id);
        let _guard = guard.lock().unwrap_or_else(PoisonError::into_inner);

        if self.store.get(id)?.is_some() {
            return Err(EngineError::DuplicateChannel);
        }

        if amount_a > 0 {
            self.ledger
                .lock(party_a, token, amount_a)
                .map_err(lock_failure)?;
        }
        if amount_b > 0 {
            if let Err(e) = self.ledger.lock(party_b, token, amount_b) {
                self.release_lock(party_a, token, amount_a);
                return Err(lock_failure(e));
            }
        }

        let channel = Channel {
            id,
            party_a,
            party_b,
            token,
            deposit_a: amount_a,
            deposit_b: amount_b,
            status: ChannelStatus::Open,
            nonce,
            pending: None,
            deadline: None,
        };
        if let Err(e) = self.store.put(channel) {
            self.release_lock(party_a, token, amount_a);
            self.release_lock(party_b, token, amount_b);
            return Err(e.into());
        }

        info!(channel = ?id, deposit_a = amount_a, deposit_b = amount_b, "channel opened");
        Ok(id)
    }

    /// Put a valid state on record and start the challenge window.
    ///
    /// Callable by either party: the point is to start the clock with *a*
    /// dual-signed state, and the counterparty gets the window to supersede
    /// it if it is stale.
    pub fn initiate_close(&self, state: SignedState) -> Result<(), EngineError> {
        let guard = self.channel_guard(state.channel_id);
        let _guard = guard.lock().unwrap_or_else(PoisonError::into_inner);

        let mut channel = self.load(state.channel_id)?;
        match channel.status {
            ChannelStatus::Open => {}
            ChannelStatus::Closing | ChannelStatus::Disputed => {
                return Err(EngineError::AlreadyClosing)
            }
            ChannelStatus::Closed => return Err(EngineError::AlreadyClosed),
        }
        // For the first close any state at or above the open nonce counts.
        if state.nonce < channel.nonce {
            warn!(channel = ?state.channel_id, nonce = state.nonce, "stale close attempt");
            return Err(EngineError::StaleState);
        }
        self.validate_state(&channel, &state)?;

        let deadline = self.clock.now().saturating_add(self.challenge_period);
        channel.nonce = state.nonce;
        channel.pending = Some(state);
        channel.status = ChannelStatus::Closing;
        channel.deadline = Some(deadline);
        self.store.put(channel)?;

        debug!(channel = ?state.channel_id, nonce = state.nonce, deadline, "close initiated");
        Ok(())
    }

    /// Supersede the pending state with a strictly newer dual-signed one.
    ///
    /// The deadline is not reset: the window is fixed from the first
    /// InitiateClose, bounding total time-to-finality no matter how many
    /// challenges occur.
    pub fn challenge(&self, state: SignedState) -> Result<(), EngineError> {
        let guard = self.channel_guard(state.channel_id);
        let _guard = guard.lock().unwrap_or_else(PoisonError::into_inner);

        let mut channel = self.load(state.channel_id)?;
        match channel.status {
            ChannelStatus::Closing | ChannelStatus::Disputed => {}
            ChannelStatus::Open => return Err(EngineError::NotClosing),
            ChannelStatus::Closed => return Err(EngineError::AlreadyClosed),
        }
        let deadline = channel.deadline.ok_or_else(|| {
            EngineError::Store(StoreError::Corrupt(
                "closing channel without a deadline".into(),
            ))
        })?;
        if self.clock.now() >= deadline {
            warn!(channel = ?state.channel_id, "challenge after deadline");
            return Err(EngineError::ChallengeWindowExpired);
        }
        // The core anti-fraud rule: only a strictly newer jointly-signed
        // state can override a pending one.
        if state.nonce <= channel.nonce {
            warn!(
                channel = ?state.channel_id,
                nonce = state.nonce,
                recorded = channel.nonce,
                "stale challenge"
            );
            return Err(EngineError::StaleState);
        }
        self.validate_state(&channel, &state)?;

        channel.nonce = state.nonce;
        channel.pending = Some(state);
        channel.status = ChannelStatus::Disputed;
        self.store.put(channel)?;

        debug!(channel = ?state.channel_id, nonce = state.nonce, "pending state superseded");
        Ok(())
    }

    /// Pay out the pending state and close the channel.
    ///
    /// Callable by anyone once the window has elapsed; the outcome is
    /// already fixed by the dual-signed pending state, and requiring a
    /// particular caller would only risk liveness if one party disappears.
    /// On a payout or store failure the status is left unchanged so the
    /// call can be retried; [EscrowLedger::payout] idempotence makes the
    /// retry safe.
    pub fn finalize(&self, id: ChannelId) -> Result<(), EngineError> {
        let guard = self.channel_guard(id);
        let _guard = guard.lock().unwrap_or_else(PoisonError::into_inner);

        let mut channel = self.load(id)?;
        match channel.status {
            ChannelStatus::Closing | ChannelStatus::Disputed => {}
            ChannelStatus::Open => return Err(EngineError::NotClosing),
            ChannelStatus::Closed => return Err(EngineError::AlreadyClosed),
        }
        let deadline = channel.deadline.ok_or_else(|| {
            EngineError::Store(StoreError::Corrupt(
                "closing channel without a deadline".into(),
            ))
        })?;
        if self.clock.now() < deadline {
            return Err(EngineError::TooEarly);
        }
        let pending = channel.pending.ok_or_else(|| {
            EngineError::Store(StoreError::Corrupt(
                "closing channel without a pending state".into(),
            ))
        })?;

        self.pay_out(&channel, &pending)?;

        channel.status = ChannelStatus::Closed;
        self.store.put(channel)?;
        self.drop_channel_guard(id);

        info!(
            channel = ?id,
            balance_a = pending.balance_a,
            balance_b = pending.balance_b,
            "channel finalized"
        );
        Ok(())
    }

    /// Settle a dual-signed state immediately, skipping the challenge
    /// window.
    ///
    /// The cooperative exit: with a valid state at or above the recorded
    /// nonce in hand there is nothing left to dispute, so the window exists
    /// only to protect against staler submissions, which this one is not.
    /// Accepted from any status but `Closed`; payout and retry rules are
    /// those of [finalize][ChannelEngine::finalize].
    pub fn force_close(&self, state: SignedState) -> Result<(), EngineError> {
        let guard = self.channel_guard(state.channel_id);
        let _guard = guard.lock().unwrap_or_else(PoisonError::into_inner);

        let mut channel = self.load(state.channel_id)?;
        if channel.status == ChannelStatus::Closed {
            return Err(EngineError::AlreadyClosed);
        }
        if state.nonce < channel.nonce {
            warn!(channel = ?state.channel_id, nonce = state.nonce, "stale force close");
            return Err(EngineError::StaleState);
        }
        self.validate_state(&channel, &state)?;

        self.pay_out(&channel, &state)?;

        channel.nonce = state.nonce;
        channel.pending = Some(state);
        channel.status = ChannelStatus::Closed;
        self.store.put(channel)?;
        self.drop_channel_guard(state.channel_id);

        info!(channel = ?state.channel_id, nonce = state.nonce, "channel force-closed");
        Ok(())
    }

    pub fn get_channel(&self, id: ChannelId) -> Result<Channel, EngineError> {
        self.load(id)
    }

    /// All stored channels, regardless of status. Callers filter.
    pub fn list_channels(&self) -> Result<Vec<Channel>, EngineError> {
        Ok(self.store.list()?)
    }

    fn load(&self, id: ChannelId) -> Result<Channel, EngineError> {
        self.store.get(id)?.ok_or(EngineError::NotFound)
    }

    /// Reject a submission before any mutation: conservation first, then
    /// both signatures over the canonical encoding.
    fn validate_state(&self, channel: &Channel, state: &SignedState) -> Result<(), EngineError> {
        match state.balance_total() {
            Some(total) if total == channel.total_deposit() => {}
            _ => return Err(EngineError::MalformedState),
        }

        let message = state.message()?;
        if !self.verifier.verify(channel.party_a, &message, state.sig_a) {
            return Err(EngineError::InvalidSignature(channel.party_a));
        }
        if !self.verifier.verify(channel.party_b, &message, state.sig_b) {
            return Err(EngineError::InvalidSignature(channel.party_b));
        }
        Ok(())
    }

    /// Conservation holds by the checks at acceptance time, so these two
    /// payouts drain the channel's escrow to exactly zero.
    fn pay_out(&self, channel: &Channel, state: &SignedState) -> Result<(), EngineError> {
        if state.balance_a > 0 {
            self.ledger
                .payout(channel.id, channel.party_a, channel.token, state.balance_a)
                .map_err(EngineError::Ledger)?;
        }
        if state.balance_b > 0 {
            self.ledger
                .payout(channel.id, channel.party_b, channel.token, state.balance_b)
                .map_err(EngineError::Ledger)?;
        }
        Ok(())
    }

    /// Per-channel mutual-exclusion scope.
    fn channel_guard(&self, id: ChannelId) -> Arc<Mutex<()>> {
        self.chan_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone()
    }

    /// Forget the mutual-exclusion entry of a channel that reached `Closed`,
    /// so the lock map does not grow with every channel ever settled.
    /// Callers holding a clone of the guard are unaffected.
    fn drop_channel_guard(&self, id: ChannelId) {
        self.chan_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Compensate a lock taken by a partially completed open.
    fn release_lock(&self, party: Address, token: TokenId, amount: u64) {
        if amount == 0 {
            return;
        }
        if let Err(e) = self.ledger.unlock(party, token, amount) {
            // The open already failed; all we can do is report the funds
            // that could not be released.
            error!(?party, amount, %e, "failed to release escrow lock of aborted open");
        }
    }
}

fn lock_failure(e: LedgerError) -> EngineError {
    match e {
        LedgerError::InsufficientFunds { .. } => EngineError::InsufficientFunds,
        other => EngineError::Ledger(other),
    }
}
