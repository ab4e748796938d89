//! Escrow ledger interface and an in-memory implementation.
//!
//! The engine never reads or writes balances directly: it locks deposits at
//! open, compensates with an unlock when an open fails halfway, and pays out
//! at finalize. Everything else about fund custody is the ledger's concern.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::codec::types::{Address, ChannelId, TokenId};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The party's free balance does not cover the requested lock.
    #[error("insufficient funds: party {party:?} cannot lock {amount} of token {token:?}")]
    InsufficientFunds {
        party: Address,
        token: TokenId,
        amount: u64,
    },
    /// Transient backend failure; the operation may be retried.
    #[error("escrow ledger unavailable: {0}")]
    Unavailable(String),
}

/// Holds each party's deposited funds and the per-token escrow.
///
/// `payout` must be idempotent per `(channel, party)`: finalize retries
/// after a partial failure re-issue payouts that may already have landed,
/// and the second attempt has to be a no-op rather than a double payment.
pub trait EscrowLedger: Send + Sync {
    /// Move `amount` of `token` from `party`'s free balance into escrow.
    fn lock(&self, party: Address, token: TokenId, amount: u64) -> Result<(), LedgerError>;

    /// Undo a lock. Used to compensate a partially completed open.
    fn unlock(&self, party: Address, token: TokenId, amount: u64) -> Result<(), LedgerError>;

    /// Pay `amount` of `token` out of escrow to `party`, on behalf of
    /// `channel`.
    fn payout(
        &self,
        channel: ChannelId,
        party: Address,
        token: TokenId,
        amount: u64,
    ) -> Result<(), LedgerError>;
}

impl<T: EscrowLedger> EscrowLedger for Arc<T> {
    fn lock(&self, party: Address, token: TokenId, amount: u64) -> Result<(), LedgerError> {
        (**self).lock(party, token, amount)
    }

    fn unlock(&self, party: Address, token: TokenId, amount: u64) -> Result<(), LedgerError> {
        (**self).unlock(party, token, amount)
    }

    fn payout(
        &self,
        channel: ChannelId,
        party: Address,
        token: TokenId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        (**self).payout(channel, party, token, amount)
    }
}

#[derive(Debug, Default)]
struct LedgerInner {
    free: HashMap<(Address, TokenId), u64>,
    escrow: HashMap<TokenId, u64>,
    paid: HashSet<(ChannelId, Address)>,
}

/// In-memory [EscrowLedger] with inspectable balances.
///
/// Baseline backend and test double; deposits are seeded through
/// [MemoryLedger::deposit].
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<LedgerInner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `party`'s free balance. Test/demo seeding, not part of the
    /// [EscrowLedger] contract.
    pub fn deposit(&self, party: Address, token: TokenId, amount: u64) {
        let mut inner = self.lock_inner();
        *inner.free.entry((party, token)).or_default() += amount;
    }

    pub fn free_balance(&self, party: Address, token: TokenId) -> u64 {
        self.lock_inner()
            .free
            .get(&(party, token))
            .copied()
            .unwrap_or(0)
    }

    /// Total escrowed amount of `token` across all channels.
    pub fn escrowed(&self, token: TokenId) -> u64 {
        self.lock_inner().escrow.get(&token).copied().unwrap_or(0)
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EscrowLedger for MemoryLedger {
    fn lock(&self, party: Address, token: TokenId, amount: u64) -> Result<(), LedgerError> {
        let mut inner = self.lock_inner();
        let free = inner.free.entry((party, token)).or_default();
        if *free < amount {
            return Err(LedgerError::InsufficientFunds {
                party,
                token,
                amount,
            });
        }
        *free -= amount;
        *inner.escrow.entry(token).or_default() += amount;
        Ok(())
    }

    fn unlock(&self, party: Address, token: TokenId, amount: u64) -> Result<(), LedgerError> {
        let mut inner = self.lock_inner();
        let escrow = inner.escrow.entry(token).or_default();
        *escrow = escrow.saturating_sub(amount);
        *inner.free.entry((party, token)).or_default() += amount;
        Ok(())
    }

    fn payout(
        &self,
        channel: ChannelId,
        party: Address,
        token: TokenId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let mut inner = self.lock_inner();
        if !inner.paid.insert((channel, party)) {
            // Already paid for this channel; retried finalize.
            return Ok(());
        }
        let escrow = inner.escrow.entry(token).or_default();
        *escrow = escrow.saturating_sub(amount);
        *inner.free.entry((party, token)).or_default() += amount;
        Ok(())
    }
}
