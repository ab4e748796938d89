//! Channel records and signed off-chain states.
//!
//! A [Channel] is the durable aggregate the engine adjudicates over: two
//! parties, their escrowed deposits, the dispute status and the
//! currently-winning [SignedState]. Parties exchange [SignedState] values
//! out-of-band; the engine only sees one when a party submits it to close or
//! challenge.

use crate::clock::Timestamp;
use crate::codec::{
    self,
    types::{Address, ChannelId, Signature, TokenId},
};
use serde::Serialize;

/// Inputs the channel identity is derived from.
///
/// The ID is the Keccak-256 digest of the packed encoding of these fields,
/// so it is deterministic in the parties, the token and the caller-chosen
/// open nonce, and channels with any differing input get distinct IDs.
#[derive(Serialize, Debug, Copy, Clone)]
pub struct ChannelParams {
    pub party_a: Address,
    pub party_b: Address,
    pub token: TokenId,
    pub nonce: u64,
}

impl ChannelParams {
    pub fn channel_id(&self) -> Result<ChannelId, codec::Error> {
        codec::to_hash(self).map(ChannelId::from)
    }
}

/// Dispute status of a channel.
///
/// `Open → Closing → Disputed* → Closed`; `Disputed` may be re-entered by
/// repeated challenges, `Closed` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Funded and live; parties update state off-chain.
    Open,
    /// A close was initiated; the challenge window is running.
    Closing,
    /// The pending state was superseded at least once; window still fixed.
    Disputed,
    /// Settled and paid out. No further mutation.
    Closed,
}

/// The stored channel record.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub party_a: Address,
    pub party_b: Address,
    pub token: TokenId,
    /// Amounts locked into escrow at open. Their sum is the total value this
    /// channel can ever distribute.
    pub deposit_a: u64,
    pub deposit_b: u64,
    pub status: ChannelStatus,
    /// Sequence number of the last accepted state; starts at the open nonce.
    pub nonce: u64,
    /// The currently-winning candidate final state. Set on InitiateClose,
    /// possibly replaced by Challenge, authoritative at Finalize. Kept after
    /// close as the settlement record.
    pub pending: Option<SignedState>,
    /// End of the challenge window. Set once when the close is initiated and
    /// never moved afterwards.
    pub deadline: Option<Timestamp>,
}

impl Channel {
    /// Sum of both deposits. Validated to fit in u64 at open.
    pub fn total_deposit(&self) -> u64 {
        self.deposit_a + self.deposit_b
    }
}

/// A dual-signed off-chain balance update.
///
/// The value with the greatest nonce that carries two valid signatures is
/// authoritative for its channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SignedState {
    pub channel_id: ChannelId,
    pub nonce: u64,
    pub balance_a: u64,
    pub balance_b: u64,
    /// Authorization by PartyA over [SignedState::message].
    pub sig_a: Signature,
    /// Authorization by PartyB over [SignedState::message].
    pub sig_b: Signature,
}

/// What both parties sign: everything except the signatures themselves.
#[derive(Serialize, Debug, Copy, Clone)]
pub struct StatePayload {
    pub channel_id: ChannelId,
    pub nonce: u64,
    pub balance_a: u64,
    pub balance_b: u64,
}

impl SignedState {
    pub fn payload(&self) -> StatePayload {
        StatePayload {
            channel_id: self.channel_id,
            nonce: self.nonce,
            balance_a: self.balance_a,
            balance_b: self.balance_b,
        }
    }

    /// Canonical packed encoding of the payload, the message both
    /// signatures are checked against.
    pub fn message(&self) -> Result<Vec<u8>, codec::Error> {
        codec::to_bytes(&self.payload())
    }

    /// Balance sum, `None` on u64 overflow (such a state can never satisfy
    /// conservation and is malformed).
    pub fn balance_total(&self) -> Option<u64> {
        self.balance_a.checked_add(self.balance_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn channel_id_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(0);
        let params = ChannelParams {
            party_a: rng.gen(),
            party_b: rng.gen(),
            token: rng.gen(),
            nonce: 42,
        };

        assert_eq!(params.channel_id().unwrap(), params.channel_id().unwrap());
    }

    #[test]
    fn channel_id_distinguishes_every_input() {
        let mut rng = StdRng::seed_from_u64(1);
        let base = ChannelParams {
            party_a: rng.gen(),
            party_b: rng.gen(),
            token: rng.gen(),
            nonce: 1,
        };
        let id = base.channel_id().unwrap();

        let mut other_nonce = base;
        other_nonce.nonce = 2;
        assert_ne!(other_nonce.channel_id().unwrap(), id);

        let mut other_token = base;
        other_token.token = rng.gen();
        assert_ne!(other_token.channel_id().unwrap(), id);

        // Party order matters: (A, B) and (B, A) are different channels.
        let swapped = ChannelParams {
            party_a: base.party_b,
            party_b: base.party_a,
            ..base
        };
        assert_ne!(swapped.channel_id().unwrap(), id);
    }

    #[test]
    fn state_message_is_fixed_width() {
        let mut rng = StdRng::seed_from_u64(2);
        let state = SignedState {
            channel_id: rng.gen(),
            nonce: 7,
            balance_a: 100,
            balance_b: 50,
            sig_a: rng.gen(),
            sig_b: rng.gen(),
        };

        // 32-byte channel id plus three u64 fields.
        assert_eq!(state.message().unwrap().len(), 32 + 8 + 8 + 8);
    }

    #[test]
    fn balance_total_overflow_is_none() {
        let mut rng = StdRng::seed_from_u64(3);
        let state = SignedState {
            channel_id: rng.gen(),
            nonce: 1,
            balance_a: u64::MAX,
            balance_b: 1,
            sig_a: rng.gen(),
            sig_b: rng.gen(),
        };
        assert_eq!(state.balance_total(), None);
    }
}
