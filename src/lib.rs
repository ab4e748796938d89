//! Dispute-resolution engine for two-party state channels.
//!
//! Two parties lock deposits against a channel once, exchange dual-signed
//! balance updates off-chain, and settle through [ChannelEngine]: either
//! party puts its best state on record with `initiate_close`, the
//! counterparty may supersede it with a higher-nonce state during the
//! challenge window, and after the window anyone may `finalize`, paying out
//! the last accepted state.

mod codec {
    mod error;
    mod hashing;
    mod ser;

    pub mod types;

    pub use error::Error;
    pub use hashing::to_hash;
    pub use ser::{to_bytes, to_writer, Writer};

    #[cfg(test)]
    mod tests;
}

pub mod channel;
pub mod clock;
pub mod engine;
pub mod ledger;
pub mod sig;
pub mod store;
pub mod wire;

pub use channel::{Channel, ChannelParams, ChannelStatus, SignedState};
pub use codec::types::{Address, ChannelId, Hash, Signature, TokenId};
pub use codec::Error as EncodingError;
pub use engine::{ChannelEngine, EngineError, DEFAULT_CHALLENGE_PERIOD};
