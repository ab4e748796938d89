//! Textual interop encoding for external callers.
//!
//! Identifiers and signatures cross RPC/CLI boundaries as hex-encoded
//! fixed-width byte strings (20 bytes for an address, 16 for a token, 32
//! for a channel ID, 65 for a signature); numeric fields travel as unsigned
//! 64-bit decimals and need no help from this module. Implemented as
//! `Display`/`FromStr` on the byte newtypes so any textual transport can
//! use the standard conversion traits.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

use crate::codec::types::{Address, ChannelId, Hash, Signature, TokenId};

// No Eq: hex::FromHexError is only PartialEq.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("expected {expected} hex characters, got {got}")]
    Length { expected: usize, got: usize },
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

macro_rules! impl_hex_wire {
    ($T:ident) => {
        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl FromStr for $T {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != 2 * $T::LEN {
                    return Err(ParseError::Length {
                        expected: 2 * $T::LEN,
                        got: s.len(),
                    });
                }
                let mut out = $T::default();
                hex::decode_to_slice(s, &mut out.0)?;
                Ok(out)
            }
        }
    };
}

impl_hex_wire!(Address);
impl_hex_wire!(TokenId);
impl_hex_wire!(ChannelId);
impl_hex_wire!(Hash);
impl_hex_wire!(Signature);

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn round_trip() {
        let mut rng = StdRng::seed_from_u64(0);

        let addr: Address = rng.gen();
        assert_eq!(addr.to_string().parse::<Address>().unwrap(), addr);

        let token: TokenId = rng.gen();
        assert_eq!(token.to_string().parse::<TokenId>().unwrap(), token);

        let id: ChannelId = rng.gen();
        assert_eq!(id.to_string().parse::<ChannelId>().unwrap(), id);

        let sig: Signature = rng.gen();
        assert_eq!(sig.to_string().parse::<Signature>().unwrap(), sig);
    }

    #[test]
    fn rendering_is_fixed_width_lowercase() {
        let addr = Address([0xAB; 20]);
        let text = addr.to_string();
        assert_eq!(text.len(), 40);
        assert_eq!(text, "ab".repeat(20));
    }

    #[test]
    fn rejects_wrong_length() {
        let err = "abcd".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            ParseError::Length {
                expected: 40,
                got: 4
            }
        );
    }

    #[test]
    fn rejects_non_hex_characters() {
        let text = "zz".repeat(16);
        assert!(matches!(
            text.parse::<TokenId>().unwrap_err(),
            ParseError::Hex(_)
        ));
    }
}
