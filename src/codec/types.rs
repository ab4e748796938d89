use core::fmt::Debug;

use rand::{distributions::Standard, prelude::Distribution};
use serde::Serialize;

macro_rules! impl_hex_debug {
    ($T:ident) => {
        impl Debug for $T {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("0x")?;
                for b in self.0 {
                    f.write_fmt(format_args!("{:02x}", b))?;
                }
                Ok(())
            }
        }
    };
}

macro_rules! bytes_newtype {
    ( $(#[$meta:meta])* $T:ident, $N:literal ) => {
        $(#[$meta])*
        #[derive(PartialEq, Eq, Hash, Copy, Clone)]
        pub struct $T(pub [u8; $N]);

        impl $T {
            pub const LEN: usize = $N;
        }

        impl Serialize for $T {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_bytes(&self.0)
            }
        }

        impl Distribution<$T> for Standard {
            fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> $T {
                let mut v = $T([0; $N]);
                rng.fill(&mut v.0[..]);
                v
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self([0; $N])
            }
        }

        impl_hex_debug!($T);
    };
}

bytes_newtype!(
    /// Opaque identifier of a channel participant.
    Address,
    20
);

bytes_newtype!(
    /// Opaque identifier of the asset denominating a channel.
    TokenId,
    16
);

bytes_newtype!(
    /// Identity of a channel, derived from the two parties, the token and
    /// the open nonce. Unique per channel, immutable once assigned.
    ChannelId,
    32
);

bytes_newtype!(
    /// Keccak-256 digest of a canonical encoding.
    Hash,
    32
);

bytes_newtype!(
    /// Recoverable ECDSA signature: 65 bytes `r || s || v` with `v` in
    /// {27, 28}.
    Signature,
    65
);

impl From<Hash> for ChannelId {
    fn from(h: Hash) -> Self {
        ChannelId(h.0)
    }
}
