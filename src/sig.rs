//! Creation and verification of (Ethereum-style) signatures over canonical
//! state encodings.
//!
//! A party authorizes a state by signing the Keccak-256 digest of the
//! state's canonical packed encoding, wrapped in the
//! `\x19Ethereum Signed Message:\n32` prefix. Verification recovers the
//! signer's address from the recoverable signature and compares it to the
//! expected party, so no public-key registry is needed.

use crate::codec::types::{Address, Hash, Signature};
use sha3::{Digest, Keccak256};

mod k256;
pub use self::k256::{recover_signer, Error, Signer};

#[cfg(test)]
mod tests;

/// Validates that a purported authorization over a message was produced by a
/// given party's key.
///
/// `message` is the canonical packed encoding of the signed payload; the
/// digesting and prefixing scheme is the implementation's concern.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, party: Address, message: &[u8], sig: Signature) -> bool;
}

/// [SignatureVerifier] backed by ECDSA public-key recovery.
///
/// Stateless: the party address is itself derived from the signing key, so a
/// signature is valid iff the recovered address equals the party.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryVerifier;

impl SignatureVerifier for RecoveryVerifier {
    fn verify(&self, party: Address, message: &[u8], sig: Signature) -> bool {
        let digest = Hash(Keccak256::digest(message).into());
        match recover_signer(digest, sig) {
            Ok(signer) => signer == party,
            Err(_) => false,
        }
    }
}

/// Add the `\x19Ethereum Signed Message:\n<length>` prefix to hash.
///
/// This is the format expected by the Solidity contracts.
fn hash_to_eth_signed_msg_hash(hash: Hash) -> Hash {
    // Packed encoding => We can't use the serializer
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n32");
    hasher.update(hash.0);
    Hash(hasher.finalize().into())
}
