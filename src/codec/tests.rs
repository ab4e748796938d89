use super::types::{Address, ChannelId, TokenId};
use super::*;
use serde::Serialize;

fn encode_hex<T: Serialize>(value: &T) -> String {
    hex::encode(to_bytes(value).unwrap())
}

#[derive(Serialize)]
struct Packed {
    id: ChannelId,
    nonce: u64,
    balance_a: u64,
    balance_b: u64,
}

#[test]
fn packed_struct_is_field_concatenation() {
    let d = Packed {
        id: ChannelId([0x11; 32]),
        nonce: 0x2222,
        balance_a: 0x5555,
        balance_b: 0x6666,
    };

    let expected = concat!(
        "1111111111111111111111111111111111111111111111111111111111111111",
        "0000000000002222",
        "0000000000005555",
        "0000000000006666",
    );
    assert_eq!(encode_hex(&d), expected);
    assert_eq!(to_bytes(&d).unwrap().len(), 32 + 8 + 8 + 8);
}

#[test]
fn packed_newtypes_are_raw_bytes() {
    #[derive(Serialize)]
    struct Derivation {
        party_a: Address,
        party_b: Address,
        token: TokenId,
        nonce: u64,
    }

    let d = Derivation {
        party_a: Address([0xaa; 20]),
        party_b: Address([0xbb; 20]),
        token: TokenId([0x01; 16]),
        nonce: 7,
    };

    let expected = concat!(
        "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
        "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
        "01010101010101010101010101010101",
        "0000000000000007",
    );
    assert_eq!(encode_hex(&d), expected);
}

#[test]
fn integers_are_big_endian_at_natural_width() {
    #[derive(Serialize)]
    struct Widths(u8, u16, u32, u64, u128);

    let d = Widths(0x01, 0x0203, 0x04050607, 0x08090a0b0c0d0e0f, 0x10);
    let expected = concat!(
        "01",
        "0203",
        "04050607",
        "08090a0b0c0d0e0f",
        "00000000000000000000000000000010",
    );
    assert_eq!(encode_hex(&d), expected);
}

#[test]
fn variable_width_types_are_rejected() {
    #[derive(Serialize)]
    struct WithString {
        s: &'static str,
    }
    assert_eq!(
        to_bytes(&WithString { s: "hi" }),
        Err(Error::TypeNotRepresentable("str"))
    );

    #[derive(Serialize)]
    struct WithVec {
        v: Vec<u64>,
    }
    assert_eq!(
        to_bytes(&WithVec { v: vec![1, 2] }),
        Err(Error::TypeNotRepresentable("seq"))
    );

    #[derive(Serialize)]
    struct WithOption {
        o: Option<u64>,
    }
    assert_eq!(
        to_bytes(&WithOption { o: Some(1) }),
        Err(Error::TypeNotRepresentable("some"))
    );
}

#[test]
fn hash_is_deterministic_and_field_sensitive() {
    let base = Packed {
        id: ChannelId([0x11; 32]),
        nonce: 1,
        balance_a: 100,
        balance_b: 50,
    };
    let same = Packed {
        id: ChannelId([0x11; 32]),
        nonce: 1,
        balance_a: 100,
        balance_b: 50,
    };
    let other_nonce = Packed {
        id: ChannelId([0x11; 32]),
        nonce: 2,
        balance_a: 100,
        balance_b: 50,
    };
    // Swapping the balances must change the digest: the encoding is
    // positional, not a multiset of field values.
    let swapped = Packed {
        id: ChannelId([0x11; 32]),
        nonce: 1,
        balance_a: 50,
        balance_b: 100,
    };

    assert_eq!(to_hash(&base).unwrap(), to_hash(&same).unwrap());
    assert_ne!(to_hash(&base).unwrap(), to_hash(&other_nonce).unwrap());
    assert_ne!(to_hash(&base).unwrap(), to_hash(&swapped).unwrap());
}
