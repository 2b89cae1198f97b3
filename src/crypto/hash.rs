//! Content hashing.
//!
//! File payload hashes use Blake3, matching `spec.md` §3's `data_hash`
//! invariant (`hash(bytes) == header.data_hash`). Identity hashing for
//! datastore ids and addresses uses the bitcoin-style `hash160`
//! (RIPEMD-160 of SHA-256), matching `original_source`'s base58check
//! identifiers.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Hash payload bytes and return the hex-encoded digest used as
/// `FileHeader::data_hash`.
pub fn data_hash(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Check that `bytes` hashes to `expected_hex`, the invariant every read
/// path in `spec.md` §4.4.2 / §8 must uphold before returning data.
pub fn verify_data_hash(bytes: &[u8], expected_hex: &str) -> bool {
    data_hash(bytes) == expected_hex
}

/// RIPEMD160(SHA256(data)) — the identity hash backing datastore ids
/// (`Datastore.id == hash(Datastore.pubkey)`, `spec.md` §3) and address
/// re-encoding in the blockchain query proxy.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Base58check-encode a hash160 with the given version byte, producing a
/// datastore/address identifier.
pub fn base58check_encode(version: u8, payload: &[u8; 20]) -> String {
    let mut buf = Vec::with_capacity(21);
    buf.push(version);
    buf.extend_from_slice(payload);
    bs58::encode(buf).with_check().into_string()
}

/// Decode a base58check string, returning `(version, payload)`.
pub fn base58check_decode(s: &str) -> Option<(u8, Vec<u8>)> {
    let bytes = bs58::decode(s).with_check(None).into_vec().ok()?;
    if bytes.is_empty() {
        return None;
    }
    Some((bytes[0], bytes[1..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_hash_is_deterministic_and_sensitive() {
        let a = data_hash(b"hi");
        let b = data_hash(b"hi");
        let c = data_hash(b"ho");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn verify_data_hash_round_trips() {
        let bytes = b"payload bytes";
        let hash = data_hash(bytes);
        assert!(verify_data_hash(bytes, &hash));
        assert!(!verify_data_hash(b"tampered", &hash));
    }

    #[test]
    fn base58check_round_trips() {
        let payload = hash160(b"a public key");
        let encoded = base58check_encode(0, &payload);
        let (version, decoded) = base58check_decode(&encoded).unwrap();
        assert_eq!(version, 0);
        assert_eq!(decoded, payload.to_vec());
    }

    #[test]
    fn base58check_rejects_corrupted_strings() {
        let payload = hash160(b"a public key");
        let mut encoded = base58check_encode(0, &payload);
        encoded.push('z');
        assert!(base58check_decode(&encoded).is_none());
    }
}
