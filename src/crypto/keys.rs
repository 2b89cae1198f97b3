//! secp256k1 key handling.
//!
//! Mirrors the shape of the teacher crate's `SignatureKeyPair`
//! (`crypto::signatures::SignatureKeyPair` in `dsm_storage_node`) —
//! `generate`/`sign`/`verify`/`verify_raw` — with the backing
//! cryptosystem swapped from SPHINCS+ to secp256k1 ECDSA, since every
//! public key in this domain (device keys, datastore owner keys, the
//! master data key) is compared in *compressed* form, per `spec.md` §4.3
//! step 3 and `original_source`'s `keylib.key_formatting.compress`.

use crate::error::{GatewayError, Result};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};

#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = rand::thread_rng();
        let (secret_key, public_key) = secp.generate_keypair(&mut rng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Parse a keypair from a hex-encoded 32-byte secret key.
    pub fn from_secret_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key)
            .map_err(|e| GatewayError::InvalidInput(format!("bad secret key hex: {e}")))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| GatewayError::InvalidInput(format!("bad secret key: {e}")))?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Sign a digest (the caller hashes the message first, matching
    /// `sign_digest`'s use in the JWT codec and datastore signing paths).
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Signature {
        let secp = Secp256k1::new();
        let message = Message::from_slice(digest).expect("digest is 32 bytes");
        secp.sign_ecdsa(&message, &self.secret_key)
    }
}

/// Verify a signature over a digest against a raw (possibly uncompressed
/// or compressed) public key, without requiring the signer's secret key.
pub fn verify_digest(digest: &[u8; 32], signature: &Signature, public_key: &PublicKey) -> bool {
    let secp = Secp256k1::new();
    let message = match Message::from_slice(digest) {
        Ok(m) => m,
        Err(_) => return false,
    };
    secp.verify_ecdsa(&message, signature, public_key).is_ok()
}

/// Parse a hex-encoded public key in either compressed (33-byte) or
/// uncompressed (65-byte) form.
pub fn parse_pubkey_hex(hex_key: &str) -> Result<PublicKey> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| GatewayError::InvalidPublicKey(format!("bad public key hex: {e}")))?;
    PublicKey::from_slice(&bytes)
        .map_err(|e| GatewayError::InvalidPublicKey(format!("bad public key: {e}")))
}

/// Compress a hex-encoded public key, used wherever `spec.md` requires
/// comparing keys in "compressed form" (§4.3 step 3).
pub fn compress_pubkey(hex_key: &str) -> Result<String> {
    let pk = parse_pubkey_hex(hex_key)?;
    Ok(hex::encode(pk.serialize()))
}

/// Compressed-form equality, used to match a device's declared public key
/// against the key recovered from `app_private_key` (`spec.md` §4.3).
pub fn compressed_keys_equal(a: &str, b: &str) -> bool {
    match (compress_pubkey(a), compress_pubkey(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trips() {
        let kp = KeyPair::generate();
        let digest = blake3::hash(b"hello").into();
        let sig = kp.sign_digest(&digest);
        assert!(verify_digest(&digest, &sig, &kp.public_key));
    }

    #[test]
    fn verify_rejects_tampered_digest() {
        let kp = KeyPair::generate();
        let digest = blake3::hash(b"hello").into();
        let sig = kp.sign_digest(&digest);
        let other_digest = blake3::hash(b"goodbye").into();
        assert!(!verify_digest(&other_digest, &sig, &kp.public_key));
    }

    #[test]
    fn compressed_keys_equal_regardless_of_serialization() {
        let kp = KeyPair::generate();
        let compressed = kp.public_key.serialize();
        let uncompressed = kp.public_key.serialize_uncompressed();
        assert!(compressed_keys_equal(
            &hex::encode(compressed),
            &hex::encode(uncompressed)
        ));
    }
}
