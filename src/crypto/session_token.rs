//! Gateway-issued session tokens.
//!
//! Distinct from `jwt.rs`'s generic codec: this module owns the
//! gateway's own signing identity, the "master data key", generated on
//! first run (or loaded from config) and used to sign every `Session`
//! the session manager issues via `GET /auth`, and to verify the
//! session tokens presented on every later request.

use crate::crypto::keys::KeyPair;
use crate::error::Result;
use secp256k1::PublicKey;

/// The gateway's own signing identity. Not a device's key — that key
/// only ever signs datastore writes and root pages.
pub struct MasterDataKey {
    pub key_pair: KeyPair,
}

impl MasterDataKey {
    pub fn generate() -> Self {
        Self {
            key_pair: KeyPair::generate(),
        }
    }

    pub fn from_secret_hex(hex_key: &str) -> Result<Self> {
        Ok(Self {
            key_pair: KeyPair::from_secret_hex(hex_key)?,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.key_pair.public_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_pair_signs_and_verifies() {
        let mdk = MasterDataKey::generate();
        let digest = blake3::hash(b"session payload").into();
        let sig = mdk.key_pair.sign_digest(&digest);
        assert!(crate::crypto::keys::verify_digest(&digest, &sig, &mdk.public_key()));
    }

    #[test]
    fn from_secret_hex_round_trips_public_key() {
        let mdk = MasterDataKey::generate();
        let hex_key = hex::encode(mdk.key_pair.secret_key.secret_bytes());
        let restored = MasterDataKey::from_secret_hex(&hex_key).unwrap();
        assert_eq!(restored.public_key(), mdk.public_key());
    }
}
