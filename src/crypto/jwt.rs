//! Hand-rolled ES256K-style signed token codec.
//!
//! The `jsonwebtoken` crate used elsewhere in the pack
//! (`other_examples`'s `protojour-authly`) only supports RSA/EdDSA/HMAC
//! algorithms, not secp256k1 — so sessions and datastore tokens are
//! signed the way `original_source`'s `jsontokens` library and the
//! teacher's own `SignatureKeyPair::sign`/`verify` do it: base64url the
//! header and payload, hash the `header.payload` string, sign the
//! digest, base64url the signature, and join with `.`.

use crate::crypto::keys::{verify_digest, KeyPair};
use crate::error::{GatewayError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

const HEADER_ES256K: &str = r#"{"typ":"JWT","alg":"ES256K"}"#;

/// Encode `claims` as a signed token using `key_pair`'s secret key.
pub fn encode<T: Serialize>(claims: &T, key_pair: &KeyPair) -> Result<String> {
    let header_b64 = URL_SAFE_NO_PAD.encode(HEADER_ES256K.as_bytes());
    let payload_json =
        serde_json::to_vec(claims).map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);

    let signing_input = format!("{header_b64}.{payload_b64}");
    let digest = blake3::hash(signing_input.as_bytes()).into();
    let signature = key_pair.sign_digest(&digest);
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature.serialize_compact());

    Ok(format!("{signing_input}.{sig_b64}"))
}

/// Decode and verify a token against `public_key`, returning the
/// deserialized claims. Fails closed: any malformed segment, bad
/// signature, or JSON mismatch is an `AuthFailed`.
pub fn decode_and_verify<T: DeserializeOwned>(token: &str, public_key: &PublicKey) -> Result<T> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(GatewayError::AuthFailed("malformed token".into()));
    }
    let (header_b64, payload_b64, sig_b64) = (parts[0], parts[1], parts[2]);

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| GatewayError::AuthFailed("malformed signature encoding".into()))?;
    let signature = Signature::from_compact(&sig_bytes)
        .map_err(|_| GatewayError::AuthFailed("malformed signature".into()))?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    let digest = blake3::hash(signing_input.as_bytes()).into();
    if !verify_digest(&digest, &signature, public_key) {
        return Err(GatewayError::AuthFailed("signature verification failed".into()));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| GatewayError::AuthFailed("malformed payload encoding".into()))?;
    serde_json::from_slice(&payload_bytes)
        .map_err(|e| GatewayError::AuthFailed(format!("malformed claims: {e}")))
}

/// Decode a token's payload without verifying the signature, used by the
/// session manager to peek at `app_public_key_legacy` / `version` before
/// deciding which public key to verify against (mirrors
/// `original_source`'s legacy/current schema fallback in `verify_session`).
pub fn decode_unverified(token: &str) -> Result<Value> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(GatewayError::AuthFailed("malformed token".into()));
    }
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| GatewayError::AuthFailed("malformed payload encoding".into()))?;
    serde_json::from_slice(&payload_bytes)
        .map_err(|e| GatewayError::AuthFailed(format!("malformed claims: {e}")))
}
