//! Session manager (spec.md §4.3, `GET /v1/auth`).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::auth::normalize_app_domain;
use crate::crypto::jwt;
use crate::crypto::keys::{compressed_keys_equal, parse_pubkey_hex, KeyPair};
use crate::crypto::session_token::MasterDataKey;
use crate::datastore::types::{DevicePublicKey, Session};
use crate::error::{GatewayError, Result};

const MAX_AUTH_REQUEST_BYTES: usize = 4096;

/// The current authRequest JWT payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAuthRequest {
    pub app_domain: String,
    pub methods: Vec<String>,
    pub app_private_key: String,
    pub app_public_keys: Vec<DevicePublicKey>,
    pub device_id: String,
    pub blockchain_id: Option<String>,
}

/// The legacy shape: a single `app_public_key` instead of per-device keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyAuthRequest {
    pub app_domain: String,
    pub methods: Vec<String>,
    pub app_private_key: String,
    pub app_public_key: String,
    pub blockchain_id: Option<String>,
}

struct NormalizedAuthRequest {
    app_domain: String,
    methods: Vec<String>,
    app_private_key: String,
    app_public_keys: Vec<DevicePublicKey>,
    device_id: String,
    blockchain_id: Option<String>,
    legacy: bool,
}

fn normalize(token: &str) -> Result<NormalizedAuthRequest> {
    let value = jwt::decode_unverified(token)?;

    if let Ok(current) = serde_json::from_value::<CurrentAuthRequest>(value.clone()) {
        return Ok(NormalizedAuthRequest {
            app_domain: current.app_domain,
            methods: current.methods,
            app_private_key: current.app_private_key,
            app_public_keys: current.app_public_keys,
            device_id: current.device_id,
            blockchain_id: current.blockchain_id,
            legacy: false,
        });
    }

    let legacy: LegacyAuthRequest = serde_json::from_value(value)
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed authRequest: {e}")))?;
    Ok(NormalizedAuthRequest {
        app_domain: legacy.app_domain,
        methods: legacy.methods,
        app_private_key: legacy.app_private_key,
        app_public_keys: vec![DevicePublicKey {
            device_id: "0".to_string(),
            public_key: legacy.app_public_key,
        }],
        device_id: "0".to_string(),
        blockchain_id: legacy.blockchain_id,
        legacy: true,
    })
}

/// Run the full `GET /auth` procedure (spec.md §4.3 steps 1-5) and
/// return a signed session token.
pub fn issue_session(
    auth_request_token: &str,
    master_data_key: &MasterDataKey,
    session_lifetime_secs: i64,
    now: i64,
    app_domain_suffixes: &[String],
) -> Result<String> {
    if auth_request_token.len() > MAX_AUTH_REQUEST_BYTES {
        return Err(GatewayError::InvalidRequest(
            "authRequest exceeds 4 KiB".to_string(),
        ));
    }

    let request = normalize(auth_request_token)?;

    let declared = request
        .app_public_keys
        .iter()
        .find(|k| k.device_id == request.device_id)
        .ok_or_else(|| GatewayError::unauthorized("device_id not present in app_public_keys"))?;

    let derived_pubkey = derive_public_key_hex(&request.app_private_key)?;
    if !compressed_keys_equal(&declared.public_key, &derived_pubkey) {
        return Err(GatewayError::unauthorized(
            "declared public key does not match app_private_key",
        ));
    }

    let signer_pubkey = parse_pubkey_hex(&declared.public_key)?;
    let _: serde_json::Value = jwt::decode_and_verify(auth_request_token, &signer_pubkey)
        .map_err(|e| GatewayError::unauthorized(e.to_string()))?;

    let session = Session {
        blockchain_id: request.blockchain_id,
        app_domain: normalize_app_domain(&request.app_domain, app_domain_suffixes),
        methods: request.methods.into_iter().collect::<HashSet<_>>(),
        app_public_keys: request.app_public_keys,
        device_id: request.device_id,
        expires_at: now + session_lifetime_secs,
        legacy: request.legacy,
    };

    encode_session(&session, master_data_key)
}

fn encode_session(session: &Session, master_data_key: &MasterDataKey) -> Result<String> {
    jwt::encode(session, &master_data_key.key_pair)
}

pub fn decode_session(token: &str, master_data_key: &MasterDataKey) -> Result<Session> {
    jwt::decode_and_verify(token, &master_data_key.public_key())
}

fn derive_public_key_hex(secret_hex: &str) -> Result<String> {
    let key_pair = KeyPair::from_secret_hex(secret_hex)?;
    Ok(key_pair.public_key_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::jwt as jwt_codec;

    fn sample_current_request(device_kp: &KeyPair) -> String {
        let request = CurrentAuthRequest {
            app_domain: "https://app.id".to_string(),
            methods: vec!["store_write".to_string()],
            app_private_key: hex::encode(device_kp.secret_key.secret_bytes()),
            app_public_keys: vec![DevicePublicKey {
                device_id: "device-1".to_string(),
                public_key: device_kp.public_key_hex(),
            }],
            device_id: "device-1".to_string(),
            blockchain_id: None,
        };
        jwt_codec::encode(&request, device_kp).unwrap()
    }

    #[test]
    fn valid_auth_request_mints_a_session() {
        let device_kp = KeyPair::generate();
        let token = sample_current_request(&device_kp);
        let master_key = MasterDataKey::generate();

        let session_token = issue_session(&token, &master_key, 3600, 1000, &[]).unwrap();
        let session = decode_session(&session_token, &master_key).unwrap();
        assert_eq!(session.device_id, "device-1");
        assert!(session.has_capability("store_write"));
        assert!(!session.legacy);
    }

    #[test]
    fn mismatched_device_key_is_rejected() {
        let device_kp = KeyPair::generate();
        let wrong_kp = KeyPair::generate();
        let request = CurrentAuthRequest {
            app_domain: "https://app.id".to_string(),
            methods: vec!["store_write".to_string()],
            app_private_key: hex::encode(wrong_kp.secret_key.secret_bytes()),
            app_public_keys: vec![DevicePublicKey {
                device_id: "device-1".to_string(),
                public_key: device_kp.public_key_hex(),
            }],
            device_id: "device-1".to_string(),
            blockchain_id: None,
        };
        let token = jwt_codec::encode(&request, &device_kp).unwrap();
        let master_key = MasterDataKey::generate();
        let result = issue_session(&token, &master_key, 3600, 1000, &[]);
        assert!(matches!(result, Err(GatewayError::Unauthorized(_))));
    }

    #[test]
    fn legacy_shape_is_accepted_and_tagged() {
        let device_kp = KeyPair::generate();
        let legacy = LegacyAuthRequest {
            app_domain: "https://app.id".to_string(),
            methods: vec!["store_write".to_string()],
            app_private_key: hex::encode(device_kp.secret_key.secret_bytes()),
            app_public_key: device_kp.public_key_hex(),
            blockchain_id: None,
        };
        let token = jwt_codec::encode(&legacy, &device_kp).unwrap();
        let master_key = MasterDataKey::generate();
        let session_token = issue_session(&token, &master_key, 3600, 1000, &[]).unwrap();
        let session = decode_session(&session_token, &master_key).unwrap();
        assert!(session.legacy);
        assert_eq!(session.device_id, "0");
    }

    #[test]
    fn oversized_auth_request_is_rejected() {
        let oversized = "x".repeat(MAX_AUTH_REQUEST_BYTES + 1);
        let master_key = MasterDataKey::generate();
        let result = issue_session(&oversized, &master_key, 3600, 1000, &[]);
        assert!(result.is_err());
    }

    #[test]
    fn app_domain_is_normalized_against_allowed_suffixes() {
        let device_kp = KeyPair::generate();
        let request = CurrentAuthRequest {
            app_domain: "myapp.com".to_string(),
            methods: vec!["store_write".to_string()],
            app_private_key: hex::encode(device_kp.secret_key.secret_bytes()),
            app_public_keys: vec![DevicePublicKey {
                device_id: "device-1".to_string(),
                public_key: device_kp.public_key_hex(),
            }],
            device_id: "device-1".to_string(),
            blockchain_id: None,
        };
        let token = jwt_codec::encode(&request, &device_kp).unwrap();
        let master_key = MasterDataKey::generate();
        let suffixes = vec!["id".to_string(), "x".to_string()];
        let session_token = issue_session(&token, &master_key, 3600, 1000, &suffixes).unwrap();
        let session = decode_session(&session_token, &master_key).unwrap();
        assert_eq!(session.app_domain, "http://myapp.com.id");
    }
}
