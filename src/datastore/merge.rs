//! The merge algorithm (spec.md §4.4.4): turn a set of per-device root
//! pages into the logical, never-persisted merged root directory.

use std::collections::HashMap;

use crate::crypto::jwt;
use crate::crypto::keys::{parse_pubkey_hex, verify_digest};
use crate::datastore::types::{DeviceRootPage, FileHeader};
use crate::error::{GatewayError, Result};
use secp256k1::ecdsa::Signature;

/// Verify `page.signature` against the device's declared public key.
pub fn verify_device_root_signature(page: &DeviceRootPage, device_pubkey_hex: &str) -> bool {
    let public_key = match parse_pubkey_hex(device_pubkey_hex) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig_bytes = match hex::decode(&page.signature) {
        Ok(b) => b,
        Err(_) => return false,
    };
    let signature = match Signature::from_compact(&sig_bytes) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let digest = blake3::hash(&page.signing_payload()).into();
    verify_digest(&digest, &signature, &public_key)
}

/// Merge a set of `(device root page, its declared public key)` pairs
/// into `{name -> FileHeader}`. Pages whose signature does not verify
/// are dropped; if *every* page is invalid the whole merge fails with
/// `EINVAL` (represented as `GatewayError::InvalidRequest`), per
/// spec.md §4.4.4's closing note. An empty page set returns an empty map.
pub fn merge_root_pages(pages: &[(DeviceRootPage, String)]) -> Result<HashMap<String, FileHeader>> {
    if pages.is_empty() {
        return Ok(HashMap::new());
    }

    let valid: Vec<&DeviceRootPage> = pages
        .iter()
        .filter(|(page, pubkey)| verify_device_root_signature(page, pubkey))
        .map(|(page, _)| page)
        .collect();

    if valid.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "no device root page has a valid signature".to_string(),
        ));
    }

    // Key tombstones by (name, device_id) so suppression is scoped to the
    // same-name file regardless of which device wrote the tombstone.
    let mut tombstones_by_name: HashMap<String, u64> = HashMap::new();
    for page in &valid {
        for tombstone in &page.tombstones {
            if let Some((fq_id, timestamp)) =
                crate::datastore::types::SignedTombstone::parse_plaintext(&tombstone.to_plaintext())
            {
                let name = fq_id.rsplit_once('/').map(|(_, n)| n).unwrap_or(&fq_id);
                let entry = tombstones_by_name.entry(name.to_string()).or_insert(0);
                if timestamp > *entry {
                    *entry = timestamp;
                }
            }
        }
    }

    let mut winners: HashMap<String, FileHeader> = HashMap::new();
    for page in &valid {
        for header in page.files.values() {
            let replace = match winners.get(&header.name) {
                None => true,
                Some(existing) => {
                    header.timestamp > existing.timestamp
                        || (header.timestamp == existing.timestamp
                            && header.writer_device_id > existing.writer_device_id)
                }
            };
            if replace {
                winners.insert(header.name.clone(), header.clone());
            }
        }
    }

    winners.retain(|name, header| {
        match tombstones_by_name.get(name) {
            Some(&tombstone_ts) => tombstone_ts < header.timestamp,
            None => true,
        }
    });

    Ok(winners)
}

/// Verify and decode an authRequest-style signed blob, used by the
/// session manager; kept alongside merge verification since both rely
/// on the same secp256k1 digest-signature shape.
pub fn verify_signed_blob<T: serde::de::DeserializeOwned>(
    token: &str,
    public_key_hex: &str,
) -> Result<T> {
    let public_key = parse_pubkey_hex(public_key_hex)?;
    jwt::decode_and_verify(token, &public_key)
}
