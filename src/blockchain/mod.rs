//! Blockchain query proxy (spec.md §4.6): a stateless HTTP proxy over
//! the naming node's JSON-RPC interface and the UTXO service's REST
//! interface, with address re-encoding and bounded retries.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::crypto::hash::{base58check_decode, base58check_encode};
use crate::error::{GatewayError, Result};

const MAX_RETRIES: u32 = 3;
const MAINNET_VERSION_BYTE: u8 = 0;

pub struct BlockchainClient {
    http: reqwest::Client,
    naming_node_url: Option<String>,
    utxo_service_url: Option<String>,
}

impl BlockchainClient {
    pub fn new(naming_node_url: Option<String>, utxo_service_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            naming_node_url,
            utxo_service_url,
        }
    }

    /// Re-encode any base58check address to the canonical mainnet form
    /// (version byte 0), matching spec.md §4.6's "before every outgoing
    /// query" requirement. A malformed address is `InvalidRequest`.
    pub fn canonicalize_address(&self, address: &str) -> Result<String> {
        let (_version, payload) = base58check_decode(address)
            .ok_or_else(|| GatewayError::InvalidRequest(format!("malformed address: {address}")))?;
        if payload.len() != 20 {
            return Err(GatewayError::InvalidRequest(format!(
                "malformed address payload length: {address}"
            )));
        }
        let mut fixed = [0u8; 20];
        fixed.copy_from_slice(&payload);
        Ok(base58check_encode(MAINNET_VERSION_BYTE, &fixed))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.http.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<T>()
                        .await
                        .map_err(|e| GatewayError::upstream(format!("malformed response: {e}")));
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => {
                    return Err(GatewayError::not_found(format!("{url} not found upstream")));
                }
                Ok(resp) => {
                    if attempt >= MAX_RETRIES {
                        return Err(GatewayError::upstream(format!(
                            "upstream returned {}", resp.status()
                        )));
                    }
                }
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(GatewayError::upstream(format!("upstream unreachable: {e}")));
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
        }
    }

    pub async fn name_record(&self, name: &str) -> Result<Value> {
        let base = self.naming_node_url.as_ref().ok_or_else(|| {
            GatewayError::upstream("no naming node configured")
        })?;
        self.get_json(&format!("{base}/v1/names/{name}")).await
    }

    pub async fn unspent_outputs(&self, address: &str) -> Result<Value> {
        let canonical = self.canonicalize_address(address)?;
        let base = self
            .utxo_service_url
            .as_ref()
            .ok_or_else(|| GatewayError::upstream("no UTXO service configured"))?;
        self.get_json(&format!("{base}/addr/{canonical}/utxo")).await
    }

    /// Broadcast a raw signed transaction. Not idempotent, so this is
    /// never retried, per spec.md §4.6's "idempotent reads only" rule.
    pub async fn broadcast_transaction(&self, raw_tx_hex: &str) -> Result<Value> {
        let base = self
            .utxo_service_url
            .as_ref()
            .ok_or_else(|| GatewayError::upstream("no UTXO service configured"))?;
        let resp = self
            .http
            .post(format!("{base}/tx/send"))
            .json(&serde_json::json!({ "rawtx": raw_tx_hex }))
            .send()
            .await?;
        if resp.status().is_success() {
            resp.json::<Value>()
                .await
                .map_err(|e| GatewayError::upstream(format!("malformed response: {e}")))
        } else {
            Err(GatewayError::upstream(format!(
                "broadcast rejected with {}", resp.status()
            )))
        }
    }
}
