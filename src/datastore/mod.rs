//! Datastore core (spec.md §4.4): the heart of the gateway. Owns no
//! authoritative state of its own — every operation reads from or
//! writes through the driver registry, reconstructing what it needs per
//! request, per the concurrency model's "no shared mutable datastore
//! state kept in the gateway" rule (§5).

pub mod merge;
pub mod read;
pub mod types;
pub mod wal;
pub mod write;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::WriteThreshold;
use crate::crypto::hash::{base58check_encode, hash160};
use crate::drivers::DriverRegistry;
use crate::error::{GatewayError, Result};
use types::{Datastore, DeviceRootPage, FileHeader};
use wal::{PendingDeviceRootWrite, WriteAheadQueue};

/// Derive a datastore id from its owner public key: `hash160(pubkey)`,
/// base58check-encoded with version byte `0`.
pub fn datastore_id_for_pubkey(pubkey_hex: &str) -> Result<String> {
    let pubkey_bytes = hex::decode(pubkey_hex)
        .map_err(|e| GatewayError::InvalidPublicKey(format!("bad pubkey hex: {e}")))?;
    Ok(base58check_encode(0, &hash160(&pubkey_bytes)))
}

fn fq_datastore_record(datastore_id: &str) -> String {
    format!("_gateway:{datastore_id}/record")
}

fn fq_device_root(device_id: &str, datastore_id: &str) -> String {
    format!("{device_id}:{datastore_id}/root")
}

fn fq_file(device_id: &str, datastore_id: &str, file_name: &str) -> String {
    format!("{device_id}:{datastore_id}/{file_name}")
}

pub struct DatastoreCore {
    pub registry: Arc<DriverRegistry>,
    pub wal: Arc<WriteAheadQueue>,
    device_root_locks: DashMap<(String, String), Arc<AsyncMutex<()>>>,
    pub local_driver_names: Vec<String>,
    pub write_threshold: WriteThreshold,
}

impl DatastoreCore {
    pub fn new(
        registry: Arc<DriverRegistry>,
        local_driver_names: Vec<String>,
        write_threshold: WriteThreshold,
    ) -> Self {
        Self {
            registry,
            wal: Arc::new(WriteAheadQueue::new()),
            device_root_locks: DashMap::new(),
            local_driver_names,
            write_threshold,
        }
    }

    fn device_root_lock(&self, datastore_id: &str, device_id: &str) -> Arc<AsyncMutex<()>> {
        self.device_root_locks
            .entry((datastore_id.to_string(), device_id.to_string()))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn locate_and_fetch(&self, fq_id: &str) -> Vec<(String, String)> {
        let mut results = Vec::new();
        for name in self.registry.names() {
            if let Some(driver) = self.registry.get(&name) {
                if let Some(url) = driver.locate(fq_id) {
                    results.push((name.clone(), url));
                }
            }
        }
        results
    }

    pub async fn create_datastore(&self, datastore: &Datastore) -> Result<()> {
        let expected_id = datastore_id_for_pubkey(&datastore.pubkey)?;
        if datastore.id != expected_id {
            return Err(GatewayError::InvalidRequest(
                "datastore id does not match hash of pubkey".to_string(),
            ));
        }
        let fq_id = fq_datastore_record(&datastore.id);
        let bytes = serde_json::to_vec(datastore)?;
        write::write_payload(&fq_id, &bytes, &datastore.drivers, &self.registry, &self.write_threshold)
            .await?;
        Ok(())
    }

    pub async fn read_datastore_record(&self, datastore_id: &str) -> Result<Datastore> {
        let fq_id = fq_datastore_record(datastore_id);
        for (driver_name, url) in self.locate_and_fetch(&fq_id) {
            let driver = match self.registry.get(&driver_name) {
                Some(d) => d,
                None => continue,
            };
            if let Ok(bytes) = driver.get(&url).await {
                if let Ok(record) = serde_json::from_slice::<Datastore>(&bytes) {
                    if record.id == datastore_id {
                        return Ok(record);
                    }
                }
            }
        }
        Err(GatewayError::not_found(format!(
            "datastore {datastore_id} not found"
        )))
    }

    pub async fn delete_datastore(&self, datastore: &Datastore) -> Result<()> {
        write::delete_payload(&fq_datastore_record(&datastore.id), &datastore.drivers, &self.registry)
            .await?;
        for device_id in &datastore.device_ids {
            write::delete_payload(
                &fq_device_root(device_id, &datastore.id),
                &datastore.drivers,
                &self.registry,
            )
            .await?;
        }
        Ok(())
    }

    pub async fn read_device_root(
        &self,
        datastore_id: &str,
        device_id: &str,
        device_pubkey_hex: &str,
    ) -> Result<DeviceRootPage> {
        let fq_id = fq_device_root(device_id, datastore_id);
        for (driver_name, url) in self.locate_and_fetch(&fq_id) {
            let driver = match self.registry.get(&driver_name) {
                Some(d) => d,
                None => continue,
            };
            if let Ok(bytes) = driver.get(&url).await {
                if let Ok(page) = serde_json::from_slice::<DeviceRootPage>(&bytes) {
                    if merge::verify_device_root_signature(&page, device_pubkey_hex) {
                        return Ok(page);
                    }
                }
            }
        }
        Err(GatewayError::not_found(format!(
            "device root for {device_id} in {datastore_id} not found"
        )))
    }

    /// Fetch every device's current root page (ignoring devices whose
    /// page is missing or fails verification) and merge them.
    pub async fn read_merged_root(
        &self,
        datastore_id: &str,
        device_pubkeys: &HashMap<String, String>,
    ) -> Result<HashMap<String, FileHeader>> {
        let mut pages = Vec::new();
        for (device_id, pubkey) in device_pubkeys {
            if let Ok(page) = self.read_device_root(datastore_id, device_id, pubkey).await {
                pages.push((page, pubkey.clone()));
            }
        }
        merge::merge_root_pages(&pages)
    }

    /// Write a device's new root page. When `sync` is true, replicate
    /// inline and return only once the threshold is met; when false,
    /// accept into the write-ahead queue and return immediately.
    pub async fn write_device_root(
        &self,
        datastore_id: &str,
        driver_names: &[String],
        page: DeviceRootPage,
        sync: bool,
    ) -> Result<()> {
        let lock = self.device_root_lock(datastore_id, &page.device_id);
        let _guard = lock.lock().await;

        if sync {
            let fq_id = fq_device_root(&page.device_id, datastore_id);
            let bytes = serde_json::to_vec(&page)?;
            write::write_payload(&fq_id, &bytes, driver_names, &self.registry, &self.write_threshold)
                .await?;
        } else {
            self.wal
                .enqueue(PendingDeviceRootWrite {
                    datastore_id: datastore_id.to_string(),
                    device_id: page.device_id.clone(),
                    page,
                    driver_names: driver_names.to_vec(),
                    attempts: 0,
                })
                .await;
        }
        Ok(())
    }

    pub async fn read_file_payload(&self, header: &FileHeader) -> Result<Vec<u8>> {
        read::read_file_payload(header, &self.registry, &self.local_driver_names).await
    }

    pub async fn write_file_payload(
        &self,
        datastore_id: &str,
        device_id: &str,
        file_name: &str,
        bytes: &[u8],
        driver_names: &[String],
    ) -> Result<Vec<String>> {
        let fq_id = fq_file(device_id, datastore_id, file_name);
        write::write_payload(&fq_id, bytes, driver_names, &self.registry, &self.write_threshold).await
    }

    pub async fn delete_file_payload(
        &self,
        datastore_id: &str,
        device_id: &str,
        file_name: &str,
        driver_names: &[String],
    ) -> Result<()> {
        let fq_id = fq_file(device_id, datastore_id, file_name);
        write::delete_payload(&fq_id, driver_names, &self.registry).await
    }
}
