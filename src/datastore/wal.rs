//! Write-ahead queue for `sync=0` device-root writes (spec.md §4.4.3).
//!
//! A `sync=0` write is acknowledged on acceptance into this queue; a
//! background task drains it with bounded retries. `sync=1` callers
//! bypass the queue entirely and replicate inline.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::WriteThreshold;
use crate::datastore::types::DeviceRootPage;
use crate::drivers::DriverRegistry;

pub struct PendingDeviceRootWrite {
    pub datastore_id: String,
    pub device_id: String,
    pub page: DeviceRootPage,
    pub driver_names: Vec<String>,
    pub attempts: u32,
}

const MAX_ATTEMPTS: u32 = 5;

/// FIFO of pending device-root replications, drained by a background
/// task spawned at startup (`DatastoreCore::spawn_wal_drainer`).
pub struct WriteAheadQueue {
    queue: Mutex<VecDeque<PendingDeviceRootWrite>>,
}

impl Default for WriteAheadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteAheadQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn enqueue(&self, entry: PendingDeviceRootWrite) {
        self.queue.lock().await.push_back(entry);
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Pop and attempt to replicate one entry, re-queueing it on failure
    /// up to `MAX_ATTEMPTS`, after which it is dropped with an error log
    /// (the gateway keeps no durable state of its own, so an
    /// unrecoverable entry is simply lost, matching spec.md §5's "no
    /// shared mutable datastore state kept in the gateway").
    pub async fn drain_one(&self, registry: &DriverRegistry, threshold: &WriteThreshold) {
        let mut entry = match self.queue.lock().await.pop_front() {
            Some(e) => e,
            None => return,
        };

        let fq_id = format!("{}:{}/root", entry.device_id, entry.datastore_id);
        let bytes = match serde_json::to_vec(&entry.page) {
            Ok(b) => b,
            Err(e) => {
                error!("wal: failed to serialize device root page: {e}");
                return;
            }
        };

        match crate::datastore::write::write_payload(&fq_id, &bytes, &entry.driver_names, registry, threshold).await {
            Ok(_) => {
                info!("wal: replicated device root for {}/{}", entry.datastore_id, entry.device_id);
            }
            Err(e) => {
                entry.attempts += 1;
                if entry.attempts >= MAX_ATTEMPTS {
                    error!(
                        "wal: dropping device root write for {}/{} after {} attempts: {e}",
                        entry.datastore_id, entry.device_id, entry.attempts
                    );
                } else {
                    warn!(
                        "wal: retrying device root write for {}/{} (attempt {}): {e}",
                        entry.datastore_id, entry.device_id, entry.attempts
                    );
                    self.queue.lock().await.push_back(entry);
                }
            }
        }
    }
}

/// Spawn a background task that drains the queue at a fixed interval.
pub fn spawn_drainer(
    wal: Arc<WriteAheadQueue>,
    registry: Arc<DriverRegistry>,
    threshold: WriteThreshold,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(500));
        loop {
            interval.tick().await;
            if wal.len().await > 0 {
                wal.drain_one(&registry, &threshold).await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn enqueue_then_len_reflects_pending_entries() {
        let wal = WriteAheadQueue::new();
        wal.enqueue(PendingDeviceRootWrite {
            datastore_id: "store-1".to_string(),
            device_id: "device-1".to_string(),
            page: DeviceRootPage {
                device_id: "device-1".to_string(),
                timestamp: 1,
                files: HashMap::new(),
                tombstones: vec![],
                signature: String::new(),
            },
            driver_names: vec!["disk".to_string()],
            attempts: 0,
        })
        .await;
        assert_eq!(wal.len().await, 1);
    }

    #[tokio::test]
    async fn drain_with_no_drivers_requeues_until_max_attempts() {
        let wal = WriteAheadQueue::new();
        let registry = DriverRegistry::new();
        let threshold = WriteThreshold::default();
        wal.enqueue(PendingDeviceRootWrite {
            datastore_id: "store-1".to_string(),
            device_id: "device-1".to_string(),
            page: DeviceRootPage {
                device_id: "device-1".to_string(),
                timestamp: 1,
                files: HashMap::new(),
                tombstones: vec![],
                signature: String::new(),
            },
            driver_names: vec!["disk".to_string()],
            attempts: MAX_ATTEMPTS - 1,
        })
        .await;
        wal.drain_one(&registry, &threshold).await;
        assert_eq!(wal.len().await, 0);
    }
}
