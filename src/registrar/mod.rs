//! Registrar proxy (spec.md §4.5): forwards name operations to the
//! (external, out-of-scope) registrar queue and reports its state back
//! verbatim. The gateway never mutates the queue beyond enqueueing and
//! reading.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::datastore::types::{RegistrarOp, RegistrarQueueEntry, RegistrarStep};
use crate::error::{GatewayError, Result};

/// The in-process proxy surface for the registrar's external FIFO.
/// Guarded by a single mutex, matching §5(iii)'s "accessed through the
/// registrar's own interface, which serializes internally."
pub struct RegistrarQueue {
    entries: Mutex<VecDeque<RegistrarQueueEntry>>,
}

impl Default for RegistrarQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrarQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn enqueue(&self, op: RegistrarOp, name: String) -> RegistrarQueueEntry {
        let entry = RegistrarQueueEntry {
            op,
            name,
            tx_hash: None,
            confirmations: 0,
            next_step: RegistrarStep::Preorder,
        };
        self.entries.lock().await.push_back(entry.clone());
        entry
    }

    /// Report pending entries exactly as queued — no filtering, no
    /// derived state, per the proxy's "report pending entries verbatim"
    /// contract.
    pub async fn state(&self) -> Vec<RegistrarQueueEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn find(&self, name: &str) -> Result<RegistrarQueueEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| GatewayError::not_found(format!("no pending registrar entry for {name}")))
    }
}
