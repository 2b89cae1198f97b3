//! Pluggable storage drivers and the registry that orders them.
//!
//! Mirrors the teacher's `StorageEngine` trait in shape (an async trait
//! object held behind `Arc`, registered in a concurrent map) but with the
//! operation set spec.md's glossary actually names: `get`, `put`,
//! `delete` over opaque locator URLs, nothing more.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{GatewayError, Result};

pub mod disk;

/// A pluggable storage backend. Implementors need not be durable across
/// process restarts beyond what the backend itself guarantees — the
/// gateway keeps no authoritative state of its own (spec.md §5).
#[async_trait]
pub trait StorageDriver: Send + Sync {
    fn name(&self) -> &str;

    /// True if this driver is backed by local disk/memory rather than a
    /// network call — used by `prioritize_read_drivers`.
    fn is_local(&self) -> bool;

    async fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Store `bytes` under the fully-qualified id `"{device_id}:{logical_id}"`,
    /// returning the locator URL(s) that can later be passed to `get`.
    async fn put(&self, fq_id: &str, bytes: &[u8]) -> Result<Vec<String>>;

    async fn delete(&self, fq_id: &str) -> Result<()>;

    /// Reconstruct this driver's canonical URL for `fq_id` without a
    /// prior `put`, for objects whose location is a pure function of
    /// their id (datastore records, device root pages) rather than
    /// opaque content-addressed blobs. Drivers that cannot do this
    /// return `None`.
    fn locate(&self, _fq_id: &str) -> Option<String> {
        None
    }
}

/// Holds the set of loaded drivers, keyed by name. Registration guards
/// against a second concurrent registration of the same name producing
/// the "concurrency violation" the driver registry is required to report.
pub struct DriverRegistry {
    drivers: DashMap<String, Arc<dyn StorageDriver>>,
    in_progress: Mutex<HashSet<String>>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: DashMap::new(),
            in_progress: Mutex::new(HashSet::new()),
        }
    }

    /// Register a driver under its own name. Returns `Err(InProgress)` if
    /// another registration of the same name is already underway —
    /// callers translate that into HTTP 202, per §4.7.
    pub fn register(&self, driver: Arc<dyn StorageDriver>) -> Result<()> {
        let name = driver.name().to_string();
        {
            let mut in_progress = self.in_progress.lock();
            if !in_progress.insert(name.clone()) {
                return Err(GatewayError::InProgress);
            }
        }
        self.drivers.insert(name.clone(), driver);
        self.in_progress.lock().remove(&name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StorageDriver>> {
        self.drivers.get(name).map(|e| e.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.drivers.iter().map(|e| e.key().clone()).collect()
    }

    /// Resolve an ordered list of driver names into their live driver
    /// handles, skipping any that are not currently registered.
    pub fn resolve(&self, names: &[String]) -> Vec<Arc<dyn StorageDriver>> {
        names.iter().filter_map(|n| self.get(n)).collect()
    }
}

/// Stable-sort driver names so that locally-backed drivers precede
/// remote ones, matching `original_source`'s `policy.prioritize_read_drivers`.
/// `local_names` is the configured allow-list of driver names considered
/// local (rather than querying each driver's `is_local()`, which keeps
/// this a pure function over names — the same shape the original takes).
pub fn prioritize_read_drivers(names: &[String], local_names: &[String]) -> Vec<String> {
    let mut local = Vec::new();
    let mut remote = Vec::new();
    for name in names {
        if local_names.contains(name) {
            local.push(name.clone());
        } else {
            remote.push(name.clone());
        }
    }
    local.extend(remote);
    local
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::disk::DiskDriver;
    use tempfile::tempdir;

    #[test]
    fn prioritize_moves_local_drivers_first() {
        let names = vec!["s3".to_string(), "disk".to_string(), "ipfs".to_string()];
        let local = vec!["disk".to_string()];
        let ordered = prioritize_read_drivers(&names, &local);
        assert_eq!(ordered, vec!["disk", "s3", "ipfs"]);
    }

    #[test]
    fn prioritize_preserves_relative_order_within_groups() {
        let names = vec![
            "a".to_string(),
            "disk".to_string(),
            "b".to_string(),
            "mem".to_string(),
        ];
        let local = vec!["disk".to_string(), "mem".to_string()];
        let ordered = prioritize_read_drivers(&names, &local);
        assert_eq!(ordered, vec!["disk", "mem", "a", "b"]);
    }

    #[test]
    fn second_concurrent_registration_is_rejected() {
        let dir = tempdir().unwrap();
        let registry = DriverRegistry::new();
        let driver = Arc::new(DiskDriver::new("disk", dir.path().to_path_buf()));
        registry.register(driver.clone()).unwrap();

        registry.in_progress.lock().insert("disk".to_string());
        let result = registry.register(driver);
        assert!(matches!(result, Err(GatewayError::InProgress)));
    }
}
