//! Write pipeline (spec.md §4.4.3): replicate to every configured
//! driver, declare success once the configured threshold is met, and
//! verify by re-reading.

use std::sync::Arc;

use tracing::warn;

use crate::config::WriteThreshold;
use crate::crypto::hash::verify_data_hash;
use crate::drivers::{DriverRegistry, StorageDriver};
use crate::error::{GatewayError, Result};

/// Replicate `bytes` under `fq_id` to every driver named in `driver_names`.
/// Returns the aggregated URL set once `threshold.min_successes` drivers
/// have acknowledged the write and (if `threshold.verify_reread`) a
/// round-trip read through at least one of them matches the original
/// bytes. Per-driver failures are logged, not fatal, as long as the
/// threshold is still reachable.
pub async fn write_payload(
    fq_id: &str,
    bytes: &[u8],
    driver_names: &[String],
    registry: &DriverRegistry,
    threshold: &WriteThreshold,
) -> Result<Vec<String>> {
    let drivers = registry.resolve(driver_names);
    if drivers.is_empty() {
        return Err(GatewayError::upstream("no storage drivers configured"));
    }

    let mut urls = Vec::new();
    let mut successes: Vec<(Arc<dyn StorageDriver>, Vec<String>)> = Vec::new();

    for driver in &drivers {
        match driver.put(fq_id, bytes).await {
            Ok(driver_urls) => {
                urls.extend(driver_urls.iter().cloned());
                successes.push((driver.clone(), driver_urls));
            }
            Err(e) => {
                warn!("driver {} failed to write {fq_id}: {e}", driver.name());
            }
        }
    }

    if successes.len() < threshold.min_successes {
        return Err(GatewayError::upstream(format!(
            "only {} of {} required drivers accepted the write for {fq_id}",
            successes.len(),
            threshold.min_successes
        )));
    }

    if threshold.verify_reread {
        let mut verified = false;
        for (driver, driver_urls) in &successes {
            for url in driver_urls {
                if let Ok(reread) = driver.get(url).await {
                    if verify_data_hash(&reread, &crate::crypto::hash::data_hash(bytes)) {
                        verified = true;
                        break;
                    }
                }
            }
            if verified {
                break;
            }
            warn!("verifying reread failed for driver {}", driver.name());
        }
        if !verified {
            return Err(GatewayError::upstream(format!(
                "write to {fq_id} could not be verified by reread"
            )));
        }
    }

    Ok(urls)
}

/// Delete `fq_id` from every named driver. Unlike writes, a delete isn't
/// thresholded — drivers that don't have the object (or fail) are
/// logged and ignored, since the caller's intent (the object is gone)
/// is already satisfied for drivers that succeed.
pub async fn delete_payload(
    fq_id: &str,
    driver_names: &[String],
    registry: &DriverRegistry,
) -> Result<()> {
    for driver in registry.resolve(driver_names) {
        if let Err(e) = driver.delete(fq_id).await {
            warn!("driver {} failed to delete {fq_id}: {e}", driver.name());
        }
    }
    Ok(())
}
