use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Structured log of a single gateway operation, backing `GET /v1/node/log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOperationLog {
    pub id: String,
    pub timestamp: u64,
    pub operation_type: OperationType,
    pub details: OperationDetails,
    pub result: OperationResult,
    pub duration_ms: Option<u64>,
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationType {
    Auth,
    CreateDatastore,
    DeleteDatastore,
    ReadRootDirectory,
    ReadDeviceRoot,
    ReplaceDeviceRoot,
    ReadFile,
    WriteFile,
    DeleteFile,
    RegistrarEnqueue,
    RegistrarDrain,
    BlockchainQuery,
    DriverRegister,
    HealthCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperationDetails {
    pub description: String,
    pub data_size: Option<usize>,
    pub session_id: Option<String>,
    pub device_id: Option<String>,
    pub endpoint: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: Option<u32>,
    pub custom_fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationResult {
    Success,
    Failure,
    Timeout,
    PartialSuccess,
    InProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientInfo {
    pub device_id: Option<String>,
    pub app_domain: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_size: Option<usize>,
    pub response_size: Option<usize>,
}

/// Bounded ring buffer of recent gateway operations, kept in memory for
/// the lifetime of the process and surfaced through the node-log API.
pub struct GatewayLogger {
    logs: tokio::sync::RwLock<Vec<GatewayOperationLog>>,
    max_logs: usize,
}

impl GatewayLogger {
    pub fn new(max_logs: usize) -> Self {
        Self {
            logs: tokio::sync::RwLock::new(Vec::new()),
            max_logs,
        }
    }

    pub async fn log_operation(
        &self,
        operation_type: OperationType,
        details: OperationDetails,
        result: OperationResult,
        duration_ms: Option<u64>,
        client_info: Option<ClientInfo>,
    ) {
        let log_entry = GatewayOperationLog {
            id: Uuid::new_v4().to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            operation_type: operation_type.clone(),
            details: details.clone(),
            result: result.clone(),
            duration_ms,
            client_info: client_info.clone(),
        };

        match result {
            OperationResult::Success => {
                info!(
                    "{:?} completed in {}ms - {}",
                    operation_type,
                    duration_ms.unwrap_or(0),
                    details.description
                );
            }
            OperationResult::Failure => {
                error!(
                    "{:?} failed - {} | {}",
                    operation_type,
                    details.description,
                    details.error_message.as_deref().unwrap_or("unknown")
                );
            }
            OperationResult::Timeout => {
                warn!(
                    "{:?} timed out after {}ms - {}",
                    operation_type,
                    duration_ms.unwrap_or(0),
                    details.description
                );
            }
            OperationResult::PartialSuccess => {
                warn!("{:?} partially successful - {}", operation_type, details.description);
            }
            OperationResult::InProgress => {
                debug!("{:?} queued (attempt {}) - {}",
                    operation_type,
                    details.retry_count.unwrap_or(0),
                    details.description
                );
            }
        }

        let mut logs = self.logs.write().await;
        logs.push(log_entry);
        if logs.len() > self.max_logs {
            logs.remove(0);
        }
    }

    pub async fn get_logs(
        &self,
        since_timestamp: Option<u64>,
        limit: Option<usize>,
    ) -> Vec<GatewayOperationLog> {
        let logs = self.logs.read().await;
        let mut filtered: Vec<GatewayOperationLog> = logs
            .iter()
            .filter(|log| since_timestamp.is_none_or(|since| log.timestamp >= since))
            .cloned()
            .collect();

        filtered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            filtered.truncate(limit);
        }
        filtered
    }

    pub async fn get_statistics(&self, since_hours: Option<u64>) -> OperationStatistics {
        let logs = self.logs.read().await;
        let since_timestamp = since_hours.map(|hours| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
                .saturating_sub(hours * 3600)
        });

        let relevant: Vec<&GatewayOperationLog> = logs
            .iter()
            .filter(|log| since_timestamp.is_none_or(|since| log.timestamp >= since))
            .collect();

        let total = relevant.len();
        let successful = relevant
            .iter()
            .filter(|log| matches!(log.result, OperationResult::Success))
            .count();
        let failed = relevant
            .iter()
            .filter(|log| matches!(log.result, OperationResult::Failure))
            .count();

        let avg_duration = if total > 0 {
            relevant.iter().filter_map(|log| log.duration_ms).sum::<u64>() as f64 / total as f64
        } else {
            0.0
        };

        let mut operation_counts = HashMap::new();
        for log in &relevant {
            let name = format!("{:?}", log.operation_type);
            *operation_counts.entry(name).or_insert(0) += 1;
        }

        OperationStatistics {
            total_operations: total,
            successful_operations: successful,
            failed_operations: failed,
            success_rate: if total > 0 {
                (successful as f64 / total as f64) * 100.0
            } else {
                0.0
            },
            average_duration_ms: avg_duration,
            operation_counts,
        }
    }

    pub async fn export_logs(&self, format: ExportFormat) -> Result<String, serde_json::Error> {
        let logs = self.logs.read().await;
        match format {
            ExportFormat::Json => serde_json::to_string_pretty(&*logs),
            ExportFormat::JsonCompact => serde_json::to_string(&*logs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationStatistics {
    pub total_operations: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub operation_counts: HashMap<String, u32>,
}

#[derive(Debug, Clone)]
pub enum ExportFormat {
    Json,
    JsonCompact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ring_buffer_trims_oldest_entries() {
        let logger = GatewayLogger::new(2);
        for i in 0..3 {
            logger
                .log_operation(
                    OperationType::ReadFile,
                    OperationDetails {
                        description: format!("read {i}"),
                        ..Default::default()
                    },
                    OperationResult::Success,
                    Some(1),
                    None,
                )
                .await;
        }
        let logs = logger.get_logs(None, None).await;
        assert_eq!(logs.len(), 2);
    }

    #[tokio::test]
    async fn statistics_compute_success_rate() {
        let logger = GatewayLogger::new(10);
        logger
            .log_operation(
                OperationType::WriteFile,
                OperationDetails::default(),
                OperationResult::Success,
                Some(5),
                None,
            )
            .await;
        logger
            .log_operation(
                OperationType::WriteFile,
                OperationDetails::default(),
                OperationResult::Failure,
                Some(5),
                None,
            )
            .await;
        let stats = logger.get_statistics(None).await;
        assert_eq!(stats.total_operations, 2);
        assert_eq!(stats.success_rate, 50.0);
    }
}
