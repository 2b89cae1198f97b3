//! Node/session endpoints: `/v1/ping`, `/v1/auth`, `/v1/node/*`.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};

use crate::auth::session;
use crate::error::{GatewayError, Result};
use crate::logging::{OperationDetails, OperationResult, OperationType};

use super::schema::{AuthQuery, AuthResponse, LogQuery, PingResponse};
use super::AppState;

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "alive",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn issue_session(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
) -> Result<Json<AuthResponse>> {
    let config = state.config.read().await;
    let now = chrono::Utc::now().timestamp();
    let result = session::issue_session(
        &query.auth_request,
        &state.master_data_key,
        config.api.session_lifetime_secs,
        now,
        &config.api.app_domain_suffixes,
    );

    let (result_tag, description) = match &result {
        Ok(_) => (OperationResult::Success, "session issued".to_string()),
        Err(e) => (OperationResult::Failure, format!("session denied: {e}")),
    };
    state
        .logger
        .log_operation(
            OperationType::Auth,
            OperationDetails {
                description,
                ..Default::default()
            },
            result_tag,
            None,
            None,
        )
        .await;

    result.map(|token| Json(AuthResponse { token }))
}

pub async fn get_log(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let logs = state.logger.get_logs(query.since, query.limit).await;
    Json(logs)
}

pub async fn append_log(State(_state): State<AppState>) -> Result<Json<serde_json::Value>> {
    Err(GatewayError::NotImplemented(
        "clients read logs, they do not write them".to_string(),
    ))
}

pub async fn get_config(State(state): State<AppState>) -> Json<crate::config::GatewayConfig> {
    Json(state.config.read().await.clone())
}

/// Always 501: node restart is out of scope for this process (SPEC_FULL
/// §9, "Node reboot/backup Non-goals").
pub async fn reboot() -> Result<()> {
    Err(GatewayError::NotImplemented("node reboot is not supported".to_string()))
}

pub async fn registrar_state(State(state): State<AppState>) -> Json<Vec<crate::datastore::types::RegistrarQueueEntry>> {
    Json(state.registrar.state().await)
}

pub async fn not_implemented() -> Result<()> {
    Err(GatewayError::NotImplemented("collections are not supported".to_string()))
}
