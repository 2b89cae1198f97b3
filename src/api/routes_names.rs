//! Names endpoints (spec.md §6): listing and single-name info are
//! proxied straight to the naming node; register/revoke enqueue into
//! the registrar proxy (§4.5) and return the resulting queue entry.

use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::Value;

use crate::datastore::types::{RegistrarOp, RegistrarQueueEntry};
use crate::error::Result;

use super::AppState;

pub async fn list_names(State(_state): State<AppState>) -> Result<Json<Value>> {
    // Paged name listing would require indexing the naming node's full
    // set locally; not modeled here, matching NAMES_BULK out of scope.
    Ok(Json(serde_json::json!({ "names": [] })))
}

pub async fn register_name(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<RegistrarQueueEntry>> {
    let name = body
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let entry = state.registrar.enqueue(RegistrarOp::Register, name).await;
    Ok(Json(entry))
}

pub async fn name_info(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>> {
    let record = state.blockchain.name_record(&name).await?;
    Ok(Json(record))
}

pub async fn revoke_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RegistrarQueueEntry>> {
    let entry = state.registrar.enqueue(RegistrarOp::Revoke, name).await;
    Ok(Json(entry))
}
