use crate::{
    api::error_response,
    blockchain::{models::NativeBalance, services::node},
    utils, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

// The handler function for the GET /balance/{address} endpoint.
pub async fn get_balance_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match node::get_balance(&state.chain, &address).await {
        Ok(balance) => (StatusCode::OK, Json::<NativeBalance>(balance)).into_response(),
        Err(e) => error_response(&format!("Failed to get balance for {}", address), e),
    }
}

// GET /block/{id}. Plain digits are block numbers, anything else is passed on as a tag.
pub async fn get_block_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match node::get_block(&state.chain, &Value::String(id.clone())).await {
        Ok(block) => (StatusCode::OK, Json(utils::json_safe(block))).into_response(),
        Err(e) => error_response(&format!("Failed to get block {}", id), e),
    }
}

// GET /tx/{hash}
pub async fn get_transaction_handler(
    Path(hash): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match node::get_transaction(&state.chain, &hash).await {
        Ok(tx) => (StatusCode::OK, Json(utils::json_safe(tx))).into_response(),
        Err(e) => error_response(&format!("Failed to get transaction {}", hash), e),
    }
}
