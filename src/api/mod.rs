//! # API Module
//!
//! HTTP handlers for the Monad MCP server.
//!
//! ## Available Endpoints
//!
//! - `GET /health` - Liveness and configured chain
//! - `POST /rpc` - JSON-RPC endpoint for MCP tool calls
//! - `GET /balance/:address` - Native MON balance
//! - `GET /block/:id` - Block by number or tag
//! - `GET /tx/:hash` - Transaction by hash
//! - `GET /nft/trending` - Trending Magic Eden collections

pub mod chain;
pub mod health;
pub mod nft;
pub mod rpc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::error;

use crate::blockchain::models::ServiceError;
use crate::AppState;

/// Routes served under `/api`.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/rpc", post(rpc::rpc_handler))
        .route("/balance/:address", get(chain::get_balance_handler))
        .route("/block/:id", get(chain::get_block_handler))
        .route("/tx/:hash", get(chain::get_transaction_handler))
        .route("/nft/trending", get(nft::get_trending_handler))
}

/// Full application router with state applied.
pub fn create_router(state: AppState) -> Router {
    Router::new().nest("/api", create_api_router()).with_state(state)
}

pub(crate) fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::MissingCredential(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

pub(crate) fn error_response(context: &str, err: ServiceError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("{}: {}", context, err);
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
