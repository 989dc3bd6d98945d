use crate::{api::error_response, utils, AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default = "default_sort")]
    pub sort_by: String,
}

fn default_limit() -> i64 {
    20
}

fn default_period() -> String {
    "1d".to_string()
}

fn default_sort() -> String {
    "sales".to_string()
}

// GET /nft/trending?limit=&period=&sort_by=
pub async fn get_trending_handler(
    Query(q): Query<TrendingQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state
        .magic_eden
        .get_trending_collections(q.limit, &q.period, &q.sort_by)
        .await
    {
        Ok(collections) => (
            StatusCode::OK,
            Json(json!({
                "period": q.period,
                "sort_by": q.sort_by,
                "collections": utils::json_safe(Value::Array(collections))
            })),
        )
            .into_response(),
        Err(e) => error_response("Failed to get trending collections", e),
    }
}
