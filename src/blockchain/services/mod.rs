// src/blockchain/services/mod.rs

pub mod insight;
pub mod magic_eden;
pub mod node;
pub mod zerion;

use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, warn};

use crate::blockchain::models::ServiceError;

/// Send a vendor request and parse the JSON body. Non-2xx statuses become `Upstream` errors.
pub(crate) async fn fetch_json(
    request: RequestBuilder,
    service: &'static str,
) -> Result<Value, ServiceError> {
    let resp = request
        .send()
        .await
        .map_err(|source| ServiceError::Network { service, source })?;
    let status = resp.status();
    debug!(" -> {} status: {}", service, status);
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!("HTTP error from {}: {} - {}", service, status.as_u16(), body);
        return Err(ServiceError::Upstream { service, status: status.as_u16() });
    }
    resp.json::<Value>().await.map_err(|source| {
        if source.is_decode() {
            ServiceError::UnexpectedFormat(format!("{} response body: {}", service, source))
        } else {
            ServiceError::Network { service, source }
        }
    })
}

/// Returns the configured credential or the error naming its environment variable.
pub(crate) fn require_key<'a>(
    key: Option<&'a String>,
    env_name: &'static str,
) -> Result<&'a str, ServiceError> {
    key.map(String::as_str).ok_or(ServiceError::MissingCredential(env_name))
}

pub(crate) fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}
