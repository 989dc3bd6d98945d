// src/blockchain/services/insight.rs

//! Thirdweb Insight: contract ABIs, wallet transaction history and ERC20 holdings.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::blockchain::models::ServiceError;
use crate::blockchain::services::{fetch_json, require_key, trim_base};
use crate::config::Config;
use crate::utils::checksum_address;

const SERVICE: &str = "Insight";
const ABI_TIMEOUT: Duration = Duration::from_secs(20);
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_HISTORY_LIMIT: i64 = 500;

/// Query options for [`InsightClient::get_transaction_history`].
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub limit: i64,
    pub page: i64,
    pub sort_order: String,
    pub timestamp_gte: Option<i64>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            page: 0,
            sort_order: "desc".to_string(),
            timestamp_gte: None,
        }
    }
}

#[derive(Clone)]
pub struct InsightClient {
    http: Client,
    base_url: String,
    chain_id: u64,
    client_id: Option<String>,
    secret_key: Option<String>,
}

impl InsightClient {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            base_url: trim_base(&config.insight_api_url).to_string(),
            chain_id: config.chain_id,
            client_id: config.thirdweb_client_id.clone(),
            secret_key: config.thirdweb_secret_key.clone(),
        }
    }

    fn get(&self, path: &str, timeout: Duration) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .timeout(timeout)
            .header("User-Agent", "Mozilla/5.0")
            .header("Accept", "application/json")
    }

    /// Verified ABI of a contract. A 404 means Insight does not know the contract.
    pub async fn get_contract_abi(&self, contract_address: &str) -> Result<Vec<Value>, ServiceError> {
        let client_id = require_key(self.client_id.as_ref(), "THIRDWEB_CLIENT_ID")?;
        let contract = checksum_address(contract_address)
            .map_err(|_| ServiceError::invalid(format!("Invalid contract address format: {}", contract_address)))?;
        info!("Fetching ABI for {} from Insight", contract);

        let request = self
            .get(&format!("/v1/contracts/abi/{}", contract), ABI_TIMEOUT)
            .query(&[("chain", self.chain_id.to_string()), ("clientId", client_id.to_string())]);
        let body = fetch_json(request, SERVICE).await.map_err(|e| match e {
            ServiceError::Upstream { status: 404, .. } => {
                ServiceError::not_found("ABI not found on Insight (404).")
            }
            other => other,
        })?;

        let abi = extract_abi(body)
            .ok_or_else(|| ServiceError::UnexpectedFormat("Insight ABI response".to_string()))?;
        info!("Fetched ABI with {} items", abi.len());
        Ok(abi)
    }

    /// One page of wallet transactions, as returned by Insight.
    pub async fn get_transaction_history(
        &self,
        address: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<Value>, ServiceError> {
        let client_id = require_key(self.client_id.as_ref(), "THIRDWEB_CLIENT_ID")?;
        let wallet = checksum_address(address)?;
        let sort_order = validate_history_query(query)?;
        info!(
            "Getting transaction history for {} (page {}, limit {})",
            wallet, query.page, query.limit
        );

        let mut params = vec![
            ("chain", self.chain_id.to_string()),
            ("clientId", client_id.to_string()),
            ("limit", query.limit.to_string()),
            ("page", query.page.to_string()),
            ("sort_order", sort_order),
        ];
        if let Some(ts) = query.timestamp_gte {
            params.push(("filter_block_timestamp_gte", ts.to_string()));
        }

        let request = self
            .get(&format!("/v1/wallets/{}/transactions", wallet), LIST_TIMEOUT)
            .query(&params);
        let body = fetch_json(request, SERVICE).await?;
        take_data_array(body, "Insight transaction history")
    }

    /// ERC20 holdings of a wallet. Authenticated with the backend secret key.
    pub async fn get_erc20_balances(&self, address: &str) -> Result<Vec<Value>, ServiceError> {
        let secret_key = require_key(self.secret_key.as_ref(), "THIRDWEB_SECRET_KEY")?;
        let wallet = checksum_address(address)?;
        info!("Getting ERC20 balances for {} via Insight", wallet);

        let request = self
            .http
            .get(format!("{}/v1/tokens/erc20/{}", self.base_url, wallet))
            .timeout(LIST_TIMEOUT)
            .header("accept", "application/json")
            .header("x-secret-key", secret_key)
            .query(&[("chain", self.chain_id.to_string()), ("include_price", "false".to_string())]);
        let body = fetch_json(request, SERVICE).await?;
        let tokens = take_data_array(body, "Insight ERC20 balances")?;
        info!("Found {} ERC20 tokens", tokens.len());
        Ok(tokens)
    }
}

/// Returns the normalized sort order.
fn validate_history_query(query: &HistoryQuery) -> Result<String, ServiceError> {
    if query.page < 0 {
        return Err(ServiceError::invalid("Page must be a non-negative integer."));
    }
    if !(1..=MAX_HISTORY_LIMIT).contains(&query.limit) {
        return Err(ServiceError::invalid("Limit must be between 1 and 500."));
    }
    let sort_order = query.sort_order.to_lowercase();
    if sort_order != "asc" && sort_order != "desc" {
        return Err(ServiceError::invalid("sort_order must be 'asc' or 'desc'."));
    }
    if matches!(query.timestamp_gte, Some(ts) if ts < 0) {
        return Err(ServiceError::invalid(
            "timestamp_filter_gte must be a non-negative integer Unix timestamp.",
        ));
    }
    Ok(sort_order)
}

/// Insight returns the ABI as a bare list or wrapped under `result` or `abi`.
fn extract_abi(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => ["result", "abi"].iter().find_map(|key| match map.remove(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }),
        _ => None,
    }
}

fn take_data_array(body: Value, what: &str) -> Result<Vec<Value>, ServiceError> {
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => {
                warn!("Unexpected format from {}", what);
                Err(ServiceError::UnexpectedFormat(what.to_string()))
            }
        },
        _ => Err(ServiceError::UnexpectedFormat(what.to_string())),
    }
}
