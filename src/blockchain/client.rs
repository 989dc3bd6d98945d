//! Shared connection to the Monad testnet JSON-RPC node.
//!
//! Every tool that talks to the chain goes through the single [`ChainClient`]
//! stored in the application state. Requests are plain JSON-RPC 2.0 over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::blockchain::models::ServiceError;
use crate::config::Config;
use crate::utils::parse_quantity;

const RPC_TIMEOUT: Duration = Duration::from_secs(90);
const SERVICE: &str = "Monad RPC";

#[derive(Clone)]
pub struct ChainClient {
    http: Client,
    rpc_url: String,
    chain_id: u64,
    next_id: Arc<AtomicU64>,
}

impl ChainClient {
    /// Build a client for the configured node without touching the network.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for the RPC node")?;
        Ok(Self {
            http,
            rpc_url: config.rpc_url.clone(),
            chain_id: config.chain_id,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Build a client and verify the node answers `eth_chainId`.
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = Self::new(config)?;
        info!("Initializing connection to RPC node: {}", client.rpc_url);
        let reported = client
            .remote_chain_id()
            .await
            .map_err(|e| anyhow!("Could not connect to Monad RPC at {}: {}", client.rpc_url, e))?;
        info!("Chain ID reported by node: {}", reported);
        if reported != client.chain_id {
            warn!(
                "Node reports chain ID {} but server is configured for {}",
                reported, client.chain_id
            );
        }
        Ok(client)
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Chain id as reported by the node itself.
    pub async fn remote_chain_id(&self) -> Result<u64, ServiceError> {
        let raw = self.request("eth_chainId", json!([])).await?;
        raw.as_str()
            .and_then(parse_quantity)
            .filter(|n| *n <= ethers::types::U256::from(u64::MAX))
            .map(|n| n.as_u64())
            .ok_or_else(|| ServiceError::UnexpectedFormat(format!("eth_chainId result {}", raw)))
    }

    /// Send one JSON-RPC call and return its `result` (which may be `null`).
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });
        debug!("RPC -> {} (id {})", method, id);

        let resp = self
            .http
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ServiceError::Network { service: SERVICE, source })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ServiceError::Upstream { service: SERVICE, status: status.as_u16() });
        }
        let mut body: Value = resp
            .json()
            .await
            .map_err(|source| ServiceError::Network { service: SERVICE, source })?;

        if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
            let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
            let mut message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            if let Some(data) = err.get("data").filter(|d| !d.is_null()) {
                message.push_str(&format!(" ({})", data));
            }
            return Err(ServiceError::Rpc { code, message });
        }

        match body.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(ServiceError::UnexpectedFormat(format!(
                "{} response to {}: missing 'result'",
                SERVICE, method
            ))),
        }
    }
}
