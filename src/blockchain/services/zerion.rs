// src/blockchain/services/zerion.rs

//! Zerion portfolio API: fungible positions and wallet transactions on Monad testnet.
//!
//! Zerion paginates with an opaque `links.next` URL. Only the first request carries
//! query parameters; every following page is fetched from the returned URL verbatim.

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::blockchain::client::ChainClient;
use crate::blockchain::models::{ContractInteractions, ServiceError, TokenBalance};
use crate::blockchain::services::{fetch_json, node, require_key, trim_base};
use crate::config::{Config, Pacing};
use crate::utils::{checksum, checksum_address, parse_address};

const SERVICE: &str = "Zerion";
const TIMEOUT: Duration = Duration::from_secs(60);
const CHAIN_FILTER: &str = "monad-test-v2";
const PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct ZerionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    pacing: Pacing,
}

impl ZerionClient {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            base_url: trim_base(&config.zerion_api_url).to_string(),
            api_key: config.zerion_api_key.clone(),
            pacing: config.pacing.clone(),
        }
    }

    fn request(&self, url: &str, api_key: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .timeout(TIMEOUT)
            .basic_auth(api_key, Some(""))
            .header("accept", "application/json")
            .header("X-Env", "testnet")
    }

    /// Follows `links.next` until it runs out and returns the `data` entries of every page.
    async fn collect_pages(
        &self,
        path: &str,
        params: Vec<(&'static str, String)>,
        stop_on_empty_first_page: bool,
    ) -> Result<Vec<Value>, ServiceError> {
        let api_key = require_key(self.api_key.as_ref(), "ZERION_API_KEY")?;
        let mut url = format!("{}{}", self.base_url, path);
        let mut entries = Vec::new();
        let mut page_num = 1;

        loop {
            debug!("Fetching Zerion page {} of {}", page_num, path);
            let mut request = self.request(&url, api_key);
            if page_num == 1 {
                request = request.query(&params);
            }
            let body = fetch_json(request, SERVICE).await?;

            let page = match body.get("data") {
                Some(Value::Array(items)) => items.clone(),
                Some(Value::Null) | None => Vec::new(),
                Some(_) => {
                    return Err(ServiceError::UnexpectedFormat(format!("Zerion page {}", page_num)))
                }
            };
            let next = body
                .get("links")
                .and_then(|l| l.get("next"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            if page.is_empty() && page_num == 1 && stop_on_empty_first_page {
                info!("No Zerion entries found for {}", path);
                break;
            }
            entries.extend(page);
            debug!("Page {} OK ({} entries so far)", page_num, entries.len());

            match next {
                Some(next_url) => {
                    url = next_url;
                    page_num += 1;
                    tokio::time::sleep(self.pacing.page_delay).await;
                }
                None => break,
            }
        }
        Ok(entries)
    }

    /// Non-native, non-trash fungible balances, sorted by token name.
    pub async fn get_erc20_balances(&self, address: &str) -> Result<Vec<TokenBalance>, ServiceError> {
        require_key(self.api_key.as_ref(), "ZERION_API_KEY")?;
        let wallet = checksum_address(address)?;
        info!("Getting Monad ERC20 balances for {} via Zerion positions", wallet);

        let params = vec![
            ("filter[chain_ids]", CHAIN_FILTER.to_string()),
            ("page[size]", PAGE_SIZE.to_string()),
            ("currency", "usd".to_string()),
            ("filter[trash]", "no_filter".to_string()),
            ("filter[positions]", "no_filter".to_string()),
            ("sort", "value".to_string()),
        ];
        let positions = self
            .collect_pages(&format!("/v1/wallets/{}/positions", wallet), params, false)
            .await?;

        let mut tokens = parse_token_positions(&positions);
        tokens.sort_by_key(|t| t.name.to_lowercase());
        info!("Found {} non-native tokens", tokens.len());
        Ok(tokens)
    }

    /// Counts the distinct addresses a wallet sent transactions to, and which of them are contracts.
    pub async fn get_contract_interactions(
        &self,
        chain: &ChainClient,
        address: &str,
    ) -> Result<ContractInteractions, ServiceError> {
        require_key(self.api_key.as_ref(), "ZERION_API_KEY")?;
        let wallet = checksum_address(address)?;
        info!("Starting contract interaction analysis for {}", wallet);

        let params = vec![
            ("filter[chain_ids]", CHAIN_FILTER.to_string()),
            ("page[size]", PAGE_SIZE.to_string()),
            ("currency", "usd".to_string()),
            ("filter[trash]", "no_filter".to_string()),
        ];
        let transactions = self
            .collect_pages(&format!("/v1/wallets/{}/transactions", wallet), params, true)
            .await?;
        let interacted = collect_recipients(&transactions);
        info!(
            "Processed {} transactions, {} unique recipients",
            transactions.len(),
            interacted.len()
        );

        let contracts = self.probe_contracts(chain, &interacted).await;
        info!("Contract check complete: {} contracts", contracts.len());

        Ok(ContractInteractions {
            analysis_address: address.to_string(),
            total_transactions_processed_by_zerion: transactions.len(),
            unique_interacted_address_count: interacted.len(),
            unique_contract_count: contracts.len(),
            contract_addresses: contracts.into_iter().collect(),
        })
    }

    /// Keeps the addresses that carry code. Probe failures are logged and skipped.
    async fn probe_contracts(&self, chain: &ChainClient, addresses: &BTreeSet<String>) -> BTreeSet<String> {
        let mut contracts = BTreeSet::new();
        let total = addresses.len();
        for (i, addr) in addresses.iter().enumerate() {
            debug!("Checking contract {}/{}: {}", i + 1, total, addr);
            let parsed = match parse_address(addr) {
                Ok(a) => a,
                Err(_) => {
                    warn!("Skipping invalid address format: {}", addr);
                    continue;
                }
            };
            let checksummed = checksum(&parsed);
            match node::is_contract(chain, &checksummed).await {
                Ok(true) => {
                    contracts.insert(checksummed);
                    tokio::time::sleep(self.pacing.probe_delay).await;
                }
                Ok(false) => tokio::time::sleep(self.pacing.probe_delay).await,
                Err(e) => {
                    warn!("Could not check code for {}: {}", addr, e);
                    tokio::time::sleep(self.pacing.probe_error_delay).await;
                }
            }
        }
        contracts
    }

    /// Raw NFT-related transactions of a wallet across all pages.
    pub async fn get_user_nft_transactions(
        &self,
        address: &str,
        limit_per_page: u32,
    ) -> Result<Vec<Value>, ServiceError> {
        require_key(self.api_key.as_ref(), "ZERION_API_KEY")?;
        let wallet = checksum_address(address)?;
        if limit_per_page == 0 {
            return Err(ServiceError::invalid("limit_per_page must be a positive integer."));
        }
        info!("Getting NFT transactions for {} via Zerion", wallet);

        let params = vec![
            ("filter[chain_ids]", CHAIN_FILTER.to_string()),
            ("page[size]", limit_per_page.to_string()),
            ("currency", "usd".to_string()),
            ("filter[trash]", "no_filter".to_string()),
            ("filter[asset_types]", "nft".to_string()),
        ];
        let transactions = self
            .collect_pages(&format!("/v1/wallets/{}/transactions", wallet), params, true)
            .await?;
        info!("Found {} NFT transactions", transactions.len());
        Ok(transactions)
    }
}

fn parse_token_positions(positions: &[Value]) -> Vec<TokenBalance> {
    positions
        .iter()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("positions"))
        .filter_map(|p| {
            let attributes = p.get("attributes")?;
            let present = |v: &&Value| v.as_object().is_some_and(|m| !m.is_empty());
            let fungible = attributes.get("fungible_info").filter(present)?;
            let quantity = attributes.get("quantity").filter(present)?;
            let flag = |name: &str| {
                attributes
                    .get("flags")
                    .and_then(|f| f.get(name))
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            };
            if flag("trash") || flag("native") {
                return None;
            }
            let text = |v: &Value, key: &str, default: &str| {
                v.get(key).and_then(Value::as_str).unwrap_or(default).to_string()
            };
            Some(TokenBalance {
                name: text(fungible, "name", "N/A"),
                symbol: text(fungible, "symbol", "N/A"),
                balance_exact: text(quantity, "numeric", "0"),
            })
        })
        .collect()
}

fn collect_recipients(transactions: &[Value]) -> BTreeSet<String> {
    transactions
        .iter()
        .filter(|tx| tx.get("type").and_then(Value::as_str) == Some("transactions"))
        .filter_map(|tx| tx.get("attributes")?.get("sent_to")?.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}
