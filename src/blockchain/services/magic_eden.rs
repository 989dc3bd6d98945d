// src/blockchain/services/magic_eden.rs

//! Magic Eden marketplace data for Monad testnet.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::blockchain::models::ServiceError;
use crate::blockchain::services::{fetch_json, require_key, trim_base};
use crate::config::{Config, Pacing};
use crate::utils::checksum_address;

const SERVICE: &str = "Magic Eden";
const NETWORK: &str = "monad-testnet";
const TIMEOUT: Duration = Duration::from_secs(60);
const USER_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);
const COLLECTIONS_PAGE_SIZE: usize = 100;
const ACTIVITY_PAGE_SIZE: u32 = 20;

pub const TRENDING_PERIODS: [&str; 9] = ["5m", "10m", "30m", "1h", "6h", "1d", "24h", "7d", "30d"];
pub const TRENDING_SORTS: [&str; 2] = ["sales", "volume"];

#[derive(Clone)]
pub struct MagicEdenClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    pacing: Pacing,
}

impl MagicEdenClient {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            base_url: trim_base(&config.magic_eden_api_url).to_string(),
            api_key: config.magic_eden_api_key.clone(),
            pacing: config.pacing.clone(),
        }
    }

    fn request(&self, url: &str, api_key: &str, timeout: Duration) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .timeout(timeout)
            .header("accept", "*/*")
            .bearer_auth(api_key)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v3/rtp/{}{}", self.base_url, NETWORK, path)
    }

    /// Collections a wallet holds, with floor, top bid and liquidity stats.
    pub async fn get_nft_collection_stats(&self, wallet_address: &str) -> Result<Vec<Value>, ServiceError> {
        let api_key = require_key(self.api_key.as_ref(), "MAGIC_EDEN_API_KEY")?;
        let wallet = checksum_address(wallet_address)?;
        info!("Getting NFT collection stats for {} via Magic Eden", wallet);

        let url = self.endpoint(&format!("/users/{}/collections/v3", wallet));
        let mut collections = Vec::new();
        let mut offset = 0usize;

        loop {
            debug!("Fetching collections at offset {}", offset);
            let request = self.request(&url, api_key, TIMEOUT).query(&[
                ("limit", COLLECTIONS_PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
                ("includeTopBid", "true".to_string()),
                ("includeLiquidCount", "true".to_string()),
            ]);
            let body = fetch_json(request, SERVICE).await?;
            let page = required_list(&body, "collections")?;
            if page.is_empty() {
                break;
            }
            let short_page = page.len() < COLLECTIONS_PAGE_SIZE;
            collections.extend(page);
            if short_page {
                break;
            }
            offset += COLLECTIONS_PAGE_SIZE;
            tokio::time::sleep(self.pacing.page_delay).await;
        }

        info!("Found {} collections", collections.len());
        Ok(collections)
    }

    /// Full activity history of a single token.
    pub async fn get_nft_activity(
        &self,
        contract_address: &str,
        token_id: &str,
    ) -> Result<Vec<Value>, ServiceError> {
        let api_key = require_key(self.api_key.as_ref(), "MAGIC_EDEN_API_KEY")?;
        let contract = checksum_address(contract_address)?;
        let token_id = token_id.trim();
        if token_id.is_empty() {
            return Err(ServiceError::invalid("Token ID cannot be empty."));
        }
        if token_id.chars().any(char::is_whitespace) {
            return Err(ServiceError::invalid(format!("Invalid token_id provided: {}", token_id)));
        }
        info!("Getting activity for {}:{} via Magic Eden", contract, token_id);

        let token: String = form_urlencoded::byte_serialize(format!("{}:{}", contract, token_id).as_bytes()).collect();
        let base_url = self.endpoint(&format!("/tokens/{}/activity/v5", token));
        let base_params = vec![
            ("limit", ACTIVITY_PAGE_SIZE.to_string()),
            ("sortBy", "eventTimestamp".to_string()),
            ("includeMetadata", "true".to_string()),
        ];

        let mut activities = Vec::new();
        let mut next = NextPage::First;
        let mut page_num = 1;

        loop {
            let request = match &next {
                NextPage::First => self.request(&base_url, api_key, TIMEOUT).query(&base_params),
                NextPage::Url(url) => self.request(url, api_key, TIMEOUT),
                NextPage::Token(token) => {
                    let mut params = base_params.clone();
                    params.push(("continuation", token.clone()));
                    self.request(&base_url, api_key, TIMEOUT).query(&params)
                }
            };
            debug!("Fetching activity page {}", page_num);
            let body = fetch_json(request, SERVICE).await?;
            let page = list_field(&body, "activities")?;
            if page.is_empty() && page_num == 1 {
                info!("No activity found for {}:{}", contract, token_id);
                break;
            }
            activities.extend(page);

            match body.get("continuation").and_then(Value::as_str).filter(|c| !c.is_empty()) {
                Some(c) => {
                    next = NextPage::from_continuation(c);
                    page_num += 1;
                    tokio::time::sleep(self.pacing.page_delay).await;
                }
                None => break,
            }
        }

        info!("Found {} activities", activities.len());
        Ok(activities)
    }

    /// Most recent activity of a wallet. Only one page is fetched.
    pub async fn get_user_nft_activity(
        &self,
        user_address: &str,
        limit_per_page: Option<&Value>,
    ) -> Result<Vec<Value>, ServiceError> {
        let api_key = require_key(self.api_key.as_ref(), "MAGIC_EDEN_API_KEY")?;
        let user = checksum_address(user_address)?;
        let limit = resolve_activity_limit(limit_per_page);
        info!("Getting NFT activity for {} (limit {})", user, limit);

        let request = self
            .request(&self.endpoint("/users/activity/v6"), api_key, USER_ACTIVITY_TIMEOUT)
            .query(&[
                ("users", user.clone()),
                ("limit", limit.to_string()),
                ("sortBy", "eventTimestamp".to_string()),
                ("includeMetadata", "false".to_string()),
            ]);
        let body = fetch_json(request, SERVICE).await?;
        let activities = required_list(&body, "activities")?;
        info!("Fetched {} activities for {}", activities.len(), user);
        Ok(activities)
    }

    pub async fn get_trending_collections(
        &self,
        limit: i64,
        period: &str,
        sort_by: &str,
    ) -> Result<Vec<Value>, ServiceError> {
        let api_key = require_key(self.api_key.as_ref(), "MAGIC_EDEN_API_KEY")?;
        let (period, sort_by) = validate_trending(limit, period, sort_by)?;
        info!("Getting trending collections (limit {}, period {}, sort {})", limit, period, sort_by);

        let request = self
            .request(&self.endpoint("/collections/trending/v1"), api_key, TIMEOUT)
            .query(&[
                ("period", period),
                ("limit", limit.to_string()),
                ("sortBy", sort_by),
                ("normalizeRoyalties", "true".to_string()),
                ("useNonFlaggedFloorAsk", "false".to_string()),
            ]);
        let body = fetch_json(request, SERVICE).await?;
        let collections = required_list(&body, "collections")?;
        info!("Found {} trending collections", collections.len());
        Ok(collections)
    }
}

enum NextPage {
    First,
    Url(String),
    Token(String),
}

impl NextPage {
    fn from_continuation(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            NextPage::Url(value.to_string())
        } else {
            NextPage::Token(value.to_string())
        }
    }
}

/// Absent means 50, unparsable means 20, out of range means 100.
pub fn resolve_activity_limit(raw: Option<&Value>) -> u32 {
    let parsed = match raw {
        None | Some(Value::Null) => return 50,
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(n) if (1..=1000).contains(&n) => n as u32,
        Some(n) => {
            warn!("limit_per_page {} out of range, using 100", n);
            100
        }
        None => {
            warn!("Invalid limit_per_page, using 20");
            20
        }
    }
}

fn validate_trending(limit: i64, period: &str, sort_by: &str) -> Result<(String, String), ServiceError> {
    let period = period.to_lowercase();
    if !TRENDING_PERIODS.contains(&period.as_str()) {
        return Err(ServiceError::invalid(format!(
            "Invalid period. Must be one of: {}",
            TRENDING_PERIODS.join(", ")
        )));
    }
    let sort_by = sort_by.to_lowercase();
    if !TRENDING_SORTS.contains(&sort_by.as_str()) {
        return Err(ServiceError::invalid(format!(
            "Invalid sort_by. Must be one of: {}",
            TRENDING_SORTS.join(", ")
        )));
    }
    if !(1..=500).contains(&limit) {
        return Err(ServiceError::invalid("Limit must be between 1 and 500."));
    }
    Ok((period, sort_by))
}

/// The key must be present; a `null` list counts as an empty page.
fn required_list(body: &Value, key: &str) -> Result<Vec<Value>, ServiceError> {
    if body.get(key).is_none() {
        warn!("Magic Eden response without '{}': {}", key, body);
        return Err(ServiceError::UnexpectedFormat(format!("Magic Eden '{}' field", key)));
    }
    list_field(body, key)
}

/// A missing or null list is an empty page; anything else that is not a list is malformed.
fn list_field(body: &Value, key: &str) -> Result<Vec<Value>, ServiceError> {
    match body.get(key) {
        Some(Value::Array(items)) => Ok(items.clone()),
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(ServiceError::UnexpectedFormat(format!("Magic Eden '{}' field", key))),
    }
}
