// src/config.rs

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

pub const MONAD_TESTNET_CHAIN_ID: u64 = 10143;

const DEFAULT_INSIGHT_API_URL: &str = "https://insight.thirdweb.com";
const DEFAULT_ZERION_API_URL: &str = "https://api.zerion.io";
const DEFAULT_MAGIC_EDEN_API_URL: &str = "https://api-mainnet.magiceden.dev";

/// Sleeps inserted between sequential upstream calls to stay under vendor rate limits.
#[derive(Clone, Debug)]
pub struct Pacing {
    /// Between two pages of the same paginated listing
    pub page_delay: Duration,
    /// Between two `eth_getCode` probes
    pub probe_delay: Duration,
    /// After a failed `eth_getCode` probe
    pub probe_error_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(500),
            probe_delay: Duration::from_millis(50),
            probe_error_delay: Duration::from_millis(500),
        }
    }
}

impl Pacing {
    /// No sleeping at all, for tests against local mock servers.
    pub fn none() -> Self {
        Self {
            page_delay: Duration::ZERO,
            probe_delay: Duration::ZERO,
            probe_error_delay: Duration::ZERO,
        }
    }
}

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    // Node settings
    pub rpc_url: String,
    pub chain_id: u64,

    // Vendor credentials. Tools needing a missing one fail when called.
    pub zerion_api_key: Option<String>,
    pub thirdweb_client_id: Option<String>,
    pub thirdweb_secret_key: Option<String>,
    pub magic_eden_api_key: Option<String>,

    // Vendor endpoints
    pub insight_api_url: String,
    pub zerion_api_url: String,
    pub magic_eden_api_url: String,

    pub pacing: Pacing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: MONAD_TESTNET_CHAIN_ID,
            zerion_api_key: None,
            thirdweb_client_id: None,
            thirdweb_secret_key: None,
            magic_eden_api_key: None,
            insight_api_url: DEFAULT_INSIGHT_API_URL.to_string(),
            zerion_api_url: DEFAULT_ZERION_API_URL.to_string(),
            magic_eden_api_url: DEFAULT_MAGIC_EDEN_API_URL.to_string(),
            pacing: Pacing::default(),
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn millis_var(key: &str, default: Duration) -> Result<Duration> {
    match optional_var(key) {
        Some(raw) => {
            let ms = raw
                .parse::<u64>()
                .with_context(|| format!("{} must be a number of milliseconds", key))?;
            Ok(Duration::from_millis(ms))
        }
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        let rpc_url = optional_var("MONAD_TESTNET_RPC_URL")
            .context("MONAD_TESTNET_RPC_URL must be set to the Monad testnet JSON-RPC endpoint")?;

        let chain_id = env::var("CHAIN_ID")
            .unwrap_or_else(|_| MONAD_TESTNET_CHAIN_ID.to_string())
            .parse::<u64>()
            .context("CHAIN_ID must be a valid number")?;

        let defaults = Pacing::default();
        let pacing = Pacing {
            page_delay: millis_var("PAGE_DELAY_MS", defaults.page_delay)?,
            probe_delay: millis_var("PROBE_DELAY_MS", defaults.probe_delay)?,
            probe_error_delay: millis_var("PROBE_ERROR_DELAY_MS", defaults.probe_error_delay)?,
        };

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("PORT must be a valid number")?,

            rpc_url,
            chain_id,

            zerion_api_key: optional_var("ZERION_API_KEY"),
            thirdweb_client_id: optional_var("THIRDWEB_CLIENT_ID"),
            thirdweb_secret_key: optional_var("THIRDWEB_SECRET_KEY"),
            magic_eden_api_key: optional_var("MAGIC_EDEN_API_KEY"),

            insight_api_url: optional_var("INSIGHT_API_URL")
                .unwrap_or_else(|| DEFAULT_INSIGHT_API_URL.to_string()),
            zerion_api_url: optional_var("ZERION_API_URL")
                .unwrap_or_else(|| DEFAULT_ZERION_API_URL.to_string()),
            magic_eden_api_url: optional_var("MAGIC_EDEN_API_URL")
                .unwrap_or_else(|| DEFAULT_MAGIC_EDEN_API_URL.to_string()),

            pacing,
        })
    }

    /// Names of the vendor credentials that are not configured, paired with the tools they gate.
    pub fn missing_credentials(&self) -> Vec<(&'static str, &'static str)> {
        let mut missing = Vec::new();
        if self.zerion_api_key.is_none() {
            missing.push(("ZERION_API_KEY", "portfolio balances, contract interactions, NFT transactions"));
        }
        if self.thirdweb_client_id.is_none() {
            missing.push(("THIRDWEB_CLIENT_ID", "ABI auto-fetch in read_contract, transaction history"));
        }
        if self.thirdweb_secret_key.is_none() {
            missing.push(("THIRDWEB_SECRET_KEY", "Insight ERC20 balances"));
        }
        if self.magic_eden_api_key.is_none() {
            missing.push(("MAGIC_EDEN_API_KEY", "NFT collection stats, activity, trending"));
        }
        missing
    }
}
