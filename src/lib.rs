// src/lib.rs

use anyhow::{Context, Result};

pub mod api;
pub mod blockchain;
pub mod config;
pub mod mcp;
pub mod utils;

use blockchain::client::ChainClient;
use blockchain::services::{insight::InsightClient, magic_eden::MagicEdenClient, zerion::ZerionClient};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// JSON-RPC connection to the Monad testnet node
    pub chain: ChainClient,
    /// Thirdweb Insight: ABIs, history, ERC20 holdings
    pub insight: InsightClient,
    /// Zerion: positions and wallet transactions
    pub zerion: ZerionClient,
    /// Magic Eden: NFT marketplace data
    pub magic_eden: MagicEdenClient,
}

impl AppState {
    /// Wires the vendor clients around an already connected chain client.
    pub fn new(config: config::Config, chain: ChainClient) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client for vendor APIs")?;
        Ok(Self {
            insight: InsightClient::new(http.clone(), &config),
            zerion: ZerionClient::new(http.clone(), &config),
            magic_eden: MagicEdenClient::new(http, &config),
            chain,
            config,
        })
    }
}
