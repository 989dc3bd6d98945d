//! Shared setup for integration tests: application state pointed at local mock servers.

#![allow(dead_code)]

use monad_mcp_server::{
    blockchain::client::ChainClient,
    config::{Config, Pacing},
    AppState,
};
use serde_json::{json, Value};

pub const WALLET: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
pub const WALLET_LOWER: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";

/// Config whose node and vendor URLs all point at `base_url`, with every credential set.
pub fn test_config(base_url: &str) -> Config {
    Config {
        rpc_url: base_url.to_string(),
        zerion_api_key: Some("zkey".to_string()),
        thirdweb_client_id: Some("client-id".to_string()),
        thirdweb_secret_key: Some("secret".to_string()),
        magic_eden_api_key: Some("me-key".to_string()),
        insight_api_url: base_url.to_string(),
        zerion_api_url: base_url.to_string(),
        magic_eden_api_url: base_url.to_string(),
        pacing: Pacing::none(),
        ..Config::default()
    }
}

pub fn test_state(config: Config) -> AppState {
    let chain = ChainClient::new(&config).unwrap();
    AppState::new(config, chain).unwrap()
}

pub fn rpc_result(result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}
