//! HTTP surface tests: REST conveniences and the JSON-RPC endpoint, backed by a mock node.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{rpc_result, test_config, test_state, WALLET, WALLET_LOWER};
use monad_mcp_server::{api::create_router, config::Config, utils::checksum_address};

const TOKEN_LOWER: &str = "0x760afe86e5de5fa0ee542fc7b7b713e1c5425701";

fn balance_of_abi() -> Value {
    json!([{
        "type": "function",
        "name": "balanceOf",
        "inputs": [{"name": "owner", "type": "address", "internalType": "address"}],
        "outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}],
        "stateMutability": "view"
    }])
}

fn read_balance_call(id: u64, abi: Option<Value>) -> Value {
    let mut arguments = json!({
        "contract_address": TOKEN_LOWER,
        "function_name": "balanceOf",
        "args": [WALLET]
    });
    if let Some(abi) = abi {
        arguments["abi"] = abi;
    }
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": "read_contract_tool", "arguments": arguments}
    })
}

fn create_test_app(config: Config) -> Router {
    create_router(test_state(config))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn rpc(app: Router, payload: Value) -> Value {
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/rpc")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_reports_chain() {
    let server = Server::new_async().await;
    let app = create_test_app(test_config(&server.url()));

    let (status, body) = get(app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chain_id"], 10143);
}

#[tokio::test]
async fn test_balance_endpoint_formats_mon() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "eth_getBalance",
            "params": [WALLET, "latest"]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(json!("0xde0b6b3a7640000")))
        .create_async()
        .await;

    let app = create_test_app(test_config(&server.url()));
    let (status, body) = get(app, &format!("/api/balance/{}", WALLET_LOWER)).await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"], WALLET);
    assert_eq!(body["balance_wei"], "1000000000000000000");
    assert_eq!(body["balance_mon"], "1.000000000000000000");
}

#[tokio::test]
async fn test_balance_endpoint_rejects_bad_address() {
    let server = Server::new_async().await;
    let app = create_test_app(test_config(&server.url()));

    let (status, body) = get(app, "/api/balance/0x1234").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid address format: 0x1234");
}

#[tokio::test]
async fn test_block_endpoint_decodes_quantities() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "eth_getBlockByNumber",
            "params": ["0x10", false]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(json!({
            "number": "0x10",
            "hash": "0xabc",
            "timestamp": "0x65",
            "gasUsed": "0x0",
            "totalDifficulty": "0x20000000000001",
            "transactions": ["0x01"]
        })))
        .create_async()
        .await;

    let app = create_test_app(test_config(&server.url()));
    let (status, body) = get(app, "/api/block/16").await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["number"], 16);
    assert_eq!(body["timestamp"], 101);
    assert_eq!(body["gasUsed"], 0);
    assert_eq!(body["totalDifficulty"], "9007199254740993");
    assert_eq!(body["hash"], "0xabc");
}

#[tokio::test]
async fn test_block_endpoint_rejects_garbage_identifier() {
    let server = Server::new_async().await;
    let app = create_test_app(test_config(&server.url()));

    let (status, body) = get(app, "/api/block/soon").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid block identifier string.");
}

#[tokio::test]
async fn test_missing_transaction_is_404() {
    let hash = format!("0x{}", "ab".repeat(32));
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_getTransactionByHash"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(Value::Null))
        .create_async()
        .await;

    let app = create_test_app(test_config(&server.url()));
    let (status, body) = get(app, &format!("/api/tx/{}", hash)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], format!("Transaction not found: {}", hash));
}

#[tokio::test]
async fn test_trending_endpoint_validates_period() {
    let server = Server::new_async().await;
    let app = create_test_app(test_config(&server.url()));

    let (status, body) = get(app, "/api/nft/trending?period=2y").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid period"));
}

#[tokio::test]
async fn test_trending_endpoint_returns_collections() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v3/rtp/monad-testnet/collections/trending/v1")
        .match_header("authorization", "Bearer me-key")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("period".into(), "7d".into()),
            Matcher::UrlEncoded("limit".into(), "5".into()),
            Matcher::UrlEncoded("sortBy".into(), "volume".into()),
            Matcher::UrlEncoded("normalizeRoyalties".into(), "true".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"collections": [{"name": "Monadians", "volume": 12}]}).to_string())
        .create_async()
        .await;

    let app = create_test_app(test_config(&server.url()));
    let (status, body) = get(app, "/api/nft/trending?limit=5&period=7D&sort_by=volume").await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["period"], "7D");
    assert_eq!(body["collections"][0]["name"], "Monadians");
}

#[tokio::test]
async fn test_rpc_initialize_and_tools_list() {
    let server = Server::new_async().await;
    let config = test_config(&server.url());

    let init = rpc(
        create_test_app(config.clone()),
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
    )
    .await;
    assert_eq!(init["result"]["serverInfo"]["name"], "monad_mcp");

    let list = rpc(
        create_test_app(config),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    )
    .await;
    let tools = list["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 15);
    assert!(tools.iter().any(|t| t["name"] == "get_trending_collections_tool"));
}

#[tokio::test]
async fn test_rpc_native_balance_error_is_tool_result() {
    let server = Server::new_async().await;
    let app = create_test_app(test_config(&server.url()));

    let resp = rpc(
        app,
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "get_native_monad_balance_tool", "arguments": {"address": "nope"}}
        }),
    )
    .await;
    assert!(resp.get("error").is_none());
    assert_eq!(resp["result"]["isError"], true);
    assert_eq!(resp["result"]["content"][0]["text"], "Error: Invalid address format: nope");
}

#[tokio::test]
async fn test_rpc_direct_alias_returns_texty_result() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_getBalance"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(json!("0x0")))
        .create_async()
        .await;
    let app = create_test_app(test_config(&server.url()));

    let resp = rpc(
        app,
        json!({"jsonrpc": "2.0", "id": 4, "method": "get_monad_balance_tool", "params": {"address": WALLET}}),
    )
    .await;
    assert_eq!(resp["result"]["balance_mon"], "0.000000000000000000");
    assert_eq!(
        resp["result"]["content"][0]["text"],
        format!("Balance of {}: 0.000000000000000000 MON", WALLET)
    );
}

#[tokio::test]
async fn test_rpc_read_contract_with_inline_abi() {
    let contract = "0x760AfE86e5de5fa0Ee542fc7B7B713e1c5425701";
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_call"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(json!(format!("0x{:064x}", 1u128 << 60))))
        .create_async()
        .await;
    let app = create_test_app(test_config(&server.url()));

    let abi = json!([{
        "type": "function",
        "name": "balanceOf",
        "inputs": [{"name": "owner", "type": "address", "internalType": "address"}],
        "outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}],
        "stateMutability": "view"
    }]);
    let resp = rpc(
        app,
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "read_contract_tool", "arguments": {
                "contract_address": contract,
                "function_name": "balanceOf",
                "args": [WALLET],
                "abi": abi
            }}
        }),
    )
    .await;

    mock.assert_async().await;
    assert_eq!(resp["result"]["result"], "1152921504606846976");
}

#[tokio::test]
async fn test_rpc_reports_missing_credential() {
    let server = Server::new_async().await;
    let config = Config {
        thirdweb_client_id: None,
        ..test_config(&server.url())
    };
    let app = create_test_app(config);

    let resp = rpc(
        app,
        json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "tools/call",
            "params": {"name": "get_contract_abi_tool", "arguments": {"contract_address": WALLET}}
        }),
    )
    .await;
    assert_eq!(resp["error"]["code"], -32602);
    assert_eq!(resp["error"]["message"], "THIRDWEB_CLIENT_ID environment variable is not set.");
}

#[tokio::test]
async fn test_rpc_unknown_tool() {
    let server = Server::new_async().await;
    let app = create_test_app(test_config(&server.url()));

    let resp = rpc(
        app,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "transfer_evm", "arguments": {}}
        }),
    )
    .await;
    assert_eq!(resp["error"]["code"], -32601);
}

#[tokio::test]
async fn test_rpc_read_contract_fetches_abi_from_insight() {
    let token = checksum_address(TOKEN_LOWER).unwrap();
    let mut server = Server::new_async().await;
    let abi_mock = server
        .mock("GET", format!("/v1/contracts/abi/{}", token).as_str())
        .match_query(Matcher::UrlEncoded("clientId".into(), "client-id".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"result": balance_of_abi()}).to_string())
        .expect(1)
        .create_async()
        .await;
    let call_mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_call", "params": [{"to": token}, "latest"]})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(json!(format!("0x{:064x}", 42))))
        .expect(1)
        .create_async()
        .await;
    let app = create_test_app(test_config(&server.url()));

    let resp = rpc(app, read_balance_call(8, None)).await;

    abi_mock.assert_async().await;
    call_mock.assert_async().await;
    assert_eq!(resp["result"]["result"], 42);
}

#[tokio::test]
async fn test_rpc_read_contract_rejects_empty_fetched_abi() {
    let token = checksum_address(TOKEN_LOWER).unwrap();
    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("/v1/contracts/abi/{}", token).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;
    let call_mock = server.mock("POST", "/").expect(0).create_async().await;
    let app = create_test_app(test_config(&server.url()));

    let resp = rpc(app, read_balance_call(9, None)).await;

    call_mock.assert_async().await;
    assert_eq!(resp["error"]["code"], -32602);
    assert_eq!(resp["error"]["message"], "Invalid or empty ABI.");
}

#[tokio::test]
async fn test_rpc_read_contract_maps_revert_to_invalid_input() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_call"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": 3, "message": "execution reverted: paused", "data": "0x"}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let app = create_test_app(test_config(&server.url()));

    let resp = rpc(app, read_balance_call(10, Some(balance_of_abi()))).await;

    assert_eq!(resp["error"]["code"], -32602);
    let message = resp["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Contract execution reverted:"), "{}", message);
    assert!(message.contains("paused"));
}

#[tokio::test]
async fn test_rpc_transaction_tool_stringifies_wide_values() {
    let hash = format!("0x{}", "cd".repeat(32));
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "eth_getTransactionByHash",
            "params": [hash]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(json!({
            "hash": hash,
            "nonce": "0x5",
            "value": "0x3635c9adc5dea00000",
            "blockNumber": "0x10"
        })))
        .create_async()
        .await;
    let app = create_test_app(test_config(&server.url()));

    let resp = rpc(
        app,
        json!({
            "jsonrpc": "2.0",
            "id": 11,
            "method": "tools/call",
            "params": {"name": "get_monad_transaction_tool", "arguments": {"tx_hash": hash}}
        }),
    )
    .await;

    assert_eq!(resp["result"]["value"], "1000000000000000000000");
    assert_eq!(resp["result"]["nonce"], 5);
    assert_eq!(resp["result"]["blockNumber"], 16);
}
