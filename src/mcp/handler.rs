//! # MCP Handler Module
//!
//! This module implements the Model Context Protocol (MCP) for the Monad testnet server.
//! It handles incoming MCP requests and dispatches them to the matching tool.
//!
//! ## Supported Tools
//!
//! ### Node
//! - `get_native_monad_balance_tool` - Native MON balance as text
//! - `get_monad_balance_tool` - Native MON balance with wei amount
//! - `get_monad_transaction_tool` - Transaction by hash
//! - `get_monad_block_tool` - Block by number or tag
//! - `read_contract_tool` - Call a view function, fetching the ABI if needed
//!
//! ### Thirdweb Insight
//! - `get_contract_abi_tool`
//! - `get_transaction_history_tool`
//! - `get_insight_erc20_balances_tool`
//!
//! ### Zerion
//! - `get_monad_erc20_balances_tool`
//! - `get_contract_interactions_tool`
//! - `get_user_nft_transactions_tool`
//!
//! ### Magic Eden
//! - `get_nft_collection_stats_tool`
//! - `get_nft_activity_tool`
//! - `get_user_nft_activity_tool`
//! - `get_trending_collections_tool`

use crate::{
    blockchain::{
        models::ServiceError,
        services::{insight::HistoryQuery, node},
    },
    mcp::protocol::{error_codes, Request, Response},
    utils, AppState,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Every tool name, also accepted as a direct JSON-RPC method.
pub const TOOL_NAMES: [&str; 15] = [
    "get_native_monad_balance_tool",
    "get_monad_balance_tool",
    "get_monad_transaction_tool",
    "get_monad_block_tool",
    "read_contract_tool",
    "get_contract_abi_tool",
    "get_contract_interactions_tool",
    "get_monad_erc20_balances_tool",
    "get_insight_erc20_balances_tool",
    "get_transaction_history_tool",
    "get_user_nft_transactions_tool",
    "get_nft_collection_stats_tool",
    "get_nft_activity_tool",
    "get_user_nft_activity_tool",
    "get_trending_collections_tool",
];

// Helper: produce a result Value that always contains a text content array
// and preserves structured data for JSON-friendly clients.
fn make_texty_result(text: String, payload: Value) -> Value {
    let content = json!([{ "type": "text", "text": text }]);
    match payload {
        Value::Object(mut map) => {
            // Do not overwrite if caller already set content
            if !map.contains_key("content") {
                map.insert("content".into(), content);
            }
            Value::Object(map)
        }
        other => json!({
            "data": other,
            "content": content
        }),
    }
}

fn texty_success(req_id: &Value, text: String, payload: Value) -> Response {
    Response::success(req_id.clone(), make_texty_result(text, utils::json_safe(payload)))
}

/// Maps a service failure onto a JSON-RPC error.
fn service_error(req_id: &Value, tool: &str, err: ServiceError) -> Response {
    let code = match &err {
        ServiceError::InvalidInput(_) | ServiceError::MissingCredential(_) => {
            warn!("{} rejected: {}", tool, err);
            error_codes::INVALID_PARAMS
        }
        ServiceError::NotFound(_) => {
            warn!("{}: {}", tool, err);
            error_codes::RESOURCE_NOT_FOUND
        }
        _ => {
            error!("{} failed: {}", tool, err);
            error_codes::UPSTREAM_ERROR
        }
    };
    Response::error(req_id.clone(), code, err.to_string())
}

fn count_text(count: usize, what: &str, subject: &str) -> String {
    format!("Found {} {} for {}", count, what, subject)
}

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tool_call(req, state).await,
        // Direct method calls are rewritten into tools/call to reuse the same logic
        method if TOOL_NAMES.contains(&method) => {
            let wrapped = Request {
                jsonrpc: req.jsonrpc.clone(),
                id: req.id.clone(),
                method: "tools/call".to_string(),
                params: Some(json!({
                    "name": method,
                    "arguments": req.params.clone().unwrap_or_else(|| json!({}))
                })),
            };
            handle_tool_call(wrapped, state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

/// Handles a 'tools/call' request by dispatching it to the correct tool logic.
async fn handle_tool_call(req: Request, state: AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let empty_args = json!({});
    let args = params.get("arguments").unwrap_or(&empty_args);
    let req_id = &req.id;
    let fail = |e: ServiceError| service_error(req_id, tool_name, e);

    let res: Result<Response, Response> = (async {
        match tool_name {
            // --- Node ---
            "get_native_monad_balance_tool" => {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                // Failures are reported inside the tool result rather than as a JSON-RPC error
                let result = match node::get_native_balance_text(&state.chain, &address).await {
                    Ok(text) => make_texty_result(text.clone(), json!({ "balance": text })),
                    Err(e) => {
                        warn!("Native balance lookup for {} failed: {}", address, e);
                        json!({
                            "content": [{ "type": "text", "text": format!("Error: {}", e) }],
                            "isError": true
                        })
                    }
                };
                Ok(Response::success(req_id.clone(), result))
            }
            "get_monad_balance_tool" => {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let balance = node::get_balance(&state.chain, &address).await.map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    format!("Balance of {}: {} MON", balance.address, balance.balance_mon),
                    json!(balance),
                ))
            }
            "get_monad_transaction_tool" => {
                let tx_hash = utils::get_required_arg::<String>(args, "tx_hash", req_id)?;
                let tx = node::get_transaction(&state.chain, &tx_hash).await.map_err(fail)?;
                Ok(texty_success(req_id, format!("Transaction {}", tx_hash), tx))
            }
            "get_monad_block_tool" => {
                let identifier = match args.get("block_identifier") {
                    Some(v) if !v.is_null() => v.clone(),
                    _ => {
                        return Err(Response::error(
                            req_id.clone(),
                            error_codes::INVALID_PARAMS,
                            "Missing or invalid required argument: 'block_identifier'".into(),
                        ))
                    }
                };
                let block = node::get_block(&state.chain, &identifier).await.map_err(fail)?;
                let label = match block.get("number") {
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::String(s)) => s.clone(),
                    _ => identifier.to_string(),
                };
                Ok(texty_success(req_id, format!("Block {}", label), block))
            }
            "read_contract_tool" => {
                let contract = utils::get_required_arg::<String>(args, "contract_address", req_id)?;
                let function = utils::get_required_arg::<String>(args, "function_name", req_id)?;
                let call_args = utils::get_optional_arg::<Vec<Value>>(args, "args", req_id)?
                    .unwrap_or_default();
                let abi = abi_argument(args, req_id)?;
                let value = node::read_contract(
                    &state.chain,
                    &state.insight,
                    &contract,
                    &function,
                    call_args,
                    abi,
                )
                .await
                .map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    format!("Read {}.{}", contract, function),
                    json!({ "result": value }),
                ))
            }

            // --- Thirdweb Insight ---
            "get_contract_abi_tool" => {
                let contract = utils::get_required_arg::<String>(args, "contract_address", req_id)?;
                let abi = state.insight.get_contract_abi(&contract).await.map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    format!("ABI for {} has {} entries", contract, abi.len()),
                    Value::Array(abi),
                ))
            }
            "get_insight_erc20_balances_tool" => {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let tokens = state.insight.get_erc20_balances(&address).await.map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    count_text(tokens.len(), "ERC20 tokens", &address),
                    Value::Array(tokens),
                ))
            }
            "get_transaction_history_tool" => {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let defaults = HistoryQuery::default();
                let query = HistoryQuery {
                    limit: utils::get_optional_arg(args, "limit", req_id)?.unwrap_or(defaults.limit),
                    page: utils::get_optional_arg(args, "page", req_id)?.unwrap_or(defaults.page),
                    sort_order: utils::get_optional_arg(args, "sort_order", req_id)?
                        .unwrap_or(defaults.sort_order),
                    timestamp_gte: utils::get_optional_arg(args, "timestamp_gte", req_id)?,
                };
                let txs = state
                    .insight
                    .get_transaction_history(&address, &query)
                    .await
                    .map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    count_text(txs.len(), "transactions", &address),
                    Value::Array(txs),
                ))
            }

            // --- Zerion ---
            "get_monad_erc20_balances_tool" => {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let tokens = state.zerion.get_erc20_balances(&address).await.map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    count_text(tokens.len(), "ERC20 tokens", &address),
                    json!(tokens),
                ))
            }
            "get_contract_interactions_tool" => {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let summary = state
                    .zerion
                    .get_contract_interactions(&state.chain, &address)
                    .await
                    .map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    format!(
                        "{} interacted with {} unique addresses, {} of them contracts",
                        address, summary.unique_interacted_address_count, summary.unique_contract_count
                    ),
                    json!(summary),
                ))
            }
            "get_user_nft_transactions_tool" => {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let limit = utils::get_optional_arg::<u32>(args, "limit_per_page", req_id)?.unwrap_or(50);
                let txs = state
                    .zerion
                    .get_user_nft_transactions(&address, limit)
                    .await
                    .map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    count_text(txs.len(), "NFT transactions", &address),
                    Value::Array(txs),
                ))
            }

            // --- Magic Eden ---
            "get_nft_collection_stats_tool" => {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let collections = state
                    .magic_eden
                    .get_nft_collection_stats(&address)
                    .await
                    .map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    count_text(collections.len(), "collections", &address),
                    Value::Array(collections),
                ))
            }
            "get_nft_activity_tool" => {
                let contract = utils::get_required_arg::<String>(args, "contract_address", req_id)?;
                let token_id = token_id_argument(args, req_id)?;
                let activities = state
                    .magic_eden
                    .get_nft_activity(&contract, &token_id)
                    .await
                    .map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    count_text(activities.len(), "activities", &format!("{}:{}", contract, token_id)),
                    Value::Array(activities),
                ))
            }
            "get_user_nft_activity_tool" => {
                let address = utils::get_required_arg::<String>(args, "address", req_id)?;
                let activities = state
                    .magic_eden
                    .get_user_nft_activity(&address, args.get("limit_per_page"))
                    .await
                    .map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    count_text(activities.len(), "activities", &address),
                    Value::Array(activities),
                ))
            }
            "get_trending_collections_tool" => {
                let limit = utils::get_optional_arg::<i64>(args, "limit", req_id)?.unwrap_or(20);
                let period = utils::get_optional_arg::<String>(args, "period", req_id)?
                    .unwrap_or_else(|| "1d".to_string());
                let sort_by = utils::get_optional_arg::<String>(args, "sort_by", req_id)?
                    .unwrap_or_else(|| "sales".to_string());
                let collections = state
                    .magic_eden
                    .get_trending_collections(limit, &period, &sort_by)
                    .await
                    .map_err(fail)?;
                Ok(texty_success(
                    req_id,
                    format!("Found {} trending collections ({}, by {})", collections.len(), period, sort_by),
                    Value::Array(collections),
                ))
            }
            _ => Err(Response::error(
                req_id.clone(),
                error_codes::METHOD_NOT_FOUND,
                format!("Tool not found: {}", tool_name),
            )),
        }
    })
    .await;

    res.unwrap_or_else(|err_resp| err_resp)
}

/// `abi` may be given as a JSON array or as a string holding one.
fn abi_argument(args: &Value, req_id: &Value) -> Result<Option<Vec<Value>>, Response> {
    let invalid = |msg: String| Response::error(req_id.clone(), error_codes::INVALID_PARAMS, msg);
    match args.get("abi") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items.clone())),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => serde_json::from_str::<Vec<Value>>(raw)
            .map(Some)
            .map_err(|e| invalid(format!("Invalid or empty ABI: {}", e))),
        Some(_) => Err(invalid("Invalid or empty ABI.".into())),
    }
}

/// Token ids are strings upstream; integers are accepted for convenience.
fn token_id_argument(args: &Value, req_id: &Value) -> Result<String, Response> {
    match args.get("token_id") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            "Missing or invalid required argument: 'token_id'".into(),
        )),
    }
}

/// Handles the 'initialize' request.
fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": "monad_mcp",
        "version": env!("CARGO_PKG_VERSION")
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions = "Monad testnet data tools: native balances, blocks, transactions and contract reads \
        from the node, ABIs and history from Thirdweb Insight, portfolios from Zerion and NFT data from Magic Eden.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": "2025-06-18",
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

fn address_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "address": {"type": "string", "description": description}
        },
        "required": ["address"],
        "additionalProperties": false
    })
}

/// JSON definitions of all available tools.
pub fn tool_definitions() -> Value {
    json!([
        {
            "name": "get_native_monad_balance_tool",
            "description": "Get the native MON balance of an address on Monad testnet, as text.",
            "inputSchema": address_schema("The 0x... wallet address to check.")
        },
        {
            "name": "get_monad_balance_tool",
            "description": "Get the native MON balance of an address, in wei and in MON.",
            "inputSchema": address_schema("The 0x... wallet address to check.")
        },
        {
            "name": "get_monad_transaction_tool",
            "description": "Get a Monad testnet transaction by hash.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tx_hash": {"type": "string", "description": "0x-prefixed 32-byte transaction hash"}
                },
                "required": ["tx_hash"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_monad_block_tool",
            "description": "Get a Monad testnet block by number or by tag (latest, earliest, pending).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "block_identifier": {
                        "type": ["integer", "string"],
                        "description": "Block number, decimal string, or tag"
                    }
                },
                "required": ["block_identifier"],
                "additionalProperties": false
            }
        },
        {
            "name": "read_contract_tool",
            "description": "Call a read-only contract function. The ABI is fetched from Thirdweb Insight when not supplied.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "contract_address": {"type": "string", "description": "Contract address"},
                    "function_name": {"type": "string", "description": "Function to call"},
                    "args": {"type": "array", "description": "Positional arguments", "default": []},
                    "abi": {"type": ["array", "string"], "description": "Optional contract ABI"}
                },
                "required": ["contract_address", "function_name"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_contract_abi_tool",
            "description": "Fetch the verified ABI of a contract from Thirdweb Insight.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "contract_address": {"type": "string", "description": "Contract address"}
                },
                "required": ["contract_address"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_contract_interactions_tool",
            "description": "List the contracts a wallet has sent transactions to, using Zerion history and on-chain code checks.",
            "inputSchema": address_schema("The 0x... wallet address to analyse.")
        },
        {
            "name": "get_monad_erc20_balances_tool",
            "description": "Get the ERC20 balances of a wallet from Zerion, sorted by token name.",
            "inputSchema": address_schema("The 0x... wallet address.")
        },
        {
            "name": "get_insight_erc20_balances_tool",
            "description": "Get the ERC20 balances of a wallet from Thirdweb Insight.",
            "inputSchema": address_schema("The 0x... wallet address.")
        },
        {
            "name": "get_transaction_history_tool",
            "description": "Get one page of a wallet's transaction history from Thirdweb Insight.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "address": {"type": "string", "description": "Wallet address"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 500, "default": 50},
                    "page": {"type": "integer", "minimum": 0, "default": 0},
                    "sort_order": {"type": "string", "enum": ["asc", "desc"], "default": "desc"},
                    "timestamp_gte": {"type": "integer", "minimum": 0, "description": "Only transactions at or after this Unix timestamp"}
                },
                "required": ["address"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_user_nft_transactions_tool",
            "description": "Get every NFT-related transaction of a wallet from Zerion.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "address": {"type": "string", "description": "Wallet address"},
                    "limit_per_page": {"type": "integer", "minimum": 1, "default": 50}
                },
                "required": ["address"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_nft_collection_stats_tool",
            "description": "Get the NFT collections a wallet holds on Magic Eden, with floor and top bid.",
            "inputSchema": address_schema("The 0x... wallet address.")
        },
        {
            "name": "get_nft_activity_tool",
            "description": "Get the full Magic Eden activity history of a single NFT.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "contract_address": {"type": "string", "description": "Collection contract address"},
                    "token_id": {"type": ["string", "integer"], "description": "Token id"}
                },
                "required": ["contract_address", "token_id"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_user_nft_activity_tool",
            "description": "Get the most recent Magic Eden NFT activity of a wallet.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "address": {"type": "string", "description": "Wallet address"},
                    "limit_per_page": {"type": "integer", "minimum": 1, "maximum": 1000, "default": 50}
                },
                "required": ["address"],
                "additionalProperties": false
            }
        },
        {
            "name": "get_trending_collections_tool",
            "description": "Get trending NFT collections on Magic Eden for Monad testnet.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "minimum": 1, "maximum": 500, "default": 20},
                    "period": {"type": "string", "enum": ["5m", "10m", "30m", "1h", "6h", "1d", "24h", "7d", "30d"], "default": "1d"},
                    "sort_by": {"type": "string", "enum": ["sales", "volume"], "default": "sales"}
                },
                "additionalProperties": false
            }
        }
    ])
}

/// Handles the 'tools/list' request.
fn handle_tools_list(req: &Request) -> Response {
    Response::success(req.id.clone(), json!({ "tools": tool_definitions() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_tool_is_dispatchable() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), TOOL_NAMES.len());
        for name in TOOL_NAMES {
            assert!(names.contains(&name), "{} missing from tools/list", name);
        }
    }

    #[test]
    fn texty_result_wraps_non_objects() {
        let wrapped = make_texty_result("two".into(), json!([1, 2]));
        assert_eq!(wrapped["data"], json!([1, 2]));
        assert_eq!(wrapped["content"][0]["text"], "two");

        let merged = make_texty_result("obj".into(), json!({"a": 1}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["content"][0]["type"], "text");
    }

    #[test]
    fn service_errors_map_to_rpc_codes() {
        let id = json!(1);
        let code = |e| service_error(&id, "t", e).error.unwrap().code;
        assert_eq!(code(ServiceError::invalid("bad")), error_codes::INVALID_PARAMS);
        assert_eq!(code(ServiceError::MissingCredential("ZERION_API_KEY")), error_codes::INVALID_PARAMS);
        assert_eq!(code(ServiceError::not_found("gone")), error_codes::RESOURCE_NOT_FOUND);
        assert_eq!(
            code(ServiceError::Upstream { service: "Zerion", status: 500 }),
            error_codes::UPSTREAM_ERROR
        );
    }

    #[test]
    fn abi_argument_accepts_array_or_string() {
        let id = json!(1);
        assert_eq!(abi_argument(&json!({}), &id).unwrap(), None);
        assert_eq!(abi_argument(&json!({"abi": [{"type": "function"}]}), &id).unwrap().unwrap().len(), 1);
        assert_eq!(abi_argument(&json!({"abi": "[{\"type\":\"function\"}]"}), &id).unwrap().unwrap().len(), 1);
        assert!(abi_argument(&json!({"abi": "not json"}), &id).is_err());
        assert!(abi_argument(&json!({"abi": 5}), &id).is_err());
    }
}
