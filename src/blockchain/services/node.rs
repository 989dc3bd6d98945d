// src/blockchain/services/node.rs

use ethers::types::{I256, U256};
use ethers::utils::format_units;
use ethers_core::abi::{Abi, Function, ParamType, Token};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::blockchain::client::ChainClient;
use crate::blockchain::models::{BlockId, NativeBalance, ServiceError};
use crate::blockchain::services::insight::InsightClient;
use crate::utils::{
    checksum, checksum_address, decode_quantities, json_safe, parse_address, parse_quantity,
    u256_to_json, MAX_SAFE_INTEGER,
};

const BLOCK_QUANTITY_FIELDS: &[&str] = &[
    "number",
    "gasLimit",
    "gasUsed",
    "timestamp",
    "baseFeePerGas",
    "difficulty",
    "totalDifficulty",
    "size",
    "blobGasUsed",
    "excessBlobGas",
];

const TX_QUANTITY_FIELDS: &[&str] = &[
    "blockNumber",
    "chainId",
    "gas",
    "gasPrice",
    "maxFeePerGas",
    "maxPriorityFeePerGas",
    "maxFeePerBlobGas",
    "nonce",
    "transactionIndex",
    "type",
    "v",
    "value",
    "yParity",
];

async fn balance_wei(chain: &ChainClient, address: &str) -> Result<U256, ServiceError> {
    let raw = chain.request("eth_getBalance", json!([address, "latest"])).await?;
    raw.as_str()
        .and_then(parse_quantity)
        .ok_or_else(|| ServiceError::UnexpectedFormat(format!("eth_getBalance result {}", raw)))
}

fn format_mon(wei: U256) -> Result<String, ServiceError> {
    format_units(wei, "ether")
        .map_err(|e| ServiceError::UnexpectedFormat(format!("balance conversion: {}", e)))
}

/// Native MON balance with both the raw wei amount and the 18-decimal MON amount.
pub async fn get_balance(chain: &ChainClient, address: &str) -> Result<NativeBalance, ServiceError> {
    let checksummed = checksum_address(address)?;
    let wei = balance_wei(chain, &checksummed).await?;
    Ok(NativeBalance {
        address: checksummed,
        balance_wei: wei.to_string(),
        balance_mon: format_mon(wei)?,
    })
}

/// Native balance rendered for humans, e.g. `4.157000000000000000 MON`.
pub async fn get_native_balance_text(chain: &ChainClient, address: &str) -> Result<String, ServiceError> {
    let balance = get_balance(chain, address).await?;
    let text = format!("{} MON", balance.balance_mon);
    info!("Native balance found: {}", text);
    Ok(text)
}

fn validate_tx_hash(tx_hash: &str) -> Result<(), ServiceError> {
    let valid = tx_hash.len() == 66
        && tx_hash.starts_with("0x")
        && tx_hash[2..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(ServiceError::invalid("Invalid transaction hash format."))
    }
}

pub async fn get_transaction(chain: &ChainClient, tx_hash: &str) -> Result<Value, ServiceError> {
    validate_tx_hash(tx_hash)?;
    let mut tx = chain
        .request("eth_getTransactionByHash", json!([tx_hash]))
        .await?;
    if tx.is_null() {
        return Err(ServiceError::not_found(format!("Transaction not found: {}", tx_hash)));
    }
    decode_quantities(&mut tx, TX_QUANTITY_FIELDS);
    Ok(json_safe(tx))
}

/// Accepts a non-negative integer, a decimal string, or one of `latest`, `earliest`, `pending`.
pub fn parse_block_id(identifier: &Value) -> Result<BlockId, ServiceError> {
    match identifier {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(BlockId::Number(u))
            } else if n.as_i64().is_some() {
                Err(ServiceError::invalid("Block number cannot be negative."))
            } else {
                Err(ServiceError::invalid("Invalid block identifier type."))
            }
        }
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "latest" => Ok(BlockId::Latest),
            "earliest" => Ok(BlockId::Earliest),
            "pending" => Ok(BlockId::Pending),
            other => other
                .parse::<u64>()
                .map(BlockId::Number)
                .map_err(|_| ServiceError::invalid("Invalid block identifier string.")),
        },
        _ => Err(ServiceError::invalid("Invalid block identifier type.")),
    }
}

/// Block header with transaction hashes only.
pub async fn get_block(chain: &ChainClient, identifier: &Value) -> Result<Value, ServiceError> {
    let block_id = parse_block_id(identifier)?;
    let mut block = chain
        .request("eth_getBlockByNumber", json!([block_id.to_rpc_param(), false]))
        .await?;
    if block.is_null() {
        return Err(ServiceError::not_found(format!("Block not found: {}", block_id)));
    }
    decode_quantities(&mut block, BLOCK_QUANTITY_FIELDS);
    Ok(json_safe(block))
}

pub async fn get_code(chain: &ChainClient, address: &str) -> Result<String, ServiceError> {
    let raw = chain.request("eth_getCode", json!([address, "latest"])).await?;
    raw.as_str()
        .map(str::to_string)
        .ok_or_else(|| ServiceError::UnexpectedFormat(format!("eth_getCode result {}", raw)))
}

pub async fn is_contract(chain: &ChainClient, address: &str) -> Result<bool, ServiceError> {
    let code = get_code(chain, address).await?;
    Ok(code != "0x" && code != "0x0")
}

// --- Contract reads ---

/// Calls a view function. The ABI is fetched from Insight when the caller does not supply one.
pub async fn read_contract(
    chain: &ChainClient,
    insight: &InsightClient,
    contract_address: &str,
    function_name: &str,
    args: Vec<Value>,
    abi: Option<Vec<Value>>,
) -> Result<Value, ServiceError> {
    let contract = checksum_address(contract_address)
        .map_err(|_| ServiceError::invalid(format!("Invalid contract address format: {}", contract_address)))?;

    let abi = match abi.filter(|a| !a.is_empty()) {
        Some(abi) => abi,
        None => {
            info!("ABI not provided for {}. Fetching from Insight...", contract);
            insight.get_contract_abi(&contract).await?
        }
    };
    if abi.is_empty() {
        return Err(ServiceError::invalid("Invalid or empty ABI."));
    }
    let abi: Abi = serde_json::from_value(Value::Array(abi))
        .map_err(|e| ServiceError::invalid(format!("Invalid or empty ABI: {}", e)))?;

    let function = select_function(&abi, function_name, args.len())?;
    let tokens = coerce_tokens(function, &args).map_err(|e| {
        ServiceError::invalid(format!("Invalid arguments for function '{}': {}", function_name, e))
    })?;
    let calldata = function.encode_input(&tokens).map_err(|e| {
        ServiceError::invalid(format!("Invalid arguments for function '{}': {}", function_name, e))
    })?;

    debug!("Calling contract function '{}' at {}...", function_name, contract);
    let raw = chain
        .request(
            "eth_call",
            json!([{ "to": contract, "data": format!("0x{}", hex::encode(calldata)) }, "latest"]),
        )
        .await
        .map_err(|e| {
            if e.is_revert() {
                ServiceError::invalid(format!("Contract execution reverted: {}", e))
            } else {
                e
            }
        })?;

    let output_hex = raw
        .as_str()
        .ok_or_else(|| ServiceError::UnexpectedFormat(format!("eth_call result {}", raw)))?;
    let output = hex::decode(output_hex.trim_start_matches("0x"))
        .map_err(|e| ServiceError::UnexpectedFormat(format!("eth_call result: {}", e)))?;
    let decoded = function.decode_output(&output).map_err(|e| {
        ServiceError::UnexpectedFormat(format!("output of '{}' at {}: {}", function_name, contract, e))
    })?;

    let mut values: Vec<Value> = decoded.into_iter().map(token_to_json).collect();
    Ok(match values.len() {
        0 => Value::Null,
        1 => values.remove(0),
        _ => Value::Array(values),
    })
}

fn select_function<'a>(abi: &'a Abi, name: &str, arg_count: usize) -> Result<&'a Function, ServiceError> {
    let overloads = abi
        .functions_by_name(name)
        .map_err(|_| ServiceError::invalid(format!("Function '{}' not found in ABI.", name)))?;
    overloads
        .iter()
        .find(|f| f.inputs.len() == arg_count)
        .or_else(|| overloads.first())
        .ok_or_else(|| ServiceError::invalid(format!("Function '{}' not found in ABI.", name)))
}

fn coerce_tokens(func: &Function, args: &[Value]) -> Result<Vec<Token>, String> {
    if func.inputs.len() != args.len() {
        return Err(format!(
            "arg count mismatch: expected {}, got {}",
            func.inputs.len(),
            args.len()
        ));
    }
    func.inputs
        .iter()
        .zip(args)
        .map(|(param, val)| coerce_token(&param.kind, val))
        .collect()
}

fn coerce_uint(val: &Value) -> Result<U256, String> {
    match val {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("uint arg must be a non-negative integer, got {}", n)),
        Value::String(s) if s.starts_with("0x") => {
            parse_quantity(s).ok_or_else(|| format!("invalid hex uint '{}'", s))
        }
        Value::String(s) => U256::from_dec_str(s.trim()).map_err(|_| format!("invalid uint '{}'", s)),
        other => Err(format!("uint arg must be a number or string, got {}", other)),
    }
}

/// Non-negative magnitudes above `I256::MAX` do not fit a signed word.
fn signed_from_magnitude(magnitude: U256, negative: bool) -> Option<I256> {
    if magnitude > I256::MAX.into_raw() {
        return None;
    }
    let value = I256::from_raw(magnitude);
    Some(if negative { -value } else { value })
}

fn coerce_int(val: &Value) -> Result<I256, String> {
    match val {
        Value::Number(n) => n
            .as_i64()
            .map(I256::from)
            .or_else(|| n.as_u64().map(|u| I256::from_raw(U256::from(u))))
            .ok_or_else(|| format!("int arg must be an integer, got {}", n)),
        Value::String(s) => {
            let trimmed = s.trim();
            let (negative, digits) = match trimmed.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, trimmed),
            };
            if digits.starts_with("0x") {
                parse_quantity(digits)
                    .and_then(|m| signed_from_magnitude(m, negative))
                    .ok_or_else(|| format!("invalid hex int '{}'", s))
            } else {
                I256::from_dec_str(trimmed).map_err(|_| format!("invalid int '{}'", s))
            }
        }
        other => Err(format!("int arg must be a number or string, got {}", other)),
    }
}

fn coerce_hex_bytes(val: &Value) -> Result<Vec<u8>, String> {
    let s = val.as_str().ok_or_else(|| "bytes arg must be a hex string".to_string())?;
    hex::decode(s.trim_start_matches("0x")).map_err(|e| format!("invalid hex bytes '{}': {}", s, e))
}

fn coerce_items(val: &Value, kind: &str) -> Result<Vec<Value>, String> {
    val.as_array()
        .cloned()
        .ok_or_else(|| format!("{} arg must be a JSON array", kind))
}

fn coerce_token(kind: &ParamType, val: &Value) -> Result<Token, String> {
    let token = match kind {
        ParamType::Address => {
            let s = val.as_str().ok_or_else(|| "address arg must be string".to_string())?;
            Token::Address(parse_address(s).map_err(|e| e.to_string())?)
        }
        ParamType::Uint(_) => Token::Uint(coerce_uint(val)?),
        ParamType::Int(_) => Token::Int(coerce_int(val)?.into_raw()),
        ParamType::Bool => Token::Bool(val.as_bool().ok_or_else(|| "bool arg must be boolean".to_string())?),
        ParamType::String => Token::String(
            val.as_str()
                .ok_or_else(|| "string arg must be a string".to_string())?
                .to_string(),
        ),
        ParamType::Bytes => Token::Bytes(coerce_hex_bytes(val)?),
        ParamType::FixedBytes(size) => {
            let mut bytes = coerce_hex_bytes(val)?;
            if bytes.len() > *size {
                return Err(format!("bytes{} arg is {} bytes long", size, bytes.len()));
            }
            bytes.resize(*size, 0);
            Token::FixedBytes(bytes)
        }
        ParamType::Array(inner) => Token::Array(
            coerce_items(val, "array")?
                .iter()
                .map(|v| coerce_token(inner, v))
                .collect::<Result<_, _>>()?,
        ),
        ParamType::FixedArray(inner, len) => {
            let items = coerce_items(val, "fixed array")?;
            if items.len() != *len {
                return Err(format!("fixed array expects {} items, got {}", len, items.len()));
            }
            Token::FixedArray(items.iter().map(|v| coerce_token(inner, v)).collect::<Result<_, _>>()?)
        }
        ParamType::Tuple(components) => {
            let items = coerce_items(val, "tuple")?;
            if items.len() != components.len() {
                return Err(format!("tuple expects {} items, got {}", components.len(), items.len()));
            }
            Token::Tuple(
                components
                    .iter()
                    .zip(items.iter())
                    .map(|(k, v)| coerce_token(k, v))
                    .collect::<Result<_, _>>()?,
            )
        }
    };
    Ok(token)
}

fn int_to_json(value: I256) -> Value {
    if !value.is_negative() {
        return u256_to_json(value.into_raw());
    }
    let magnitude = value.twos_complement();
    if magnitude <= U256::from(MAX_SAFE_INTEGER) {
        Value::from(-(magnitude.as_u64() as i64))
    } else {
        Value::String(value.to_string())
    }
}

/// JSON rendering of a decoded ABI value.
pub fn token_to_json(token: Token) -> Value {
    match token {
        Token::Address(a) => Value::String(checksum(&a)),
        Token::Uint(u) => u256_to_json(u),
        Token::Int(raw) => int_to_json(I256::from_raw(raw)),
        Token::Bool(b) => Value::Bool(b),
        Token::String(s) => Value::String(s),
        Token::Bytes(b) | Token::FixedBytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.into_iter().map(token_to_json).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erc20_abi() -> Abi {
        serde_json::from_value(json!([
            {"type": "function", "name": "balanceOf", "stateMutability": "view",
             "inputs": [{"name": "owner", "type": "address"}],
             "outputs": [{"name": "", "type": "uint256"}]},
            {"type": "function", "name": "balanceOf", "stateMutability": "view",
             "inputs": [{"name": "owner", "type": "address"}, {"name": "id", "type": "uint256"}],
             "outputs": [{"name": "", "type": "uint256"}]},
            {"type": "function", "name": "setFlags", "stateMutability": "nonpayable",
             "inputs": [{"name": "ids", "type": "uint8[]"}, {"name": "tag", "type": "bytes4"}, {"name": "delta", "type": "int256"}],
             "outputs": []}
        ]))
        .unwrap()
    }

    #[test]
    fn block_ids_follow_the_accepted_shapes() {
        assert_eq!(parse_block_id(&json!(12)).unwrap(), BlockId::Number(12));
        assert_eq!(parse_block_id(&json!("LATEST")).unwrap(), BlockId::Latest);
        assert_eq!(parse_block_id(&json!("pending")).unwrap(), BlockId::Pending);
        assert_eq!(parse_block_id(&json!(" 42 ")).unwrap(), BlockId::Number(42));

        let negative = parse_block_id(&json!(-1)).unwrap_err();
        assert_eq!(negative.to_string(), "Block number cannot be negative.");
        let bad_string = parse_block_id(&json!("-3")).unwrap_err();
        assert_eq!(bad_string.to_string(), "Invalid block identifier string.");
        let bad_type = parse_block_id(&json!([1])).unwrap_err();
        assert_eq!(bad_type.to_string(), "Invalid block identifier type.");
        assert!(parse_block_id(&json!(1.5)).is_err());
    }

    #[test]
    fn block_ids_render_as_rpc_params() {
        assert_eq!(BlockId::Number(255).to_rpc_param(), "0xff");
        assert_eq!(BlockId::Earliest.to_rpc_param(), "earliest");
        assert_eq!(BlockId::Number(255).to_string(), "255");
    }

    #[test]
    fn tx_hash_must_be_32_bytes_of_hex() {
        let good = format!("0x{}", "ab".repeat(32));
        assert!(validate_tx_hash(&good).is_ok());
        assert!(validate_tx_hash(&good[2..]).is_err());
        assert!(validate_tx_hash(&format!("0x{}", "zz".repeat(32))).is_err());
        assert!(validate_tx_hash("0x1234").is_err());
    }

    #[test]
    fn overloads_are_picked_by_argument_count() {
        let abi = erc20_abi();
        assert_eq!(select_function(&abi, "balanceOf", 2).unwrap().inputs.len(), 2);
        assert_eq!(select_function(&abi, "balanceOf", 1).unwrap().inputs.len(), 1);
        let err = select_function(&abi, "transfer", 2).unwrap_err();
        assert_eq!(err.to_string(), "Function 'transfer' not found in ABI.");
    }

    #[test]
    fn json_arguments_are_coerced_into_abi_tokens() {
        let abi = erc20_abi();
        let func = select_function(&abi, "setFlags", 3).unwrap();
        let tokens = coerce_tokens(func, &[json!([1, "2", "0x03"]), json!("0xdeadbeef"), json!("-7")]).unwrap();
        assert_eq!(
            tokens[0],
            Token::Array(vec![
                Token::Uint(U256::from(1)),
                Token::Uint(U256::from(2)),
                Token::Uint(U256::from(3))
            ])
        );
        assert_eq!(tokens[1], Token::FixedBytes(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(tokens[2], Token::Int(I256::from(-7i64).into_raw()));

        let err = coerce_tokens(func, &[json!([1])]).unwrap_err();
        assert!(err.contains("arg count mismatch"));
        let err = coerce_tokens(func, &[json!("nope"), json!("0x00"), json!(1)]).unwrap_err();
        assert!(err.contains("JSON array"));
    }

    #[test]
    fn signed_arguments_accept_hex_and_wide_numbers() {
        assert_eq!(coerce_int(&json!("0x10")).unwrap(), I256::from(16i64));
        assert_eq!(coerce_int(&json!("-0x10")).unwrap(), I256::from(-16i64));
        assert_eq!(coerce_int(&json!(u64::MAX)).unwrap(), I256::from_raw(U256::from(u64::MAX)));
        assert_eq!(coerce_int(&json!("-12")).unwrap(), I256::from(-12i64));
        let too_wide = format!("0x8{}", "0".repeat(63));
        assert!(coerce_int(&json!(too_wide)).is_err());
        assert!(coerce_int(&json!("0xzz")).is_err());

        let abi: Abi = serde_json::from_value(json!([
            {"type": "function", "name": "f", "stateMutability": "view",
             "inputs": [{"name": "x", "type": "int256"}], "outputs": []}
        ]))
        .unwrap();
        let func = select_function(&abi, "f", 1).unwrap();
        let tokens = coerce_tokens(func, &[json!("0x10")]).unwrap();
        assert_eq!(tokens, vec![Token::Int(U256::from(16))]);
    }

    #[test]
    fn decoded_values_are_json_safe() {
        assert_eq!(token_to_json(Token::Uint(U256::from(5))), json!(5));
        assert_eq!(
            token_to_json(Token::Uint(U256::exp10(18))),
            json!("1000000000000000000")
        );
        assert_eq!(token_to_json(Token::Int(I256::from(-9i64).into_raw())), json!(-9));
        assert_eq!(token_to_json(Token::Bytes(vec![0x01, 0xff])), json!("0x01ff"));
        let owner = parse_address("0xd8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap();
        assert_eq!(
            token_to_json(Token::Tuple(vec![Token::Address(owner), Token::Bool(true)])),
            json!(["0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045", true])
        );
    }
}
