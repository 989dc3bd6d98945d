//! Utility functions for the Monad MCP server

use std::str::FromStr;

use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use serde::de::DeserializeOwned;
use serde_json::{from_value, Map, Value};

use crate::blockchain::models::ServiceError;
use crate::mcp::protocol::{error_codes, Response};

/// Largest integer a JSON consumer can hold without losing precision is 2^53.
pub const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// Helper function to extract a required argument from a JSON object
pub fn get_required_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<T, Response> {
    from_value(args.get(key).cloned().unwrap_or(Value::Null)).map_err(|_| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Missing or invalid required argument: '{}'", key),
        )
    })
}

/// Like [`get_required_arg`], but absent or `null` yields `None`.
pub fn get_optional_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<Option<T>, Response> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_required_arg(args, key, req_id).map(Some),
    }
}

/// Recursively replaces unsigned integers above 2^53 with their decimal string.
pub fn json_safe(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(u) if u > MAX_SAFE_INTEGER => Value::String(u.to_string()),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(json_safe).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, json_safe(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// JSON form of a 256-bit unsigned integer: a number when it fits in 2^53, a decimal string otherwise.
pub fn u256_to_json(n: U256) -> Value {
    if n <= U256::from(MAX_SAFE_INTEGER) {
        Value::from(n.as_u64())
    } else {
        Value::String(n.to_string())
    }
}

/// Decodes a `0x`-prefixed hex quantity. Returns `None` when it is not valid hex.
pub fn parse_quantity(hex_str: &str) -> Option<U256> {
    let digits = hex_str.strip_prefix("0x").or_else(|| hex_str.strip_prefix("0X"))?;
    if digits.is_empty() {
        return Some(U256::zero());
    }
    U256::from_str_radix(digits, 16).ok()
}

/// Decodes a hex quantity into its JSON-safe form; anything unparsable is returned unchanged.
pub fn quantity_to_json(hex_str: &str) -> Value {
    match parse_quantity(hex_str) {
        Some(n) => u256_to_json(n),
        None => Value::String(hex_str.to_string()),
    }
}

/// Decodes the named hex-quantity fields of a JSON-RPC object in place.
pub fn decode_quantities(value: &mut Value, fields: &[&str]) {
    if let Value::Object(map) = value {
        for field in fields {
            if let Some(Value::String(s)) = map.get(*field) {
                let decoded = quantity_to_json(s);
                map.insert((*field).to_string(), decoded);
            }
        }
    }
}

/// Parses a 20-byte hex address (optional `0x` prefix).
pub fn parse_address(input: &str) -> Result<Address, ServiceError> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ServiceError::invalid(format!("Invalid address format: {}", input)));
    }
    Address::from_str(digits).map_err(|_| ServiceError::invalid(format!("Invalid address format: {}", input)))
}

/// EIP-55 checksummed form of an address.
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

/// Validates and checksums an address string in one step.
pub fn checksum_address(input: &str) -> Result<String, ServiceError> {
    parse_address(input).map(|a| checksum(&a))
}
