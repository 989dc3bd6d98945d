// src/blockchain/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Error types for service operations ---

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} environment variable is not set.")]
    MissingCredential(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("{service} API error: {status}")]
    Upstream { service: &'static str, status: u16 },
    #[error("Network error connecting to {service} API: {source}")]
    Network {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Unexpected format from {0}")]
    UnexpectedFormat(String),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    /// True for a JSON-RPC error raised by a reverting `eth_call`.
    pub fn is_revert(&self) -> bool {
        match self {
            ServiceError::Rpc { code, message } => {
                *code == 3 || message.to_lowercase().contains("revert")
            }
            _ => false,
        }
    }
}

// --- Balance Models ---

/// Native MON balance of an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NativeBalance {
    /// EIP-55 checksummed address
    pub address: String,
    /// Raw balance in wei, as a decimal string
    pub balance_wei: String,
    /// Balance in MON with exactly 18 decimals
    pub balance_mon: String,
}

/// A fungible position reported by the portfolio service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenBalance {
    pub name: String,
    pub symbol: String,
    /// Exact decimal amount as reported upstream
    pub balance_exact: String,
}

// --- Interaction Models ---

/// Summary of the contracts a wallet has sent transactions to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractInteractions {
    pub analysis_address: String,
    pub total_transactions_processed_by_zerion: usize,
    pub unique_interacted_address_count: usize,
    pub unique_contract_count: usize,
    pub contract_addresses: Vec<String>,
}

// --- Block Models ---

/// A validated block identifier, ready to be sent as a JSON-RPC block parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockId {
    Latest,
    Earliest,
    Pending,
    Number(u64),
}

impl BlockId {
    pub fn to_rpc_param(&self) -> String {
        match self {
            BlockId::Latest => "latest".to_string(),
            BlockId::Earliest => "earliest".to_string(),
            BlockId::Pending => "pending".to_string(),
            BlockId::Number(n) => format!("0x{:x}", n),
        }
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockId::Number(n) => write!(f, "{}", n),
            other => f.write_str(&other.to_rpc_param()),
        }
    }
}
