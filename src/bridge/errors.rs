//! Error taxonomy for bridge operations
//!
//! Every variant carries enough context (chain id, tx hash, stage) for a caller
//! to tell "not yet ready" apart from "will never succeed".

use std::fmt;

use ethers::types::{H256, U256};

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    // Input errors (permanent)
    UnsupportedChain { chain_id: u64, reason: String },
    InvalidRequest(String),

    // Business outcomes
    InsufficientFunds { chain_id: u64, asset: String, balance: U256, required: U256 },
    /// Informational: drives the approval flow instead of failing a request
    InsufficientAllowance { allowance: U256, required: U256 },

    // Chain evidence
    TransactionNotFound { chain_id: u64, tx_hash: H256 },
    MalformedReceipt { chain_id: u64, tx_hash: H256, reason: String },
    ChainReadFailure { chain_id: u64, stage: String, reason: String },

    // Collaborators
    BridgeEncodingFailure { stage: String, reason: String },
    OracleUnavailable { chain_id: u64, status: Option<u16>, reason: String },
    DeliveryFailure { destination: String, reason: String },
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedChain { chain_id, reason } => {
                write!(f, "Unsupported chain {}: {}", chain_id, reason)
            }
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::InsufficientFunds { chain_id, asset, balance, required } => write!(
                f,
                "Insufficient funds on chain {}: have {}, need {} of {}",
                chain_id, balance, required, asset
            ),
            Self::InsufficientAllowance { allowance, required } => {
                write!(f, "Insufficient allowance: have {}, need {}", allowance, required)
            }
            Self::TransactionNotFound { chain_id, tx_hash } => {
                write!(f, "Transaction {:?} not found on chain {}", tx_hash, chain_id)
            }
            Self::MalformedReceipt { chain_id, tx_hash, reason } => write!(
                f,
                "Malformed receipt for {:?} on chain {}: {}",
                tx_hash, chain_id, reason
            ),
            Self::ChainReadFailure { chain_id, stage, reason } => {
                write!(f, "Chain {} read failed during {}: {}", chain_id, stage, reason)
            }
            Self::BridgeEncodingFailure { stage, reason } => {
                write!(f, "Bridge encoding failed for {}: {}", stage, reason)
            }
            Self::OracleUnavailable { chain_id, status, reason } => match status {
                Some(code) => write!(
                    f,
                    "Checkpoint oracle for chain {} unavailable [{}]: {}",
                    chain_id, code, reason
                ),
                None => write!(f, "Checkpoint oracle for chain {} unavailable: {}", chain_id, reason),
            },
            Self::DeliveryFailure { destination, reason } => {
                write!(f, "Delivery to {} failed: {}", destination, reason)
            }
        }
    }
}

impl std::error::Error for BridgeError {}

impl BridgeError {
    pub fn unsupported_chain(chain_id: u64, reason: impl Into<String>) -> Self {
        Self::UnsupportedChain { chain_id, reason: reason.into() }
    }

    pub fn chain_read(chain_id: u64, stage: impl Into<String>, reason: impl ToString) -> Self {
        Self::ChainReadFailure {
            chain_id,
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }

    pub fn encoding(stage: impl Into<String>, reason: impl ToString) -> Self {
        Self::BridgeEncodingFailure {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }

    /// Replace the stage of a chain read failure; other variants pass through.
    pub fn at_stage(self, stage: &str) -> Self {
        match self {
            Self::ChainReadFailure { chain_id, reason, .. } => Self::ChainReadFailure {
                chain_id,
                stage: stage.to_string(),
                reason,
            },
            other => other,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedChain { .. } => "UNSUPPORTED_CHAIN",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
            Self::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            Self::MalformedReceipt { .. } => "MALFORMED_RECEIPT",
            Self::ChainReadFailure { .. } => "CHAIN_READ_FAILURE",
            Self::BridgeEncodingFailure { .. } => "BRIDGE_ENCODING_FAILURE",
            Self::OracleUnavailable { .. } => "ORACLE_UNAVAILABLE",
            Self::DeliveryFailure { .. } => "DELIVERY_FAILURE",
        }
    }

    /// Safe to retry with the identical input
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChainReadFailure { .. }
                | Self::OracleUnavailable { .. }
                | Self::DeliveryFailure { .. }
        )
    }

    /// Will fail the same way for the same input
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedChain { .. } | Self::InvalidRequest(_) | Self::MalformedReceipt { .. }
        )
    }
}
