//! Core types for bridge transfers
//!
//! Every value here is query-scoped: built for one request, returned, dropped.

use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, H160, H256, U256};
use serde::{Deserialize, Serialize};

use crate::bridge::chain_profile::{self, Direction, Route};
use crate::bridge::errors::BridgeError;
use crate::models::serde_utils;

/// Sentinel asset id for the chain's native currency
pub const NATIVE_ASSET: Address = H160([0u8; 20]);

pub fn is_native(asset: Address) -> bool {
    asset == NATIVE_ASSET
}

/// Transfer request as received from a caller
///
/// Field names follow the rebalancer API (`assetId`, `signer`, `fromChainId`...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub asset_id: Address,
    /// Unsigned integer in decimal string form
    pub amount: String,
    #[serde(rename = "signer")]
    pub initiator: Address,
    #[serde(rename = "fromChainId")]
    pub source_chain_id: u64,
    #[serde(rename = "toChainId")]
    pub destination_chain_id: u64,
}

/// Status query for a transaction the caller already broadcast
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub tx_hash: H256,
    #[serde(rename = "signer")]
    pub initiator: Address,
    #[serde(rename = "fromChainId")]
    pub source_chain_id: u64,
    #[serde(rename = "toChainId")]
    pub destination_chain_id: u64,
    /// Child-chain block of a burn; looked up from its receipt when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

/// Transfer request whose chains and amount have been checked
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTransfer {
    pub route: Route,
    pub asset: Address,
    pub amount: U256,
    pub initiator: Address,
}

impl TransferRequest {
    /// Chain ids first (no I/O on failure), then the amount.
    pub fn validate(&self) -> Result<ValidatedTransfer, BridgeError> {
        let route = chain_profile::resolve_route(self.source_chain_id, self.destination_chain_id)?;

        let amount = U256::from_dec_str(self.amount.trim())
            .map_err(|_| BridgeError::InvalidRequest(format!("amount is not an unsigned integer: {}", self.amount)))?;
        if amount.is_zero() {
            return Err(BridgeError::InvalidRequest("amount must be greater than 0".to_string()));
        }

        Ok(ValidatedTransfer {
            route,
            asset: self.asset_id,
            amount,
            initiator: self.initiator,
        })
    }
}

impl StatusRequest {
    pub fn route(&self) -> Result<Route, BridgeError> {
        chain_profile::resolve_route(self.source_chain_id, self.destination_chain_id)
    }
}

/// Fail with `InvalidRequest` unless `route` goes the `expected` way
pub fn require_direction(route: &Route, expected: Direction) -> Result<(), BridgeError> {
    if route.direction == expected {
        return Ok(());
    }
    let (from, to) = match expected {
        Direction::Deposit => ("root", "child"),
        Direction::Withdraw => ("child", "root"),
    };
    Err(BridgeError::InvalidRequest(format!(
        "operation expects a {} -> {} transfer, got {:?} between root {} and child {}",
        from, to, route.direction, route.root_chain_id, route.child_chain_id
    )))
}

impl ValidatedTransfer {
    pub fn direction(&self) -> Direction {
        self.route.direction
    }

    pub fn require_direction(&self, expected: Direction) -> Result<(), BridgeError> {
        require_direction(&self.route, expected)
    }
}

/// Unsigned transaction for the caller to sign and broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub to: Address,
    pub data: Bytes,
    #[serde(with = "serde_utils")]
    pub value: U256,
}

impl PendingTransaction {
    pub fn call(to: Address, data: Bytes) -> Self {
        Self { to, data, value: U256::zero() }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AllowanceDecision {
    Sufficient(U256),
    /// `current` is the allowance that fell short
    ApprovalRequired { current: U256, transaction: PendingTransaction },
}

impl AllowanceDecision {
    /// Allowance as read on chain; `U256::MAX` when no approval applies
    pub fn allowance(&self) -> U256 {
        match self {
            AllowanceDecision::Sufficient(allowance) => *allowance,
            AllowanceDecision::ApprovalRequired { current, .. } => *current,
        }
    }

    pub fn transaction(&self) -> Option<&PendingTransaction> {
        match self {
            AllowanceDecision::Sufficient(_) => None,
            AllowanceDecision::ApprovalRequired { transaction, .. } => Some(transaction),
        }
    }

    pub fn needs_approval(&self) -> bool {
        matches!(self, AllowanceDecision::ApprovalRequired { .. })
    }
}

/// Deposit progress: `completed` iff the child counter caught up with the root one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositStatus {
    pub completed: bool,
    #[serde(with = "serde_utils")]
    pub child_counter: U256,
    #[serde(with = "serde_utils")]
    pub root_counter: U256,
}

impl DepositStatus {
    pub fn from_counters(child_counter: U256, root_counter: U256) -> Self {
        Self {
            completed: child_counter >= root_counter,
            child_counter,
            root_counter,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BurnStatus {
    /// Burn block not checkpointed yet, poll again later
    NotYetIncluded,
    /// Checkpointed: broadcast this exit transaction on the root chain
    Included(PendingTransaction),
    /// Oracle said something we don't understand
    Unknown(String),
}

impl BurnStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, BurnStatus::Included(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BurnStatus::NotYetIncluded => "not_yet_included",
            BurnStatus::Included(_) => "included",
            BurnStatus::Unknown(_) => "unknown",
        }
    }

    pub fn exit_transaction(&self) -> Option<&PendingTransaction> {
        match self {
            BurnStatus::Included(tx) => Some(tx),
            _ => None,
        }
    }
}

/// Delivered by the exit watcher once a burn is checkpointed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitNotification {
    pub child_chain_id: u64,
    pub burn_tx_hash: H256,
    pub block_number: u64,
    pub initiator: Address,
    pub transaction: PendingTransaction,
    pub included_at: DateTime<Utc>,
}
