//! Deposit-completion oracle
//!
//! A deposit is credited on the child chain once the child's `lastStateId`
//! reaches the state-sync id emitted by the root-chain deposit.

use ethers::types::{Address, H256};

use crate::bridge::abi;
use crate::bridge::chain::{read_uint, ChainReader};
use crate::bridge::errors::BridgeError;
use crate::bridge::state_sync::StateSyncExtractor;
use crate::bridge::types::DepositStatus;

pub async fn check_deposit_status(
    root: &dyn ChainReader,
    child: &dyn ChainReader,
    extractor: &dyn StateSyncExtractor,
    state_receiver: Address,
    tx_hash: H256,
) -> Result<DepositStatus, BridgeError> {
    let receipt = root
        .transaction_receipt(tx_hash)
        .await?
        .ok_or(BridgeError::TransactionNotFound { chain_id: root.chain_id(), tx_hash })?;

    let root_counter = extractor.extract(&receipt).map_err(|reason| BridgeError::MalformedReceipt {
        chain_id: root.chain_id(),
        tx_hash,
        reason,
    })?;

    let child_counter = read_uint(child, state_receiver, abi::last_state_id(), "lastStateId").await?;

    let status = DepositStatus::from_counters(child_counter, root_counter);
    log::info!(
        "deposit {:?}: root counter {}, child counter {}, completed={}",
        tx_hash,
        root_counter,
        child_counter,
        status.completed
    );
    Ok(status)
}
