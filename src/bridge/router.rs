//! Rebalancer facade
//!
//! Validates requests, picks the chain pair they address and runs the
//! matching component. Pairs are built once at start-up; every request after
//! that is stateless.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{H256, U256};

use crate::bridge::allowance;
use crate::bridge::chain::ChainReader;
use crate::bridge::chain_profile::{self, Direction, Route};
use crate::bridge::checkpoint::{CheckpointApi, CheckpointOracle};
use crate::bridge::deposit_status;
use crate::bridge::errors::BridgeError;
use crate::bridge::exit_watcher::{ExitSink, ExitWatch, ExitWatchHandle, ExitWatcher, DEFAULT_POLL_INTERVAL};
use crate::bridge::initiator;
use crate::bridge::sdk::BridgeSdk;
use crate::bridge::state_sync::{FixedPositionExtractor, StateSyncExtractor};
use crate::bridge::types::{
    require_direction, AllowanceDecision, BurnStatus, DepositStatus, PendingTransaction, StatusRequest,
    TransferRequest, ValidatedTransfer,
};

/// Read handles and builders for one (root, child) pair
pub struct ChainPair {
    pub route: Route,
    pub root: Arc<dyn ChainReader>,
    pub child: Arc<dyn ChainReader>,
    pub sdk: Arc<dyn BridgeSdk>,
    pub extractor: Arc<dyn StateSyncExtractor>,
    pub oracle: Arc<CheckpointOracle>,
}

impl ChainPair {
    /// Fails with `UnsupportedChain` unless the readers form a root/child
    /// pair of the same network.
    pub fn new(
        root: Arc<dyn ChainReader>,
        child: Arc<dyn ChainReader>,
        sdk: Arc<dyn BridgeSdk>,
        checkpoint_api: Arc<dyn CheckpointApi>,
    ) -> Result<Self, BridgeError> {
        let route = chain_profile::resolve_route(root.chain_id(), child.chain_id())?;
        if route.direction != Direction::Deposit {
            return Err(BridgeError::unsupported_chain(root.chain_id(), "root reader is not on a root chain"));
        }
        let oracle = Arc::new(CheckpointOracle::new(checkpoint_api, sdk.clone()));
        Ok(Self {
            route,
            root,
            child,
            sdk,
            extractor: Arc::new(FixedPositionExtractor::default()),
            oracle,
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn StateSyncExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    fn key(&self) -> (u64, u64) {
        (self.route.root_chain_id, self.route.child_chain_id)
    }
}

pub struct Rebalancer {
    pairs: HashMap<(u64, u64), ChainPair>,
    poll_interval: Duration,
}

impl Default for Rebalancer {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Rebalancer {
    pub fn new(poll_interval: Duration) -> Self {
        Self { pairs: HashMap::new(), poll_interval }
    }

    pub fn add_pair(&mut self, pair: ChainPair) {
        log::info!(
            "registered pair root={} child={} ({}/{})",
            pair.route.root_chain_id,
            pair.route.child_chain_id,
            pair.route.profile.network,
            pair.route.profile.version
        );
        self.pairs.insert(pair.key(), pair);
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    fn pair(&self, route: &Route) -> Result<&ChainPair, BridgeError> {
        self.pairs
            .get(&(route.root_chain_id, route.child_chain_id))
            .ok_or_else(|| {
                BridgeError::unsupported_chain(
                    route.child_chain_id,
                    format!("no readers configured for root {}", route.root_chain_id),
                )
            })
    }

    /// Approval check for a deposit. Burns need no approval, so withdraw
    /// requests are answered without any chain read.
    pub async fn prepare_approval(&self, request: &TransferRequest) -> Result<AllowanceDecision, BridgeError> {
        let transfer = request.validate()?;
        self.approval(&transfer).await
    }

    /// Same as `prepare_approval`, rejecting requests that go the other way.
    pub async fn prepare_approval_for(
        &self,
        request: &TransferRequest,
        expected: Direction,
    ) -> Result<AllowanceDecision, BridgeError> {
        let transfer = request.validate()?;
        transfer.require_direction(expected)?;
        self.approval(&transfer).await
    }

    async fn approval(&self, transfer: &ValidatedTransfer) -> Result<AllowanceDecision, BridgeError> {
        if transfer.direction() == Direction::Withdraw {
            return Ok(AllowanceDecision::Sufficient(U256::MAX));
        }
        let pair = self.pair(&transfer.route)?;
        allowance::check_and_prepare_approval(
            pair.root.as_ref(),
            pair.sdk.as_ref(),
            transfer.asset,
            transfer.amount,
            transfer.initiator,
        )
        .await
    }

    pub async fn prepare_deposit(&self, request: &TransferRequest) -> Result<PendingTransaction, BridgeError> {
        let transfer = request.validate()?;
        transfer.require_direction(Direction::Deposit)?;
        let pair = self.pair(&transfer.route)?;
        initiator::initiate_deposit(pair.sdk.as_ref(), transfer.asset, transfer.amount, transfer.initiator)
    }

    pub async fn prepare_burn(&self, request: &TransferRequest) -> Result<PendingTransaction, BridgeError> {
        let transfer = request.validate()?;
        transfer.require_direction(Direction::Withdraw)?;
        let pair = self.pair(&transfer.route)?;
        initiator::initiate_burn(
            pair.child.as_ref(),
            pair.sdk.as_ref(),
            transfer.asset,
            transfer.amount,
            transfer.initiator,
        )
        .await
    }

    pub async fn get_deposit_status(&self, request: &StatusRequest) -> Result<DepositStatus, BridgeError> {
        let route = request.route()?;
        require_direction(&route, Direction::Deposit)?;
        let pair = self.pair(&route)?;
        deposit_status::check_deposit_status(
            pair.root.as_ref(),
            pair.child.as_ref(),
            pair.extractor.as_ref(),
            pair.sdk.contracts().state_receiver,
            request.tx_hash,
        )
        .await
    }

    pub async fn get_burn_status(&self, request: &StatusRequest) -> Result<BurnStatus, BridgeError> {
        let route = request.route()?;
        require_direction(&route, Direction::Withdraw)?;
        let pair = self.pair(&route)?;
        let block_number = resolve_burn_block(pair, request).await?;
        pair.oracle
            .check_burn_inclusion(route.child_chain_id, block_number, request.tx_hash, request.initiator)
            .await
    }

    /// Start a long-poll for the exit of a burn. The watch stops when the
    /// returned handle is cancelled or dropped.
    pub async fn watch_exit(
        &self,
        request: &StatusRequest,
        sink: Arc<dyn ExitSink>,
    ) -> Result<ExitWatchHandle, BridgeError> {
        let route = request.route()?;
        require_direction(&route, Direction::Withdraw)?;
        let pair = self.pair(&route)?;
        let block_number = resolve_burn_block(pair, request).await?;
        let watcher = ExitWatcher::new(pair.oracle.clone(), self.poll_interval);
        Ok(watcher.spawn(
            ExitWatch {
                child_chain_id: route.child_chain_id,
                block_number,
                burn_tx_hash: request.tx_hash,
                initiator: request.initiator,
            },
            sink,
        ))
    }
}

async fn resolve_burn_block(pair: &ChainPair, request: &StatusRequest) -> Result<u64, BridgeError> {
    match request.block_number {
        Some(block_number) => Ok(block_number),
        None => burn_block(pair.child.as_ref(), request.tx_hash).await,
    }
}

/// Block number of a mined child-chain transaction
pub async fn burn_block(child: &dyn ChainReader, tx_hash: H256) -> Result<u64, BridgeError> {
    let receipt = child
        .transaction_receipt(tx_hash)
        .await?
        .ok_or(BridgeError::TransactionNotFound { chain_id: child.chain_id(), tx_hash })?;
    receipt
        .block_number
        .map(|block| block.as_u64())
        .ok_or_else(|| BridgeError::MalformedReceipt {
            chain_id: child.chain_id(),
            tx_hash,
            reason: "receipt has no block number".to_string(),
        })
}
