//! In-memory doubles for chain readers, the bridge SDK and the checkpoint API
//!
//! Responses are configured up front; every read is counted so tests can
//! assert that a code path did (or did not) touch the chain.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

use crate::bridge::abi;
use crate::bridge::chain::ChainReader;
use crate::bridge::chain_profile::{BridgeContracts, ChainProfile, STATE_RECEIVER};
use crate::bridge::checkpoint::CheckpointApi;
use crate::bridge::errors::BridgeError;
use crate::bridge::sdk::{BridgeSdk, ExitPayloadSource, PosBridgeSdk};
use crate::bridge::types::PendingTransaction;

fn encode_uint(value: U256) -> Bytes {
    Bytes::from(ethers::abi::encode(&[Token::Uint(value)]))
}

/// Chain reader backed by maps
///
/// Unconfigured `eth_call`s return an encoded zero, the same as reading an
/// unset ERC20 mapping slot. Unknown receipts are `None`.
pub struct MockChainReader {
    chain_id: u64,
    calls: Mutex<HashMap<(Address, Vec<u8>), Bytes>>,
    native_balances: Mutex<HashMap<Address, U256>>,
    receipts: Mutex<HashMap<H256, TransactionReceipt>>,
    failing: Mutex<bool>,
    reads: AtomicUsize,
}

impl MockChainReader {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            calls: Mutex::new(HashMap::new()),
            native_balances: Mutex::new(HashMap::new()),
            receipts: Mutex::new(HashMap::new()),
            failing: Mutex::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    /// Set the raw output of `contract.call(data)`
    pub fn set_call(&self, contract: Address, data: Bytes, output: Bytes) {
        self.calls.lock().unwrap().insert((contract, data.to_vec()), output);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, value: U256) {
        self.set_call(token, abi::allowance(owner, spender), encode_uint(value));
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, value: U256) {
        self.set_call(token, abi::balance_of(owner), encode_uint(value));
    }

    pub fn set_native_balance(&self, owner: Address, value: U256) {
        self.native_balances.lock().unwrap().insert(owner, value);
    }

    /// `lastStateId()` on the child chain's state receiver
    pub fn set_last_state_id(&self, value: U256) {
        self.set_call(STATE_RECEIVER, abi::last_state_id(), encode_uint(value));
    }

    pub fn set_receipt(&self, tx_hash: H256, receipt: TransactionReceipt) {
        self.receipts.lock().unwrap().insert(tx_hash, receipt);
    }

    /// Make every subsequent read fail like an unreachable RPC node
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Number of reads attempted, failed ones included
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn begin_read(&self, stage: &str) -> Result<(), BridgeError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            return Err(BridgeError::chain_read(self.chain_id, stage, "mock rpc unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>, BridgeError> {
        self.begin_read("eth_getTransactionReceipt")?;
        Ok(self.receipts.lock().unwrap().get(&tx_hash).cloned())
    }

    async fn balance(&self, address: Address) -> Result<U256, BridgeError> {
        self.begin_read("eth_getBalance")?;
        Ok(self
            .native_balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn call(&self, contract: Address, data: Bytes) -> Result<Bytes, BridgeError> {
        self.begin_read("eth_call")?;
        log::debug!("[mock {}] call {:?} {}", self.chain_id, contract, data);
        Ok(self
            .calls
            .lock()
            .unwrap()
            .get(&(contract, data.to_vec()))
            .cloned()
            .unwrap_or_else(|| encode_uint(U256::zero())))
    }
}

/// Exit payload source returning a fixed result
pub struct StaticExitPayload {
    result: Result<Bytes, BridgeError>,
    calls: AtomicUsize,
}

impl StaticExitPayload {
    pub fn new(payload: &[u8]) -> Self {
        Self { result: Ok(Bytes::from(payload.to_vec())), calls: AtomicUsize::new(0) }
    }

    pub fn failing(error: BridgeError) -> Self {
        Self { result: Err(error), calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExitPayloadSource for StaticExitPayload {
    async fn exit_payload(&self, _burn_tx_hash: H256) -> Result<Bytes, BridgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Real PoS encoding over a static exit payload, counting every build
pub struct MockBridgeSdk {
    inner: PosBridgeSdk,
    builds: AtomicUsize,
}

impl MockBridgeSdk {
    pub const EXIT_PAYLOAD: &'static [u8] = &[0xf9, 0x02, 0x4e, 0x84];

    pub fn new(profile: ChainProfile) -> Self {
        Self::with_exit_payload(profile, Arc::new(StaticExitPayload::new(Self::EXIT_PAYLOAD)))
    }

    pub fn with_exit_payload(profile: ChainProfile, exit_payloads: Arc<dyn ExitPayloadSource>) -> Self {
        Self {
            inner: PosBridgeSdk::new(profile, exit_payloads),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.builds.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BridgeSdk for MockBridgeSdk {
    fn contracts(&self) -> BridgeContracts {
        self.inner.contracts()
    }

    fn build_approve(&self, asset: Address, amount: U256) -> Result<PendingTransaction, BridgeError> {
        self.count();
        self.inner.build_approve(asset, amount)
    }

    fn build_deposit(&self, asset: Address, amount: U256, user: Address) -> Result<PendingTransaction, BridgeError> {
        self.count();
        self.inner.build_deposit(asset, amount, user)
    }

    fn build_burn(&self, asset: Address, amount: U256) -> Result<PendingTransaction, BridgeError> {
        self.count();
        self.inner.build_burn(asset, amount)
    }

    async fn build_exit(&self, burn_tx_hash: H256, initiator: Address) -> Result<PendingTransaction, BridgeError> {
        self.count();
        self.inner.build_exit(burn_tx_hash, initiator).await
    }
}

/// Checkpoint API replaying queued replies
///
/// Replies are consumed in order; the last one keeps being returned once the
/// queue is down to a single entry.
pub struct MockCheckpointApi {
    replies: Mutex<VecDeque<Result<Option<String>, BridgeError>>>,
    requested: Mutex<Vec<(u64, u64)>>,
}

impl MockCheckpointApi {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn push_message(&self, message: &str) {
        self.replies.lock().unwrap().push_back(Ok(Some(message.to_string())));
    }

    /// 200 reply whose body carries no usable `message`
    pub fn push_missing_message(&self) {
        self.replies.lock().unwrap().push_back(Ok(None));
    }

    pub fn push_error(&self, error: BridgeError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    /// `(child_chain_id, block_number)` of every request, in order
    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.requested.lock().unwrap().clone()
    }
}

impl Default for MockCheckpointApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointApi for MockCheckpointApi {
    async fn block_included(&self, child_chain_id: u64, block_number: u64) -> Result<Option<String>, BridgeError> {
        self.requested.lock().unwrap().push((child_chain_id, block_number));
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 { replies.pop_front() } else { replies.front().cloned() };
        reply.unwrap_or_else(|| {
            Err(BridgeError::OracleUnavailable {
                chain_id: child_chain_id,
                status: None,
                reason: "no mock reply queued".to_string(),
            })
        })
    }
}
