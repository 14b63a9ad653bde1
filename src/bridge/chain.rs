//! Read-only chain access
//!
//! The bridge core only ever reads: receipts, balances and `eth_call`s.
//! Handles are built once per chain and shared across requests.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256};

use crate::bridge::abi;
use crate::bridge::errors::BridgeError;

/// Read-only RPC handle for one chain
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn chain_id(&self) -> u64;

    /// `None` when the transaction is unknown or not yet mined
    async fn transaction_receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>, BridgeError>;

    /// Native balance at the latest block
    async fn balance(&self, address: Address) -> Result<U256, BridgeError>;

    /// `eth_call` at the latest block
    async fn call(&self, contract: Address, data: Bytes) -> Result<Bytes, BridgeError>;
}

/// `eth_call` a view returning one `uint256`
pub async fn read_uint(
    reader: &dyn ChainReader,
    contract: Address,
    data: Bytes,
    stage: &str,
) -> Result<U256, BridgeError> {
    let output = reader
        .call(contract, data)
        .await
        .map_err(|e| e.at_stage(stage))?;
    abi::decode_uint(&output).map_err(|reason| BridgeError::ChainReadFailure {
        chain_id: reader.chain_id(),
        stage: stage.to_string(),
        reason,
    })
}

/// ChainReader over an ethers middleware
pub struct RpcChainReader<M> {
    chain_id: u64,
    provider: Arc<M>,
}

impl RpcChainReader<Provider<Http>> {
    pub fn from_url(chain_id: u64, url: &str) -> Result<Self, BridgeError> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| BridgeError::chain_read(chain_id, "connect", e))?;
        Ok(Self::new(chain_id, Arc::new(provider)))
    }
}

impl<M> RpcChainReader<M> {
    pub fn new(chain_id: u64, provider: Arc<M>) -> Self {
        Self { chain_id, provider }
    }
}

#[async_trait]
impl<M> ChainReader for RpcChainReader<M>
where
    M: Middleware + 'static,
{
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>, BridgeError> {
        self.provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| BridgeError::chain_read(self.chain_id, "eth_getTransactionReceipt", e))
    }

    async fn balance(&self, address: Address) -> Result<U256, BridgeError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| BridgeError::chain_read(self.chain_id, "eth_getBalance", e))
    }

    async fn call(&self, contract: Address, data: Bytes) -> Result<Bytes, BridgeError> {
        let tx: TypedTransaction = TransactionRequest::new().to(contract).data(data).into();
        self.provider
            .call(&tx, None)
            .await
            .map_err(|e| BridgeError::chain_read(self.chain_id, "eth_call", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::Token;
    use ethers::providers::MockProvider;

    fn mocked(chain_id: u64) -> (RpcChainReader<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        (RpcChainReader::new(chain_id, Arc::new(provider)), mock)
    }

    #[tokio::test]
    async fn test_balance() {
        let (reader, mock) = mocked(137);
        mock.push::<U256, _>(U256::from(12345)).unwrap();

        let balance = reader.balance(Address::repeat_byte(1)).await.unwrap();
        assert_eq!(balance, U256::from(12345));
    }

    #[tokio::test]
    async fn test_missing_receipt_is_none() {
        let (reader, mock) = mocked(1);
        mock.push::<Option<TransactionReceipt>, _>(None).unwrap();

        let receipt = reader.transaction_receipt(H256::repeat_byte(9)).await.unwrap();
        assert!(receipt.is_none());
    }

    #[tokio::test]
    async fn test_read_uint_decodes_call_output() {
        let (reader, mock) = mocked(137);
        let output = Bytes::from(ethers::abi::encode(&[Token::Uint(U256::from(77))]));
        mock.push::<Bytes, _>(output).unwrap();

        let value = read_uint(&reader, Address::repeat_byte(2), abi::last_state_id(), "lastStateId")
            .await
            .unwrap();
        assert_eq!(value, U256::from(77));
    }

    #[tokio::test]
    async fn test_rpc_error_becomes_chain_read_failure() {
        // No queued response: the mock transport errors out
        let (reader, _mock) = mocked(5);

        let err = read_uint(&reader, Address::repeat_byte(2), abi::last_state_id(), "lastStateId")
            .await
            .unwrap_err();
        match err {
            BridgeError::ChainReadFailure { chain_id, stage, .. } => {
                assert_eq!(chain_id, 5);
                assert_eq!(stage, "lastStateId");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(BridgeError::chain_read(5, "x", "y").is_retryable());
    }

    #[tokio::test]
    async fn test_undecodable_output_is_chain_read_failure() {
        let (reader, mock) = mocked(137);
        mock.push::<Bytes, _>(Bytes::from(vec![1u8, 2, 3])).unwrap();

        let err = read_uint(&reader, Address::repeat_byte(2), abi::balance_of(Address::zero()), "balanceOf")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CHAIN_READ_FAILURE");
    }
}
