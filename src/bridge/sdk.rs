//! Bridge transaction builders
//!
//! Produces unsigned `{to, data, value}` descriptors for approve, deposit,
//! burn and exit. The exit payload (burn receipt proof) is fetched from the
//! bridge's proof-generation API rather than built here.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::bridge::abi;
use crate::bridge::chain_profile::{BridgeContracts, ChainProfile};
use crate::bridge::errors::BridgeError;
use crate::bridge::types::{is_native, PendingTransaction};

/// Transaction construction for one chain pair
#[async_trait]
pub trait BridgeSdk: Send + Sync {
    fn contracts(&self) -> BridgeContracts;

    /// ERC20 approval of the bridge predicate on the root chain
    fn build_approve(&self, asset: Address, amount: U256) -> Result<PendingTransaction, BridgeError>;

    /// Root-chain deposit crediting `user` on the child chain
    fn build_deposit(&self, asset: Address, amount: U256, user: Address) -> Result<PendingTransaction, BridgeError>;

    /// Child-chain burn, first half of a withdrawal
    fn build_burn(&self, asset: Address, amount: U256) -> Result<PendingTransaction, BridgeError>;

    /// Root-chain exit for a checkpointed burn
    async fn build_exit(&self, burn_tx_hash: H256, initiator: Address) -> Result<PendingTransaction, BridgeError>;
}

/// Source of exit payloads (RLP-encoded burn proofs)
#[async_trait]
pub trait ExitPayloadSource: Send + Sync {
    async fn exit_payload(&self, burn_tx_hash: H256) -> Result<Bytes, BridgeError>;
}

/// Polygon PoS bridge: RootChainManager / ERC20 predicate / child token `withdraw`
pub struct PosBridgeSdk {
    contracts: BridgeContracts,
    exit_payloads: Arc<dyn ExitPayloadSource>,
}

impl PosBridgeSdk {
    pub fn new(profile: ChainProfile, exit_payloads: Arc<dyn ExitPayloadSource>) -> Self {
        Self {
            contracts: profile.contracts(),
            exit_payloads,
        }
    }
}

#[async_trait]
impl BridgeSdk for PosBridgeSdk {
    fn contracts(&self) -> BridgeContracts {
        self.contracts
    }

    fn build_approve(&self, asset: Address, amount: U256) -> Result<PendingTransaction, BridgeError> {
        if is_native(asset) {
            return Err(BridgeError::encoding("approve", "native asset cannot be approved"));
        }
        Ok(PendingTransaction::call(
            asset,
            abi::approve(self.contracts.erc20_predicate, amount),
        ))
    }

    fn build_deposit(&self, asset: Address, amount: U256, user: Address) -> Result<PendingTransaction, BridgeError> {
        if user.is_zero() {
            return Err(BridgeError::encoding("deposit", "deposit recipient is the zero address"));
        }
        let manager = self.contracts.root_chain_manager;
        if is_native(asset) {
            return Ok(PendingTransaction::call(manager, abi::deposit_ether_for(user)).with_value(amount));
        }
        Ok(PendingTransaction::call(manager, abi::deposit_for(user, asset, amount)))
    }

    fn build_burn(&self, asset: Address, amount: U256) -> Result<PendingTransaction, BridgeError> {
        if is_native(asset) {
            return Err(BridgeError::encoding(
                "burn",
                "native asset has no PoS burn mapping on this network",
            ));
        }
        Ok(PendingTransaction::call(asset, abi::withdraw(amount)))
    }

    async fn build_exit(&self, burn_tx_hash: H256, initiator: Address) -> Result<PendingTransaction, BridgeError> {
        let payload = self.exit_payloads.exit_payload(burn_tx_hash).await?;
        if payload.is_empty() {
            return Err(BridgeError::encoding("exit", format!("empty exit payload for {:?}", burn_tx_hash)));
        }
        log::debug!(
            "exit payload for {:?} ({} bytes), initiator={:?}",
            burn_tx_hash,
            payload.len(),
            initiator
        );
        Ok(PendingTransaction::call(self.contracts.root_chain_manager, abi::exit(&payload)))
    }
}

#[derive(Debug, Deserialize)]
struct ExitPayloadResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<String>,
}

/// Proof-generation API: `{base}/{matic|mumbai}/exit-payload/{burnTx}?eventSignature=...`
pub struct HttpExitPayloadApi {
    client: Client,
    base_url: String,
    child_chain_id: u64,
    api_network: &'static str,
    event_signature: H256,
}

impl HttpExitPayloadApi {
    pub fn new(client: Client, base_url: &str, child_chain_id: u64, profile: ChainProfile) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            child_chain_id,
            api_network: profile.api_network(),
            event_signature: abi::event_topic(abi::TRANSFER_EVENT),
        }
    }

    pub fn url(&self, burn_tx_hash: H256) -> String {
        format!(
            "{}/{}/exit-payload/{:?}?eventSignature={:?}",
            self.base_url, self.api_network, burn_tx_hash, self.event_signature
        )
    }

    fn unavailable(&self, status: Option<u16>, reason: impl ToString) -> BridgeError {
        BridgeError::OracleUnavailable {
            chain_id: self.child_chain_id,
            status,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ExitPayloadSource for HttpExitPayloadApi {
    async fn exit_payload(&self, burn_tx_hash: H256) -> Result<Bytes, BridgeError> {
        let url = self.url(burn_tx_hash);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unavailable(None, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            log::error!("Bad response from proof API: [{}] {}", status, body);
            return Err(self.unavailable(Some(status.as_u16()), format!("proof API: {}", body)));
        }

        let body: ExitPayloadResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::encoding("exit", format!("unreadable proof API response: {}", e)))?;

        // the proof API can trail the checkpoint API, so no payload yet is transient
        let hex_payload = body.result.ok_or_else(|| {
            self.unavailable(
                Some(status.as_u16()),
                format!("proof API returned no payload: {}", body.message.unwrap_or_default()),
            )
        })?;
        hex_payload
            .parse::<Bytes>()
            .map_err(|e| BridgeError::encoding("exit", format!("invalid payload hex: {}", e)))
    }
}
