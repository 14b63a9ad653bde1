//! Checkpoint-inclusion oracle
//!
//! A burn on the child chain can only be exited on the root chain once the
//! block containing it has been checkpointed. The checkpoint API answers
//! with free text; only three verdicts are derived from it.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::bridge::chain_profile::{self, ChainRole};
use crate::bridge::errors::BridgeError;
use crate::bridge::sdk::BridgeSdk;
use crate::bridge::types::BurnStatus;

pub const NOT_FOUND_MARKER: &str = "no block found";
pub const SUCCESS_MARKER: &str = "success";

/// Block-inclusion lookup for child-chain blocks
#[async_trait]
pub trait CheckpointApi: Send + Sync {
    /// `message` of a 200 reply, `None` when the body carries none.
    /// Transport errors and non-200 replies are `OracleUnavailable`.
    async fn block_included(&self, child_chain_id: u64, block_number: u64) -> Result<Option<String>, BridgeError>;
}

/// Body of `/block-included/{block}`; only `message` is interpreted
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockIncludedResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<bool>,
    #[serde(default)]
    pub header_block_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InclusionSignal {
    NotFound,
    Included,
    Unrecognized,
}

/// Case-insensitive substring match; "not found" wins over "success".
pub fn classify(message: &str) -> InclusionSignal {
    let message = message.to_lowercase();
    if message.contains(NOT_FOUND_MARKER) {
        InclusionSignal::NotFound
    } else if message.contains(SUCCESS_MARKER) {
        InclusionSignal::Included
    } else {
        InclusionSignal::Unrecognized
    }
}

fn require_child(chain_id: u64) -> Result<&'static str, BridgeError> {
    if chain_profile::chain_role(chain_id) != Some(ChainRole::Child) {
        return Err(BridgeError::unsupported_chain(chain_id, "not a supported child chain"));
    }
    Ok(chain_profile::resolve(chain_id)?.api_network())
}

/// `{base}/{matic|mumbai}/block-included/{block}`
pub struct HttpCheckpointApi {
    client: Client,
    base_url: String,
}

impl HttpCheckpointApi {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, child_chain_id: u64, block_number: u64) -> Result<String, BridgeError> {
        let network = require_child(child_chain_id)?;
        Ok(format!("{}/{}/block-included/{}", self.base_url, network, block_number))
    }
}

#[async_trait]
impl CheckpointApi for HttpCheckpointApi {
    async fn block_included(&self, child_chain_id: u64, block_number: u64) -> Result<Option<String>, BridgeError> {
        let url = self.url(child_chain_id, block_number)?;
        let unavailable = |status: Option<u16>, reason: String| BridgeError::OracleUnavailable {
            chain_id: child_chain_id,
            status,
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(None, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| unavailable(Some(status.as_u16()), e.to_string()))?;
        if status != StatusCode::OK {
            log::error!("Bad response from checkpoint API: [{}] {}", status, body);
            return Err(unavailable(Some(status.as_u16()), body));
        }

        match serde_json::from_str::<BlockIncludedResponse>(&body) {
            Ok(parsed) => {
                log::debug!("block {} on chain {}: {:?}", block_number, child_chain_id, parsed);
                Ok(parsed.message)
            }
            Err(e) => {
                log::warn!("unparseable checkpoint API body for block {}: {} ({})", block_number, body, e);
                Ok(None)
            }
        }
    }
}

/// Turns checkpoint verdicts into burn statuses, building the exit on success
pub struct CheckpointOracle {
    api: Arc<dyn CheckpointApi>,
    sdk: Arc<dyn BridgeSdk>,
}

impl CheckpointOracle {
    pub fn new(api: Arc<dyn CheckpointApi>, sdk: Arc<dyn BridgeSdk>) -> Self {
        Self { api, sdk }
    }

    /// One-shot inclusion check. No retries: a failed oracle call is
    /// returned as `OracleUnavailable` and nothing else is attempted.
    pub async fn check_burn_inclusion(
        &self,
        child_chain_id: u64,
        block_number: u64,
        burn_tx_hash: H256,
        initiator: Address,
    ) -> Result<BurnStatus, BridgeError> {
        require_child(child_chain_id)?;

        let message = self.api.block_included(child_chain_id, block_number).await?;
        let Some(message) = message else {
            log::error!("checkpoint API reply for block {} has no message, check logs and handle", block_number);
            return Ok(BurnStatus::Unknown(String::new()));
        };

        match classify(&message) {
            InclusionSignal::NotFound => {
                log::info!("block {} not checkpointed yet", block_number);
                Ok(BurnStatus::NotYetIncluded)
            }
            InclusionSignal::Included => {
                log::info!("block {} is included, generating exit tx for {:?}", block_number, burn_tx_hash);
                let exit = self.sdk.build_exit(burn_tx_hash, initiator).await?;
                Ok(BurnStatus::Included(exit))
            }
            InclusionSignal::Unrecognized => {
                log::error!("unknown checkpoint API message for block {}: {:?}", block_number, message);
                Ok(BurnStatus::Unknown(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::abi;
    use crate::bridge::chain_profile::{ChainProfile, ETHEREUM_MAINNET, MUMBAI, POLYGON_MAINNET};
    use crate::bridge::mock::{MockBridgeSdk, MockCheckpointApi, StaticExitPayload};

    const BURN: H256 = H256([0xbb; 32]);
    const ROUTER: Address = ethers::types::H160([0x66; 20]);

    fn oracle(api: Arc<MockCheckpointApi>, sdk: Arc<MockBridgeSdk>) -> CheckpointOracle {
        CheckpointOracle::new(api, sdk)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("No Block found"), InclusionSignal::NotFound);
        assert_eq!(classify("NO BLOCK FOUND for 123"), InclusionSignal::NotFound);
        assert_eq!(classify("Success"), InclusionSignal::Included);
        assert_eq!(classify("success: block included"), InclusionSignal::Included);
        assert_eq!(classify("No block found, success pending"), InclusionSignal::NotFound);
        assert_eq!(classify("Internal error"), InclusionSignal::Unrecognized);
        assert_eq!(classify(""), InclusionSignal::Unrecognized);
    }

    #[test]
    fn test_url() {
        let api = HttpCheckpointApi::new(Client::new(), "https://apis.matic.network/api/v1/");
        assert_eq!(
            api.url(POLYGON_MAINNET, 100).unwrap(),
            "https://apis.matic.network/api/v1/matic/block-included/100"
        );
        assert_eq!(
            api.url(MUMBAI, 7).unwrap(),
            "https://apis.matic.network/api/v1/mumbai/block-included/7"
        );
        assert_eq!(api.url(ETHEREUM_MAINNET, 7).unwrap_err().error_code(), "UNSUPPORTED_CHAIN");
    }

    #[test]
    fn test_response_parsing_tolerates_extra_fields() {
        let body = r#"{"headerBlockNumber":"0x1","blockNumber":"5","start":"1","end":"10","message":"success"}"#;
        let parsed: BlockIncludedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.as_deref(), Some("success"));
        assert_eq!(parsed.header_block_number.as_deref(), Some("0x1"));

        let parsed: BlockIncludedResponse = serde_json::from_str(r#"{"error":true,"message":"No Block found"}"#).unwrap();
        assert_eq!(parsed.error, Some(true));
    }

    #[tokio::test]
    async fn test_not_yet_included() {
        let api = Arc::new(MockCheckpointApi::new());
        api.push_message("No Block found");
        let sdk = Arc::new(MockBridgeSdk::new(ChainProfile::MAINNET));

        let status = oracle(api.clone(), sdk.clone())
            .check_burn_inclusion(POLYGON_MAINNET, 100, BURN, ROUTER)
            .await
            .unwrap();
        assert_eq!(status, BurnStatus::NotYetIncluded);
        assert_eq!(sdk.build_count(), 0);
        assert_eq!(api.requests(), vec![(POLYGON_MAINNET, 100)]);
    }

    #[tokio::test]
    async fn test_included_builds_exit() {
        let api = Arc::new(MockCheckpointApi::new());
        api.push_message("success");
        let sdk = Arc::new(MockBridgeSdk::new(ChainProfile::MAINNET));

        let status = oracle(api, sdk.clone())
            .check_burn_inclusion(POLYGON_MAINNET, 100, BURN, ROUTER)
            .await
            .unwrap();
        let exit = status.exit_transaction().unwrap();
        assert_eq!(exit.to, ChainProfile::MAINNET.contracts().root_chain_manager);
        assert_eq!(exit.data, abi::exit(MockBridgeSdk::EXIT_PAYLOAD));
        assert_eq!(sdk.build_count(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_and_missing_message() {
        let api = Arc::new(MockCheckpointApi::new());
        api.push_message("rate limited");
        api.push_missing_message();
        let sdk = Arc::new(MockBridgeSdk::new(ChainProfile::MAINNET));
        let oracle = oracle(api, sdk.clone());

        let first = oracle.check_burn_inclusion(POLYGON_MAINNET, 1, BURN, ROUTER).await.unwrap();
        assert_eq!(first, BurnStatus::Unknown("rate limited".to_string()));
        let second = oracle.check_burn_inclusion(POLYGON_MAINNET, 1, BURN, ROUTER).await.unwrap();
        assert!(matches!(second, BurnStatus::Unknown(_)));
        assert_eq!(sdk.build_count(), 0);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_not_retried() {
        let api = Arc::new(MockCheckpointApi::new());
        api.push_error(BridgeError::OracleUnavailable {
            chain_id: POLYGON_MAINNET,
            status: Some(502),
            reason: "bad gateway".to_string(),
        });
        let sdk = Arc::new(MockBridgeSdk::new(ChainProfile::MAINNET));

        let err = oracle(api.clone(), sdk.clone())
            .check_burn_inclusion(POLYGON_MAINNET, 100, BURN, ROUTER)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(api.call_count(), 1);
        assert_eq!(sdk.build_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_child_chain_does_no_io() {
        let api = Arc::new(MockCheckpointApi::new());
        let sdk = Arc::new(MockBridgeSdk::new(ChainProfile::MAINNET));

        for chain_id in [ETHEREUM_MAINNET, 42] {
            let err = oracle(api.clone(), sdk.clone())
                .check_burn_inclusion(chain_id, 100, BURN, ROUTER)
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), "UNSUPPORTED_CHAIN");
        }
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_exit_payload_failure_surfaces() {
        let api = Arc::new(MockCheckpointApi::new());
        api.push_message("success");
        let payloads = Arc::new(StaticExitPayload::failing(BridgeError::encoding("exit", "no payload")));
        let sdk = Arc::new(MockBridgeSdk::with_exit_payload(ChainProfile::MAINNET, payloads.clone()));

        let err = oracle(api, sdk)
            .check_burn_inclusion(POLYGON_MAINNET, 100, BURN, ROUTER)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "BRIDGE_ENCODING_FAILURE");
        assert_eq!(payloads.call_count(), 1);
    }
}
