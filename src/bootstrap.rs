//! Builds the rebalancer from configuration: one RPC-backed chain pair per
//! (root, child) network with both endpoints configured.

use std::sync::Arc;

use reqwest::Client;

use crate::bridge::chain_profile::{self, ETHEREUM_MAINNET, GOERLI, MUMBAI, POLYGON_MAINNET};
use crate::bridge::{
    BridgeError, ChainPair, HttpCheckpointApi, HttpExitPayloadApi, PosBridgeSdk, Rebalancer, RpcChainReader,
};
use crate::configure::AppConfig;

/// `(root id, root url, child id, child url)` for every configured network
pub fn configured_pairs(config: &AppConfig) -> Vec<(u64, String, u64, String)> {
    let candidates = [
        (ETHEREUM_MAINNET, &config.ethereum_rpc_url, POLYGON_MAINNET, &config.polygon_rpc_url),
        (GOERLI, &config.goerli_rpc_url, MUMBAI, &config.mumbai_rpc_url),
    ];
    candidates
        .into_iter()
        .filter_map(|(root_id, root_url, child_id, child_url)| match (root_url, child_url) {
            (Some(root_url), Some(child_url)) => Some((root_id, root_url.clone(), child_id, child_url.clone())),
            (None, None) => None,
            _ => {
                log::warn!(
                    "only one side of pair {} <-> {} has an rpc url, pair skipped",
                    root_id,
                    child_id
                );
                None
            }
        })
        .collect()
}

pub fn build_pair(
    config: &AppConfig,
    client: &Client,
    root_id: u64,
    root_url: &str,
    child_id: u64,
    child_url: &str,
) -> Result<ChainPair, BridgeError> {
    let profile = chain_profile::resolve(child_id)?;
    let root = Arc::new(RpcChainReader::from_url(root_id, root_url)?);
    let child = Arc::new(RpcChainReader::from_url(child_id, child_url)?);
    let exit_payloads = Arc::new(HttpExitPayloadApi::new(
        client.clone(),
        &config.exit_payload_api_url,
        child_id,
        profile,
    ));
    let sdk = Arc::new(PosBridgeSdk::new(profile, exit_payloads));
    let checkpoint_api = Arc::new(HttpCheckpointApi::new(client.clone(), &config.checkpoint_api_url));
    ChainPair::new(root, child, sdk, checkpoint_api)
}

pub fn build_rebalancer(config: &AppConfig, client: &Client) -> Result<Rebalancer, BridgeError> {
    let mut rebalancer = Rebalancer::new(config.exit_poll_interval());
    for (root_id, root_url, child_id, child_url) in configured_pairs(config) {
        rebalancer.add_pair(build_pair(config, client, root_id, &root_url, child_id, &child_url)?);
    }
    if rebalancer.pair_count() == 0 {
        log::warn!("no chain pair configured, every request will fail with UnsupportedChain");
    }
    Ok(rebalancer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configure::load_config_from;

    #[test]
    fn test_pairs_need_both_endpoints() {
        let mut config = load_config_from("config/does-not-exist").unwrap();
        config.ethereum_rpc_url = Some("http://localhost:8545".to_string());
        config.polygon_rpc_url = Some("http://localhost:8546".to_string());
        config.goerli_rpc_url = Some("http://localhost:8547".to_string());
        config.mumbai_rpc_url = None;

        let pairs = configured_pairs(&config);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, ETHEREUM_MAINNET);
        assert_eq!(pairs[0].2, POLYGON_MAINNET);

        let rebalancer = build_rebalancer(&config, &Client::new()).unwrap();
        assert_eq!(rebalancer.pair_count(), 1);
    }
}
