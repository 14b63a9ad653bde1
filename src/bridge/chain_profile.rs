//! Chain profile resolver
//!
//! Maps chain identifiers to the bridge network/version profile. The set of
//! supported chains is closed; everything else fails with `UnsupportedChain`
//! before any network I/O happens.

use ethers::types::{Address, H160};
use serde::Serialize;

use crate::bridge::errors::BridgeError;

pub const ETHEREUM_MAINNET: u64 = 1;
pub const GOERLI: u64 = 5;
pub const POLYGON_MAINNET: u64 = 137;
pub const MUMBAI: u64 = 80001;

pub const ROOT_CHAINS: [u64; 2] = [ETHEREUM_MAINNET, GOERLI];
pub const CHILD_CHAINS: [u64; 2] = [POLYGON_MAINNET, MUMBAI];

pub const MAINNET_ROOT_CHAIN_MANAGER: Address = H160([0xa0, 0xc6, 0x8c, 0x63, 0x82, 0x35, 0xee, 0x32, 0x65, 0x7e, 0x8f, 0x72, 0x0a, 0x23, 0xce, 0xc1, 0xbf, 0xc7, 0x7c, 0x77]);
pub const MAINNET_ERC20_PREDICATE: Address = H160([0x40, 0xec, 0x5b, 0x33, 0xf5, 0x4e, 0x0e, 0x8a, 0x33, 0xa9, 0x75, 0x90, 0x8c, 0x5b, 0xa1, 0xc1, 0x4e, 0x5b, 0xbb, 0xdf]);
pub const TESTNET_ROOT_CHAIN_MANAGER: Address = H160([0xbb, 0xd7, 0xcb, 0xfa, 0x79, 0xfa, 0xee, 0x89, 0x9e, 0xaf, 0x90, 0x0f, 0x13, 0xc9, 0x06, 0x5b, 0xf0, 0x3b, 0x1a, 0x74]);
pub const TESTNET_ERC20_PREDICATE: Address = H160([0xdd, 0x65, 0x96, 0xf2, 0x02, 0x9e, 0x62, 0x33, 0xde, 0xff, 0xac, 0xa3, 0x16, 0xe6, 0xa9, 0x52, 0x17, 0xd4, 0xdb, 0x34]);
/// Child-chain system contract tracking the last processed state-sync id
pub const STATE_RECEIVER: Address = H160([0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x01]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainRole {
    Root,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// root -> child
    Deposit,
    /// child -> root (burn, then exit)
    Withdraw,
}

/// Network/version pair understood by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChainProfile {
    pub network: &'static str,
    pub version: &'static str,
}

impl ChainProfile {
    pub const MAINNET: ChainProfile = ChainProfile { network: "mainnet", version: "v1" };
    pub const TESTNET: ChainProfile = ChainProfile { network: "testnet", version: "mumbai" };

    pub fn is_mainnet(&self) -> bool {
        *self == Self::MAINNET
    }

    pub fn contracts(&self) -> BridgeContracts {
        if self.is_mainnet() {
            BridgeContracts {
                root_chain_manager: MAINNET_ROOT_CHAIN_MANAGER,
                erc20_predicate: MAINNET_ERC20_PREDICATE,
                state_receiver: STATE_RECEIVER,
            }
        } else {
            BridgeContracts {
                root_chain_manager: TESTNET_ROOT_CHAIN_MANAGER,
                erc20_predicate: TESTNET_ERC20_PREDICATE,
                state_receiver: STATE_RECEIVER,
            }
        }
    }

    /// Path segment used by the checkpoint and proof-generation APIs
    pub fn api_network(&self) -> &'static str {
        if self.is_mainnet() {
            "matic"
        } else {
            "mumbai"
        }
    }
}

/// Bridge contract addresses for one network profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeContracts {
    pub root_chain_manager: Address,
    pub erc20_predicate: Address,
    pub state_receiver: Address,
}

/// A validated (source, destination) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    pub direction: Direction,
    pub root_chain_id: u64,
    pub child_chain_id: u64,
    pub profile: ChainProfile,
}

pub fn chain_role(chain_id: u64) -> Option<ChainRole> {
    if ROOT_CHAINS.contains(&chain_id) {
        Some(ChainRole::Root)
    } else if CHILD_CHAINS.contains(&chain_id) {
        Some(ChainRole::Child)
    } else {
        None
    }
}

pub fn resolve(chain_id: u64) -> Result<ChainProfile, BridgeError> {
    match chain_id {
        ETHEREUM_MAINNET | POLYGON_MAINNET => Ok(ChainProfile::MAINNET),
        GOERLI | MUMBAI => Ok(ChainProfile::TESTNET),
        _ => Err(BridgeError::unsupported_chain(chain_id, "not a supported root or child chain")),
    }
}

/// Resolve the route of a transfer from its source and destination chains
pub fn resolve_route(source_chain_id: u64, destination_chain_id: u64) -> Result<Route, BridgeError> {
    let source_profile = resolve(source_chain_id)?;
    let destination_profile = resolve(destination_chain_id)?;

    let (direction, root_chain_id, child_chain_id) =
        match (chain_role(source_chain_id), chain_role(destination_chain_id)) {
            (Some(ChainRole::Root), Some(ChainRole::Child)) => {
                (Direction::Deposit, source_chain_id, destination_chain_id)
            }
            (Some(ChainRole::Child), Some(ChainRole::Root)) => {
                (Direction::Withdraw, destination_chain_id, source_chain_id)
            }
            _ => {
                return Err(BridgeError::unsupported_chain(
                    destination_chain_id,
                    format!("no bridge route from {} to {}", source_chain_id, destination_chain_id),
                ))
            }
        };

    if source_profile != destination_profile {
        return Err(BridgeError::unsupported_chain(
            child_chain_id,
            format!("chain {} is not on the {} network", child_chain_id, source_profile.network),
        ));
    }

    Ok(Route {
        direction,
        root_chain_id,
        child_chain_id,
        profile: source_profile,
    })
}
