//! Bridge module - main module file
//!
//! Checkpoint-bridge rebalancing between a root chain and its PoS child
//! chain: allowance gate, deposit/burn builders and the two completion
//! oracles, wired per chain pair by the [`Rebalancer`] facade.

pub mod abi;
pub mod allowance;
pub mod chain;
pub mod chain_profile;
pub mod checkpoint;
pub mod deposit_status;
pub mod errors;
pub mod exit_watcher;
pub mod http;
pub mod initiator;
pub mod mock;
pub mod router;
pub mod sdk;
pub mod state_sync;
pub mod types;

// Re-export commonly used types
pub use chain::{ChainReader, RpcChainReader};
pub use chain_profile::{ChainProfile, Direction, Route};
pub use checkpoint::{CheckpointApi, CheckpointOracle, HttpCheckpointApi};
pub use errors::BridgeError;
pub use exit_watcher::{ChannelSink, ExitSink, ExitWatchHandle, WatchOutcome, WebhookSink};
pub use router::{ChainPair, Rebalancer};
pub use sdk::{BridgeSdk, HttpExitPayloadApi, PosBridgeSdk};
pub use types::{
    AllowanceDecision, BurnStatus, DepositStatus, ExitNotification, PendingTransaction, StatusRequest,
    TransferRequest,
};
