//! State-sync event extraction
//!
//! A root-chain deposit emits `StateSynced(uint256 indexed id, ...)` from the
//! StateSender contract. The id is the counter the child chain must reach
//! before the deposit is credited. Where that log lives inside the receipt is
//! a property of the bridge contracts, so it is isolated behind a trait.

use ethers::types::{TransactionReceipt, H256, U256};

use crate::bridge::abi;

pub trait StateSyncExtractor: Send + Sync {
    /// Root-chain state-sync id carried by a deposit receipt.
    /// `Err` explains why the receipt does not look like a bridge deposit.
    fn extract(&self, receipt: &TransactionReceipt) -> Result<U256, String>;
}

/// Reads a fixed (log, topic) position; the PoS ERC20 deposit puts the
/// state-sync id at log 3, topic 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPositionExtractor {
    pub log_index: usize,
    pub topic_index: usize,
}

impl Default for FixedPositionExtractor {
    fn default() -> Self {
        Self { log_index: 3, topic_index: 1 }
    }
}

impl StateSyncExtractor for FixedPositionExtractor {
    fn extract(&self, receipt: &TransactionReceipt) -> Result<U256, String> {
        let log = receipt.logs.get(self.log_index).ok_or_else(|| {
            format!(
                "expected at least {} logs, receipt has {}",
                self.log_index + 1,
                receipt.logs.len()
            )
        })?;
        let topic = log.topics.get(self.topic_index).ok_or_else(|| {
            format!(
                "log {} has {} topics, expected at least {}",
                self.log_index,
                log.topics.len(),
                self.topic_index + 1
            )
        })?;
        Ok(U256::from_big_endian(topic.as_bytes()))
    }
}

/// Finds the first `StateSynced` log regardless of its position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSyncedEventExtractor {
    topic: H256,
}

impl Default for StateSyncedEventExtractor {
    fn default() -> Self {
        Self { topic: abi::event_topic(abi::STATE_SYNCED_EVENT) }
    }
}

impl StateSyncExtractor for StateSyncedEventExtractor {
    fn extract(&self, receipt: &TransactionReceipt) -> Result<U256, String> {
        receipt
            .logs
            .iter()
            .find(|log| log.topics.first() == Some(&self.topic))
            .and_then(|log| log.topics.get(1))
            .map(|id| U256::from_big_endian(id.as_bytes()))
            .ok_or_else(|| "no StateSynced event in receipt".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Log;

    fn log_with_topics(topics: Vec<H256>) -> Log {
        Log { topics, ..Default::default() }
    }

    fn id_topic(id: u64) -> H256 {
        let mut bytes = [0u8; 32];
        U256::from(id).to_big_endian(&mut bytes);
        H256::from(bytes)
    }

    fn deposit_receipt(state_id: u64) -> TransactionReceipt {
        let state_synced = abi::event_topic(abi::STATE_SYNCED_EVENT);
        TransactionReceipt {
            logs: vec![
                log_with_topics(vec![H256::repeat_byte(1)]),
                log_with_topics(vec![H256::repeat_byte(2)]),
                log_with_topics(vec![H256::repeat_byte(3)]),
                log_with_topics(vec![state_synced, id_topic(state_id), H256::repeat_byte(4)]),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_fixed_position() {
        let receipt = deposit_receipt(2_451_005);
        let id = FixedPositionExtractor::default().extract(&receipt).unwrap();
        assert_eq!(id, U256::from(2_451_005u64));
    }

    #[test]
    fn test_fixed_position_too_few_logs() {
        let mut receipt = deposit_receipt(1);
        receipt.logs.truncate(3);
        let err = FixedPositionExtractor::default().extract(&receipt).unwrap_err();
        assert!(err.contains("receipt has 3"), "{}", err);
    }

    #[test]
    fn test_fixed_position_missing_topic() {
        let mut receipt = deposit_receipt(1);
        receipt.logs[3].topics.truncate(1);
        assert!(FixedPositionExtractor::default().extract(&receipt).is_err());
    }

    #[test]
    fn test_event_extractor_ignores_position() {
        let mut receipt = deposit_receipt(99);
        receipt.logs.rotate_left(2);
        let id = StateSyncedEventExtractor::default().extract(&receipt).unwrap();
        assert_eq!(id, U256::from(99));

        receipt.logs.clear();
        assert!(StateSyncedEventExtractor::default().extract(&receipt).is_err());
    }
}
