//! Deposit (root -> child) and burn (child -> root) initiation

use ethers::types::{Address, U256};

use crate::bridge::abi;
use crate::bridge::chain::{read_uint, ChainReader};
use crate::bridge::errors::BridgeError;
use crate::bridge::sdk::BridgeSdk;
use crate::bridge::types::{is_native, PendingTransaction};

/// Build the deposit transaction for `initiator`.
///
/// Precondition: the caller already confirmed the allowance through the
/// allowance gate. It is not read again here.
pub fn initiate_deposit(
    sdk: &dyn BridgeSdk,
    asset: Address,
    amount: U256,
    initiator: Address,
) -> Result<PendingTransaction, BridgeError> {
    log::info!("deposit: asset={:?} amount={} initiator={:?}", asset, amount, initiator);
    let tx = sdk.build_deposit(asset, amount, initiator)?;
    log::debug!("deposit tx: {:?}", tx);
    Ok(tx)
}

/// Balance of `owner` on the child chain, native or ERC20
pub async fn balance_of(
    child: &dyn ChainReader,
    asset: Address,
    owner: Address,
) -> Result<U256, BridgeError> {
    if is_native(asset) {
        return child.balance(owner).await.map_err(|e| e.at_stage("native balance"));
    }
    read_uint(child, asset, abi::balance_of(owner), "balanceOf").await
}

/// Build the burn transaction after checking the initiator can cover `amount`.
///
/// Nothing is built when the balance is short.
pub async fn initiate_burn(
    child: &dyn ChainReader,
    sdk: &dyn BridgeSdk,
    asset: Address,
    amount: U256,
    initiator: Address,
) -> Result<PendingTransaction, BridgeError> {
    log::info!("burn: asset={:?} amount={} initiator={:?}", asset, amount, initiator);

    let balance = balance_of(child, asset, initiator).await?;
    if balance < amount {
        log::warn!(
            "insufficient funds for withdrawal on chain {}: balance={} amount={}",
            child.chain_id(),
            balance,
            amount
        );
        return Err(BridgeError::InsufficientFunds {
            chain_id: child.chain_id(),
            asset: format!("{:?}", asset),
            balance,
            required: amount,
        });
    }

    let tx = sdk.build_burn(asset, amount)?;
    log::debug!("burn tx: {:?}", tx);
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::chain_profile::{ChainProfile, POLYGON_MAINNET};
    use crate::bridge::mock::{MockBridgeSdk, MockChainReader};
    use ethers::types::H160;

    const CHILD_TOKEN: Address = H160([0x55; 20]);
    const ROUTER: Address = H160([0x66; 20]);

    #[test]
    fn test_deposit_does_not_touch_the_chain() {
        let sdk = MockBridgeSdk::new(ChainProfile::MAINNET);
        let tx = initiate_deposit(&sdk, H160([0x33; 20]), U256::from(10), ROUTER).unwrap();
        assert_eq!(tx.to, sdk.contracts().root_chain_manager);
        assert_eq!(sdk.build_count(), 1);
    }

    #[tokio::test]
    async fn test_burn_with_enough_token_balance() {
        let child = MockChainReader::new(POLYGON_MAINNET);
        child.set_token_balance(CHILD_TOKEN, ROUTER, U256::from(100));
        let sdk = MockBridgeSdk::new(ChainProfile::MAINNET);

        let tx = initiate_burn(&child, &sdk, CHILD_TOKEN, U256::from(100), ROUTER).await.unwrap();
        assert_eq!(tx.to, CHILD_TOKEN);
        assert_eq!(tx.data, abi::withdraw(U256::from(100)));
    }

    #[tokio::test]
    async fn test_burn_over_balance_builds_nothing() {
        let child = MockChainReader::new(POLYGON_MAINNET);
        child.set_token_balance(CHILD_TOKEN, ROUTER, U256::from(99));
        let sdk = MockBridgeSdk::new(ChainProfile::MAINNET);

        let err = initiate_burn(&child, &sdk, CHILD_TOKEN, U256::from(100), ROUTER)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
        assert_eq!(sdk.build_count(), 0);
    }

    #[tokio::test]
    async fn test_native_burn_checks_account_balance() {
        let child = MockChainReader::new(POLYGON_MAINNET);
        child.set_native_balance(ROUTER, U256::from(5));
        let sdk = MockBridgeSdk::new(ChainProfile::MAINNET);

        let err = initiate_burn(&child, &sdk, Address::zero(), U256::from(6), ROUTER)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InsufficientFunds { .. }));
        assert_eq!(sdk.build_count(), 0);

        // Enough balance, but the PoS bridge has no native burn mapping
        let err = initiate_burn(&child, &sdk, Address::zero(), U256::from(5), ROUTER)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "BRIDGE_ENCODING_FAILURE");
    }

    #[tokio::test]
    async fn test_balance_read_failure_builds_nothing() {
        let child = MockChainReader::new(POLYGON_MAINNET);
        child.set_token_balance(CHILD_TOKEN, ROUTER, U256::from(100));
        child.set_failing(true);
        let sdk = MockBridgeSdk::new(ChainProfile::MAINNET);

        let err = initiate_burn(&child, &sdk, CHILD_TOKEN, U256::one(), ROUTER).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(sdk.build_count(), 0);
    }
}
