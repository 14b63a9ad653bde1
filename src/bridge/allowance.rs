//! Allowance gate for root-chain deposits

use ethers::types::{Address, U256};

use crate::bridge::abi;
use crate::bridge::chain::{read_uint, ChainReader};
use crate::bridge::errors::BridgeError;
use crate::bridge::sdk::BridgeSdk;
use crate::bridge::types::{is_native, AllowanceDecision};

/// Current allowance of `owner` towards the bridge predicate, or
/// `InsufficientAllowance` when it does not cover `amount`.
pub async fn check_allowance(
    root: &dyn ChainReader,
    sdk: &dyn BridgeSdk,
    asset: Address,
    amount: U256,
    owner: Address,
) -> Result<U256, BridgeError> {
    let predicate = sdk.contracts().erc20_predicate;
    let allowance = read_uint(root, asset, abi::allowance(owner, predicate), "allowance").await?;
    log::info!(
        "allowance for {:?} on chain {}: {}, needed: {}",
        asset,
        root.chain_id(),
        allowance,
        amount
    );
    if allowance < amount {
        return Err(BridgeError::InsufficientAllowance { allowance, required: amount });
    }
    Ok(allowance)
}

/// Decide whether `spender` must approve the bridge before depositing `amount`.
///
/// Native deposits never need approval. A short allowance yields an approval
/// for `U256::MAX` so the same spender/asset pair is not approved again.
pub async fn check_and_prepare_approval(
    root: &dyn ChainReader,
    sdk: &dyn BridgeSdk,
    asset: Address,
    amount: U256,
    spender: Address,
) -> Result<AllowanceDecision, BridgeError> {
    if is_native(asset) {
        return Ok(AllowanceDecision::Sufficient(U256::MAX));
    }

    match check_allowance(root, sdk, asset, amount, spender).await {
        Ok(allowance) => Ok(AllowanceDecision::Sufficient(allowance)),
        Err(BridgeError::InsufficientAllowance { allowance, .. }) => {
            log::info!(
                "allowance {} below {} for {:?}, generating max approve tx",
                allowance,
                amount,
                asset
            );
            let approval = sdk.build_approve(asset, U256::MAX)?;
            Ok(AllowanceDecision::ApprovalRequired { current: allowance, transaction: approval })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::chain_profile::{ChainProfile, ETHEREUM_MAINNET};
    use crate::bridge::mock::{MockBridgeSdk, MockChainReader};
    use ethers::types::H160;

    const TOKEN: Address = H160([0x33; 20]);
    const SPENDER: Address = H160([0x44; 20]);

    fn setup(allowance: u64) -> (MockChainReader, MockBridgeSdk) {
        let sdk = MockBridgeSdk::new(ChainProfile::MAINNET);
        let root = MockChainReader::new(ETHEREUM_MAINNET);
        root.set_allowance(TOKEN, SPENDER, sdk.contracts().erc20_predicate, U256::from(allowance));
        (root, sdk)
    }

    #[tokio::test]
    async fn test_native_asset_is_always_sufficient() {
        let (root, sdk) = setup(0);
        for amount in [U256::one(), U256::exp10(30), U256::MAX] {
            let decision = check_and_prepare_approval(&root, &sdk, Address::zero(), amount, SPENDER)
                .await
                .unwrap();
            assert_eq!(decision, AllowanceDecision::Sufficient(U256::MAX));
        }
        assert_eq!(root.read_count(), 0);
    }

    #[tokio::test]
    async fn test_sufficient_allowance() {
        let (root, sdk) = setup(500);
        let decision = check_and_prepare_approval(&root, &sdk, TOKEN, U256::from(500), SPENDER)
            .await
            .unwrap();
        assert_eq!(decision, AllowanceDecision::Sufficient(U256::from(500)));
        assert_eq!(sdk.build_count(), 0);
    }

    #[tokio::test]
    async fn test_short_allowance_requests_max_approval() {
        let (root, sdk) = setup(499);
        let decision = check_and_prepare_approval(&root, &sdk, TOKEN, U256::from(500), SPENDER)
            .await
            .unwrap();
        match decision {
            AllowanceDecision::ApprovalRequired { current, transaction: tx } => {
                assert_eq!(current, U256::from(499));
                assert_eq!(tx.to, TOKEN);
                assert_eq!(tx.data, abi::approve(sdk.contracts().erc20_predicate, U256::MAX));
            }
            other => panic!("expected approval, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_allowance_reports_shortfall() {
        let (root, sdk) = setup(10);
        let err = check_allowance(&root, &sdk, TOKEN, U256::from(11), SPENDER).await.unwrap_err();
        assert_eq!(
            err,
            BridgeError::InsufficientAllowance { allowance: U256::from(10), required: U256::from(11) }
        );
    }

    #[tokio::test]
    async fn test_read_failure_is_surfaced() {
        let (root, sdk) = setup(1_000);
        root.set_failing(true);
        let err = check_and_prepare_approval(&root, &sdk, TOKEN, U256::from(1), SPENDER)
            .await
            .unwrap_err();
        match err {
            BridgeError::ChainReadFailure { chain_id, stage, .. } => {
                assert_eq!(chain_id, ETHEREUM_MAINNET);
                assert_eq!(stage, "allowance");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(sdk.build_count(), 0);
    }
}
