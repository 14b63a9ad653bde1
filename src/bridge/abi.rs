//! Calldata for the handful of contract functions the bridge touches.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{id, keccak256};

pub const ALLOWANCE: &str = "allowance(address,address)";
pub const BALANCE_OF: &str = "balanceOf(address)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const LAST_STATE_ID: &str = "lastStateId()";
pub const DEPOSIT_FOR: &str = "depositFor(address,address,bytes)";
pub const DEPOSIT_ETHER_FOR: &str = "depositEtherFor(address)";
pub const WITHDRAW: &str = "withdraw(uint256)";
pub const EXIT: &str = "exit(bytes)";

pub const STATE_SYNCED_EVENT: &str = "StateSynced(uint256,address,bytes)";
pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

/// topic0 of an event signature
pub fn event_topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend_from_slice(&abi::encode(args));
    Bytes::from(data)
}

pub fn allowance(owner: Address, spender: Address) -> Bytes {
    encode_call(ALLOWANCE, &[Token::Address(owner), Token::Address(spender)])
}

pub fn balance_of(owner: Address) -> Bytes {
    encode_call(BALANCE_OF, &[Token::Address(owner)])
}

pub fn approve(spender: Address, amount: U256) -> Bytes {
    encode_call(APPROVE, &[Token::Address(spender), Token::Uint(amount)])
}

pub fn last_state_id() -> Bytes {
    encode_call(LAST_STATE_ID, &[])
}

/// `depositData` for ERC20 deposits is `abi.encode(amount)`
pub fn deposit_for(user: Address, root_token: Address, amount: U256) -> Bytes {
    let deposit_data = abi::encode(&[Token::Uint(amount)]);
    encode_call(
        DEPOSIT_FOR,
        &[Token::Address(user), Token::Address(root_token), Token::Bytes(deposit_data)],
    )
}

pub fn deposit_ether_for(user: Address) -> Bytes {
    encode_call(DEPOSIT_ETHER_FOR, &[Token::Address(user)])
}

pub fn withdraw(amount: U256) -> Bytes {
    encode_call(WITHDRAW, &[Token::Uint(amount)])
}

pub fn exit(payload: &[u8]) -> Bytes {
    encode_call(EXIT, &[Token::Bytes(payload.to_vec())])
}

/// Decode a single `uint256` return value
pub fn decode_uint(output: &[u8]) -> Result<U256, String> {
    let tokens = abi::decode(&[ParamType::Uint(256)], output)
        .map_err(|e| format!("cannot decode uint256 from {} bytes: {}", output.len(), e))?;
    match tokens.into_iter().next() {
        Some(Token::Uint(value)) => Ok(value),
        other => Err(format!("unexpected return token: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors() {
        assert_eq!(&approve(Address::zero(), U256::zero())[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(&allowance(Address::zero(), Address::zero())[..4], &[0xdd, 0x62, 0xed, 0x3e]);
        assert_eq!(&balance_of(Address::zero())[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(&withdraw(U256::one())[..4], &[0x2e, 0x1a, 0x7d, 0x4d]);
    }

    #[test]
    fn test_approve_encodes_spender_and_amount() {
        let spender = Address::repeat_byte(0xab);
        let data = approve(spender, U256::MAX);
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[16..36], spender.as_bytes());
        assert!(data[36..].iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_deposit_for_wraps_amount_in_bytes() {
        let data = deposit_for(Address::repeat_byte(1), Address::repeat_byte(2), U256::from(1000));
        let tokens = abi::decode(
            &[ParamType::Address, ParamType::Address, ParamType::Bytes],
            &data[4..],
        )
        .unwrap();
        assert_eq!(tokens[0], Token::Address(Address::repeat_byte(1)));
        assert_eq!(tokens[1], Token::Address(Address::repeat_byte(2)));
        let inner = tokens[2].clone().into_bytes().unwrap();
        assert_eq!(decode_uint(&inner).unwrap(), U256::from(1000));
    }

    #[test]
    fn test_decode_uint() {
        let encoded = abi::encode(&[Token::Uint(U256::from(42))]);
        assert_eq!(decode_uint(&encoded).unwrap(), U256::from(42));
        assert!(decode_uint(&[]).is_err());
        assert!(decode_uint(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_transfer_event_topic() {
        assert_eq!(
            format!("{:?}", event_topic(TRANSFER_EVENT)),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }
}
