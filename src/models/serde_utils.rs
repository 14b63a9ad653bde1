//! U256 as a decimal string, the wire format for amounts and counters

use ethers::types::U256;
use serde::{self, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    U256::from_dec_str(&s).map_err(|e| serde::de::Error::custom(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use ethers::types::U256;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        amount: U256,
    }

    #[test]
    fn test_u256_as_decimal_string() {
        let w = Wrapper { amount: U256::MAX };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(
            json,
            "{\"amount\":\"115792089237316195423570985008687907853269984665640564039457584007913129639935\"}"
        );
        let parsed: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, w);
    }

    #[test]
    fn test_rejects_hex_and_garbage() {
        assert!(serde_json::from_str::<Wrapper>("{\"amount\":\"0x10\"}").is_err());
        assert!(serde_json::from_str::<Wrapper>("{\"amount\":\"ten\"}").is_err());
    }
}
