//! 256-bit unsigned integers for on-chain identifiers.
//!
//! Token ids and plan ids are uint256 on chain and real ids use the full
//! width (hash-derived token ids are the common case). Money amounts stay in
//! `u128` smallest units; only identifiers and quantities need [`U256`].
//!
//! On text surfaces a value is a decimal string. Parsing also accepts `0x`
//! hex and, for JSON, plain integers that fit in a `u64`. Binary encodings
//! (bincode, sled keys, packed digests) use 32 big-endian bytes.

pub use primitive_types::U256;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UintError {
    #[error("empty uint256")]
    Empty,

    #[error("invalid uint256 {input:?}: {reason}")]
    Invalid { input: String, reason: String },
}

/// Parse a decimal or `0x`-prefixed hex string.
pub fn parse_u256(s: &str) -> Result<U256, UintError> {
    let s = s.trim();
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    if digits.is_empty() {
        return Err(UintError::Empty);
    }
    let parsed = if radix == 16 {
        U256::from_str_radix(digits, 16).map_err(|e| e.to_string())
    } else {
        U256::from_dec_str(digits).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| UintError::Invalid {
        input: s.to_string(),
        reason,
    })
}

pub fn to_be_bytes(value: &U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

pub fn from_be_bytes(bytes: &[u8; 32]) -> U256 {
    U256::from_big_endian(bytes)
}

/// `#[serde(with = "cyan_protocol::uint::serde_u256")]` for [`U256`] fields.
pub mod serde_u256 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(value)
        } else {
            to_be_bytes(value).serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(TextVisitor)
        } else {
            let bytes = <[u8; 32]>::deserialize(deserializer)?;
            Ok(from_be_bytes(&bytes))
        }
    }

    struct TextVisitor;

    impl<'de> Visitor<'de> for TextVisitor {
        type Value = U256;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a uint256 as a decimal or 0x-hex string, or a u64")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<U256, E> {
            parse_u256(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<U256, E> {
            Ok(U256::from(v))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapped {
        #[serde(with = "serde_u256")]
        id: U256,
    }

    fn two_pow_128() -> U256 {
        U256::from(u128::MAX) + U256::one()
    }

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_u256("42").unwrap(), U256::from(42u64));
        assert_eq!(parse_u256("0x2a").unwrap(), U256::from(42u64));
        assert_eq!(
            parse_u256("340282366920938463463374607431768211456").unwrap(),
            two_pow_128()
        );
        assert_eq!(parse_u256(""), Err(UintError::Empty));
        assert_eq!(parse_u256("0x"), Err(UintError::Empty));
        assert!(parse_u256("forty-two").is_err());
    }

    #[test]
    fn big_endian_bytes_fill_the_word() {
        let bytes = to_be_bytes(&two_pow_128());
        let mut expected = [0u8; 32];
        expected[15] = 1;
        assert_eq!(bytes, expected);
        assert_eq!(from_be_bytes(&bytes), two_pow_128());
    }

    #[test]
    fn json_is_a_decimal_string_and_accepts_small_integers() {
        let wrapped = Wrapped { id: two_pow_128() };
        let json = serde_json::to_string(&wrapped).unwrap();
        assert_eq!(json, r#"{"id":"340282366920938463463374607431768211456"}"#);
        assert_eq!(serde_json::from_str::<Wrapped>(&json).unwrap(), wrapped);

        let small: Wrapped = serde_json::from_str(r#"{"id":7}"#).unwrap();
        assert_eq!(small.id, U256::from(7u64));
        let hex: Wrapped = serde_json::from_str(r#"{"id":"0xff"}"#).unwrap();
        assert_eq!(hex.id, U256::from(255u64));
    }

    #[test]
    fn bincode_uses_fixed_width_bytes() {
        let wrapped = Wrapped { id: U256::MAX };
        let bytes = bincode::serialize(&wrapped).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bincode::deserialize::<Wrapped>(&bytes).unwrap(), wrapped);
    }
}
