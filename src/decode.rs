//! Decoding of script response bytes according to the declared return type.

use crate::config::ReturnType;
use crate::errors::{DecodeError, DecodeResult};
use alloy_primitives::{I256, U256, hex};
use std::fmt;

/// "0x" plus 64 hex digits
const MAX_WORD_HEX_LEN: usize = 66;

/// A response interpreted under its `ReturnType`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Uint(U256),
    Int(I256),
    String(String),
    /// The raw `0x` hex string, unchanged
    Bytes(String),
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Uint(value) => write!(f, "{value}"),
            DecodedValue::Int(value) => write!(f, "{value}"),
            DecodedValue::String(value) => f.write_str(value),
            DecodedValue::Bytes(value) => f.write_str(value),
        }
    }
}

/// Decode a `0x`-prefixed response hex string.
///
/// Integers are read as big-endian 256-bit words; `int256` uses two's
/// complement, so a value is only negative when all 32 bytes are present and
/// the top bit is set. Strings are decoded as lossy UTF-8. `bytes` returns
/// the input untouched.
pub fn decode_result(hex_str: &str, return_type: ReturnType) -> DecodeResult<DecodedValue> {
    let digits = hex_str
        .strip_prefix("0x")
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| DecodeError::InvalidHex(hex_str.to_string()))?;

    match return_type {
        ReturnType::Uint256 => parse_word(hex_str, digits, return_type).map(DecodedValue::Uint),
        ReturnType::Int256 => parse_word(hex_str, digits, return_type)
            .map(|raw| DecodedValue::Int(I256::from_raw(raw))),
        ReturnType::String => {
            let bytes =
                hex::decode(digits).map_err(|_| DecodeError::InvalidHex(hex_str.to_string()))?;
            Ok(DecodedValue::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        }
        ReturnType::Bytes => Ok(DecodedValue::Bytes(hex_str.to_string())),
    }
}

fn parse_word(hex_str: &str, digits: &str, return_type: ReturnType) -> DecodeResult<U256> {
    if hex_str.len() > MAX_WORD_HEX_LEN {
        return Err(DecodeError::TooLarge {
            hex: hex_str.to_string(),
            len: hex_str.len(),
            ty: return_type.as_str(),
        });
    }
    if digits.is_empty() {
        return Err(DecodeError::Empty(hex_str.to_string()));
    }

    U256::from_str_radix(digits, 16).map_err(|_| DecodeError::InvalidHex(hex_str.to_string()))
}
