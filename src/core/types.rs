// Basic types for the ledger

use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Milliseconds since the Unix epoch
pub type UnixMillis = u64;

/// Current wall-clock time in milliseconds
pub fn now_millis() -> UnixMillis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// 256-bit digest (32 bytes)
/// Used for block hashes and signing digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest256(pub [u8; 32]);

impl Digest256 {
    /// Create a new digest from a byte array
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the digest as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, most significant byte first
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string
    pub fn from_hex(hex_str: &str) -> Result<Self, String> {
        let bytes = hex::decode(hex_str).map_err(|e| format!("Invalid hex string: {}", e))?;
        if bytes.len() != 32 {
            return Err(format!("Invalid digest length: expected 32, got {}", bytes.len()));
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes);
        Ok(Self(digest))
    }
}

impl fmt::Display for Digest256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Wallet address used as sender/recipient identity.
///
/// Addresses minted by the keystore are `0x` followed by 64 hex digits, but the
/// ledger treats any non-empty string as an opaque identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Case-insensitive comparison after trimming whitespace
    pub fn matches(&self, other: &str) -> bool {
        self.0.trim().eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount {0:?}")]
    Invalid(String),
    #[error("amount {0} has more than {max} fractional digits", max = Amount::DECIMALS)]
    TooPrecise(String),
    #[error("amount {0} is out of range")]
    Overflow(String),
}

/// Non-negative fixed-point decimal with 8 fractional digits.
///
/// Stored as an integer count of base units so that the canonical encoding is
/// exact. On the wire it is a JSON number; strings are rejected rather than
/// coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    pub const DECIMALS: u32 = 8;
    pub const UNITS_PER_COIN: u64 = 100_000_000;

    pub fn from_units(units: u64) -> Self {
        Self(units)
    }

    pub fn from_whole(whole: u64) -> Result<Self, AmountError> {
        whole
            .checked_mul(Self::UNITS_PER_COIN)
            .map(Self)
            .ok_or_else(|| AmountError::Overflow(whole.to_string()))
    }

    pub fn units(&self) -> u64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parse a plain decimal literal such as `10`, `0.5` or `12.00000001`
    pub fn parse(text: &str) -> Result<Self, AmountError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AmountError::Empty);
        }

        let (whole, frac) = match text.split_once('.') {
            Some((w, f)) => (w, f),
            None => (text, ""),
        };

        let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !digits_only(whole) || !digits_only(frac) {
            return Err(AmountError::Invalid(text.to_string()));
        }
        if frac.len() > Self::DECIMALS as usize {
            return Err(AmountError::TooPrecise(text.to_string()));
        }

        let whole: u64 = whole
            .parse()
            .map_err(|_| AmountError::Overflow(text.to_string()))?;
        let mut frac_units: u64 = 0;
        for (i, b) in frac.bytes().enumerate() {
            frac_units += u64::from(b - b'0') * 10u64.pow(Self::DECIMALS - 1 - i as u32);
        }

        whole
            .checked_mul(Self::UNITS_PER_COIN)
            .and_then(|units| units.checked_add(frac_units))
            .map(Self)
            .ok_or_else(|| AmountError::Overflow(text.to_string()))
    }

    /// Canonical decimal form: no exponent, no trailing fractional zeros
    pub fn to_decimal_string(&self) -> String {
        let whole = self.0 / Self::UNITS_PER_COIN;
        let frac = self.0 % Self::UNITS_PER_COIN;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:08}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // written as the exact decimal literal, never through f64
        let number = serde_json::Number::from_str(&self.to_decimal_string())
            .map_err(ser::Error::custom)?;
        number.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = serde_json::Number::deserialize(deserializer)?;
        Amount::parse(&number.to_string()).map_err(de::Error::custom)
    }
}
