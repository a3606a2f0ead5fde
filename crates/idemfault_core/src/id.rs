//! Word-sized identifiers found in traces and on the target.
//!
//! Addresses and program markers serialize as `0x`-prefixed hex strings so
//! persisted metrics stay readable next to disassembly listings.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parse a 32-bit word written in hex, with or without a `0x` prefix
///
/// # Errors
///
/// Returns error if the text is empty, too long or not hex
pub fn parse_word(input: &str) -> CoreResult<u32> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16).map_err(|e| CoreError::InvalidWord {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Memory address of a traced access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(u32);

impl Address {
    /// Create from raw value
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get raw value
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_word(s).map(Self)
    }
}

impl From<u32> for Address {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Opaque identity of the instruction that produced an access.
///
/// Taken from the leading field of a trace line. Two accesses with equal
/// origins are treated as coming from the same instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OriginId(u32);

impl OriginId {
    /// Create from raw value
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get raw value
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl FromStr for OriginId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_word(s).map(Self)
    }
}

/// Program location reported by the target (program counter or return address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramMarker(u32);

impl ProgramMarker {
    /// Create from raw value
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get raw value
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProgramMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl FromStr for ProgramMarker {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_word(s).map(Self)
    }
}

impl From<u32> for ProgramMarker {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

macro_rules! hex_string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_string_serde!(Address);
hex_string_serde!(ProgramMarker);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_word_prefixes() {
        assert_eq!(parse_word("0x20000000").unwrap(), 0x2000_0000);
        assert_eq!(parse_word("0X1f").unwrap(), 0x1f);
        assert_eq!(parse_word("000000AB").unwrap(), 0xab);
        assert!(parse_word("").is_err());
        assert!(parse_word("0xnothex").is_err());
        assert!(parse_word("0x123456789").is_err());
    }

    #[test]
    fn test_address_display() {
        let addr = Address::new(0x2000_00ab);
        assert_eq!(addr.to_string(), "0x200000AB");
        assert_eq!("0x200000ab".parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_origin_display() {
        let origin = OriginId::new(1);
        assert_eq!(origin.to_string(), "00000001");
    }

    #[test]
    fn test_marker_display() {
        let marker = ProgramMarker::new(0x200);
        assert_eq!(marker.to_string(), "0x00000200");
    }

    #[test]
    fn test_marker_serde_as_string() {
        let marker = ProgramMarker::new(0x1a4);
        let json = serde_json::to_string(&marker).unwrap();
        assert_eq!(json, "\"0x000001a4\"");
        let restored: ProgramMarker = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, marker);
    }

    #[test]
    fn test_address_serde_rejects_garbage() {
        let result: Result<Address, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }
}
