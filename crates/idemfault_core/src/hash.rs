//! Final output hash sampled from the target at program exit.
//!
//! The target computes the digest itself; this side only validates that it
//! is hex and compares values across runs.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Hex digest of a program's final output, normalized to lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputHash(String);

impl OutputHash {
    /// Parse from hex string, with or without `0x` prefix
    ///
    /// # Errors
    ///
    /// Returns error if the text is empty or not an even number of hex digits
    pub fn from_hex(input: &str) -> CoreResult<Self> {
        let digits = input.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        if digits.is_empty() {
            return Err(CoreError::InvalidHash {
                input: input.to_string(),
                reason: "empty".to_string(),
            });
        }
        hex::decode(digits).map_err(|e| CoreError::InvalidHash {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(digits.to_ascii_lowercase()))
    }

    /// Build from raw digest bytes
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Get as hex string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OutputHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for OutputHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for OutputHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
