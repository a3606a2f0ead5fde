//! Memory access events observed on the simulated target.

use crate::error::CoreError;
use crate::id::{Address, OriginId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Memory space an access landed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemorySpace {
    /// Non-volatile program memory
    Flash,
    /// Volatile working memory
    Ram,
}

impl MemorySpace {
    /// Name as printed in traces
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "Flash",
            Self::Ram => "Ram",
        }
    }
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemorySpace {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Flash" => Ok(Self::Flash),
            "Ram" => Ok(Self::Ram),
            other => Err(CoreError::UnknownSpace(other.to_string())),
        }
    }
}

/// Direction of an access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    /// Load from memory
    Read,
    /// Store to memory
    Write,
}

impl AccessKind {
    /// Name as printed in traces
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(CoreError::UnknownAccess(other.to_string())),
        }
    }
}

/// A single read or write, as produced per trace line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAccessEvent {
    /// Instruction identity (leading trace field)
    pub origin: OriginId,
    /// Read or write
    pub kind: AccessKind,
    /// Flash or RAM
    pub space: MemorySpace,
    /// Accessed address
    pub address: Address,
    /// Value read or written
    pub value: u32,
    /// Line the event was parsed from, without trailing newline
    pub raw_line: String,
}

impl MemoryAccessEvent {
    /// Create a new access event, rendering its canonical trace line
    #[must_use]
    pub fn new(
        origin: OriginId,
        kind: AccessKind,
        space: MemorySpace,
        address: Address,
        value: u32,
    ) -> Self {
        let raw_line = format!("{}: {} {} at {}=0x{:08X}", origin, space, kind, address, value);
        Self {
            origin,
            kind,
            space,
            address,
            value,
            raw_line,
        }
    }

    /// Replace the raw line with the text actually read from a trace
    #[must_use]
    pub fn with_raw_line(mut self, line: impl Into<String>) -> Self {
        self.raw_line = line.into();
        self
    }

    /// Whether this is a read
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.kind == AccessKind::Read
    }

    /// Whether this is a write
    #[must_use]
    pub fn is_write(&self) -> bool {
        self.kind == AccessKind::Write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_canonical_line() {
        let event = MemoryAccessEvent::new(
            OriginId::new(1),
            AccessKind::Read,
            MemorySpace::Ram,
            Address::new(0x2000_0000),
            1,
        );
        assert_eq!(event.raw_line, "00000001: Ram read at 0x20000000=0x00000001");
        assert!(event.is_read());
        assert!(!event.is_write());
    }

    #[test]
    fn test_with_raw_line() {
        let event = MemoryAccessEvent::new(
            OriginId::new(2),
            AccessKind::Write,
            MemorySpace::Flash,
            Address::new(0x100),
            0,
        )
        .with_raw_line("custom");
        assert_eq!(event.raw_line, "custom");
        assert!(event.is_write());
    }

    #[test]
    fn test_space_and_kind_parse() {
        assert_eq!("Flash".parse::<MemorySpace>().unwrap(), MemorySpace::Flash);
        assert!("Rom".parse::<MemorySpace>().is_err());
        assert_eq!("write".parse::<AccessKind>().unwrap(), AccessKind::Write);
        assert!("fetch".parse::<AccessKind>().is_err());
    }
}
