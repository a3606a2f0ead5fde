//! Trace line grammar.
//!
//! ```text
//! <marker>: CP: <decimal>
//! <marker>: (Flash|Ram) read at 0x<8hex>=0x<8hex>
//! <marker>: (Flash|Ram) write at 0x<8hex>=0x<8hex>
//! <marker>: Program exit
//! ```

use idemfault_core::{AccessKind, Address, MemoryAccessEvent, MemorySpace, OriginId};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static CHECKPOINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{8}): CP: ?([0-9]*)").expect("checkpoint pattern is valid")
});

static ACCESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{8}): (Flash|Ram) (read|write) at 0x([0-9A-Fa-f]{8})=0x([0-9A-Fa-f]{8})\s*$")
        .expect("access pattern is valid")
});

static EXIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{8}): Program exit").expect("exit pattern is valid")
});

/// One classified trace line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLine {
    /// Checkpoint boundary
    Checkpoint {
        /// Leading marker field
        origin: OriginId,
        /// Decimal value printed after `CP:`; `None` if absent or out of range.
        /// The line is a boundary either way.
        id: Option<u64>,
    },
    /// Memory read or write
    Access(MemoryAccessEvent),
    /// End of program
    ProgramExit {
        /// Leading marker field
        origin: OriginId,
    },
    /// Anything else, kept verbatim
    Unrecognized(String),
}

impl TraceLine {
    /// Classify a single line. Trailing line terminators are ignored.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\n', '\r']);

        if let Some(event) = ACCESS_RE.captures(line).and_then(|caps| access_from(&caps, line)) {
            return Self::Access(event);
        }

        if let Some(caps) = CHECKPOINT_RE.captures(line) {
            if let Ok(origin) = caps[1].parse::<OriginId>() {
                let id = caps[2].parse::<u64>().ok();
                return Self::Checkpoint { origin, id };
            }
        }

        if let Some(caps) = EXIT_RE.captures(line) {
            if let Ok(origin) = caps[1].parse::<OriginId>() {
                return Self::ProgramExit { origin };
            }
        }

        Self::Unrecognized(line.to_string())
    }

    /// Whether this line ends a checkpoint segment
    #[must_use]
    pub fn is_boundary(&self) -> bool {
        matches!(self, Self::Checkpoint { .. } | Self::ProgramExit { .. })
    }

    /// The access carried by this line, if any
    #[must_use]
    pub fn access(&self) -> Option<&MemoryAccessEvent> {
        match self {
            Self::Access(event) => Some(event),
            _ => None,
        }
    }
}

fn access_from(caps: &Captures<'_>, line: &str) -> Option<MemoryAccessEvent> {
    let origin = caps[1].parse::<OriginId>().ok()?;
    let space = caps[2].parse::<MemorySpace>().ok()?;
    let kind = caps[3].parse::<AccessKind>().ok()?;
    let address = caps[4].parse::<Address>().ok()?;
    let value = u32::from_str_radix(&caps[5], 16).ok()?;
    Some(MemoryAccessEvent::new(origin, kind, space, address, value).with_raw_line(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read() {
        let line = TraceLine::parse("00000001: Ram read at 0x20000000=0x00000001\n");
        let event = line.access().unwrap();
        assert_eq!(event.origin, OriginId::new(1));
        assert_eq!(event.kind, AccessKind::Read);
        assert_eq!(event.space, MemorySpace::Ram);
        assert_eq!(event.address, Address::new(0x2000_0000));
        assert_eq!(event.value, 1);
        assert_eq!(event.raw_line, "00000001: Ram read at 0x20000000=0x00000001");
    }

    #[test]
    fn test_parse_flash_write() {
        let line = TraceLine::parse("0000ABCD: Flash write at 0x0000F000=0xDEADBEEF");
        let event = line.access().unwrap();
        assert_eq!(event.kind, AccessKind::Write);
        assert_eq!(event.space, MemorySpace::Flash);
        assert_eq!(event.value, 0xdead_beef);
    }

    #[test]
    fn test_parse_checkpoint() {
        let line = TraceLine::parse("00001000: CP: 4096 saved");
        assert_eq!(
            line,
            TraceLine::Checkpoint {
                origin: OriginId::new(0x1000),
                id: Some(4096)
            }
        );
        assert!(line.is_boundary());
    }

    #[test]
    fn test_checkpoint_without_usable_id_is_still_boundary() {
        for text in ["00000003: CP: 99999999999999999999", "00000003: CP: ", "00000003: CP:"] {
            let line = TraceLine::parse(text);
            assert_eq!(
                line,
                TraceLine::Checkpoint {
                    origin: OriginId::new(3),
                    id: None
                },
                "{text}"
            );
            assert!(line.is_boundary());
        }
    }

    #[test]
    fn test_parse_exit() {
        let line = TraceLine::parse("00002000: Program exit\r\n");
        assert_eq!(line, TraceLine::ProgramExit { origin: OriginId::new(0x2000) });
        assert!(line.is_boundary());
    }

    #[test]
    fn test_unrecognized_lines_pass_through() {
        for text in [
            "",
            "hello world",
            "0001: Ram read at 0x20000000=0x00000001",
            "00000001: Rom read at 0x20000000=0x00000001",
            "00000001: Ram read at 0x2000=0x00000001",
            "00000001: Ram read at 0x20000000=0x00000001 trailing",
        ] {
            let line = TraceLine::parse(text);
            assert_eq!(line, TraceLine::Unrecognized(text.to_string()), "{text}");
            assert!(!line.is_boundary());
            assert!(line.access().is_none());
        }
    }
}
