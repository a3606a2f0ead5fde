//! Live checkpoint segment state.

use crate::report::ViolationRecord;
use idemfault_core::{AccessKind, Address, MemoryAccessEvent, OriginId};
use indexmap::{IndexMap, IndexSet};

/// A read that may witness a later aliasing write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadWitness {
    /// Instruction that performed the read
    pub origin: OriginId,
    /// Index of the read in the segment's line history
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HistoryLine {
    text: String,
    address: Option<Address>,
}

/// Accesses between two checkpoint markers.
///
/// Every read of a not-yet-written address is kept as a witness. The first
/// write to an address commits it; later writes to it are not re-examined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointSegment {
    history: Vec<HistoryLine>,
    reads: IndexMap<Address, Vec<ReadWitness>>,
    /// First writer per committed address
    written: IndexMap<Address, OriginId>,
    violators: IndexSet<Address>,
}

impl CheckpointSegment {
    /// Create an empty segment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line that carries no access to the history
    pub fn record_other(&mut self, text: impl Into<String>) {
        self.history.push(HistoryLine {
            text: text.into(),
            address: None,
        });
    }

    /// Fold one access into the segment.
    ///
    /// Returns the address if this access newly made it a violator.
    pub fn observe(&mut self, event: &MemoryAccessEvent, ignored: Option<Address>) -> Option<Address> {
        let line = self.history.len();
        self.history.push(HistoryLine {
            text: event.raw_line.clone(),
            address: Some(event.address),
        });

        match event.kind {
            AccessKind::Read => {
                if !self.written.contains_key(&event.address) {
                    self.reads.entry(event.address).or_default().push(ReadWitness {
                        origin: event.origin,
                        line,
                    });
                }
                None
            }
            AccessKind::Write => {
                if self.written.contains_key(&event.address) {
                    return None;
                }
                self.written.insert(event.address, event.origin);

                if Some(event.address) == ignored || !self.aliases(event.address, event.origin) {
                    return None;
                }
                self.violators.insert(event.address).then_some(event.address)
            }
        }
    }

    fn aliases(&self, address: Address, writer: OriginId) -> bool {
        self.reads
            .get(&address)
            .is_some_and(|witnesses| witnesses.iter().any(|w| w.origin != writer))
    }

    /// Addresses flagged so far, in detection order
    #[must_use]
    pub fn violators(&self) -> &IndexSet<Address> {
        &self.violators
    }

    /// Whether any address has been flagged
    #[must_use]
    pub fn has_violations(&self) -> bool {
        !self.violators.is_empty()
    }

    /// Reads recorded for an address before its first write
    #[must_use]
    pub fn witnesses(&self, address: Address) -> &[ReadWitness] {
        self.reads.get(&address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Instruction that first wrote an address in this segment
    #[must_use]
    pub fn first_writer(&self, address: Address) -> Option<OriginId> {
        self.written.get(&address).copied()
    }

    /// Number of lines in the history
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.history.len()
    }

    /// Build the report for this segment, or `None` if nothing was flagged
    #[must_use]
    pub fn violation(&self) -> Option<ViolationRecord> {
        if !self.has_violations() {
            return None;
        }
        let lines = self
            .history
            .iter()
            .filter(|h| h.address.is_some_and(|a| self.violators.contains(&a)))
            .map(|h| h.text.clone())
            .collect();
        Some(ViolationRecord::new(self.violators.iter().copied().collect(), lines))
    }
}
