//! Violation reports and run-wide deduplication.

use idemfault_core::Address;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{self, Write};

/// Render an address list as `[0x20000000, 0x20000004]`
#[must_use]
pub fn format_addresses<'a>(addresses: impl IntoIterator<Item = &'a Address>) -> String {
    let joined: Vec<String> = addresses.into_iter().map(ToString::to_string).collect();
    format!("[{}]", joined.join(", "))
}

/// Violations found in one flushed segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Violating addresses, in detection order
    pub addresses: Vec<Address>,
    /// Segment lines touching any violating address, in trace order
    pub lines: Vec<String>,
}

impl ViolationRecord {
    /// Create a new record
    #[must_use]
    pub fn new(addresses: Vec<Address>, lines: Vec<String>) -> Self {
        Self { addresses, lines }
    }

    /// Formatted report text; two records are duplicates iff this matches
    #[must_use]
    pub fn render(&self) -> String {
        let mut s = String::from("Found idempotency violation!\n");
        s.push_str(&format_addresses(&self.addresses));
        s.push('\n');
        s.push_str("----- BEGIN -----\n");
        for line in &self.lines {
            s.push_str(line);
            s.push('\n');
        }
        s.push_str("------ END ------\n");
        s
    }
}

/// Prints each distinct report once and accumulates every violator seen
pub struct ViolationReporter<W> {
    out: W,
    emitted: HashSet<String>,
    all_violators: IndexSet<Address>,
    suppressed: usize,
}

impl<W: Write> ViolationReporter<W> {
    /// Create a reporter writing to `out`
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out,
            emitted: HashSet::new(),
            all_violators: IndexSet::new(),
            suppressed: 0,
        }
    }

    /// Emit a record unless an identical report was already printed.
    ///
    /// Returns whether the report was printed.
    ///
    /// # Errors
    ///
    /// Returns error if writing the report fails
    pub fn report(&mut self, record: &ViolationRecord) -> io::Result<bool> {
        self.all_violators.extend(record.addresses.iter().copied());

        let text = record.render();
        if self.emitted.contains(&text) {
            self.suppressed += 1;
            tracing::trace!(addresses = %format_addresses(&record.addresses), "duplicate report suppressed");
            return Ok(false);
        }
        writeln!(self.out, "{}", text)?;
        self.emitted.insert(text);
        Ok(true)
    }

    /// Print the run-wide set of violating addresses
    ///
    /// # Errors
    ///
    /// Returns error if writing fails
    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out, "All aliasing addresses:")?;
        writeln!(self.out, "{}", format_addresses(&self.all_violators))?;
        self.out.flush()
    }

    /// Distinct violating addresses across the run, in first-seen order
    #[must_use]
    pub fn all_violators(&self) -> &IndexSet<Address> {
        &self.all_violators
    }

    /// Number of distinct reports printed
    #[must_use]
    pub fn emitted_count(&self) -> usize {
        self.emitted.len()
    }

    /// Number of reports suppressed as duplicates
    #[must_use]
    pub fn suppressed_count(&self) -> usize {
        self.suppressed
    }

    /// Recover the output sink
    pub fn into_inner(self) -> W {
        self.out
    }
}
