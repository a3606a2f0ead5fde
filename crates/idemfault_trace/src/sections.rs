//! Checkpoint section lengths.

use crate::line::TraceLine;
use crate::reader::{TraceError, TraceReader};
use std::io::BufRead;

/// Distance between consecutive checkpoint values in a trace.
///
/// The first section is measured from zero. Values are signed because the
/// `CP:` field is whatever the target printed and is not guaranteed to grow.
/// Checkpoints without a readable value are skipped.
///
/// # Errors
///
/// Returns error if the trace cannot be read
pub fn section_lengths<R: BufRead>(reader: TraceReader<R>) -> Result<Vec<i128>, TraceError> {
    let mut last = 0i128;
    let mut lengths = Vec::new();
    for line in reader {
        if let TraceLine::Checkpoint { id: Some(id), .. } = line? {
            let id = i128::from(id);
            lengths.push(id - last);
            last = id;
        }
    }
    Ok(lengths)
}
