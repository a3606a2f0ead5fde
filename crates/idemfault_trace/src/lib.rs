//! IDEMFAULT Trace Parsing
//!
//! Line-oriented reader for the memory-access traces emitted by the
//! instruction-level simulator. Parsing is best-effort: lines that match no
//! known grammar are passed through as [`TraceLine::Unrecognized`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod line;
pub mod reader;
pub mod sections;

pub use line::TraceLine;
pub use reader::{TraceError, TraceReader};
pub use sections::section_lengths;
