//! IDEMFAULT Idempotency Analysis
//!
//! Splits a memory-access stream into checkpoint-bounded segments and flags
//! first writes whose address was read earlier in the same segment by a
//! different instruction. Re-executing such a segment from its checkpoint is
//! not guaranteed to reproduce the same write.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analyzer;
pub mod report;
pub mod segment;

pub use analyzer::{AnalysisSummary, AnalyzeError, AnalyzerConfig, Flow, IdempotencyAnalyzer, check_trace};
pub use report::{ViolationRecord, ViolationReporter, format_addresses};
pub use segment::{CheckpointSegment, ReadWitness};
