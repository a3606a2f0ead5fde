//! Checkpoint segmenter driving the per-segment analysis.

use crate::report::{ViolationReporter, format_addresses};
use crate::segment::CheckpointSegment;
use idemfault_core::{Address, MemoryAccessEvent};
use idemfault_trace::{TraceError, TraceLine, TraceReader};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

/// Analyzer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Address that is never flagged, whatever its aliasing
    pub ignored: Option<Address>,
}

impl AnalyzerConfig {
    /// Create a config with no ignored address
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ignored address
    #[must_use]
    pub fn with_ignored(mut self, address: Address) -> Self {
        self.ignored = Some(address);
        self
    }
}

/// Whether the analyzer wants more input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep feeding events
    Continue,
    /// Program exit was seen
    Stop,
}

/// Analysis errors
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// Trace could not be read
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// Report output failed
    #[error("Failed to write report: {0}")]
    Output(#[from] io::Error),
}

/// Outcome of analyzing one trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Distinct violating addresses across the run
    pub violators: Vec<Address>,
    /// Segments closed by a checkpoint or program exit
    pub segments: usize,
    /// Reports printed
    pub reports_emitted: usize,
    /// Reports suppressed as duplicates
    pub reports_suppressed: usize,
    /// Lines that matched no grammar
    pub unrecognized: usize,
    /// Whether a program exit marker ended the stream
    pub exited: bool,
}

/// Folds an ordered event stream into segments and reports violations.
///
/// Segment state never survives a boundary: a fresh [`CheckpointSegment`]
/// replaces the live one at every checkpoint.
pub struct IdempotencyAnalyzer<W> {
    config: AnalyzerConfig,
    segment: CheckpointSegment,
    reporter: ViolationReporter<W>,
    segments: usize,
    unrecognized: usize,
    exited: bool,
}

impl<W: Write> IdempotencyAnalyzer<W> {
    /// Create an analyzer reporting to `out`
    #[must_use]
    pub fn new(config: AnalyzerConfig, out: W) -> Self {
        Self {
            config,
            segment: CheckpointSegment::new(),
            reporter: ViolationReporter::new(out),
            segments: 0,
            unrecognized: 0,
            exited: false,
        }
    }

    /// Dispatch one classified trace line
    ///
    /// # Errors
    ///
    /// Returns error if a report cannot be written
    pub fn feed(&mut self, line: TraceLine) -> io::Result<Flow> {
        if self.exited {
            return Ok(Flow::Stop);
        }
        match line {
            TraceLine::Checkpoint { .. } => self.on_checkpoint().map(|()| Flow::Continue),
            TraceLine::ProgramExit { .. } => self.on_program_exit().map(|()| Flow::Stop),
            TraceLine::Access(event) => {
                self.on_access(&event);
                Ok(Flow::Continue)
            }
            TraceLine::Unrecognized(text) => {
                self.unrecognized += 1;
                self.segment.record_other(text);
                Ok(Flow::Continue)
            }
        }
    }

    /// Fold a memory access into the live segment
    pub fn on_access(&mut self, event: &MemoryAccessEvent) {
        if let Some(address) = self.segment.observe(event, self.config.ignored) {
            tracing::debug!(%address, origin = %event.origin, "aliasing first write");
        }
    }

    /// Close the live segment at a checkpoint boundary
    ///
    /// # Errors
    ///
    /// Returns error if a report cannot be written
    pub fn on_checkpoint(&mut self) -> io::Result<()> {
        self.flush()
    }

    /// Close the live segment at program exit; later input is ignored
    ///
    /// # Errors
    ///
    /// Returns error if a report cannot be written
    pub fn on_program_exit(&mut self) -> io::Result<()> {
        self.flush()?;
        self.exited = true;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        let segment = std::mem::take(&mut self.segment);
        self.segments += 1;
        if let Some(record) = segment.violation() {
            self.reporter.report(&record)?;
        }
        Ok(())
    }

    /// Live segment, for inspection
    #[must_use]
    pub fn segment(&self) -> &CheckpointSegment {
        &self.segment
    }

    /// Print the run-wide violator set and return the summary.
    ///
    /// The live segment is not flushed: without a closing marker its
    /// accesses never reach a report.
    ///
    /// # Errors
    ///
    /// Returns error if writing fails
    pub fn finish(mut self) -> io::Result<AnalysisSummary> {
        if self.segment.has_violations() {
            tracing::warn!(
                addresses = %format_addresses(self.segment.violators()),
                "trace ended inside a segment; its violations are not reported"
            );
        }
        self.reporter.finish()?;
        let summary = AnalysisSummary {
            violators: self.reporter.all_violators().iter().copied().collect(),
            segments: self.segments,
            reports_emitted: self.reporter.emitted_count(),
            reports_suppressed: self.reporter.suppressed_count(),
            unrecognized: self.unrecognized,
            exited: self.exited,
        };
        tracing::info!(
            violators = summary.violators.len(),
            segments = summary.segments,
            reports = summary.reports_emitted,
            suppressed = summary.reports_suppressed,
            "idempotency check finished"
        );
        Ok(summary)
    }
}

/// Analyze a whole trace, streaming reports to `out`.
///
/// Stops consuming at the first program exit marker.
///
/// # Errors
///
/// Returns error if the trace cannot be read or reports cannot be written
pub fn check_trace<R: BufRead, W: Write>(
    reader: TraceReader<R>,
    config: AnalyzerConfig,
    out: W,
) -> Result<AnalysisSummary, AnalyzeError> {
    let mut analyzer = IdempotencyAnalyzer::new(config, out);
    for line in reader {
        if analyzer.feed(line?)? == Flow::Stop {
            break;
        }
    }
    Ok(analyzer.finish()?)
}
