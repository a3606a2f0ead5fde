//! Run metrics accumulation and persistence.

use crate::metrics::{CheckpointTiming, FailureEvent, MetricsError, RunMetrics};
use idemfault_core::{OutputHash, ProgramMarker};
use std::path::{Path, PathBuf};

/// Accumulates failure and checkpoint timing for one run
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: RunMetrics,
    last_checkpoint_cycles: u64,
    last_seen_cycles: u64,
}

impl MetricsCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure
    pub fn record_failure(&mut self, event: FailureEvent) {
        self.observe_cycles(event.time);
        self.metrics.failures.push(event);
    }

    /// Sample a checkpoint exit; the interval is measured from the previous one
    pub fn on_checkpoint_exit(&mut self, cycles: u64, return_marker: ProgramMarker) -> CheckpointTiming {
        let timing = CheckpointTiming {
            time: cycles,
            interval: cycles.saturating_sub(self.last_checkpoint_cycles),
            return_marker,
        };
        self.last_checkpoint_cycles = cycles;
        self.observe_cycles(cycles);
        self.metrics.checkpoints.push(timing);
        timing
    }

    /// Sample a restore exit and charge the lost work to the latest failure.
    ///
    /// Returns the wasted cycles, or `None` if no failure has been recorded
    /// yet (the boot-time restore).
    pub fn on_restore_exit(&mut self, cycles: u64) -> Option<u64> {
        self.observe_cycles(cycles);
        let wasted = cycles.saturating_sub(self.last_checkpoint_cycles);
        match self.metrics.failures.last_mut() {
            Some(failure) => {
                failure.wasted_cycles = wasted;
                Some(wasted)
            }
            None => {
                tracing::debug!(cycles, "restore exit before any failure");
                None
            }
        }
    }

    /// Note the latest known total cycle count
    pub fn observe_cycles(&mut self, cycles: u64) {
        self.last_seen_cycles = self.last_seen_cycles.max(cycles);
    }

    /// Metrics so far
    #[must_use]
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Partial metrics for an abnormal end
    #[must_use]
    pub fn snapshot(&self) -> RunMetrics {
        RunMetrics {
            total_cycles: self.last_seen_cycles,
            ..self.metrics.clone()
        }
    }

    /// Complete metrics at program exit
    #[must_use]
    pub fn finish(self, total_cycles: u64, hash: OutputHash) -> RunMetrics {
        RunMetrics {
            total_cycles,
            hash: Some(hash),
            ..self.metrics
        }
    }
}

/// Collector bound to its output file.
///
/// Completed runs are written by [`MetricsSink::complete`]. A sink dropped on
/// any other path writes a partial snapshot, logging rather than returning
/// write errors.
#[derive(Debug)]
pub struct MetricsSink {
    path: PathBuf,
    collector: MetricsCollector,
    persisted: bool,
}

impl MetricsSink {
    /// Start collecting for `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            collector: MetricsCollector::new(),
            persisted: false,
        }
    }

    /// Output file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Underlying collector
    #[must_use]
    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }

    /// Underlying collector, mutable
    pub fn collector_mut(&mut self) -> &mut MetricsCollector {
        &mut self.collector
    }

    /// Finish the run and write complete metrics
    ///
    /// # Errors
    ///
    /// Returns error if the metrics cannot be written
    pub fn complete(mut self, total_cycles: u64, hash: OutputHash) -> Result<RunMetrics, MetricsError> {
        self.persisted = true;
        let collector = std::mem::take(&mut self.collector);
        let metrics = collector.finish(total_cycles, hash);
        metrics.save(&self.path)?;
        tracing::info!(
            path = %self.path.display(),
            cycles = metrics.total_cycles,
            failures = metrics.failures.len(),
            "run metrics written"
        );
        Ok(metrics)
    }

    /// Write a partial snapshot now
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot cannot be written
    pub fn snapshot(mut self) -> Result<RunMetrics, MetricsError> {
        self.persisted = true;
        let metrics = self.collector.snapshot();
        metrics.save(&self.path)?;
        tracing::warn!(
            path = %self.path.display(),
            failures = metrics.failures.len(),
            "partial run metrics written"
        );
        Ok(metrics)
    }
}

impl Drop for MetricsSink {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        let metrics = self.collector.snapshot();
        match metrics.save(&self.path) {
            Ok(()) => tracing::warn!(path = %self.path.display(), "run ended early, partial metrics written"),
            Err(e) => tracing::error!(error = %e, "failed to write partial metrics"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> OutputHash {
        OutputHash::from_hex("deadbeefdeadbeef00112233").unwrap()
    }

    #[test]
    fn test_checkpoint_intervals() {
        let mut collector = MetricsCollector::new();
        let first = collector.on_checkpoint_exit(300, ProgramMarker::new(0x1a4));
        let second = collector.on_checkpoint_exit(900, ProgramMarker::new(0x1a4));
        assert_eq!(first.interval, 300);
        assert_eq!(second.interval, 600);
        assert_eq!(collector.metrics().checkpoints.len(), 2);
    }

    #[test]
    fn test_wasted_cycles_backfilled() {
        let mut collector = MetricsCollector::new();
        collector.on_checkpoint_exit(900, ProgramMarker::new(0x1a4));
        collector.record_failure(FailureEvent::new(1000, 1000, ProgramMarker::new(0x200)));
        assert_eq!(collector.on_restore_exit(1050), Some(150));
        assert_eq!(collector.metrics().failures[0].wasted_cycles, 150);
    }

    #[test]
    fn test_restore_without_failure_ignored() {
        let mut collector = MetricsCollector::new();
        assert_eq!(collector.on_restore_exit(40), None);
        assert!(collector.metrics().failures.is_empty());
    }

    #[test]
    fn test_snapshot_and_finish() {
        let mut collector = MetricsCollector::new();
        collector.record_failure(FailureEvent::new(1000, 1000, ProgramMarker::new(0x200)));
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_cycles, 1000);
        assert!(!snapshot.is_complete());

        let done = collector.finish(5000, hash());
        assert_eq!(done.total_cycles, 5000);
        assert!(done.is_complete());
        assert_eq!(done.failures.len(), 1);
    }

    #[test]
    fn test_sink_complete_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let mut sink = MetricsSink::new(&path);
        sink.collector_mut().on_checkpoint_exit(100, ProgramMarker::new(0x10));
        let metrics = sink.complete(200, hash()).unwrap();

        let loaded = RunMetrics::load(&path).unwrap();
        assert_eq!(loaded, metrics);
        assert_eq!(loaded.hash, Some(hash()));
    }

    #[test]
    fn test_sink_drop_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        {
            let mut sink = MetricsSink::new(&path);
            sink.collector_mut()
                .record_failure(FailureEvent::new(1000, 1000, ProgramMarker::new(0x200)));
        }
        let loaded = RunMetrics::load(&path).unwrap();
        assert_eq!(loaded.failures.len(), 1);
        assert_eq!(loaded.hash, None);
    }

    #[test]
    fn test_sink_complete_propagates_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("metrics.json");
        let sink = MetricsSink::new(&path);
        assert!(matches!(sink.complete(1, hash()), Err(MetricsError::Io { .. })));
    }
}
