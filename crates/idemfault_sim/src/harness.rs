//! Drive loop for a fault-injected run.

use crate::collector::MetricsSink;
use crate::config::FaultConfig;
use crate::metrics::{MetricsError, RunMetrics};
use crate::scheduler::{FaultScheduler, SchedulerError};
use crate::target::{StopEvent, Target, TargetError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Harness errors
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Scheduling failed, including stalls
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Metrics could not be loaded or written
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// The target misbehaved
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The program exited; metrics carry the final hash
    Completed(RunMetrics),
    /// Stopped from outside; metrics are a partial snapshot
    Interrupted(RunMetrics),
    /// The target stopped for an unrecognized reason
    Aborted {
        /// What happened
        reason: String,
        /// Partial snapshot
        metrics: RunMetrics,
    },
}

impl RunOutcome {
    /// Metrics recorded, complete or partial
    #[must_use]
    pub fn metrics(&self) -> &RunMetrics {
        match self {
            Self::Completed(metrics) | Self::Interrupted(metrics) => metrics,
            Self::Aborted { metrics, .. } => metrics,
        }
    }

    /// Whether the program reached its exit
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Runs a [`Target`] under a [`FaultScheduler`], recording metrics.
///
/// Each harness drives one run. Metrics are written to the configured path
/// on every exit path: complete on program exit, a partial snapshot
/// otherwise.
pub struct FaultHarness<T: Target> {
    target: T,
    scheduler: FaultScheduler,
    metrics_path: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl<T: Target> FaultHarness<T> {
    /// Create a harness
    #[must_use]
    pub fn new(target: T, scheduler: FaultScheduler, metrics_path: impl Into<PathBuf>) -> Self {
        Self {
            target,
            scheduler,
            metrics_path: metrics_path.into(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a harness from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the policy cannot be built
    pub fn from_config(target: T, config: &FaultConfig) -> Result<Self, HarnessError> {
        let policy = config.policy.build()?;
        let scheduler =
            FaultScheduler::new(policy, &config.seed).with_stall_threshold(config.stall_threshold);
        Ok(Self::new(target, scheduler, &config.metrics_path))
    }

    /// Share an external cancellation flag
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the run before the next resume
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Scheduler state
    #[must_use]
    pub fn scheduler(&self) -> &FaultScheduler {
        &self.scheduler
    }

    /// Metrics output path
    #[must_use]
    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }

    /// The driven target
    #[must_use]
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Give the target back
    #[must_use]
    pub fn into_target(self) -> T {
        self.target
    }

    /// Drive the target until it exits, is interrupted or fails.
    ///
    /// # Errors
    ///
    /// Returns error on a stall, a target failure or a metrics write
    /// failure. A partial snapshot is still written in the first two cases.
    pub fn run(&mut self) -> Result<RunOutcome, HarnessError> {
        let mut sink = MetricsSink::new(&self.metrics_path);
        self.target.arm_failure(self.scheduler.threshold())?;
        tracing::info!(
            path = %self.metrics_path.display(),
            threshold = ?self.scheduler.threshold(),
            "starting fault-injected run"
        );

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::warn!("run cancelled");
                return Ok(RunOutcome::Interrupted(sink.snapshot()?));
            }

            let event = match self.target.resume() {
                Ok(event) => event,
                Err(TargetError::Interrupted) => {
                    tracing::warn!("target interrupted");
                    return Ok(RunOutcome::Interrupted(sink.snapshot()?));
                }
                Err(e) => return Err(e.into()),
            };

            match event {
                StopEvent::CheckpointReached => self.on_checkpoint(&mut sink)?,
                StopEvent::RestoreCompleted => self.on_restore(&mut sink)?,
                StopEvent::FailureTriggered => self.on_failure(&mut sink)?,
                StopEvent::ProgramExited => return self.on_exit(sink),
                StopEvent::Unknown => {
                    let reason = "target stopped for an unknown reason".to_string();
                    tracing::error!("{reason}");
                    let metrics = sink.snapshot()?;
                    return Ok(RunOutcome::Aborted { reason, metrics });
                }
            }
        }
    }

    fn on_checkpoint(&mut self, sink: &mut MetricsSink) -> Result<(), HarnessError> {
        let cycles = self.target.total_cycles()?;
        let ret = self.target.return_marker()?;
        let timing = sink.collector_mut().on_checkpoint_exit(cycles, ret);
        tracing::debug!(time = timing.time, interval = timing.interval, ret = %ret, "checkpoint exit");
        Ok(())
    }

    fn on_restore(&mut self, sink: &mut MetricsSink) -> Result<(), HarnessError> {
        let cycles = self.target.total_cycles()?;
        if let Some(wasted) = sink.collector_mut().on_restore_exit(cycles) {
            tracing::debug!(time = cycles, wasted, "restore exit");
        }
        Ok(())
    }

    fn on_failure(&mut self, sink: &mut MetricsSink) -> Result<(), HarnessError> {
        let total = self.target.total_cycles()?;
        let since = self.target.cycles_since_reset()?;
        let marker = self.target.program_marker()?;
        sink.collector_mut().observe_cycles(total);

        let event = self.scheduler.trigger(total, since, marker)?;
        sink.collector_mut().record_failure(event);

        self.target.reset_processor()?;
        self.target.reset_cycle_counter()?;
        self.target.arm_failure(self.scheduler.threshold())?;
        Ok(())
    }

    fn on_exit(&mut self, sink: MetricsSink) -> Result<RunOutcome, HarnessError> {
        let hash = self.target.final_hash()?;
        let total = self.target.total_cycles()?;
        let metrics = sink.complete(total, hash)?;
        if let Some(hash) = &metrics.hash {
            tracing::info!(%hash, cycles = total, failures = metrics.failures.len(), "program exited");
        }
        Ok(RunOutcome::Completed(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::policy::FailurePolicy;
    use crate::seed::SimSeed;
    use idemfault_core::{OutputHash, ProgramMarker};

    /// Cycle-accurate stand-in for the simulator.
    ///
    /// Checkpoints and program exit are scheduled on total cycles; failures
    /// on cycles since reset. The earliest pending event wins, a failure
    /// first on ties.
    struct ScriptedTarget {
        total: u64,
        since: u64,
        armed: Option<u64>,
        exit_at: u64,
        checkpoint_every: Option<u64>,
        pc: ProgramMarker,
        restore_cost: u64,
        restore_pending: bool,
        stop_unknown: bool,
        resets: usize,
    }

    impl ScriptedTarget {
        fn new(exit_at: u64) -> Self {
            Self {
                total: 0,
                since: 0,
                armed: None,
                exit_at,
                checkpoint_every: None,
                pc: ProgramMarker::new(0x200),
                restore_cost: 0,
                restore_pending: false,
                stop_unknown: false,
                resets: 0,
            }
        }

        fn with_checkpoints(mut self, every: u64, restore_cost: u64) -> Self {
            self.checkpoint_every = Some(every);
            self.restore_cost = restore_cost;
            self
        }

        fn advance(&mut self, cycles: u64) {
            self.total += cycles;
            self.since += cycles;
        }
    }

    impl Target for ScriptedTarget {
        fn resume(&mut self) -> Result<StopEvent, TargetError> {
            if self.stop_unknown {
                return Ok(StopEvent::Unknown);
            }
            if self.restore_pending {
                self.restore_pending = false;
                self.advance(self.restore_cost);
                return Ok(StopEvent::RestoreCompleted);
            }

            let failure = self.armed.map(|t| t.saturating_sub(self.since));
            let checkpoint = self
                .checkpoint_every
                .map(|every| (self.total / every + 1) * every - self.total);
            let exit = self.exit_at.saturating_sub(self.total);

            if let Some(delta) = failure.filter(|d| *d <= exit && checkpoint.is_none_or(|c| *d <= c)) {
                self.advance(delta);
                return Ok(StopEvent::FailureTriggered);
            }
            if let Some(delta) = checkpoint.filter(|c| *c < exit) {
                self.advance(delta);
                return Ok(StopEvent::CheckpointReached);
            }
            self.advance(exit);
            Ok(StopEvent::ProgramExited)
        }

        fn total_cycles(&mut self) -> Result<u64, TargetError> {
            Ok(self.total)
        }

        fn cycles_since_reset(&mut self) -> Result<u64, TargetError> {
            Ok(self.since)
        }

        fn program_marker(&mut self) -> Result<ProgramMarker, TargetError> {
            Ok(self.pc)
        }

        fn return_marker(&mut self) -> Result<ProgramMarker, TargetError> {
            Ok(ProgramMarker::new(0x1a4))
        }

        fn arm_failure(&mut self, threshold: Option<u64>) -> Result<(), TargetError> {
            self.armed = threshold;
            Ok(())
        }

        fn reset_processor(&mut self) -> Result<(), TargetError> {
            self.resets += 1;
            self.restore_pending = true;
            Ok(())
        }

        fn reset_cycle_counter(&mut self) -> Result<(), TargetError> {
            self.since = 0;
            Ok(())
        }

        fn final_hash(&mut self) -> Result<OutputHash, TargetError> {
            Ok(OutputHash::from_hex("deadbeefdeadbeef00112233").expect("valid hash"))
        }
    }

    fn harness(
        target: ScriptedTarget,
        policy: FailurePolicy,
        dir: &tempfile::TempDir,
    ) -> FaultHarness<ScriptedTarget> {
        let scheduler = FaultScheduler::new(policy, &SimSeed::default());
        FaultHarness::new(target, scheduler, dir.path().join("metrics.json"))
    }

    #[test]
    fn test_fixed_frequency_stall_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = FaultScheduler::new(FailurePolicy::fixed(1000).unwrap(), &SimSeed::default())
            .with_stall_threshold(3);
        let mut harness = FaultHarness::new(ScriptedTarget::new(1_000_000), scheduler, dir.path().join("metrics.json"));

        let err = harness.run().unwrap_err();
        match err {
            HarnessError::Scheduler(SchedulerError::Stalled { marker, threshold }) => {
                assert_eq!(marker, ProgramMarker::new(0x200));
                assert_eq!(threshold, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        let snapshot = RunMetrics::load(harness.metrics_path()).unwrap();
        let times: Vec<u64> = snapshot.failures.iter().map(|f| f.time).collect();
        assert_eq!(times, vec![1000, 2000, 3000]);
        assert!(snapshot.hash.is_none());
        assert_eq!(harness.target().resets, 3);
    }

    #[test]
    fn test_replay_reproduces_failure_times() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(
            ScriptedTarget::new(10_000),
            FailurePolicy::replay(vec![1000, 1500, 1700], false),
            &dir,
        );

        let outcome = harness.run().unwrap();
        assert!(outcome.is_completed());
        let metrics = outcome.metrics();
        let times: Vec<u64> = metrics.failures.iter().map(|f| f.time).collect();
        assert_eq!(times, vec![1000, 2500, 4200]);
        assert_eq!(metrics.replay_sequence(), vec![1000, 1500, 1700]);
        assert_eq!(metrics.total_cycles, 10_000);
        assert_eq!(&RunMetrics::load(harness.metrics_path()).unwrap(), metrics);
    }

    #[test]
    fn test_replay_from_recorded_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = harness(
            ScriptedTarget::new(10_000),
            FailurePolicy::replay(vec![1000, 1500, 1700], false),
            &dir,
        );
        let recorded = first.run().unwrap().metrics().clone();

        let replay_dir = tempfile::tempdir().unwrap();
        let mut second = harness(
            ScriptedTarget::new(10_000),
            FailurePolicy::replay_run(&recorded, true),
            &replay_dir,
        );
        let replayed = second.run().unwrap();
        let times: Vec<u64> = replayed.metrics().failures.iter().map(|f| f.time).collect();
        assert_eq!(times, vec![1000, 2500]);
        assert!(replayed.is_completed());
    }

    #[test]
    fn test_wasted_cycles_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(
            ScriptedTarget::new(1500).with_checkpoints(400, 50),
            FailurePolicy::fixed(1000).unwrap(),
            &dir,
        );

        let outcome = harness.run().unwrap();
        let metrics = outcome.metrics();
        assert_eq!(metrics.failures.len(), 1);
        assert_eq!(metrics.failures[0].time, 1000);
        assert_eq!(metrics.failures[0].wasted_cycles, 250);

        let cps: Vec<(u64, u64)> = metrics.checkpoints.iter().map(|c| (c.time, c.interval)).collect();
        assert_eq!(cps, vec![(400, 400), (800, 400), (1200, 400)]);
        assert_eq!(metrics.checkpoints[0].return_marker, ProgramMarker::new(0x1a4));
        assert_eq!(metrics.total_cycles, 1500);
    }

    #[test]
    fn test_cancel_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(ScriptedTarget::new(10_000), FailurePolicy::fixed(1000).unwrap(), &dir);
        harness.cancel_flag().store(true, Ordering::SeqCst);

        let outcome = harness.run().unwrap();
        assert!(matches!(outcome, RunOutcome::Interrupted(_)));
        assert!(harness.metrics_path().exists());
    }

    #[test]
    fn test_unknown_stop_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut target = ScriptedTarget::new(10_000);
        target.stop_unknown = true;
        let mut harness = harness(target, FailurePolicy::fixed(1000).unwrap(), &dir);

        let outcome = harness.run().unwrap();
        assert!(matches!(outcome, RunOutcome::Aborted { .. }));
        assert!(!outcome.metrics().is_complete());
        assert!(harness.metrics_path().exists());
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = FaultConfig::new(PolicyConfig::FixedFrequency { cycles: 4000 })
            .with_metrics_path(dir.path().join("run.json"));
        let mut harness = FaultHarness::from_config(ScriptedTarget::new(10_000), &config).unwrap();

        let outcome = harness.run().unwrap();
        let times: Vec<u64> = outcome.metrics().failures.iter().map(|f| f.time).collect();
        assert_eq!(times, vec![4000, 8000]);
        assert!(dir.path().join("run.json").exists());
    }
}
