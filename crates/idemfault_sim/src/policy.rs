//! Failure-trigger policies.

use crate::metrics::RunMetrics;
use crate::scheduler::SchedulerError;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::f64::consts::TAU;

/// How the next failure threshold (cycles since reset) is chosen
#[derive(Debug, Clone, PartialEq)]
pub enum FailurePolicy {
    /// Same threshold after every failure
    FixedFrequency {
        /// Cycles between failures
        cycles: u64,
    },
    /// Threshold drawn from a normal distribution, draws below one cycle rejected
    GaussianRandom {
        /// Mean cycles between failures
        mean: f64,
        /// Standard deviation
        std_dev: f64,
    },
    /// Thresholds taken in order from a prior run
    DeterministicReplay {
        /// Thresholds not yet armed
        remaining: VecDeque<u64>,
    },
}

impl FailurePolicy {
    /// Fixed cadence
    ///
    /// # Errors
    ///
    /// Returns error if `cycles` is zero
    pub fn fixed(cycles: u64) -> Result<Self, SchedulerError> {
        if cycles == 0 {
            return Err(SchedulerError::InvalidPolicy(
                "fixed frequency must be at least one cycle".to_string(),
            ));
        }
        Ok(Self::FixedFrequency { cycles })
    }

    /// Gaussian cadence
    ///
    /// # Errors
    ///
    /// Returns error if the parameters are not finite, the mean is below one
    /// cycle or the deviation is negative
    pub fn gaussian(mean: f64, std_dev: f64) -> Result<Self, SchedulerError> {
        if !mean.is_finite() || !std_dev.is_finite() || mean < 1.0 || std_dev < 0.0 {
            return Err(SchedulerError::InvalidPolicy(format!(
                "gaussian needs finite mean >= 1 and std_dev >= 0, got mean={mean} std_dev={std_dev}"
            )));
        }
        Ok(Self::GaussianRandom { mean, std_dev })
    }

    /// Replay an explicit interval sequence.
    ///
    /// With `skip_last` the final interval is never armed, so the run goes
    /// on to finish instead of failing again at the recorded point.
    #[must_use]
    pub fn replay(mut sequence: Vec<u64>, skip_last: bool) -> Self {
        if skip_last {
            sequence.pop();
        }
        Self::DeterministicReplay {
            remaining: sequence.into(),
        }
    }

    /// Replay the failure timing of a persisted run
    #[must_use]
    pub fn replay_run(metrics: &RunMetrics, skip_last: bool) -> Self {
        Self::replay(metrics.replay_sequence(), skip_last)
    }

    /// Whether consecutive same-location failures should be watched
    #[must_use]
    pub fn detects_stalls(&self) -> bool {
        matches!(self, Self::FixedFrequency { .. })
    }

    /// Next threshold to arm, or `None` once a replay is exhausted
    pub fn next_threshold(&mut self, rng: &mut ChaCha8Rng) -> Option<u64> {
        match self {
            Self::FixedFrequency { cycles } => Some(*cycles),
            Self::GaussianRandom { mean, std_dev } => Some(draw_threshold(rng, *mean, *std_dev)),
            Self::DeterministicReplay { remaining } => remaining.pop_front(),
        }
    }
}

/// Box-Muller draw, truncated toward zero, resampled until at least one cycle
fn draw_threshold(rng: &mut ChaCha8Rng, mean: f64, std_dev: f64) -> u64 {
    loop {
        let u1 = 1.0 - rng.r#gen::<f64>();
        let u2 = rng.r#gen::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos();
        let draw = (mean + std_dev * z).trunc();
        if draw >= 1.0 {
            return draw as u64;
        }
    }
}
