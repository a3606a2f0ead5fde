//! Fault injection configuration.

use crate::harness::HarnessError;
use crate::metrics::load_replay_sequence;
use crate::policy::FailurePolicy;
use crate::scheduler::DEFAULT_STALL_THRESHOLD;
use crate::seed::SimSeed;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Serializable description of a [`FailurePolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Fail every `cycles` cycles
    FixedFrequency {
        /// Cycles between failures
        cycles: u64,
    },
    /// Fail after a normally distributed number of cycles
    GaussianRandom {
        /// Mean cycles between failures
        mean: f64,
        /// Standard deviation
        std_dev: f64,
    },
    /// Replay the failure timing recorded in a metrics file
    Replay {
        /// Metrics file of the run to reproduce
        metrics: PathBuf,
        /// Leave the final recorded failure out
        #[serde(default)]
        skip_last: bool,
    },
}

impl PolicyConfig {
    /// Build the runtime policy, loading replay metrics if needed
    ///
    /// # Errors
    ///
    /// Returns error if the parameters are invalid or replay metrics cannot be loaded
    pub fn build(&self) -> Result<FailurePolicy, HarnessError> {
        let policy = match self {
            Self::FixedFrequency { cycles } => FailurePolicy::fixed(*cycles)?,
            Self::GaussianRandom { mean, std_dev } => FailurePolicy::gaussian(*mean, *std_dev)?,
            Self::Replay { metrics, skip_last } => {
                FailurePolicy::replay(load_replay_sequence(metrics)?, *skip_last)
            }
        };
        Ok(policy)
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::GaussianRandom {
            mean: 2_400_000.0,
            std_dev: 240_000.0,
        }
    }
}

/// Settings for one fault-injected run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Failure policy
    pub policy: PolicyConfig,
    /// Consecutive same-location failures tolerated (fixed frequency only)
    pub stall_threshold: usize,
    /// Seed for randomized policies
    pub seed: SimSeed,
    /// Where run metrics are written
    pub metrics_path: PathBuf,
}

impl FaultConfig {
    /// Create a config with the given policy and defaults elsewhere
    #[must_use]
    pub fn new(policy: PolicyConfig) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Set the stall threshold
    #[must_use]
    pub fn with_stall_threshold(mut self, threshold: usize) -> Self {
        self.stall_threshold = threshold;
        self
    }

    /// Set the seed
    #[must_use]
    pub fn with_seed(mut self, seed: SimSeed) -> Self {
        self.seed = seed;
        self
    }

    /// Set the metrics output path
    #[must_use]
    pub fn with_metrics_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_path = path.into();
        self
    }

    /// Load from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&json).map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            seed: SimSeed::default(),
            metrics_path: PathBuf::from("metrics.json"),
        }
    }
}
