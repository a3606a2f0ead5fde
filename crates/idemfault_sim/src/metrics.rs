//! Persisted run metrics.
//!
//! One [`RunMetrics`] per run, stored as a JSON object:
//!
//! ```json
//! {
//!   "cycles": 4200,
//!   "hash": "deadbeefdeadbeef00112233",
//!   "fail": [{ "time": 1000, "last_fail": 1000, "pc": "0x00000200", "wasted": 150 }],
//!   "checkpoints": [{ "time": 900, "last_cp": 300, "ret_addr": "0x000001a4" }]
//! }
//! ```

use idemfault_core::{OutputHash, ProgramMarker};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A simulated power failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    /// Total cycles when the failure fired
    pub time: u64,
    /// Cycles since the previous failure (or run start)
    #[serde(rename = "last_fail")]
    pub cycles_since_last_failure: u64,
    /// Program counter at the failure
    #[serde(rename = "pc")]
    pub marker: ProgramMarker,
    /// Cycles lost between the last checkpoint and the completed restore
    #[serde(rename = "wasted")]
    pub wasted_cycles: u64,
}

impl FailureEvent {
    /// Create a failure event; wasted cycles are filled in on restore
    #[must_use]
    pub fn new(time: u64, cycles_since_last_failure: u64, marker: ProgramMarker) -> Self {
        Self {
            time,
            cycles_since_last_failure,
            marker,
            wasted_cycles: 0,
        }
    }
}

/// Timing sampled when a checkpoint routine returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointTiming {
    /// Total cycles at checkpoint exit
    pub time: u64,
    /// Cycles since the previous checkpoint exit
    #[serde(rename = "last_cp")]
    pub interval: u64,
    /// Return address of the checkpoint call
    #[serde(rename = "ret_addr")]
    pub return_marker: ProgramMarker,
}

/// Metrics errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Metrics file could not be read or written
    #[error("Metrics I/O failed for {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// I/O cause
        #[source]
        source: io::Error,
    },

    /// Metrics file content is malformed
    #[error("Malformed metrics in {path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Decoding cause
        #[source]
        source: serde_json::Error,
    },

    /// Metrics could not be encoded
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything recorded about one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Total cycles at the end of the run (or at the snapshot)
    #[serde(rename = "cycles")]
    pub total_cycles: u64,
    /// Final output hash; absent for partial snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<OutputHash>,
    /// Failures in firing order
    #[serde(rename = "fail")]
    pub failures: Vec<FailureEvent>,
    /// Checkpoint exits in order
    pub checkpoints: Vec<CheckpointTiming>,
}

impl RunMetrics {
    /// Create empty metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the run reached program exit
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.hash.is_some()
    }

    /// Per-failure intervals, in order, for deterministic replay
    #[must_use]
    pub fn replay_sequence(&self) -> Vec<u64> {
        self.failures.iter().map(|f| f.cycles_since_last_failure).collect()
    }

    /// Sum of wasted cycles over all failures
    #[must_use]
    pub fn total_wasted(&self) -> u64 {
        self.failures.iter().map(|f| f.wasted_cycles).sum()
    }

    /// Serialize to JSON
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn to_json(&self) -> Result<String, MetricsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to a file, replacing any previous content
    ///
    /// # Errors
    ///
    /// Returns error if encoding or writing fails
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MetricsError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| MetricsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read from a file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is malformed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MetricsError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| MetricsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json).map_err(|source| MetricsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load a persisted run and extract its failure intervals for replay.
///
/// Each recorded failure is logged as `Fail <n>: pc=<marker>`.
///
/// # Errors
///
/// Returns error if the file cannot be read or is malformed
pub fn load_replay_sequence(path: impl AsRef<Path>) -> Result<Vec<u64>, MetricsError> {
    let path = path.as_ref();
    let metrics = RunMetrics::load(path)?;
    for (n, failure) in metrics.failures.iter().enumerate() {
        tracing::info!("Fail {}: pc={}", n, failure.marker);
    }
    tracing::info!(path = %path.display(), failures = metrics.failures.len(), "loaded replay sequence");
    Ok(metrics.replay_sequence())
}
