//! Hash agreement across repeated runs.

use crate::verdict::{RunSummary, TargetVerdict, VerificationReport};
use idemfault_sim::{MetricsError, RunMetrics};
use std::path::{Path, PathBuf};

/// Verification errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// A run's metrics could not be loaded
    #[error("Failed to load run for target {target}: {source}")]
    Load {
        /// Target being verified
        target: String,
        /// Load cause
        #[source]
        source: MetricsError,
    },
}

/// Compares final hashes of repeated runs.
///
/// Every run is compared against the first run's hash. A run without a hash
/// (a partial snapshot) never passes.
#[derive(Debug, Clone, Default)]
pub struct HashVerifier {
    allow_empty: bool,
}

impl HashVerifier {
    /// Create a verifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat a target with no runs as passing
    #[must_use]
    pub fn with_allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    /// Verify already-loaded runs of one target
    #[must_use]
    pub fn verify_runs(&self, target: &str, runs: &[(String, RunMetrics)]) -> TargetVerdict {
        let reference = runs.first().and_then(|(_, m)| m.hash.as_ref());
        let summaries: Vec<RunSummary> = runs
            .iter()
            .map(|(label, metrics)| RunSummary {
                label: label.clone(),
                hash: metrics.hash.clone(),
                cycles: metrics.total_cycles,
                passed: metrics.hash.is_some() && metrics.hash.as_ref() == reference,
            })
            .collect();

        let passed = if summaries.is_empty() {
            self.allow_empty
        } else {
            summaries.iter().all(|r| r.passed)
        };
        if passed {
            tracing::info!(target_name = target, runs = summaries.len(), "all run hashes agree");
        } else {
            tracing::warn!(
                target_name = target,
                failed = summaries.iter().filter(|r| !r.passed).count(),
                "run hashes disagree"
            );
        }

        TargetVerdict {
            target: target.to_string(),
            passed,
            runs: summaries,
        }
    }

    /// Load and verify one target's metrics files, labelled by file stem
    ///
    /// # Errors
    ///
    /// Returns error if any metrics file cannot be read or parsed
    pub fn verify_target(&self, target: &str, paths: &[PathBuf]) -> Result<TargetVerdict, VerifyError> {
        let runs = paths
            .iter()
            .map(|path| {
                RunMetrics::load(path)
                    .map(|metrics| (run_label(path), metrics))
                    .map_err(|source| VerifyError::Load {
                        target: target.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.verify_runs(target, &runs))
    }

    /// Verify several targets.
    ///
    /// A hash mismatch only fails its own target; a load error stops the
    /// whole verification.
    ///
    /// # Errors
    ///
    /// Returns error if any metrics file cannot be read or parsed
    pub fn verify_targets(&self, targets: &[(String, Vec<PathBuf>)]) -> Result<VerificationReport, VerifyError> {
        let mut report = VerificationReport::default();
        for (target, paths) in targets {
            report.targets.push(self.verify_target(target, paths)?);
        }
        Ok(report)
    }
}

fn run_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
