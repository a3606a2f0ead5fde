//! Verification results.

use idemfault_core::OutputHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One run as seen by the verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run label, usually the metrics file stem
    pub label: String,
    /// Final hash, absent for partial runs
    pub hash: Option<OutputHash>,
    /// Total cycles
    pub cycles: u64,
    /// Whether the run matched the reference hash
    pub passed: bool,
}

impl RunSummary {
    /// `<label>: <hash> -- <cycles>`
    #[must_use]
    pub fn line(&self) -> String {
        let hash = self.hash.as_ref().map_or("<none>", OutputHash::as_str);
        format!("{}: {} -- {}", self.label, hash, self.cycles)
    }
}

/// Pass/fail for one target program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetVerdict {
    /// Target name
    pub target: String,
    /// Whether every run agreed
    pub passed: bool,
    /// Runs in the order given
    pub runs: Vec<RunSummary>,
}

impl TargetVerdict {
    /// Hash every other run was compared against
    #[must_use]
    pub fn reference(&self) -> Option<&OutputHash> {
        self.runs.first().and_then(|r| r.hash.as_ref())
    }

    /// Runs that disagreed
    #[must_use]
    pub fn failed_runs(&self) -> Vec<&RunSummary> {
        self.runs.iter().filter(|r| !r.passed).collect()
    }

    /// Closing line
    #[must_use]
    pub fn conclusion(&self) -> String {
        if self.passed {
            format!("{} passes all checks!", self.target)
        } else {
            format!("{} failed checks!", self.target)
        }
    }
}

impl fmt::Display for TargetVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Verifying {}!", self.target)?;
        for run in &self.runs {
            writeln!(f, "{}", run.line())?;
        }
        write!(f, "{}", self.conclusion())
    }
}

/// Verdicts for every target checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Per-target results
    pub targets: Vec<TargetVerdict>,
}

impl VerificationReport {
    /// Whether every target passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.targets.iter().all(|t| t.passed)
    }

    /// Targets that failed
    #[must_use]
    pub fn failed_targets(&self) -> Vec<&TargetVerdict> {
        self.targets.iter().filter(|t| !t.passed).collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let passed = self.targets.iter().filter(|t| t.passed).count();
        format!(
            "Verification {}: {}/{} targets passed",
            if self.passed() { "PASSED" } else { "FAILED" },
            passed,
            self.targets.len()
        )
    }
}
