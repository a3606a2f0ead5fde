//! Failure trigger scheduling and stall detection.

use crate::metrics::FailureEvent;
use crate::policy::FailurePolicy;
use crate::seed::SimSeed;
use idemfault_core::ProgramMarker;
use rand_chacha::ChaCha8Rng;

/// Consecutive same-location failures tolerated by default
pub const DEFAULT_STALL_THRESHOLD: usize = 10_000;

/// Scheduler errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The target keeps failing at the same place
    #[error(
        "{threshold} failures at {marker}, no progress being made; increase the number of cycles between failures"
    )]
    Stalled {
        /// Location of the repeated failures
        marker: ProgramMarker,
        /// Configured stall threshold
        threshold: usize,
    },

    /// Policy parameters are unusable
    #[error("Invalid failure policy: {0}")]
    InvalidPolicy(String),

    /// A failure fired while no threshold was armed
    #[error("Failure triggered at {marker} with no threshold armed")]
    NotArmed {
        /// Location reported by the target
        marker: ProgramMarker,
    },
}

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for cycles-since-reset to reach the threshold
    Armed(u64),
    /// Handling a failure
    Triggered,
    /// Nothing left to arm (replay exhausted)
    Disarmed,
}

/// Counts consecutive failures at the same program location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StallDetector {
    threshold: usize,
    last: Option<ProgramMarker>,
    streak: usize,
}

impl StallDetector {
    /// Create a detector that trips after more than `threshold` repeats
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            last: None,
            streak: 0,
        }
    }

    /// Record a failure location
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Stalled`] once the same location has failed
    /// more than `threshold` times in a row
    pub fn record(&mut self, marker: ProgramMarker) -> Result<usize, SchedulerError> {
        if self.last == Some(marker) {
            self.streak += 1;
        } else {
            self.last = Some(marker);
            self.streak = 1;
        }
        if self.streak > self.threshold {
            return Err(SchedulerError::Stalled {
                marker,
                threshold: self.threshold,
            });
        }
        Ok(self.streak)
    }

    /// Current run length of identical locations
    #[must_use]
    pub fn streak(&self) -> usize {
        self.streak
    }

    /// Configured threshold
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

/// Decides when simulated power failures fire.
///
/// Policy-agnostic: it asks its [`FailurePolicy`] for each new threshold and
/// otherwise only tracks state and stalls.
#[derive(Debug, Clone)]
pub struct FaultScheduler {
    policy: FailurePolicy,
    rng: ChaCha8Rng,
    state: SchedulerState,
    stall: Option<StallDetector>,
    triggers: usize,
}

impl FaultScheduler {
    /// Create a scheduler armed with the policy's first threshold
    #[must_use]
    pub fn new(mut policy: FailurePolicy, seed: &SimSeed) -> Self {
        let mut rng = seed.rng();
        let state = match policy.next_threshold(&mut rng) {
            Some(threshold) => SchedulerState::Armed(threshold),
            None => SchedulerState::Disarmed,
        };
        let stall = policy
            .detects_stalls()
            .then(|| StallDetector::new(DEFAULT_STALL_THRESHOLD));
        Self {
            policy,
            rng,
            state,
            stall,
            triggers: 0,
        }
    }

    /// Override the stall threshold; ignored for policies without stall detection
    #[must_use]
    pub fn with_stall_threshold(mut self, threshold: usize) -> Self {
        if self.stall.is_some() {
            self.stall = Some(StallDetector::new(threshold));
        }
        self
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Armed threshold, if any
    #[must_use]
    pub fn threshold(&self) -> Option<u64> {
        match self.state {
            SchedulerState::Armed(threshold) => Some(threshold),
            _ => None,
        }
    }

    /// Whether a failure is due at this cycles-since-reset value
    #[must_use]
    pub fn is_due(&self, cycles_since_reset: u64) -> bool {
        self.threshold().is_some_and(|t| cycles_since_reset >= t)
    }

    /// Failures handled so far
    #[must_use]
    pub fn trigger_count(&self) -> usize {
        self.triggers
    }

    /// Active policy
    #[must_use]
    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    /// Handle a fired failure and arm the next threshold.
    ///
    /// The caller is expected to reset the processor and its
    /// cycles-since-reset counter, then program the new threshold
    /// ([`FaultScheduler::threshold`]) into the target.
    ///
    /// # Errors
    ///
    /// Returns error if no threshold was armed or the target has stalled
    pub fn trigger(
        &mut self,
        total_cycles: u64,
        cycles_since_reset: u64,
        marker: ProgramMarker,
    ) -> Result<FailureEvent, SchedulerError> {
        if !matches!(self.state, SchedulerState::Armed(_)) {
            return Err(SchedulerError::NotArmed { marker });
        }
        self.state = SchedulerState::Triggered;

        if let Some(stall) = self.stall.as_mut() {
            stall.record(marker)?;
        }

        self.triggers += 1;
        let event = FailureEvent::new(total_cycles, cycles_since_reset, marker);

        self.state = match self.policy.next_threshold(&mut self.rng) {
            Some(threshold) => SchedulerState::Armed(threshold),
            None => SchedulerState::Disarmed,
        };
        tracing::debug!(
            time = total_cycles,
            since = cycles_since_reset,
            %marker,
            next = ?self.threshold(),
            "power failure injected"
        );
        Ok(event)
    }
}
