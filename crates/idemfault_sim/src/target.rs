//! The simulated machine driven by the harness.

use idemfault_core::{OutputHash, ProgramMarker};

/// Why the target stopped and handed control back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopEvent {
    /// The checkpoint routine returned
    CheckpointReached,
    /// Execution resumed after a completed restore
    RestoreCompleted,
    /// Cycles since reset reached the armed threshold
    FailureTriggered,
    /// The program reached its exit point
    ProgramExited,
    /// Stopped for a reason the harness does not know
    Unknown,
}

/// Target errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    /// Execution was interrupted from outside
    #[error("Target interrupted")]
    Interrupted,

    /// Connection to the simulator was lost
    #[error("Target disconnected: {0}")]
    Disconnected(String),

    /// The simulator answered with something unexpected
    #[error("Target protocol error: {0}")]
    Protocol(String),
}

/// Instruction-level simulator (or the debugger in front of it).
///
/// `resume` blocks until the next notification. Every other call is made
/// while the target is stopped.
pub trait Target {
    /// Run until the next stop
    fn resume(&mut self) -> Result<StopEvent, TargetError>;

    /// Cycles executed since the run started
    fn total_cycles(&mut self) -> Result<u64, TargetError>;

    /// Cycles executed since the last processor reset
    fn cycles_since_reset(&mut self) -> Result<u64, TargetError>;

    /// Current program counter
    fn program_marker(&mut self) -> Result<ProgramMarker, TargetError>;

    /// Link register, the return address of the routine just exited
    fn return_marker(&mut self) -> Result<ProgramMarker, TargetError>;

    /// Program the failure threshold; `None` disables failures
    fn arm_failure(&mut self, threshold: Option<u64>) -> Result<(), TargetError>;

    /// Hard reset of the simulated processor
    fn reset_processor(&mut self) -> Result<(), TargetError>;

    /// Zero the cycles-since-reset counter
    fn reset_cycle_counter(&mut self) -> Result<(), TargetError>;

    /// Content hash of the program's output
    fn final_hash(&mut self) -> Result<OutputHash, TargetError>;
}

impl<T: Target + ?Sized> Target for &mut T {
    fn resume(&mut self) -> Result<StopEvent, TargetError> {
        (**self).resume()
    }

    fn total_cycles(&mut self) -> Result<u64, TargetError> {
        (**self).total_cycles()
    }

    fn cycles_since_reset(&mut self) -> Result<u64, TargetError> {
        (**self).cycles_since_reset()
    }

    fn program_marker(&mut self) -> Result<ProgramMarker, TargetError> {
        (**self).program_marker()
    }

    fn return_marker(&mut self) -> Result<ProgramMarker, TargetError> {
        (**self).return_marker()
    }

    fn arm_failure(&mut self, threshold: Option<u64>) -> Result<(), TargetError> {
        (**self).arm_failure(threshold)
    }

    fn reset_processor(&mut self) -> Result<(), TargetError> {
        (**self).reset_processor()
    }

    fn reset_cycle_counter(&mut self) -> Result<(), TargetError> {
        (**self).reset_cycle_counter()
    }

    fn final_hash(&mut self) -> Result<OutputHash, TargetError> {
        (**self).final_hash()
    }
}
