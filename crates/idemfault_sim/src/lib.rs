//! IDEMFAULT Fault Injection
//!
//! Simulated power failures for intermittently-powered targets. A
//! [`FaultScheduler`] decides when the next failure fires, a [`FaultHarness`]
//! drives a [`Target`] through its notifications, and [`RunMetrics`] records
//! what happened. Runs are reproducible from a seed or from a prior run's
//! recorded failure timing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod harness;
pub mod metrics;
pub mod policy;
pub mod scheduler;
pub mod seed;
pub mod target;

pub use collector::{MetricsCollector, MetricsSink};
pub use config::{FaultConfig, PolicyConfig};
pub use harness::{FaultHarness, HarnessError, RunOutcome};
pub use metrics::{CheckpointTiming, FailureEvent, MetricsError, RunMetrics, load_replay_sequence};
pub use policy::FailurePolicy;
pub use scheduler::{FaultScheduler, SchedulerError, SchedulerState, StallDetector};
pub use seed::{SeedSource, SimSeed};
pub use target::{StopEvent, Target, TargetError};
