//! Output verification for IDEMFAULT.
//!
//! A checkpoint/restore implementation is accepted when repeated runs of the
//! same program, each under its own failure schedule, all produce the same
//! final output hash.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod verdict;
pub mod verifier;

pub use verdict::{RunSummary, TargetVerdict, VerificationReport};
pub use verifier::{HashVerifier, VerifyError};
