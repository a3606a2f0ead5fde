//! IDEMFAULT Core Types
//!
//! Pure value types shared by the trace analyzer and the fault injector.
//! Nothing in this crate performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod error;
pub mod hash;
pub mod id;

// Re-exports
pub use access::{AccessKind, MemoryAccessEvent, MemorySpace};
pub use error::{CoreError, CoreResult};
pub use hash::OutputHash;
pub use id::{Address, OriginId, ProgramMarker};
