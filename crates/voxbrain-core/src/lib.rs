//! voxbrain core: wire protocol + session-neutral data structures.
//!
//! Everything here is transport-agnostic and runtime-agnostic; the gateway
//! crate owns sockets, tasks and timers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod segment;
pub mod speech;
pub mod transcript;

/// Shared result type.
pub use error::{BrainError, CloseReason, Result};
