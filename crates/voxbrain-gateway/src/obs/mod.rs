//! Lightweight in-process metrics.
//!
//! Counters are write-through atomics behind a process-global registry;
//! rendering happens only in the `/metrics` handler. Dotted metric names
//! from the session code are exported with dots replaced by underscores.

pub mod metrics;
