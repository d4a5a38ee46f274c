//! Call admission policy (pluggable allowlist hook).
//!
//! This is the only auth surface the brain carries; anything richer lives in
//! front of it (platform-side signing, a gateway proxy).

pub mod allowlist;

pub use allowlist::{policy_from_config, AllowAll, CallPolicy, PrefixAllowlist};
