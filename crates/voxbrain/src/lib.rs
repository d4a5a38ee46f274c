//! Top-level facade crate for voxbrain.
//!
//! Re-exports the core protocol and the gateway library so users can depend
//! on a single crate.

pub mod core {
    pub use voxbrain_core::*;
}

pub mod gateway {
    pub use voxbrain_gateway::*;
}
