//! Per-call session runtime.
//!
//! One WebSocket = one session = one set of tasks:
//! - reader: socket -> decode-once -> inbound queue
//! - machine: inbound queue -> turn/epoch bookkeeping -> outbound queue
//! - turn handler: one task per epoch, producing speech segments
//! - keepalive: periodic ping enqueue
//! - writer: outbound queue -> deadline-bounded socket writes
//!
//! The supervisor composes them and owns the close reason.

pub mod clock;
pub mod keepalive;
pub mod machine;
pub mod queues;
pub mod reader;
pub mod registry;
pub mod slots;
pub mod supervisor;
pub mod turn;
pub mod writer;

pub use supervisor::{run_session, SessionDeps, SessionExit};
