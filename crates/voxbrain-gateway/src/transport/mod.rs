//! Transport layer (WebSocket).
//!
//! `wire` abstracts the socket behind narrow source/sink traits so session
//! tasks can be driven by fakes in tests; `ws` owns the HTTP -> WS upgrade.
//! Frame decoding itself lives in `voxbrain_core::protocol` and is invoked
//! exactly once per frame by the session reader.

pub mod wire;
pub mod ws;
