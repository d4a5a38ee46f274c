//! Axum router wiring.
//!
//! `/llm-websocket/{call_id}` is the canonical platform path; `/ws/{call_id}`
//! is kept as a legacy alias for older platform configurations.

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/llm-websocket/:call_id", get(transport::ws::ws_upgrade))
        .route("/ws/:call_id", get(transport::ws::ws_upgrade))
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
