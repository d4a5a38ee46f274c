//! WebSocket upgrade handler.
//!
//! One socket per call: the allowlist hook gates the upgrade, then the
//! session supervisor runs the call under a per-session tracing span.

use axum::{
    extract::{ws::WebSocket, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use tracing::Instrument;

use crate::app_state::AppState;
use crate::session::{run_session, SessionDeps};
use crate::transport::wire::{AxumFrameSink, AxumFrameSource};

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.policy().allow(&call_id) {
        tracing::warn!(call = %call_id, "call rejected by allowlist");
        return StatusCode::FORBIDDEN.into_response();
    }

    state.metrics().ws_upgrades.inc(&[]);
    ws.on_upgrade(move |socket| handle_socket(state, call_id, socket))
        .into_response()
}

async fn handle_socket(state: AppState, call_id: String, socket: WebSocket) {
    let span = tracing::info_span!("call_session", call = %call_id);
    async move {
        let (tx, rx) = socket.split();
        let deps = SessionDeps {
            source: Box::new(AxumFrameSource::new(rx)),
            sink: Box::new(AxumFrameSink::new(tx)),
        };
        run_session(state, call_id, deps).await;
    }
    .instrument(span)
    .await
}
