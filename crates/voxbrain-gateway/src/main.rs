//! voxbrain gateway binary.
//!
//! One WebSocket per phone call; see the library crate for the session
//! runtime. Config comes from `voxbrain.yaml` plus environment overrides.

use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use voxbrain_gateway::{app_state, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = config::load_from_file("voxbrain.yaml").expect("config load failed");
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .expect("gateway.listen must be a valid SocketAddr");

    let state = app_state::AppState::new(cfg);
    let app = router::build_router(state.clone());

    tracing::info!(%listen, "voxbrain-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .expect("failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("server failed");
}

async fn shutdown_signal(state: app_state::AppState) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received; closing live calls");
    state.begin_shutdown();
}
