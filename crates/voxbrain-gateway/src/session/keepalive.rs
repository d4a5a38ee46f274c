//! Keepalive engine: periodic outbound ping at control priority.
//!
//! Write-deadline accounting for pings lives in the writer; together they
//! form the only graceful path by which the brain initiates a close under
//! stress. Silent wedging is worse than a close-plus-reconnect.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use voxbrain_core::protocol::outbound::Outbound;

use crate::session::queues::{OutEntry, OutboundQueue};
use crate::session::supervisor::SessionExit;

pub async fn run_keepalive(outq: Arc<OutboundQueue>, exit: Arc<SessionExit>, interval: Duration) {
    let mut tick = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = exit.cancelled() => break,
            _ = tick.tick() => {
                outq.push(OutEntry::control(Outbound::PingPong { timestamp: unix_ms() }));
            }
        }
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
