//! Backpressure and overload behavior: write deadlines, queue flooding.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use voxbrain_core::error::{CloseReason, Result};
use voxbrain_gateway::config::BrainConfig;
use voxbrain_gateway::producer::{SpeechProducer, TurnPrompt};

use support::{assert_stream_invariants, response_required, spawn_session};

struct FloodProducer {
    chunks: usize,
}

#[async_trait]
impl SpeechProducer for FloodProducer {
    async fn produce(&self, _prompt: TurnPrompt, out: mpsc::Sender<String>) -> Result<()> {
        for i in 0..self.chunks {
            if out.send(format!("chunk {i}")).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_socket_closes_with_write_timeout_backpressure() {
    let mut cfg = BrainConfig::default();
    cfg.brain.ping_interval_ms = 200;
    cfg.ws.write_timeout_ms = 400;
    cfg.ws.max_consecutive_write_timeouts = 2;
    cfg.brain.idle_timeout_ms = 60_000;

    let mut h = spawn_session(cfg, Arc::new(FloodProducer { chunks: 0 }));

    // Opening frames go through while the socket is healthy.
    h.next_frame_skip_pings().await;
    h.next_frame_skip_pings().await;

    // Then the peer's TCP buffer wedges.
    let stalled_at = Instant::now();
    h.set_write_delay(Duration::from_secs(3600));

    let reason = h.handle.await.unwrap();
    assert_eq!(reason, CloseReason::WriteTimeoutBackpressure);

    // Two missed deadlines at 400ms each, pings every 200ms: about a second.
    assert!(stalled_at.elapsed() <= Duration::from_secs(2));
    assert!(h.state.metrics().ws_write_timeout.get(&[]) >= 2);
    assert!(h.state.metrics().keepalive_write_timeout.get(&[]) >= 1);
}

#[tokio::test(start_paused = true)]
async fn write_timeout_escalation_can_be_disabled() {
    let mut cfg = BrainConfig::default();
    cfg.brain.ping_interval_ms = 200;
    cfg.ws.write_timeout_ms = 400;
    cfg.ws.close_on_write_timeout = false;
    cfg.brain.idle_timeout_ms = 5_000;

    let h = spawn_session(cfg, Arc::new(FloodProducer { chunks: 0 }));
    h.set_write_delay(Duration::from_secs(3600));

    // Deadlines keep missing but the session only dies of idleness.
    let reason = h.handle.await.unwrap();
    assert_eq!(reason, CloseReason::IdleTimeout);
    assert!(h.state.metrics().ws_write_timeout.get(&[]) >= 2);
}

#[tokio::test(start_paused = true)]
async fn terminal_survives_outbound_queue_flood() {
    let mut cfg = BrainConfig::default();
    cfg.brain.outbound_queue_max = 4;
    cfg.brain.ping_interval_ms = 60_000;
    cfg.brain.idle_timeout_ms = 120_000;

    let mut h = spawn_session(cfg, Arc::new(FloodProducer { chunks: 8 }));
    // Slow writer so the queue actually backs up.
    h.set_write_delay(Duration::from_millis(50));

    h.next_frame_skip_pings().await;
    h.next_frame_skip_pings().await;

    h.send_json(response_required(1, &[("user", "go")])).await;

    let frames = h.collect_until_terminal(1).await;
    assert_stream_invariants(&frames);

    let terminal = frames.last().unwrap();
    assert_eq!(terminal["response_id"], 1);
    assert_eq!(terminal["content_complete"], true);

    // The flood was resolved by shedding speech, not by losing the terminal.
    assert!(
        h.state.metrics().outbound_queue_evictions.get(&[("class", "speech")]) > 0
            || h.state.metrics().stale_segment_dropped.get(&[]) > 0
    );
}

#[tokio::test(start_paused = true)]
async fn metrics_render_uses_underscored_names() {
    let h = spawn_session(BrainConfig::default(), Arc::new(FloodProducer { chunks: 0 }));
    h.send_raw("{\"interaction_type\":\"novel_event\"}").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let body = h.state.metrics().render();
    assert!(body.contains("inbound_bad_schema_total"));
    assert!(body.contains("ws_write_timeout_total"));
    assert!(body.contains("keepalive_ping_pong_queue_delay_ms"));
    assert!(body.contains("memory_transcript_compactions_total"));
    assert!(!body.contains("inbound.bad_schema_total"));
}
