//! Reader task: socket -> decode-once -> inbound queue.
//!
//! Never blocks on a full queue (eviction happens inside the push) and
//! never closes the session for schema drift; only structural failures
//! (frame size, JSON) are fatal.

use std::sync::Arc;

use tokio::time::Instant;

use voxbrain_core::error::CloseReason;
use voxbrain_core::protocol::inbound::{decode_inbound, Inbound};

use crate::obs::metrics::BrainMetrics;
use crate::session::queues::{InboundQueue, OutEntry, OutboundQueue, PushOutcome};
use crate::session::supervisor::SessionExit;
use crate::transport::wire::{FrameSource, RawFrame};

pub struct ReaderCtx {
    pub source: Box<dyn FrameSource>,
    pub inq: Arc<InboundQueue>,
    pub outq: Arc<OutboundQueue>,
    pub metrics: Arc<BrainMetrics>,
    pub exit: Arc<SessionExit>,
    pub max_frame_bytes: usize,
    /// Idle watchdog clock, touched on every inbound frame.
    pub last_rx: Arc<std::sync::Mutex<Instant>>,
}

pub async fn run_reader(mut ctx: ReaderCtx) {
    loop {
        let frame = tokio::select! {
            _ = ctx.exit.cancelled() => break,
            frame = ctx.source.next_frame() => frame,
        };

        let Some(frame) = frame else {
            ctx.exit.report(CloseReason::PeerClose);
            break;
        };

        touch(&ctx.last_rx);

        match frame {
            RawFrame::Close => {
                ctx.exit.report(CloseReason::PeerClose);
                break;
            }
            RawFrame::Pong => {}
            RawFrame::Ping(payload) => {
                ctx.outq.push(OutEntry::ws_pong(payload));
            }
            RawFrame::Text(bytes) => match decode_inbound(&bytes, ctx.max_frame_bytes) {
                Ok(Inbound::Unknown { .. }) => {
                    // Counted, not fatal, and nothing downstream to do.
                    ctx.metrics.inbound_bad_schema.inc(&[]);
                }
                Ok(frame) => {
                    ctx.metrics.inbound_frames.inc(&[("kind", frame.kind())]);
                    match ctx.inq.push(frame) {
                        PushOutcome::Queued => {}
                        PushOutcome::Evicted(class) => {
                            ctx.metrics
                                .inbound_queue_evictions
                                .inc(&[("class", class)]);
                        }
                        PushOutcome::Rejected => {
                            ctx.metrics
                                .inbound_queue_evictions
                                .inc(&[("class", "self")]);
                        }
                    }
                }
                Err(e) => {
                    let reason = e.close_reason().unwrap_or(CloseReason::PeerClose);
                    tracing::warn!(reason = reason.as_str(), error = %e, "fatal inbound frame");
                    ctx.exit.report(reason);
                    break;
                }
            },
        }
    }
}

fn touch(last_rx: &std::sync::Mutex<Instant>) {
    if let Ok(mut g) = last_rx.lock() {
        *g = Instant::now();
    }
}
