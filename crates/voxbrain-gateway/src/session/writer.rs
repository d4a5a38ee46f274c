//! Writer task: priority dequeue -> staleness gate -> deadline-bounded write.
//!
//! The staleness re-check here is deliberate duplication of the machine's
//! check: producers can enqueue while a cancellation is in flight, and this
//! is the last gate before bytes hit the socket.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use voxbrain_core::error::CloseReason;
use voxbrain_core::protocol::outbound::{encode_outbound, Outbound};

use crate::obs::metrics::BrainMetrics;
use crate::session::clock::SessionClock;
use crate::session::queues::{OutEntry, OutPayload, OutboundQueue};
use crate::session::supervisor::SessionExit;
use crate::transport::wire::FrameSink;

pub struct WriterCtx {
    pub sink: Box<dyn FrameSink>,
    pub outq: Arc<OutboundQueue>,
    pub clock: Arc<SessionClock>,
    pub metrics: Arc<BrainMetrics>,
    pub exit: Arc<SessionExit>,
    pub write_timeout: Duration,
    pub max_consecutive_timeouts: u32,
    pub close_on_timeout: bool,
}

pub async fn run_writer(mut ctx: WriterCtx) {
    let mut consecutive_timeouts: u32 = 0;
    // Terminal frames dequeue ahead of a speech backlog; once one has been
    // taken for write, same-epoch speech still sitting in the queue must
    // never follow it onto the wire.
    let mut terminal_taken_for: Option<u64> = None;

    loop {
        let entry = tokio::select! {
            _ = ctx.exit.cancelled() => break,
            entry = ctx.outq.pop() => entry,
        };

        // Last line of defense against races between producer enqueue and
        // cancellation: re-check the stamp against the live clock.
        if let Some(stamp) = entry.stamp {
            let snap = ctx.clock.snapshot();
            let terminal = matches!(
                entry.payload,
                OutPayload::Frame(ref f) if f.is_terminal()
            );
            let late_after_terminal = !terminal
                && (snap.terminal_seq.map_or(false, |tseq| stamp.seq > tseq)
                    || terminal_taken_for == Some(stamp.epoch));

            if stamp.epoch != snap.epoch || stamp.speak_gen != snap.speak_gen || late_after_terminal
            {
                ctx.metrics.stale_segment_dropped.inc(&[]);
                continue;
            }

            if terminal {
                terminal_taken_for = Some(stamp.epoch);
            }
        }

        let is_ping = matches!(
            entry.payload,
            OutPayload::Frame(Outbound::PingPong { .. })
        );
        if is_ping {
            ctx.metrics.keepalive_write_attempt.inc(&[]);
            let delay = entry.enqueued_at.elapsed();
            ctx.metrics.keepalive_queue_delay.observe(&[], delay);
            if delay > ctx.write_timeout {
                ctx.metrics.keepalive_missed_deadline.inc(&[]);
            }
        }

        let write = match entry.payload {
            OutPayload::Frame(frame) => {
                let text = match encode_outbound(&frame) {
                    Ok(t) => t,
                    Err(e) => {
                        // Encode failure is an invariant breach: shed the
                        // frame, never the session.
                        tracing::error!(kind = frame.kind(), error = %e, "encode failed");
                        continue;
                    }
                };
                timeout(ctx.write_timeout, ctx.sink.send_text(text)).await
            }
            OutPayload::Pong(payload) => {
                timeout(ctx.write_timeout, ctx.sink.send_pong(payload)).await
            }
        };

        match write {
            Ok(Ok(())) => {
                consecutive_timeouts = 0;
            }
            Ok(Err(e)) => {
                tracing::info!(error = %e, "socket write failed");
                ctx.exit.report(CloseReason::PeerClose);
                break;
            }
            Err(_elapsed) => {
                ctx.metrics.ws_write_timeout.inc(&[]);
                if is_ping {
                    ctx.metrics.keepalive_write_timeout.inc(&[]);
                    ctx.metrics.keepalive_missed_deadline.inc(&[]);
                }
                consecutive_timeouts += 1;
                tracing::warn!(consecutive_timeouts, "write deadline missed");

                if ctx.close_on_timeout && consecutive_timeouts >= ctx.max_consecutive_timeouts {
                    ctx.exit.report(CloseReason::WriteTimeoutBackpressure);
                    break;
                }
            }
        }
    }
}
