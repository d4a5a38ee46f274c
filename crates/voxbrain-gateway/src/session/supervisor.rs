//! Session supervisor: composes reader, writer, keepalive and the
//! turn-epoch machine for one call, owns the close reason, and tears
//! everything down when the first fatal condition fires.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use voxbrain_core::error::CloseReason;
use voxbrain_core::protocol::outbound::{ConfigBody, Outbound};
use voxbrain_core::protocol::OutboundClass;
use voxbrain_core::segment::SegmentStamp;

use crate::app_state::AppState;
use crate::session::clock::SessionClock;
use crate::session::keepalive::run_keepalive;
use crate::session::machine::TurnMachine;
use crate::session::queues::{InboundQueue, OutEntry, OutboundQueue};
use crate::session::reader::{run_reader, ReaderCtx};
use crate::session::writer::{run_writer, WriterCtx};
use crate::transport::wire::{FrameSink, FrameSource};

/// First-reason-wins close signal shared by all session tasks.
///
/// `report` records the reason and fires the token; tasks unwind at their
/// next suspension point. An external cancel without a report (process
/// shutdown via the call registry) reads as `SHUTDOWN`.
pub struct SessionExit {
    reason: Mutex<Option<CloseReason>>,
    token: CancellationToken,
}

impl Default for SessionExit {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionExit {
    pub fn new() -> Self {
        Self {
            reason: Mutex::new(None),
            token: CancellationToken::new(),
        }
    }

    /// Record the close reason; only the first report sticks.
    pub fn report(&self, reason: CloseReason) -> bool {
        let won = {
            let mut r = match self.reason.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if r.is_none() {
                *r = Some(reason);
                true
            } else {
                false
            }
        };
        self.token.cancel();
        won
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn reason(&self) -> CloseReason {
        match self.reason.lock() {
            Ok(g) => g.unwrap_or(CloseReason::Shutdown),
            Err(poisoned) => poisoned.into_inner().unwrap_or(CloseReason::Shutdown),
        }
    }
}

/// The two socket halves, behind the wire seam so tests can inject fakes.
pub struct SessionDeps {
    pub source: Box<dyn FrameSource>,
    pub sink: Box<dyn FrameSink>,
}

/// Run one call session to completion. Returns the close reason; protocol
/// errors never propagate past this point.
pub async fn run_session(state: AppState, call_id: String, deps: SessionDeps) -> CloseReason {
    let cfg = state.cfg().clone();
    let metrics = state.metrics_arc();
    let exit = Arc::new(SessionExit::new());

    state.registry().register(&call_id, exit.token().clone());
    metrics.ws_sessions_active.inc(&[]);

    let clock = Arc::new(SessionClock::new());
    let inq = Arc::new(InboundQueue::new(cfg.brain.inbound_queue_max));
    let outq = Arc::new(OutboundQueue::new(
        cfg.brain.outbound_queue_max,
        cfg.brain.control_before_terminal,
    ));
    let last_rx = Arc::new(Mutex::new(Instant::now()));

    // Opening sequence: config first, then the response_id=0 stream. With
    // speak-first the machine runs a greeting turn; otherwise epoch 0 is
    // closed immediately and the brain waits for the user.
    outq.push(OutEntry::control(Outbound::Config {
        config: ConfigBody::default(),
    }));
    if !cfg.brain.speak_first {
        clock.mark_terminal(0);
        outq.push(OutEntry::stamped(
            OutboundClass::Control,
            Outbound::empty_terminal(0),
            SegmentStamp {
                epoch: 0,
                speak_gen: 0,
                seq: 0,
            },
        ));
    }

    let writer = tokio::spawn(run_writer(WriterCtx {
        sink: deps.sink,
        outq: outq.clone(),
        clock: clock.clone(),
        metrics: metrics.clone(),
        exit: exit.clone(),
        write_timeout: Duration::from_millis(cfg.ws.write_timeout_ms),
        max_consecutive_timeouts: cfg.ws.max_consecutive_write_timeouts,
        close_on_timeout: cfg.ws.close_on_write_timeout,
    }));

    let reader = tokio::spawn(run_reader(ReaderCtx {
        source: deps.source,
        inq: inq.clone(),
        outq: outq.clone(),
        metrics: metrics.clone(),
        exit: exit.clone(),
        max_frame_bytes: cfg.ws.max_frame_bytes,
        last_rx: last_rx.clone(),
    }));

    let keepalive = tokio::spawn(run_keepalive(
        outq.clone(),
        exit.clone(),
        Duration::from_millis(cfg.brain.ping_interval_ms),
    ));

    let machine = TurnMachine::new(
        Arc::from(call_id.as_str()),
        cfg.clone(),
        clock.clone(),
        inq.clone(),
        outq.clone(),
        metrics.clone(),
        exit.clone(),
        state.producer(),
    );
    let machine = tokio::spawn(machine.run());

    let idle = Duration::from_millis(cfg.brain.idle_timeout_ms);
    tokio::select! {
        _ = exit.cancelled() => {}
        _ = idle_elapsed(last_rx.clone(), idle) => {
            exit.report(CloseReason::IdleTimeout);
        }
    }

    // Token is already cancelled; abort is the backstop for a wedged sink.
    for handle in [writer, reader, keepalive, machine] {
        handle.abort();
    }

    let reason = exit.reason();
    metrics.ws_close_reason.inc(&[("reason", reason.as_str())]);
    metrics.ws_sessions_active.dec(&[]);
    state.registry().remove(&call_id);

    tracing::info!(reason = reason.as_str(), "session ended");
    reason
}

/// Resolves once no inbound frame has been seen for `idle`.
async fn idle_elapsed(last_rx: Arc<Mutex<Instant>>, idle: Duration) {
    loop {
        let last = match last_rx.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        };
        let deadline = last + idle;
        if Instant::now() >= deadline {
            return;
        }
        tokio::time::sleep_until(deadline).await;
    }
}
