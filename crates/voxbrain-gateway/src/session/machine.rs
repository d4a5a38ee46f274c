//! Turn-epoch machine.
//!
//! Single consumer of the inbound queue and of the active turn's output
//! channel. Owns every mutation of the session clock: epoch transitions,
//! barge-in speak-generation bumps, terminal accounting and the slot
//! rollback policy.
//!
//! The waiters here are persistent; they belong to this task's loop and
//! outlive individual turns. At the top of every iteration the turn-output
//! consumer is checked against the live queue generation and rebound if a
//! transition replaced the queue; without that swap the consumer would sit
//! parked on a channel nothing writes to anymore.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use voxbrain_core::protocol::inbound::Inbound;
use voxbrain_core::protocol::outbound::Outbound;
use voxbrain_core::protocol::{OutboundClass, Utterance};
use voxbrain_core::segment::{Segment, SegmentStamp};
use voxbrain_core::transcript::TranscriptRing;

use crate::config::BrainConfig;
use crate::obs::metrics::BrainMetrics;
use crate::producer::{SpeechProducer, TurnKind};
use crate::session::clock::SessionClock;
use crate::session::queues::{InboundQueue, OutEntry, OutboundQueue, PushOutcome};
use crate::session::slots::SlotStore;
use crate::session::supervisor::SessionExit;
use crate::session::turn::{run_turn, TurnContext};

/// Capacity of one turn's output channel. Small on purpose: it is a relief
/// valve between producer speed and writer speed, not a buffer.
const TURN_QUEUE_CAP: usize = 32;

struct ActiveTurn {
    epoch: u64,
    cancel: CancellationToken,
    updates: watch::Sender<voxbrain_core::transcript::TranscriptView>,
}

pub struct TurnMachine {
    call_id: Arc<str>,
    cfg: BrainConfig,
    clock: Arc<SessionClock>,
    inq: Arc<InboundQueue>,
    outq: Arc<OutboundQueue>,
    metrics: Arc<BrainMetrics>,
    exit: Arc<SessionExit>,
    producer: Arc<dyn SpeechProducer>,

    ring: TranscriptRing,
    slots: SlotStore,
    active: Option<ActiveTurn>,
    turn_rx: Option<mpsc::Receiver<Segment>>,
    turn_gen: u64,
    started: Instant,
}

impl TurnMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        call_id: Arc<str>,
        cfg: BrainConfig,
        clock: Arc<SessionClock>,
        inq: Arc<InboundQueue>,
        outq: Arc<OutboundQueue>,
        metrics: Arc<BrainMetrics>,
        exit: Arc<SessionExit>,
        producer: Arc<dyn SpeechProducer>,
    ) -> Self {
        let ring = TranscriptRing::new(cfg.transcript.max_utterances, cfg.transcript.max_chars);
        Self {
            call_id,
            cfg,
            clock,
            inq,
            outq,
            metrics,
            exit,
            producer,
            ring,
            slots: SlotStore::new(),
            active: None,
            turn_rx: None,
            turn_gen: 0,
            started: Instant::now(),
        }
    }

    pub async fn run(mut self) {
        if self.cfg.brain.speak_first {
            self.spawn_turn(0, TurnKind::Greeting);
        }

        loop {
            // REQUIRED swap rule: rebind the turn-output consumer whenever a
            // transition installed a new queue.
            if let Some((gen, rx)) = self.clock.take_turn_rx(self.turn_gen) {
                self.turn_gen = gen;
                self.turn_rx = Some(rx);
            }

            tokio::select! {
                _ = self.exit.cancelled() => break,
                seg = Self::recv_segment(&mut self.turn_rx) => match seg {
                    Some(seg) => self.on_segment(seg),
                    None => self.turn_rx = None,
                },
                frame = self.inq.pop() => self.on_frame(frame),
            }
        }

        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }

    async fn recv_segment(rx: &mut Option<mpsc::Receiver<Segment>>) -> Option<Segment> {
        match rx {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Forward one producer segment to the outbound queue, enforcing the
    /// staleness and single-terminal invariants on the producer side. The
    /// writer re-checks at write time; producers can enqueue while a
    /// cancellation is still in flight.
    fn on_segment(&mut self, seg: Segment) {
        let snap = self.clock.snapshot();
        if seg.stamp.epoch != snap.epoch || seg.stamp.speak_gen != snap.speak_gen {
            self.metrics.stale_segment_dropped.inc(&[]);
            return;
        }

        if seg.terminal {
            if !self.clock.mark_terminal(seg.stamp.seq) {
                self.metrics.stale_segment_dropped.inc(&[]);
                return;
            }
            let frame = Outbound::Response {
                response_id: seg.stamp.epoch,
                content: seg.content,
                content_complete: true,
            };
            self.push_out(OutEntry::stamped(OutboundClass::Terminal, frame, seg.stamp));
            return;
        }

        if snap.terminal_seq.is_some() {
            // Producers must stop after the terminal; anything late is shed.
            self.metrics.stale_segment_dropped.inc(&[]);
            return;
        }

        self.clock.note_speech();
        let class = seg.class();
        let frame = Outbound::Response {
            response_id: seg.stamp.epoch,
            content: seg.content,
            content_complete: false,
        };
        self.push_out(OutEntry::stamped(class, frame, seg.stamp));
    }

    fn on_frame(&mut self, frame: Inbound) {
        match frame {
            Inbound::PingPong { timestamp } => {
                // Echo with the platform's clock, bypassing speech backlog.
                self.push_out(OutEntry::control(Outbound::PingPong { timestamp }));
            }
            Inbound::Clear => self.barge_in("clear"),
            Inbound::UpdateOnly {
                transcript,
                turntaking,
            } => {
                self.ingest(&transcript);
                self.notify_active_transcript();
                if turntaking.as_deref() == Some(voxbrain_core::protocol::inbound::TURNTAKING_USER)
                {
                    self.barge_in("user_turn");
                }
            }
            Inbound::ResponseRequired {
                response_id,
                transcript,
            } => self.on_turn_request(response_id, TurnKind::Response, &transcript),
            Inbound::ReminderRequired {
                response_id,
                transcript,
            } => self.on_turn_request(response_id, TurnKind::Reminder, &transcript),
            Inbound::CallDetails { call } => {
                tracing::info!(payload_len = call.get().len(), "call details received");
            }
            // Unknown frames are counted and shed at the reader.
            Inbound::Unknown { .. } => {}
        }
    }

    fn on_turn_request(&mut self, n: u64, kind: TurnKind, transcript: &[Utterance]) {
        self.ingest(transcript);

        let epoch = self.clock.epoch();
        if n < epoch {
            self.metrics.stale_turn_dropped.inc(&[]);
            tracing::debug!(response_id = n, epoch, "stale turn request dropped");
            return;
        }

        if n == epoch {
            if let Some(active) = &self.active {
                if active.epoch == n && !active.cancel.is_cancelled() {
                    // Idempotent re-prompt: hand the fresher transcript to
                    // the live handler instead of respawning.
                    let _ = active.updates.send_replace(self.ring.view());
                    return;
                }
            }
            if self.clock.terminal_marked() {
                self.metrics.stale_turn_dropped.inc(&[]);
                return;
            }
        }

        self.spawn_turn(n, kind);
    }

    /// Epoch transition: one critical section on the clock, then the old
    /// handler is cancelled without being awaited.
    fn spawn_turn(&mut self, n: u64, kind: TurnKind) {
        let (seg_tx, seg_rx) = mpsc::channel(TURN_QUEUE_CAP);
        let begin = self.clock.begin_epoch(n, seg_rx);

        // Confirmation-safe rollback: only a turn that never spoke is
        // allowed to take its tentative slot writes with it.
        if begin.prior_spoke {
            self.slots.commit();
        } else {
            self.slots.rollback();
        }

        if let Some(old) = self.active.take() {
            old.cancel.cancel();
        }

        let cancel = self.exit.token().child_token();
        let (updates_tx, updates_rx) = watch::channel(self.ring.view());

        let ctx = TurnContext {
            call_id: self.call_id.clone(),
            epoch: n,
            kind,
            cancel: cancel.clone(),
            out: seg_tx,
            clock: self.clock.clone(),
            transcript: self.ring.view(),
            updates: updates_rx,
            greeting: (kind == TurnKind::Greeting).then(|| self.cfg.brain.greeting.clone()),
            markup_mode: self.cfg.speech.markup_mode,
            dash_scope: self.cfg.speech.dash_pause_scope,
        };

        self.metrics.turns_started.inc(&[("kind", kind.as_str())]);
        let span = tracing::info_span!("turn", epoch = n, kind = kind.as_str());
        tokio::spawn(run_turn(ctx, self.producer.clone()).instrument(span));

        self.active = Some(ActiveTurn {
            epoch: n,
            cancel,
            updates: updates_tx,
        });
    }

    /// Same-epoch interruption: bump the speak-generation so in-flight
    /// chunks go stale, cancel the handler, and close the epoch on the wire
    /// with an empty terminal at control priority.
    fn barge_in(&mut self, trigger: &'static str) {
        let snap = self.clock.snapshot();
        if snap.terminal_seq.is_some() {
            // Epoch already closed on the wire; nothing in flight to kill.
            if let Some(active) = &self.active {
                active.cancel.cancel();
            }
            return;
        }

        let new_gen = self.clock.bump_speak_gen();
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }

        let stamp = SegmentStamp {
            epoch: snap.epoch,
            speak_gen: new_gen,
            seq: 0,
        };
        self.clock.mark_terminal(stamp.seq);
        tracing::debug!(epoch = snap.epoch, speak_gen = new_gen, trigger, "barge-in");

        let entry = OutEntry::stamped(
            OutboundClass::Control,
            Outbound::empty_terminal(snap.epoch),
            stamp,
        );
        self.push_out(entry);
    }

    fn ingest(&mut self, transcript: &[Utterance]) {
        if transcript.is_empty() {
            return;
        }
        let now_ms = self.started.elapsed().as_millis() as u64;
        let runs = self.ring.ingest_snapshot(transcript, now_ms);
        if runs > 0 {
            self.metrics.transcript_compactions.add(&[], runs);
        }
    }

    fn notify_active_transcript(&self) {
        if let Some(active) = &self.active {
            if !active.cancel.is_cancelled() {
                let _ = active.updates.send_replace(self.ring.view());
            }
        }
    }

    fn push_out(&self, entry: OutEntry) {
        match self.outq.push(entry) {
            PushOutcome::Queued => {}
            PushOutcome::Evicted(class) => {
                self.metrics.outbound_queue_evictions.inc(&[("class", class)]);
            }
            PushOutcome::Rejected => {
                self.metrics
                    .outbound_queue_evictions
                    .inc(&[("class", "self")]);
            }
        }
    }
}
