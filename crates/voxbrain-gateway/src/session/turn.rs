//! Per-turn producer task.
//!
//! A turn handler owns one epoch's output: a deterministic ACK, streamed
//! producer chunks, then exactly one terminal segment on normal completion.
//! On cancellation it stops at the next suspension point and emits nothing
//! further; the machine owns the terminal frame for cancelled epochs. No
//! part of the turn is shielded from the token.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use voxbrain_core::segment::{Segment, SegmentKind, SegmentStamp};
use voxbrain_core::speech::{self, DashScope, MarkupMode};
use voxbrain_core::transcript::TranscriptView;

use crate::producer::{SpeechProducer, TurnKind, TurnPrompt};
use crate::session::clock::SessionClock;

pub struct TurnContext {
    pub call_id: Arc<str>,
    pub epoch: u64,
    pub kind: TurnKind,
    pub cancel: CancellationToken,
    pub out: mpsc::Sender<Segment>,
    pub clock: Arc<SessionClock>,
    pub transcript: TranscriptView,
    pub updates: watch::Receiver<TranscriptView>,
    /// Greeting content for the opening turn; ignored otherwise.
    pub greeting: Option<String>,
    pub markup_mode: MarkupMode,
    pub dash_scope: DashScope,
}

pub async fn run_turn(ctx: TurnContext, producer: Arc<dyn SpeechProducer>) {
    let mut seq: u64 = 0;

    if ctx.kind == TurnKind::Greeting {
        let greeting = ctx.greeting.clone().unwrap_or_default();
        if !emit(&ctx, &mut seq, SegmentKind::Greeting, &greeting).await {
            return;
        }
        emit_terminal(&ctx, &mut seq).await;
        return;
    }

    // ACK goes out first, unconditionally; also when the producer's first
    // payload turns out to be empty (tool-first turns).
    let ack = speech::ack_phrase(&ctx.call_id, ctx.epoch, SegmentKind::Ack, 0);
    if !emit(&ctx, &mut seq, SegmentKind::Ack, ack).await {
        return;
    }

    let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(16);
    let prompt = TurnPrompt {
        call_id: ctx.call_id.clone(),
        turn_id: ctx.epoch,
        kind: ctx.kind,
        transcript: ctx.transcript.clone(),
        updates: ctx.updates.clone(),
    };

    let producer_fut = producer.produce(prompt, chunk_tx);
    tokio::pin!(producer_fut);
    let mut producer_done = false;

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return,
            res = &mut producer_fut, if !producer_done => {
                producer_done = true;
                if let Err(e) = res {
                    // Contained: the epoch still gets its terminal frame so
                    // the remote state machine stays defined.
                    tracing::warn!(epoch = ctx.epoch, error = %e, "producer failed mid-turn");
                }
            }
            chunk = chunk_rx.recv() => match chunk {
                Some(text) => {
                    if !emit(&ctx, &mut seq, SegmentKind::Speech, &text).await {
                        return;
                    }
                }
                // Producer future dropped its sender: turn is complete.
                None => break,
            }
        }
    }

    emit_terminal(&ctx, &mut seq).await;
}

/// Send one non-terminal segment, tagged with the clock's speak-generation
/// at emission time. Returns false if the turn was cancelled.
async fn emit(ctx: &TurnContext, seq: &mut u64, kind: SegmentKind, text: &str) -> bool {
    let stamp = SegmentStamp {
        epoch: ctx.epoch,
        speak_gen: ctx.clock.speak_gen(),
        seq: *seq,
    };
    *seq += 1;

    let segment = Segment {
        stamp,
        kind,
        content: speech::render_segment(text, ctx.markup_mode, ctx.dash_scope),
        terminal: false,
    };

    tokio::select! {
        _ = ctx.cancel.cancelled() => false,
        sent = ctx.out.send(segment) => sent.is_ok(),
    }
}

async fn emit_terminal(ctx: &TurnContext, seq: &mut u64) {
    let stamp = SegmentStamp {
        epoch: ctx.epoch,
        speak_gen: ctx.clock.speak_gen(),
        seq: *seq,
    };
    *seq += 1;

    let segment = Segment {
        stamp,
        kind: SegmentKind::Speech,
        content: String::new(),
        terminal: true,
    };

    tokio::select! {
        _ = ctx.cancel.cancelled() => {}
        _ = ctx.out.send(segment) => {}
    }
}
