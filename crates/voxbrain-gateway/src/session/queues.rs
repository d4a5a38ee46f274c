//! Bounded priority queues on both directions of the socket.
//!
//! Enqueue is synchronous (mutex + notify) so neither the reader nor the
//! machine ever blocks on a full queue; overload is resolved by eviction
//! instead. Dequeue is async and cancel-safe (re-checks the queue before
//! every wait), with a single consumer per queue.
//!
//! Outbound ordering: CONTROL dequeues first. TERMINAL and SPEECH share one
//! FIFO lane ordered by enqueue sequence, so a turn's terminal can never
//! overtake its own speech; TERMINAL differs from SPEECH only in being
//! immune to eviction. The CONTROL-vs-ready-TERMINAL tie-break is config.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::time::Instant;

use voxbrain_core::protocol::inbound::Inbound;
use voxbrain_core::protocol::outbound::Outbound;
use voxbrain_core::protocol::{InboundClass, OutboundClass};
use voxbrain_core::segment::SegmentStamp;

/// What happened to a pushed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting an entry of the named class.
    Evicted(&'static str),
    /// The entry itself was dropped (queue full of higher classes).
    Rejected,
}

/// Payload of one outbound queue entry.
#[derive(Debug)]
pub enum OutPayload {
    Frame(Outbound),
    /// WebSocket-level pong echo.
    Pong(Vec<u8>),
}

/// One outbound queue entry, carrying its staleness stamp (speech only) and
/// enqueue time (keepalive latency accounting).
#[derive(Debug)]
pub struct OutEntry {
    pub class: OutboundClass,
    pub payload: OutPayload,
    pub stamp: Option<SegmentStamp>,
    pub enqueued_at: Instant,
    /// Enqueue sequence, assigned by the queue on push.
    order: u64,
}

impl OutEntry {
    pub fn control(frame: Outbound) -> Self {
        Self {
            class: OutboundClass::Control,
            payload: OutPayload::Frame(frame),
            stamp: None,
            enqueued_at: Instant::now(),
            order: 0,
        }
    }

    pub fn stamped(class: OutboundClass, frame: Outbound, stamp: SegmentStamp) -> Self {
        Self {
            class,
            payload: OutPayload::Frame(frame),
            stamp: Some(stamp),
            enqueued_at: Instant::now(),
            order: 0,
        }
    }

    pub fn ws_pong(payload: Vec<u8>) -> Self {
        Self {
            class: OutboundClass::Control,
            payload: OutPayload::Pong(payload),
            stamp: None,
            enqueued_at: Instant::now(),
            order: 0,
        }
    }
}

#[derive(Default)]
struct OutInner {
    control: VecDeque<OutEntry>,
    terminal: VecDeque<OutEntry>,
    speech: VecDeque<OutEntry>,
    low: VecDeque<OutEntry>,
    next_order: u64,
}

impl OutInner {
    fn len(&self) -> usize {
        self.control.len() + self.terminal.len() + self.speech.len() + self.low.len()
    }
}

pub struct OutboundQueue {
    inner: Mutex<OutInner>,
    notify: Notify,
    capacity: usize,
    control_before_terminal: bool,
}

impl OutboundQueue {
    pub fn new(capacity: usize, control_before_terminal: bool) -> Self {
        Self {
            inner: Mutex::new(OutInner::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            control_before_terminal,
        }
    }

    fn lock(&self) -> MutexGuard<'_, OutInner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Enqueue with the overload policy: CONTROL/TERMINAL always fit (may
    /// transiently exceed capacity); SPEECH/LOW evict from the tail of the
    /// lowest-priority class present, or are dropped themselves when only
    /// undroppable classes remain.
    pub fn push(&self, entry: OutEntry) -> PushOutcome {
        let mut entry = entry;
        let mut q = self.lock();
        entry.order = q.next_order;
        q.next_order += 1;
        let mut outcome = PushOutcome::Queued;

        if q.len() >= self.capacity
            && matches!(entry.class, OutboundClass::Speech | OutboundClass::Low)
        {
            if !q.low.is_empty() {
                q.low.pop_back();
                outcome = PushOutcome::Evicted("low");
            } else if !q.speech.is_empty() && entry.class == OutboundClass::Speech {
                q.speech.pop_back();
                outcome = PushOutcome::Evicted("speech");
            } else {
                return PushOutcome::Rejected;
            }
        }

        match entry.class {
            OutboundClass::Control => q.control.push_back(entry),
            OutboundClass::Terminal => q.terminal.push_back(entry),
            OutboundClass::Speech => q.speech.push_back(entry),
            OutboundClass::Low => q.low.push_back(entry),
        }
        drop(q);
        self.notify.notify_one();
        outcome
    }

    fn try_pop(&self) -> Option<OutEntry> {
        let mut q = self.lock();

        let terminal_order = q.terminal.front().map(|e| e.order);
        let speech_order = q.speech.front().map(|e| e.order);
        let terminal_is_lane_head = match (terminal_order, speech_order) {
            (Some(t), Some(s)) => t < s,
            (Some(_), None) => true,
            _ => false,
        };

        if !self.control_before_terminal && terminal_is_lane_head {
            if let Some(e) = q.terminal.pop_front() {
                return Some(e);
            }
        }
        if let Some(e) = q.control.pop_front() {
            return Some(e);
        }
        match (terminal_order, speech_order) {
            (Some(t), Some(s)) => {
                if t < s {
                    q.terminal.pop_front()
                } else {
                    q.speech.pop_front()
                }
            }
            (Some(_), None) => q.terminal.pop_front(),
            (None, Some(_)) => q.speech.pop_front(),
            (None, None) => q.low.pop_front(),
        }
    }

    /// Priority dequeue (single consumer: the writer).
    pub async fn pop(&self) -> OutEntry {
        loop {
            let notified = self.notify.notified();
            if let Some(e) = self.try_pop() {
                return e;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct InInner {
    control: VecDeque<Inbound>,
    turn: VecDeque<Inbound>,
    update: VecDeque<Inbound>,
}

impl InInner {
    fn len(&self) -> usize {
        self.control.len() + self.turn.len() + self.update.len()
    }
}

pub struct InboundQueue {
    inner: Mutex<InInner>,
    notify: Notify,
    capacity: usize,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(InInner::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InInner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Enqueue with the overload policy: oldest UPDATE evicted first, then
    /// the oldest TURN, but never the newest turn request. CONTROL always
    /// fits.
    pub fn push(&self, frame: Inbound) -> PushOutcome {
        let class = frame.class();
        let mut q = self.lock();
        let mut outcome = PushOutcome::Queued;

        if q.len() >= self.capacity && class != InboundClass::Control {
            if !q.update.is_empty() {
                q.update.pop_front();
                outcome = PushOutcome::Evicted("update");
            } else if q.turn.len() >= 2 || (class == InboundClass::Turn && !q.turn.is_empty()) {
                // The incoming turn request (if any) is the newest; the
                // front of the deque is safe to shed.
                q.turn.pop_front();
                outcome = PushOutcome::Evicted("turn");
            } else if class == InboundClass::Update {
                return PushOutcome::Rejected;
            }
        }

        match class {
            InboundClass::Control => q.control.push_back(frame),
            InboundClass::Turn => q.turn.push_back(frame),
            InboundClass::Update => q.update.push_back(frame),
        }
        drop(q);
        self.notify.notify_one();
        outcome
    }

    fn try_pop(&self) -> Option<Inbound> {
        let mut q = self.lock();
        q.control
            .pop_front()
            .or_else(|| q.turn.pop_front())
            .or_else(|| q.update.pop_front())
    }

    /// Priority dequeue (single consumer: the machine). Control frames are
    /// delivered ahead of any update backlog that arrived earlier.
    pub async fn pop(&self) -> Inbound {
        loop {
            let notified = self.notify.notified();
            if let Some(f) = self.try_pop() {
                return f;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use voxbrain_core::protocol::outbound::Outbound;

    fn speech(seq: u64) -> OutEntry {
        OutEntry::stamped(
            OutboundClass::Speech,
            Outbound::Response {
                response_id: 1,
                content: format!("chunk {seq}"),
                content_complete: false,
            },
            SegmentStamp {
                epoch: 1,
                speak_gen: 0,
                seq,
            },
        )
    }

    #[tokio::test]
    async fn control_overtakes_speech_backlog() {
        let q = OutboundQueue::new(16, true);
        q.push(speech(0));
        q.push(speech(1));
        q.push(OutEntry::control(Outbound::PingPong { timestamp: 1 }));

        let first = q.pop().await;
        assert_eq!(first.class, OutboundClass::Control);
    }

    #[tokio::test]
    async fn terminal_survives_speech_flood() {
        let q = OutboundQueue::new(4, true);
        for i in 0..8 {
            q.push(speech(i));
        }
        let outcome = q.push(OutEntry::stamped(
            OutboundClass::Terminal,
            Outbound::empty_terminal(1),
            SegmentStamp {
                epoch: 1,
                speak_gen: 0,
                seq: 8,
            },
        ));
        assert_eq!(outcome, PushOutcome::Queued);

        // The flood evicted speech, never the terminal, and dequeue keeps
        // the surviving speech ahead of the terminal (enqueue order).
        let mut popped = Vec::new();
        while !q.is_empty() {
            popped.push(q.pop().await);
        }
        assert!(popped.len() <= 5);
        let last = popped.last().unwrap();
        assert_eq!(last.class, OutboundClass::Terminal);
        assert!(popped[..popped.len() - 1]
            .iter()
            .all(|e| e.class == OutboundClass::Speech));
    }

    #[tokio::test]
    async fn terminal_never_overtakes_same_turn_speech() {
        let q = OutboundQueue::new(16, true);
        q.push(speech(0));
        q.push(OutEntry::stamped(
            OutboundClass::Terminal,
            Outbound::empty_terminal(1),
            SegmentStamp {
                epoch: 1,
                speak_gen: 0,
                seq: 1,
            },
        ));

        let first = q.pop().await;
        assert_eq!(first.class, OutboundClass::Speech);
        let second = q.pop().await;
        assert_eq!(second.class, OutboundClass::Terminal);
    }

    #[tokio::test]
    async fn speech_flood_evicts_tail_speech() {
        let q = OutboundQueue::new(4, true);
        for i in 0..4 {
            assert_eq!(q.push(speech(i)), PushOutcome::Queued);
        }
        assert!(matches!(q.push(speech(4)), PushOutcome::Evicted(_)));
        assert_eq!(q.len(), 4);
    }

    #[tokio::test]
    async fn inbound_update_evicted_before_turn() {
        use voxbrain_core::protocol::inbound::Inbound;

        let q = InboundQueue::new(2);
        q.push(Inbound::UpdateOnly {
            transcript: vec![],
            turntaking: None,
        });
        q.push(Inbound::ResponseRequired {
            response_id: 1,
            transcript: vec![],
        });
        // Full; this update evicts the older update, not the turn.
        let outcome = q.push(Inbound::UpdateOnly {
            transcript: vec![],
            turntaking: Some("user_turn".into()),
        });
        assert!(matches!(outcome, PushOutcome::Evicted("update")));

        let first = q.pop().await;
        assert!(matches!(first, Inbound::ResponseRequired { .. }));
    }

    #[tokio::test]
    async fn newest_turn_request_never_evicted() {
        use voxbrain_core::protocol::inbound::Inbound;

        let q = InboundQueue::new(2);
        q.push(Inbound::ResponseRequired {
            response_id: 1,
            transcript: vec![],
        });
        q.push(Inbound::ResponseRequired {
            response_id: 2,
            transcript: vec![],
        });
        // Full of turns; the incoming turn is newest, the oldest goes.
        q.push(Inbound::ResponseRequired {
            response_id: 3,
            transcript: vec![],
        });

        let first = q.pop().await;
        match first {
            Inbound::ResponseRequired { response_id, .. } => assert_eq!(response_id, 2),
            other => panic!("unexpected frame: {other:?}"),
        }
        let second = q.pop().await;
        match second {
            Inbound::ResponseRequired { response_id, .. } => assert_eq!(response_id, 3),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn control_delivered_before_earlier_updates() {
        use voxbrain_core::protocol::inbound::Inbound;

        let q = InboundQueue::new(8);
        q.push(Inbound::UpdateOnly {
            transcript: vec![],
            turntaking: None,
        });
        q.push(Inbound::Clear);

        let first = q.pop().await;
        assert!(matches!(first, Inbound::Clear));
    }
}
