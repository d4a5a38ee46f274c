//! Session clock: epoch / speak-generation bookkeeping.
//!
//! This is the only cross-task mutable state in a session. All mutations go
//! through the turn-epoch machine; the writer and turn handlers only read.
//! Every method is a single short critical section and the lock is never
//! held across a suspension point.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use voxbrain_core::segment::Segment;

/// Consistent read of the live `(epoch, speak_gen, terminal)` values, taken
/// by the writer immediately before each socket write.
#[derive(Debug, Clone, Copy)]
pub struct ClockSnapshot {
    pub epoch: u64,
    pub speak_gen: u64,
    /// Segment sequence of the terminal frame, once one is enqueued for the
    /// current epoch. Later non-terminal sequences must be dropped.
    pub terminal_seq: Option<u64>,
}

/// Result of an epoch transition.
#[derive(Debug, Clone, Copy)]
pub struct BeginEpoch {
    /// Whether the prior epoch emitted any speech segment (drives the
    /// confirmation-safe slot rollback policy).
    pub prior_spoke: bool,
    /// Generation tag of the freshly installed turn-output queue.
    pub turn_q_gen: u64,
}

struct ClockState {
    epoch: u64,
    speak_gen: u64,
    turn_q_gen: u64,
    terminal_seq: Option<u64>,
    spoke_in_epoch: bool,
    /// Receiver half of the new turn-output queue, parked here by
    /// `begin_epoch` until the machine's consumer swaps onto it.
    parked_turn_rx: Option<mpsc::Receiver<Segment>>,
}

pub struct SessionClock {
    inner: Mutex<ClockState>,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ClockState {
                epoch: 0,
                speak_gen: 0,
                turn_q_gen: 0,
                terminal_seq: None,
                spoke_in_epoch: false,
                parked_turn_rx: None,
            }),
        }
    }

    // Poisoning means a panic mid-update; the state itself is still the
    // last written value, so recover the guard instead of wedging the call.
    fn state(&self) -> MutexGuard<'_, ClockState> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        let s = self.state();
        ClockSnapshot {
            epoch: s.epoch,
            speak_gen: s.speak_gen,
            terminal_seq: s.terminal_seq,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.state().epoch
    }

    pub fn speak_gen(&self) -> u64 {
        self.state().speak_gen
    }

    pub fn turn_q_gen(&self) -> u64 {
        self.state().turn_q_gen
    }

    pub fn terminal_marked(&self) -> bool {
        self.state().terminal_seq.is_some()
    }

    /// Epoch transition: publish `epoch = n`, `speak_gen = 0` and the new
    /// turn queue as one critical section, so the writer can never observe a
    /// new-epoch frame before the transition itself.
    pub fn begin_epoch(&self, n: u64, turn_rx: mpsc::Receiver<Segment>) -> BeginEpoch {
        let mut s = self.state();
        let prior_spoke = s.spoke_in_epoch;
        s.epoch = n;
        s.speak_gen = 0;
        s.terminal_seq = None;
        s.spoke_in_epoch = false;
        s.turn_q_gen += 1;
        s.parked_turn_rx = Some(turn_rx);
        BeginEpoch {
            prior_spoke,
            turn_q_gen: s.turn_q_gen,
        }
    }

    /// Take the parked turn-output receiver if the consumer's generation tag
    /// is behind the live one (the machine's swap rule).
    pub fn take_turn_rx(&self, held_gen: u64) -> Option<(u64, mpsc::Receiver<Segment>)> {
        let mut s = self.state();
        if s.turn_q_gen == held_gen {
            return None;
        }
        s.parked_turn_rx.take().map(|rx| (s.turn_q_gen, rx))
    }

    /// Same-epoch barge-in: invalidate all in-flight speech.
    pub fn bump_speak_gen(&self) -> u64 {
        let mut s = self.state();
        s.speak_gen += 1;
        s.speak_gen
    }

    /// Record the terminal frame for the current epoch. Returns false if one
    /// was already recorded; the caller must then drop its frame.
    pub fn mark_terminal(&self, seq: u64) -> bool {
        let mut s = self.state();
        if s.terminal_seq.is_some() {
            return false;
        }
        s.terminal_seq = Some(seq);
        true
    }

    /// Note that the current epoch has put speech on the wire path.
    pub fn note_speech(&self) {
        self.state().spoke_in_epoch = true;
    }
}
