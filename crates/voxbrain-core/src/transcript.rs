//! Bounded transcript memory with deterministic compaction.
//!
//! The platform sends full transcript snapshots; the ring consumes the
//! unseen suffix, so replayed or out-of-order snapshots are idempotent.
//! When either bound overflows, the oldest utterances are folded into a
//! summary record (last-N kept verbatim). The summary is a pure function of
//! the input sequence and minimizes PII: digit runs that look like phone
//! numbers are reduced to their last four digits.

use std::collections::VecDeque;

use crate::protocol::{Role, Utterance};

/// Utterances always kept verbatim at the tail of the ring.
const KEEP_VERBATIM: usize = 4;

/// One stored utterance with its session-relative ingest stamp (ms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptItem {
    pub role: Role,
    pub text: String,
    pub t: u64,
}

/// Read-only view handed to turn handlers for prompt building.
#[derive(Debug, Clone, Default)]
pub struct TranscriptView {
    /// Compacted prefix, oldest first, already PII-minimized.
    pub summary: Option<String>,
    /// Verbatim tail, oldest first.
    pub items: Vec<TranscriptItem>,
}

#[derive(Debug)]
pub struct TranscriptRing {
    max_utterances: usize,
    max_chars: usize,
    items: VecDeque<TranscriptItem>,
    chars: usize,
    summary: VecDeque<String>,
    summary_chars: usize,
    /// Wire utterances consumed so far (snapshot suffix cursor).
    seen: usize,
    compactions: u64,
}

impl TranscriptRing {
    pub fn new(max_utterances: usize, max_chars: usize) -> Self {
        Self {
            max_utterances: max_utterances.max(1),
            max_chars: max_chars.max(1),
            items: VecDeque::new(),
            chars: 0,
            summary: VecDeque::new(),
            summary_chars: 0,
            seen: 0,
            compactions: 0,
        }
    }

    /// Consume a full transcript snapshot. Returns the number of compaction
    /// runs this ingest triggered.
    ///
    /// Snapshots shorter than what we have already consumed are stale
    /// (arrived out of order) and ignored. A same-length snapshot may revise
    /// the text of the final utterance (ASR refinement).
    pub fn ingest_snapshot(&mut self, snapshot: &[Utterance], now_ms: u64) -> u64 {
        if snapshot.len() < self.seen {
            return 0;
        }

        if snapshot.len() == self.seen {
            if let (Some(last_new), Some(last_old)) = (snapshot.last(), self.items.back_mut()) {
                if last_new.role == last_old.role && last_new.content != last_old.text {
                    self.chars = self.chars - last_old.text.len() + last_new.content.len();
                    last_old.text = last_new.content.clone();
                    return self.compact();
                }
            }
            return 0;
        }

        for u in &snapshot[self.seen..] {
            self.chars += u.content.len();
            self.items.push_back(TranscriptItem {
                role: u.role,
                text: u.content.clone(),
                t: now_ms,
            });
        }
        self.seen = snapshot.len();
        self.compact()
    }

    /// Fold the oldest utterances into the summary until both bounds hold.
    fn compact(&mut self) -> u64 {
        let keep = KEEP_VERBATIM.min(self.max_utterances);
        let mut folded = false;

        while (self.items.len() > self.max_utterances || self.chars > self.max_chars)
            && self.items.len() > keep
        {
            let Some(item) = self.items.pop_front() else {
                break;
            };
            self.chars -= item.text.len();

            let record = format!("{}: {}", item.role.as_str(), minimize_pii(&item.text));
            self.summary_chars += record.len();
            self.summary.push_back(record);
            folded = true;
        }

        // The summary itself stays bounded; oldest records fall off first.
        let summary_cap = (self.max_chars / 4).max(256);
        while self.summary_chars > summary_cap && self.summary.len() > 1 {
            if let Some(dropped) = self.summary.pop_front() {
                self.summary_chars -= dropped.len();
            }
        }

        if folded {
            self.compactions += 1;
            1
        } else {
            0
        }
    }

    /// Snapshot for prompt building (summary + verbatim tail).
    pub fn view(&self) -> TranscriptView {
        let summary = if self.summary.is_empty() {
            None
        } else {
            Some(
                self.summary
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };
        TranscriptView {
            summary,
            items: self.items.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total compaction runs since session start.
    pub fn compactions(&self) -> u64 {
        self.compactions
    }
}

/// Reduce digit runs that look like phone numbers to their last four digits.
fn minimize_pii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();

    let flush = |run: &mut String, out: &mut String| {
        if run.len() >= 7 {
            out.push_str("...");
            out.push_str(&run[run.len() - 4..]);
        } else {
            out.push_str(run);
        }
        run.clear();
    };

    for c in text.chars() {
        if c.is_ascii_digit() {
            run.push(c);
        } else {
            flush(&mut run, &mut out);
            out.push(c);
        }
    }
    flush(&mut run, &mut out);
    out
}
