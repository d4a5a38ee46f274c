//! Speech text rendering for the telephony TTS path.
//!
//! Pacing uses literal ` - ` dash tokens embedded in the content (spaces
//! required by the platform). Digit sequences are "protected spans": read
//! out one digit at a time (`1234` -> `1 - 2 - 3 - 4`) so phone numbers and
//! confirmation codes survive synthesis. SSML is recognized as a mode but
//! not emitted by default.

use serde::{Deserialize, Serialize};

use crate::segment::SegmentKind;

/// Dash token inserted between paced units. The surrounding spaces are part
/// of the platform contract.
pub const PAUSE_TOKEN: &str = " - ";

/// How outbound speech content is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupMode {
    /// Dash-pause pacing (default).
    DashPause,
    /// Pass content through untouched.
    RawText,
    /// Reserved: accepted in config, currently renders like `RawText`.
    Ssml,
}

impl Default for MarkupMode {
    fn default() -> Self {
        MarkupMode::DashPause
    }
}

/// Where dash pacing applies in `DashPause` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashScope {
    /// Only protected (digit) spans are paced.
    ProtectedOnly,
    /// Protected spans are paced and each segment ends on a pause.
    SegmentBoundary,
}

impl Default for DashScope {
    fn default() -> Self {
        DashScope::ProtectedOnly
    }
}

/// Render one segment's content for the wire.
pub fn render_segment(text: &str, mode: MarkupMode, scope: DashScope) -> String {
    match mode {
        MarkupMode::RawText | MarkupMode::Ssml => text.to_owned(),
        MarkupMode::DashPause => {
            let mut out = space_digit_runs(text);
            if scope == DashScope::SegmentBoundary
                && !out.is_empty()
                && !out.ends_with(PAUSE_TOKEN)
            {
                out.push_str(PAUSE_TOKEN);
            }
            out
        }
    }
}

/// Expand every digit run of length >= 2 into dash-paced single digits.
fn space_digit_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();

    let flush = |run: &mut String, out: &mut String| {
        if run.len() >= 2 {
            let mut first = true;
            for d in run.chars() {
                if !first {
                    out.push_str(PAUSE_TOKEN);
                }
                out.push(d);
                first = false;
            }
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

const ACK_PHRASES: &[&str] = &[
    "Okay.",
    "Sure.",
    "Alright.",
    "Got it.",
    "One moment.",
];

/// Deterministic acknowledgement selection.
///
/// A pure function of `(call_id, turn_id, kind, index)` so a replayed turn
/// reproduces byte-identical output.
pub fn ack_phrase(call_id: &str, turn_id: u64, kind: SegmentKind, index: u64) -> &'static str {
    let mut h = fnv1a_64(0xcbf2_9ce4_8422_2325, call_id.as_bytes());
    h = fnv1a_64(h, &turn_id.to_le_bytes());
    h = fnv1a_64(h, kind.as_str().as_bytes());
    h = fnv1a_64(h, &index.to_le_bytes());
    let idx = (h % ACK_PHRASES.len() as u64) as usize;
    ACK_PHRASES.get(idx).copied().unwrap_or("Okay.")
}

fn fnv1a_64(mut hash: u64, bytes: &[u8]) -> u64 {
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}
