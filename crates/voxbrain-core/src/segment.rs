//! Internal envelope around an outbound speech chunk.

use crate::protocol::OutboundClass;

/// Staleness tag carried by every segment. The writer compares this against
/// the live session clock immediately before the socket write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentStamp {
    /// Epoch (wire `response_id`) the segment belongs to.
    pub epoch: u64,
    /// Speak-generation within the epoch at emission time.
    pub speak_gen: u64,
    /// Monotonic sequence within the turn.
    pub seq: u64,
}

/// What produced the segment content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Deterministic acknowledgement emitted at turn start.
    Ack,
    /// Streamed producer output.
    Speech,
    /// Configured greeting for the opening turn.
    Greeting,
}

impl SegmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Ack => "ack",
            SegmentKind::Speech => "speech",
            SegmentKind::Greeting => "greeting",
        }
    }
}

/// One unit of turn output flowing handler -> machine -> outbound queue.
#[derive(Debug, Clone)]
pub struct Segment {
    pub stamp: SegmentStamp,
    pub kind: SegmentKind,
    pub content: String,
    /// Terminal segments map to `content_complete=true` on the wire.
    pub terminal: bool,
}

impl Segment {
    /// Outbound queue class for this segment.
    pub fn class(&self) -> OutboundClass {
        if self.terminal {
            OutboundClass::Terminal
        } else {
            OutboundClass::Speech
        }
    }
}
