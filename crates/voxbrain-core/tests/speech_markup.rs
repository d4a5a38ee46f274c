//! Speech rendering + deterministic ACK selection.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use voxbrain_core::segment::SegmentKind;
use voxbrain_core::speech::{ack_phrase, render_segment, DashScope, MarkupMode};

#[test]
fn digits_are_dash_paced() {
    let out = render_segment(
        "your code is 4821, okay?",
        MarkupMode::DashPause,
        DashScope::ProtectedOnly,
    );
    assert_eq!(out, "your code is 4 - 8 - 2 - 1, okay?");
}

#[test]
fn single_digit_untouched() {
    let out = render_segment("press 1 now", MarkupMode::DashPause, DashScope::ProtectedOnly);
    assert_eq!(out, "press 1 now");
}

#[test]
fn segment_boundary_appends_pause() {
    let out = render_segment(
        "see you tomorrow",
        MarkupMode::DashPause,
        DashScope::SegmentBoundary,
    );
    assert_eq!(out, "see you tomorrow - ");
}

#[test]
fn raw_text_passes_through() {
    let s = "call 5551234567 back";
    assert_eq!(
        render_segment(s, MarkupMode::RawText, DashScope::ProtectedOnly),
        s
    );
}

#[test]
fn ack_is_pure_function_of_identity() {
    let a = ack_phrase("call_ab", 3, SegmentKind::Ack, 0);
    let b = ack_phrase("call_ab", 3, SegmentKind::Ack, 0);
    assert_eq!(a, b);

    // Different turn should be allowed to vary (and must stay deterministic).
    let c1 = ack_phrase("call_ab", 4, SegmentKind::Ack, 0);
    let c2 = ack_phrase("call_ab", 4, SegmentKind::Ack, 0);
    assert_eq!(c1, c2);
}
