//! Inbound codec vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use bytes::Bytes;

use voxbrain_core::protocol::inbound::{decode_inbound, Inbound};
use voxbrain_core::protocol::{InboundClass, Role};
use voxbrain_core::BrainError;

const MAX: usize = 262_144;

fn load(name: &str) -> Bytes {
    Bytes::from(fs::read_to_string(format!("tests/vectors/{name}")).unwrap())
}

#[test]
fn parse_response_required_ignores_extra_fields() {
    let frame = decode_inbound(&load("response_required.json"), MAX).unwrap();
    match frame {
        Inbound::ResponseRequired {
            response_id,
            transcript,
        } => {
            assert_eq!(response_id, 7);
            assert_eq!(transcript.len(), 2);
            assert_eq!(transcript[0].role, Role::Agent);
            assert_eq!(transcript[1].content, "I need to reschedule.");
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn parse_update_barge_in() {
    let frame = decode_inbound(&load("update_barge_in.json"), MAX).unwrap();
    assert!(frame.is_barge_in());
    assert_eq!(frame.class(), InboundClass::Update);
}

#[test]
fn parse_ping_pong_is_control_class() {
    let frame = decode_inbound(&load("ping_pong.json"), MAX).unwrap();
    match &frame {
        Inbound::PingPong { timestamp } => assert_eq!(*timestamp, 1_712_345_678_901),
        other => panic!("unexpected variant: {other:?}"),
    }
    assert_eq!(frame.class(), InboundClass::Control);
}

#[test]
fn unknown_interaction_type_decodes_not_errors() {
    let frame = decode_inbound(&load("unknown_event.json"), MAX).unwrap();
    match frame {
        Inbound::Unknown { raw } => {
            assert_eq!(raw["interaction_type"], "novel_event");
            assert_eq!(raw["x"], 1);
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn missing_interaction_type_is_unknown() {
    let frame = decode_inbound(&Bytes::from_static(b"{\"foo\":\"bar\"}"), MAX).unwrap();
    assert!(matches!(frame, Inbound::Unknown { .. }));
}

#[test]
fn known_tag_with_broken_fields_is_unknown_not_fatal() {
    // response_id is mandatory on the typed variant.
    let frame = decode_inbound(
        &Bytes::from_static(b"{\"interaction_type\":\"response_required\"}"),
        MAX,
    )
    .unwrap();
    assert!(matches!(frame, Inbound::Unknown { .. }));
}

#[test]
fn call_details_keeps_raw_payload() {
    let frame = decode_inbound(&load("call_details.json"), MAX).unwrap();
    match frame {
        Inbound::CallDetails { call } => {
            assert!(call.get().contains("call_0c34c18e"));
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn frame_at_cap_accepted_one_over_rejected() {
    // Pad a valid JSON object with trailing spaces to hit the cap exactly.
    let mut body = String::from("{\"interaction_type\":\"clear\"}");
    let cap = 256;
    while body.len() < cap {
        body.push(' ');
    }

    let at_cap = decode_inbound(&Bytes::from(body.clone()), cap).unwrap();
    assert!(matches!(at_cap, Inbound::Clear));

    body.push(' ');
    let err = decode_inbound(&Bytes::from(body), cap).expect_err("must reject");
    match err {
        BrainError::FrameTooLarge { len, max } => {
            assert_eq!(len, cap + 1);
            assert_eq!(max, cap);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn malformed_json_is_fatal() {
    let err = decode_inbound(&Bytes::from_static(b"{not json"), MAX).expect_err("must reject");
    assert!(matches!(err, BrainError::BadJson(_)));
    assert_eq!(
        err.close_reason().map(|r| r.as_str()),
        Some("BAD_JSON")
    );
}

#[test]
fn non_object_json_is_fatal() {
    let err = decode_inbound(&Bytes::from_static(b"[1,2,3]"), MAX).expect_err("must reject");
    assert!(matches!(err, BrainError::BadJson(_)));
}
