//! Inbound frame decoding (schema-tolerant).
//!
//! Only two failures are structural and therefore fatal to the session:
//! oversized frames and malformed JSON. Anything else (an unrecognized
//! `interaction_type`, a missing field on a known variant) decodes into
//! [`Inbound::Unknown`] so the platform can evolve its schema without
//! dropping live calls.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;

use super::{InboundClass, Utterance};
use crate::error::{BrainError, Result};

/// `turntaking` value that signals a barge-in.
pub const TURNTAKING_USER: &str = "user_turn";

/// Decoded inbound frame, discriminated by `interaction_type`.
#[derive(Debug)]
pub enum Inbound {
    /// Platform asks for a new response; `response_id` names the epoch.
    ResponseRequired {
        response_id: u64,
        transcript: Vec<Utterance>,
    },
    /// Same semantics as `ResponseRequired`, sent after user silence.
    ReminderRequired {
        response_id: u64,
        transcript: Vec<Utterance>,
    },
    /// Transcript snapshot; `turntaking == "user_turn"` signals barge-in.
    UpdateOnly {
        transcript: Vec<Utterance>,
        turntaking: Option<String>,
    },
    /// Keepalive carrying the platform's clock.
    PingPong { timestamp: u64 },
    /// Explicit interruption signal.
    Clear,
    /// One-shot session metadata; payload kept raw for lazy parsing.
    CallDetails { call: Box<RawValue> },
    /// Forward-compat catch-all, carrying the raw object.
    Unknown { raw: Value },
}

#[derive(Debug, Deserialize)]
struct TurnPayload {
    response_id: u64,
    #[serde(default)]
    transcript: Vec<Utterance>,
}

#[derive(Debug, Deserialize)]
struct UpdatePayload {
    #[serde(default)]
    transcript: Vec<Utterance>,
    #[serde(default)]
    turntaking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PingPayload {
    timestamp: u64,
}

#[derive(Debug, Deserialize)]
struct CallDetailsPayload {
    call: Box<RawValue>,
}

/// Decode one inbound text frame.
///
/// Errors are limited to [`BrainError::FrameTooLarge`] and
/// [`BrainError::BadJson`]; both are fatal to the session.
pub fn decode_inbound(buf: &Bytes, max_frame_bytes: usize) -> Result<Inbound> {
    if buf.len() > max_frame_bytes {
        return Err(BrainError::FrameTooLarge {
            len: buf.len(),
            max: max_frame_bytes,
        });
    }

    let v: Value =
        serde_json::from_slice(buf).map_err(|e| BrainError::BadJson(e.to_string()))?;
    if !v.is_object() {
        return Err(BrainError::BadJson("top-level value is not an object".into()));
    }

    let tag: Option<String> = v
        .get("interaction_type")
        .and_then(Value::as_str)
        .map(str::to_owned);

    let frame = match tag.as_deref() {
        Some("response_required") => TurnPayload::deserialize(&v)
            .map(|p| Inbound::ResponseRequired {
                response_id: p.response_id,
                transcript: p.transcript,
            })
            .unwrap_or_else(|_| Inbound::Unknown { raw: v }),
        Some("reminder_required") => TurnPayload::deserialize(&v)
            .map(|p| Inbound::ReminderRequired {
                response_id: p.response_id,
                transcript: p.transcript,
            })
            .unwrap_or_else(|_| Inbound::Unknown { raw: v }),
        Some("update_only") => UpdatePayload::deserialize(&v)
            .map(|p| Inbound::UpdateOnly {
                transcript: p.transcript,
                turntaking: p.turntaking,
            })
            .unwrap_or_else(|_| Inbound::Unknown { raw: v }),
        Some("ping_pong") => PingPayload::deserialize(&v)
            .map(|p| Inbound::PingPong {
                timestamp: p.timestamp,
            })
            .unwrap_or_else(|_| Inbound::Unknown { raw: v }),
        Some("clear") => Inbound::Clear,
        // RawValue needs the original text, so re-parse from the buffer.
        Some("call_details") => serde_json::from_slice::<CallDetailsPayload>(buf)
            .map(|p| Inbound::CallDetails { call: p.call })
            .unwrap_or_else(|_| Inbound::Unknown { raw: v }),
        _ => {
            tracing::debug!(tag = tag.as_deref().unwrap_or("-"), "unknown inbound variant");
            Inbound::Unknown { raw: v }
        }
    };

    Ok(frame)
}

impl Inbound {
    /// Queue priority class for this frame.
    pub fn class(&self) -> InboundClass {
        match self {
            Inbound::PingPong { .. } | Inbound::Clear => InboundClass::Control,
            Inbound::ResponseRequired { .. } | Inbound::ReminderRequired { .. } => {
                InboundClass::Turn
            }
            Inbound::UpdateOnly { .. } | Inbound::CallDetails { .. } | Inbound::Unknown { .. } => {
                InboundClass::Update
            }
        }
    }

    /// Stable name for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::ResponseRequired { .. } => "response_required",
            Inbound::ReminderRequired { .. } => "reminder_required",
            Inbound::UpdateOnly { .. } => "update_only",
            Inbound::PingPong { .. } => "ping_pong",
            Inbound::Clear => "clear",
            Inbound::CallDetails { .. } => "call_details",
            Inbound::Unknown { .. } => "unknown",
        }
    }

    /// True for `update_only` frames that signal a user barge-in.
    pub fn is_barge_in(&self) -> bool {
        matches!(
            self,
            Inbound::UpdateOnly { turntaking: Some(t), .. } if t == TURNTAKING_USER
        )
    }
}
