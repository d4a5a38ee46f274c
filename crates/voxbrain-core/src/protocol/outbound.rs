//! Outbound frame encoding.
//!
//! Frames carry `response_type` as their discriminant and encode to minimal
//! JSON. `Deserialize` is derived as well so the encoder is round-trippable
//! (used by the conformance tests).

use serde::{Deserialize, Serialize};

use crate::error::{BrainError, Result};

/// Body of the one-shot `config` frame sent at session open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigBody {
    pub auto_reconnect: bool,
    pub call_details: bool,
}

impl Default for ConfigBody {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            call_details: true,
        }
    }
}

/// Outbound frame, discriminated by `response_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum Outbound {
    /// Session configuration, sent exactly once at open.
    Config { config: ConfigBody },
    /// One speech chunk; `content_complete=true` terminates the response id.
    Response {
        response_id: u64,
        content: String,
        content_complete: bool,
    },
    /// Keepalive heartbeat or echo.
    PingPong { timestamp: u64 },
    /// Reserved; encodable but disabled by default.
    AgentInterrupt { content: String },
}

impl Outbound {
    /// Empty terminal response used to close out an epoch after barge-in.
    pub fn empty_terminal(response_id: u64) -> Self {
        Outbound::Response {
            response_id,
            content: String::new(),
            content_complete: true,
        }
    }

    /// True for `response` frames with `content_complete=true`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Outbound::Response {
                content_complete: true,
                ..
            }
        )
    }

    /// Stable name for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Config { .. } => "config",
            Outbound::Response { .. } => "response",
            Outbound::PingPong { .. } => "ping_pong",
            Outbound::AgentInterrupt { .. } => "agent_interrupt",
        }
    }
}

/// Encode an outbound frame to its wire form.
pub fn encode_outbound(frame: &Outbound) -> Result<String> {
    serde_json::to_string(frame).map_err(|e| BrainError::Encode(e.to_string()))
}
