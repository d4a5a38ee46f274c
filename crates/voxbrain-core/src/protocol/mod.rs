//! Wire protocol for the Custom-LLM-over-WebSocket contract.
//!
//! JSON text frames in both directions:
//! - Inbound: discriminated by `interaction_type`, with a catch-all
//!   [`inbound::Inbound::Unknown`] variant so remote schema drift never
//!   terminates a session.
//! - Outbound: discriminated by `response_type`.

pub mod inbound;
pub mod outbound;

use serde::{Deserialize, Serialize};

/// Speaker role on a transcript utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    User,
    /// Forward-compat: roles this build does not know about.
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::User => "user",
            Role::Unknown => "unknown",
        }
    }
}

/// One transcript utterance as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: Role,
    pub content: String,
}

/// Inbound priority classes (highest first). Drives queue dequeue order and
/// eviction under overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InboundClass {
    /// `ping_pong`, `clear`; must never queue behind transcript backlog.
    Control,
    /// `response_required`, `reminder_required`.
    Turn,
    /// `update_only`, `call_details`, unknown variants.
    Update,
}

/// Outbound priority classes (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutboundClass {
    /// Keepalives, WS pongs and the machine's empty terminal response.
    Control,
    /// A producer's `content_complete=true` response.
    Terminal,
    /// Non-terminal speech chunks.
    Speech,
    /// Everything else (reserved frames).
    Low,
}
