//! Shared error type and the session close-reason taxonomy.

use thiserror::Error;

/// Why a session ended (stable taxonomy, reported exactly once per session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Inbound frame exceeded the configured byte cap.
    FrameTooLarge,
    /// Inbound frame was not valid JSON.
    BadJson,
    /// Too many consecutive write deadline misses.
    WriteTimeoutBackpressure,
    /// No inbound frames within the idle window.
    IdleTimeout,
    /// Remote peer closed the socket (or the TCP stream errored).
    PeerClose,
    /// Local process shutdown.
    Shutdown,
}

impl CloseReason {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::FrameTooLarge => "FRAME_TOO_LARGE",
            CloseReason::BadJson => "BAD_JSON",
            CloseReason::WriteTimeoutBackpressure => "WRITE_TIMEOUT_BACKPRESSURE",
            CloseReason::IdleTimeout => "IDLE_TIMEOUT",
            CloseReason::PeerClose => "PEER_CLOSE",
            CloseReason::Shutdown => "SHUTDOWN",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BrainError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum BrainError {
    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },
    #[error("bad json: {0}")]
    BadJson(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("bad config: {0}")]
    Config(String),
    #[error("call not allowed: {0}")]
    NotAllowed(String),
    #[error("channel closed")]
    ChannelClosed,
    #[error("internal: {0}")]
    Internal(String),
}

impl BrainError {
    /// Close reason for errors that terminate the session; `None` for errors
    /// that are absorbed locally (counted, logged, or surfaced to the caller).
    pub fn close_reason(&self) -> Option<CloseReason> {
        match self {
            BrainError::FrameTooLarge { .. } => Some(CloseReason::FrameTooLarge),
            BrainError::BadJson(_) => Some(CloseReason::BadJson),
            _ => None,
        }
    }
}
