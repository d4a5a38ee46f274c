//! Config schema with strict parsing.
//!
//! `deny_unknown_fields` prevents silent misconfiguration. Every operational
//! knob also has an environment-variable override (see `env_overrides` in
//! the parent module), which is how deployments tune a single container
//! without editing the YAML.

use serde::Deserialize;

use voxbrain_core::error::{BrainError, Result};
use voxbrain_core::speech::{DashScope, MarkupMode};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrainConfig {
    pub version: u32,
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub brain: BrainSection,
    #[serde(default)]
    pub ws: WsSection,
    #[serde(default)]
    pub transcript: TranscriptSection,
    #[serde(default)]
    pub speech: SpeechSection,
    #[serde(default)]
    pub allowlist: AllowlistSection,
}

impl BrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BrainError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        if self.brain.inbound_queue_max == 0 || self.brain.outbound_queue_max == 0 {
            return Err(BrainError::Config("queue capacities must be > 0".into()));
        }
        if self.ws.write_timeout_ms == 0 {
            return Err(BrainError::Config("ws.write_timeout_ms must be > 0".into()));
        }
        if self.ws.max_frame_bytes == 0 {
            return Err(BrainError::Config("ws.max_frame_bytes must be > 0".into()));
        }
        if self.transcript.max_utterances == 0 || self.transcript.max_chars == 0 {
            return Err(BrainError::Config("transcript bounds must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            brain: BrainSection::default(),
            ws: WsSection::default(),
            transcript: TranscriptSection::default(),
            speech: SpeechSection::default(),
            allowlist: AllowlistSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrainSection {
    /// Inbound queue capacity.
    #[serde(default = "default_queue_max")]
    pub inbound_queue_max: usize,
    /// Outbound queue capacity.
    #[serde(default = "default_queue_max")]
    pub outbound_queue_max: usize,
    /// Heartbeat interval.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Idle close threshold.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// If true, the opening `response_id=0` stream carries a greeting.
    #[serde(default)]
    pub speak_first: bool,
    /// Greeting content used when `speak_first` is set.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Dequeue tie-break when CONTROL and TERMINAL are both queued.
    #[serde(default = "default_true")]
    pub control_before_terminal: bool,
}

impl Default for BrainSection {
    fn default() -> Self {
        Self {
            inbound_queue_max: default_queue_max(),
            outbound_queue_max: default_queue_max(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            speak_first: false,
            greeting: default_greeting(),
            control_before_terminal: true,
        }
    }
}

fn default_queue_max() -> usize {
    256
}

fn default_ping_interval_ms() -> u64 {
    2000
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}

fn default_greeting() -> String {
    "Hello! How can I help you today?".into()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WsSection {
    /// Per-frame write deadline.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Consecutive deadline misses tolerated before closing.
    #[serde(default = "default_max_consecutive_write_timeouts")]
    pub max_consecutive_write_timeouts: u32,
    /// Whether deadline misses escalate to a session close.
    #[serde(default = "default_true")]
    pub close_on_write_timeout: bool,
    /// Inbound frame size cap.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Reserved `agent_interrupt` frames; off unless explicitly enabled.
    #[serde(default)]
    pub agent_interrupt_enabled: bool,
}

impl Default for WsSection {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_write_timeout_ms(),
            max_consecutive_write_timeouts: default_max_consecutive_write_timeouts(),
            close_on_write_timeout: true,
            max_frame_bytes: default_max_frame_bytes(),
            agent_interrupt_enabled: false,
        }
    }
}

fn default_write_timeout_ms() -> u64 {
    400
}

fn default_max_consecutive_write_timeouts() -> u32 {
    2
}

fn default_max_frame_bytes() -> usize {
    262_144
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptSection {
    #[serde(default = "default_max_utterances")]
    pub max_utterances: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for TranscriptSection {
    fn default() -> Self {
        Self {
            max_utterances: default_max_utterances(),
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_utterances() -> usize {
    128
}

fn default_max_chars() -> usize {
    16_384
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeechSection {
    #[serde(default)]
    pub markup_mode: MarkupMode,
    #[serde(default)]
    pub dash_pause_scope: DashScope,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowlistSection {
    /// When false the hook admits every call.
    #[serde(default)]
    pub enabled: bool,
    /// Accepted `call_id` prefixes; empty while enabled means strict deny.
    #[serde(default)]
    pub call_id_prefixes: Vec<String>,
}
