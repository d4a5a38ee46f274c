//! Gateway config loader (strict parsing + env overrides).

pub mod schema;

use std::fs;

use voxbrain_core::error::{BrainError, Result};
use voxbrain_core::speech::{DashScope, MarkupMode};

pub use schema::{
    AllowlistSection, BrainConfig, BrainSection, GatewaySection, SpeechSection,
    TranscriptSection, WsSection,
};

pub fn load_from_file(path: &str) -> Result<BrainConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| BrainError::Config(format!("read config failed: {e}")))?;
    let mut cfg = load_from_str(&s)?;
    apply_env_overrides(&mut cfg)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_str(s: &str) -> Result<BrainConfig> {
    let cfg: BrainConfig =
        serde_yaml::from_str(s).map_err(|e| BrainError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Apply the documented `BRAIN_*` / `WS_*` / `TRANSCRIPT_*` / `SPEECH_*`
/// environment overrides on top of the parsed file.
pub fn apply_env_overrides(cfg: &mut BrainConfig) -> Result<()> {
    override_parsed("BRAIN_INBOUND_QUEUE_MAX", &mut cfg.brain.inbound_queue_max)?;
    override_parsed("BRAIN_OUTBOUND_QUEUE_MAX", &mut cfg.brain.outbound_queue_max)?;
    override_parsed("BRAIN_PING_INTERVAL_MS", &mut cfg.brain.ping_interval_ms)?;
    override_parsed("BRAIN_IDLE_TIMEOUT_MS", &mut cfg.brain.idle_timeout_ms)?;
    override_bool("BRAIN_SPEAK_FIRST", &mut cfg.brain.speak_first)?;

    override_parsed("WS_WRITE_TIMEOUT_MS", &mut cfg.ws.write_timeout_ms)?;
    override_parsed(
        "WS_MAX_CONSECUTIVE_WRITE_TIMEOUTS",
        &mut cfg.ws.max_consecutive_write_timeouts,
    )?;
    override_bool("WS_CLOSE_ON_WRITE_TIMEOUT", &mut cfg.ws.close_on_write_timeout)?;
    override_parsed("WS_MAX_FRAME_BYTES", &mut cfg.ws.max_frame_bytes)?;

    override_parsed("TRANSCRIPT_MAX_UTTERANCES", &mut cfg.transcript.max_utterances)?;
    override_parsed("TRANSCRIPT_MAX_CHARS", &mut cfg.transcript.max_chars)?;

    if let Some(v) = env_var("SPEECH_MARKUP_MODE") {
        cfg.speech.markup_mode = match v.as_str() {
            "DASH_PAUSE" => MarkupMode::DashPause,
            "RAW_TEXT" => MarkupMode::RawText,
            "SSML" => MarkupMode::Ssml,
            other => {
                return Err(BrainError::Config(format!(
                    "SPEECH_MARKUP_MODE: unknown mode {other}"
                )))
            }
        };
    }
    if let Some(v) = env_var("DASH_PAUSE_SCOPE") {
        cfg.speech.dash_pause_scope = match v.as_str() {
            "PROTECTED_ONLY" => DashScope::ProtectedOnly,
            "SEGMENT_BOUNDARY" => DashScope::SegmentBoundary,
            other => {
                return Err(BrainError::Config(format!(
                    "DASH_PAUSE_SCOPE: unknown scope {other}"
                )))
            }
        };
    }

    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn override_parsed<T: std::str::FromStr>(name: &str, slot: &mut T) -> Result<()> {
    if let Some(v) = env_var(name) {
        *slot = v
            .parse()
            .map_err(|_| BrainError::Config(format!("{name}: cannot parse {v:?}")))?;
    }
    Ok(())
}

fn override_bool(name: &str, slot: &mut bool) -> Result<()> {
    if let Some(v) = env_var(name) {
        *slot = match v.as_str() {
            "1" | "true" | "TRUE" | "yes" => true,
            "0" | "false" | "FALSE" | "no" => false,
            other => {
                return Err(BrainError::Config(format!(
                    "{name}: expected boolean, got {other:?}"
                )))
            }
        };
    }
    Ok(())
}
