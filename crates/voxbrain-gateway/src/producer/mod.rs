//! Producer seam: where LLM/NLG text generation plugs in.
//!
//! The brain treats the producer as an opaque chunk stream. It must respect
//! channel backpressure and return promptly once the receiver is gone (the
//! turn was cancelled).

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use voxbrain_core::error::Result;
use voxbrain_core::transcript::TranscriptView;

/// Which kind of turn the platform asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// Opening turn spoken without a user prompt.
    Greeting,
    /// Regular `response_required` turn.
    Response,
    /// `reminder_required` after user silence.
    Reminder,
}

impl TurnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnKind::Greeting => "greeting",
            TurnKind::Response => "response",
            TurnKind::Reminder => "reminder",
        }
    }
}

/// Everything a producer gets to work with for one turn.
///
/// `transcript` is the full bounded history at turn start; `updates`
/// delivers fresher snapshots if the platform re-prompts the same turn.
#[derive(Debug, Clone)]
pub struct TurnPrompt {
    pub call_id: Arc<str>,
    pub turn_id: u64,
    pub kind: TurnKind,
    pub transcript: TranscriptView,
    pub updates: watch::Receiver<TranscriptView>,
}

/// External LLM/policy collaborator.
#[async_trait]
pub trait SpeechProducer: Send + Sync {
    /// Stream response text for one turn into `out`. Returning `Ok` after the
    /// last chunk ends the turn; the handler appends the terminal frame.
    async fn produce(&self, prompt: TurnPrompt, out: mpsc::Sender<String>) -> Result<()>;
}

/// Deterministic canned producer used by tests and the default binary.
/// Replies cycle by turn id, so a given turn always says the same thing.
pub struct ScriptedProducer {
    lines: Vec<String>,
}

impl ScriptedProducer {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

impl Default for ScriptedProducer {
    fn default() -> Self {
        Self::new(vec![
            "I can help with that.".into(),
            "Let me check that for you.".into(),
            "Thanks, one moment please.".into(),
        ])
    }
}

#[async_trait]
impl SpeechProducer for ScriptedProducer {
    async fn produce(&self, prompt: TurnPrompt, out: mpsc::Sender<String>) -> Result<()> {
        if self.lines.is_empty() {
            return Ok(());
        }
        let idx = (prompt.turn_id as usize) % self.lines.len();
        if let Some(line) = self.lines.get(idx) {
            // Receiver dropped means the turn was cancelled; nothing to do.
            let _ = out.send(line.clone()).await;
        }
        Ok(())
    }
}
