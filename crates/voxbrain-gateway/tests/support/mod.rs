//! Shared test harness: a session wired to channel-backed fakes instead of
//! a real socket, so tests inject inbound frames and observe the exact
//! outbound byte stream.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voxbrain_core::error::{CloseReason, Result};
use voxbrain_gateway::app_state::AppState;
use voxbrain_gateway::config::BrainConfig;
use voxbrain_gateway::producer::SpeechProducer;
use voxbrain_gateway::session::{run_session, SessionDeps};
use voxbrain_gateway::transport::wire::{FrameSink, FrameSource, RawFrame};

/// What the fake sink observed on the wire.
#[derive(Debug, Clone)]
pub enum WireOut {
    Text(String),
    Pong(Vec<u8>),
}

pub struct FakeSource {
    rx: mpsc::Receiver<RawFrame>,
}

#[async_trait]
impl FrameSource for FakeSource {
    async fn next_frame(&mut self) -> Option<RawFrame> {
        self.rx.recv().await
    }
}

pub struct FakeSink {
    tx: mpsc::UnboundedSender<WireOut>,
    delay: Arc<Mutex<Duration>>,
}

impl FakeSink {
    async fn stall(&self) {
        let d = *self.delay.lock().unwrap();
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl FrameSink for FakeSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stall().await;
        let _ = self.tx.send(WireOut::Text(text));
        Ok(())
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<()> {
        self.stall().await;
        let _ = self.tx.send(WireOut::Pong(payload));
        Ok(())
    }
}

pub struct Harness {
    pub state: AppState,
    pub in_tx: mpsc::Sender<RawFrame>,
    pub out_rx: mpsc::UnboundedReceiver<WireOut>,
    pub delay: Arc<Mutex<Duration>>,
    pub handle: JoinHandle<CloseReason>,
}

pub fn spawn_session(cfg: BrainConfig, producer: Arc<dyn SpeechProducer>) -> Harness {
    let state = AppState::with_producer(cfg, producer);
    let (in_tx, in_rx) = mpsc::channel(64);
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let delay = Arc::new(Mutex::new(Duration::ZERO));

    let deps = SessionDeps {
        source: Box::new(FakeSource { rx: in_rx }),
        sink: Box::new(FakeSink {
            tx: out_tx,
            delay: delay.clone(),
        }),
    };

    let handle = tokio::spawn(run_session(state.clone(), "call_test".into(), deps));

    Harness {
        state,
        in_tx,
        out_rx,
        delay,
        handle,
    }
}

impl Harness {
    pub fn set_write_delay(&self, d: Duration) {
        *self.delay.lock().unwrap() = d;
    }

    pub async fn send_json(&self, v: Value) {
        self.send_raw(&v.to_string()).await;
    }

    pub async fn send_raw(&self, s: &str) {
        self.in_tx
            .send(RawFrame::Text(Bytes::from(s.to_owned())))
            .await
            .expect("session reader gone");
    }

    /// Next written frame, bounded so a broken session fails fast.
    pub async fn next_out(&mut self) -> Option<WireOut> {
        tokio::time::timeout(Duration::from_secs(60), self.out_rx.recv())
            .await
            .expect("timed out waiting for outbound frame")
    }

    /// Next JSON frame that is not a keepalive.
    pub async fn next_frame_skip_pings(&mut self) -> Value {
        loop {
            match self.next_out().await {
                Some(WireOut::Text(s)) => {
                    let v: Value = serde_json::from_str(&s).expect("outbound must be JSON");
                    if v["response_type"] == "ping_pong" {
                        continue;
                    }
                    return v;
                }
                Some(WireOut::Pong(_)) => continue,
                None => panic!("outbound stream closed"),
            }
        }
    }

    /// Drain whatever is already written without waiting.
    pub fn drain_now(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(frame) = self.out_rx.try_recv() {
            if let WireOut::Text(s) = frame {
                if let Ok(v) = serde_json::from_str::<Value>(&s) {
                    out.push(v);
                }
            }
        }
        out
    }

    /// Collect non-ping frames until a terminal response for `response_id`
    /// appears (inclusive).
    pub async fn collect_until_terminal(&mut self, response_id: u64) -> Vec<Value> {
        let mut out = Vec::new();
        loop {
            let v = self.next_frame_skip_pings().await;
            let done = v["response_type"] == "response"
                && v["response_id"] == response_id
                && v["content_complete"] == true;
            out.push(v);
            if done {
                return out;
            }
        }
    }
}

/// Wire-stream invariants every session must uphold, applied to a collected
/// frame sequence:
/// - response ids never go backwards,
/// - at most one `content_complete=true` per response id,
/// - nothing non-terminal follows a terminal for the same id.
pub fn assert_stream_invariants(frames: &[Value]) {
    let mut max_id: Option<u64> = None;
    let mut terminals: std::collections::HashSet<u64> = Default::default();

    for v in frames {
        if v["response_type"] != "response" {
            continue;
        }
        let id = v["response_id"].as_u64().expect("response_id must be u64");
        let terminal = v["content_complete"] == true;

        if let Some(m) = max_id {
            assert!(
                id >= m,
                "response_id went backwards: {id} after {m} in {frames:#?}"
            );
        }
        max_id = Some(max_id.map_or(id, |m| m.max(id)));

        if terminals.contains(&id) {
            panic!("frame for response_id {id} after its terminal: {v}");
        }
        if terminal {
            terminals.insert(id);
        }
    }
}

pub fn response_required(response_id: u64, lines: &[(&str, &str)]) -> Value {
    serde_json::json!({
        "interaction_type": "response_required",
        "response_id": response_id,
        "transcript": lines.iter()
            .map(|(role, content)| serde_json::json!({"role": role, "content": content}))
            .collect::<Vec<_>>(),
    })
}

pub fn update_user_turn() -> Value {
    serde_json::json!({
        "interaction_type": "update_only",
        "transcript": [{"role": "user", "content": "wait"}],
        "turntaking": "user_turn",
    })
}
