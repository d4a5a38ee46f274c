//! Narrow wire seam between session tasks and the WebSocket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use voxbrain_core::error::{BrainError, Result};

/// Raw frame classification ahead of JSON decoding.
#[derive(Debug)]
pub enum RawFrame {
    /// Text (or binary-encoded text) payload; candidate protocol frame.
    Text(Bytes),
    /// WebSocket-level ping; echoed at control priority.
    Ping(Vec<u8>),
    /// WebSocket-level pong; keepalive acknowledgement, no action.
    Pong,
    /// Peer close frame or transport error.
    Close,
}

/// Inbound half of the socket.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame; `None` when the stream has ended.
    async fn next_frame(&mut self) -> Option<RawFrame>;
}

/// Outbound half of the socket. Writes carry no deadline here; the writer
/// task owns deadline accounting.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;
    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<()>;
}

pub struct AxumFrameSource {
    inner: SplitStream<WebSocket>,
}

impl AxumFrameSource {
    pub fn new(inner: SplitStream<WebSocket>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FrameSource for AxumFrameSource {
    async fn next_frame(&mut self) -> Option<RawFrame> {
        match self.inner.next().await? {
            Ok(Message::Text(s)) => Some(RawFrame::Text(Bytes::from(s))),
            Ok(Message::Binary(b)) => Some(RawFrame::Text(Bytes::from(b))),
            Ok(Message::Ping(p)) => Some(RawFrame::Ping(p)),
            Ok(Message::Pong(_)) => Some(RawFrame::Pong),
            Ok(Message::Close(_)) => Some(RawFrame::Close),
            Err(_) => Some(RawFrame::Close),
        }
    }
}

pub struct AxumFrameSink {
    inner: SplitSink<WebSocket, Message>,
}

impl AxumFrameSink {
    pub fn new(inner: SplitSink<WebSocket, Message>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FrameSink for AxumFrameSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| BrainError::Internal(format!("ws send failed: {e}")))
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<()> {
        self.inner
            .send(Message::Pong(payload))
            .await
            .map_err(|e| BrainError::Internal(format!("ws pong failed: {e}")))
    }
}
