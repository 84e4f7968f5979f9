//! Socket seam between sessions and the network.
//!
//! A [`Connector`] opens a socket and hands back a split [`SocketPair`]. The
//! production connector speaks WebSocket through `tokio-tungstenite`; tests
//! use `fake::FakeConnector`, built with the `testing` feature.

use {
    async_trait::async_trait,
    futures::{
        SinkExt, StreamExt,
        stream::{SplitSink, SplitStream},
    },
    tokio::net::TcpStream,
    tokio_tungstenite::{
        MaybeTlsStream, WebSocketStream, connect_async,
        tungstenite::{Message, protocol::CloseFrame},
    },
    tracing::{debug, trace},
};

use crate::error::{Error, Result};

/// What a session observes on its socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Text(String),
    Closed { code: Option<u16>, reason: String },
    /// A read error. The socket is closed on the next read.
    Error(String),
}

impl SocketEvent {
    pub fn closed(code: Option<u16>) -> Self {
        Self::Closed {
            code,
            reason: String::new(),
        }
    }
}

#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait FrameStream: Send {
    /// Next event on the socket. Must be cancel-safe.
    async fn next_event(&mut self) -> SocketEvent;
}

pub struct SocketPair {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<SocketPair>;
}

// ── tokio-tungstenite ────────────────────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector for `ws://` and `wss://` gateways.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        // Ignored when a provider was already installed by someone else.
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<SocketPair> {
        let (ws, response) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        debug!(status = %response.status(), "websocket handshake complete");

        let (sink, stream) = ws.split();
        Ok(SocketPair {
            sink: Box::new(TungsteniteSink { inner: sink }),
            stream: Box::new(TungsteniteStream {
                inner: stream,
                failed: false,
            }),
        })
    }
}

struct TungsteniteSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for TungsteniteSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner
            .close()
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }
}

struct TungsteniteStream {
    inner: SplitStream<WsStream>,
    failed: bool,
}

#[async_trait]
impl FrameStream for TungsteniteStream {
    async fn next_event(&mut self) -> SocketEvent {
        if self.failed {
            return SocketEvent::closed(None);
        }
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return SocketEvent::Text(text.to_string()),
                Some(Ok(Message::Close(frame))) => return close_event(frame),
                Some(Ok(other)) => {
                    trace!(kind = message_kind(&other), "ignoring non-text message");
                },
                Some(Err(e)) => {
                    self.failed = true;
                    return SocketEvent::Error(e.to_string());
                },
                None => return SocketEvent::closed(None),
            }
        }
    }
}

fn close_event(frame: Option<CloseFrame>) -> SocketEvent {
    match frame {
        Some(frame) => SocketEvent::Closed {
            code: Some(u16::from(frame.code)),
            reason: frame.reason.to_string(),
        },
        None => SocketEvent::closed(None),
    }
}

fn message_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "frame",
    }
}
