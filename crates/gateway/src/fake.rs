//! In-memory connector for exercising sessions without a network.
//!
//! Each call to [`Connector::connect`] records a [`FakeConnection`]. Tests
//! drive the server side through it: inject frames and close codes, then
//! inspect what the session sent.
//!
//! ```ignore
//! let connector = FakeConnector::new();
//! let supervisor = ConnectionSupervisor::new(credentials, spec, settings, Arc::new(connector.clone()));
//! supervisor.start(&Target::All).await?;
//!
//! let conn = connector.wait_for_connection(0).await.unwrap();
//! conn.hello(41_250);
//! conn.close(4004);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
};

use {
    async_trait::async_trait,
    serde_json::{Value, json},
    tokio::sync::{Mutex, mpsc, watch},
};

use crate::{
    error::{Error, Result},
    protocol::opcode,
    transport::{Connector, FrameSink, FrameStream, SocketEvent, SocketPair},
};

/// Close code reported back when the client closes a fake socket.
pub const CLIENT_CLOSE_CODE: u16 = 1000;

/// How the fake server reacts when the client closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Complete the handshake with [`CLIENT_CLOSE_CODE`].
    Echo,
    /// Never answer; the socket stays silent.
    Silent,
    /// `close` itself never returns.
    Stall,
}

impl CloseMode {
    fn to_u8(self) -> u8 {
        match self {
            Self::Echo => 0,
            Self::Silent => 1,
            Self::Stall => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Silent,
            2 => Self::Stall,
            _ => Self::Echo,
        }
    }
}

/// Records every connection attempt. Clones share state.
#[derive(Clone)]
pub struct FakeConnector {
    connections: Arc<watch::Sender<Vec<FakeConnection>>>,
    failures: Arc<AtomicUsize>,
    hangs: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
    close_mode: Arc<AtomicU8>,
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeConnector {
    pub fn new() -> Self {
        let (connections, _) = watch::channel(Vec::new());
        Self {
            connections: Arc::new(connections),
            failures: Arc::new(AtomicUsize::new(0)),
            hangs: Arc::new(AtomicUsize::new(0)),
            attempts: Arc::new(AtomicUsize::new(0)),
            close_mode: Arc::new(AtomicU8::new(CloseMode::Echo.to_u8())),
        }
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` connection attempts never complete.
    pub fn hang_next(&self, n: usize) {
        self.hangs.store(n, Ordering::SeqCst);
    }

    /// Applies to every socket, already opened ones included.
    pub fn set_close_mode(&self, mode: CloseMode) {
        self.close_mode.store(mode.to_u8(), Ordering::SeqCst);
    }

    /// Number of attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of sockets successfully opened.
    pub fn connection_count(&self) -> usize {
        self.connections.borrow().len()
    }

    pub fn connection(&self, index: usize) -> Option<FakeConnection> {
        self.connections.borrow().get(index).cloned()
    }

    pub fn connections(&self) -> Vec<FakeConnection> {
        self.connections.borrow().clone()
    }

    /// Wait until the `index`-th (0-based) socket has been opened.
    pub async fn wait_for_connection(&self, index: usize) -> Option<FakeConnection> {
        let mut rx = self.connections.subscribe();
        let connections = rx.wait_for(|c| c.len() > index).await.ok()?;
        connections.get(index).cloned()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<SocketPair> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(Error::WebSocket(format!("connection to {url} refused")));
        }
        let should_hang = self
            .hangs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_hang {
            return std::future::pending().await;
        }

        let (inbound, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            url: url.to_string(),
            inbound,
            sent: Mutex::new(Vec::new()),
            closed_by_client: AtomicBool::new(false),
            close_mode: Arc::clone(&self.close_mode),
        });
        self.connections.send_modify(|c| {
            c.push(FakeConnection {
                shared: Arc::clone(&shared),
            })
        });

        Ok(SocketPair {
            sink: Box::new(FakeSink {
                shared: Arc::clone(&shared),
            }),
            stream: Box::new(FakeStream { rx }),
        })
    }
}

struct Shared {
    url: String,
    inbound: mpsc::UnboundedSender<SocketEvent>,
    sent: Mutex<Vec<Value>>,
    closed_by_client: AtomicBool,
    close_mode: Arc<AtomicU8>,
}

/// Server side of one fake socket.
#[derive(Clone)]
pub struct FakeConnection {
    shared: Arc<Shared>,
}

impl FakeConnection {
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn inject(&self, event: SocketEvent) {
        let _ = self.shared.inbound.send(event);
    }

    pub fn inject_text(&self, text: impl Into<String>) {
        self.inject(SocketEvent::Text(text.into()));
    }

    pub fn inject_json(&self, frame: Value) {
        self.inject_text(frame.to_string());
    }

    pub fn hello(&self, heartbeat_interval_ms: u64) {
        self.inject_json(json!({
            "op": opcode::HELLO,
            "d": { "heartbeat_interval": heartbeat_interval_ms },
            "s": null,
            "t": null,
        }));
    }

    pub fn request_heartbeat(&self) {
        self.inject_json(json!({ "op": opcode::HEARTBEAT, "d": null }));
    }

    pub fn close(&self, code: u16) {
        self.inject(SocketEvent::Closed {
            code: Some(code),
            reason: String::new(),
        });
    }

    pub fn error(&self, message: &str) {
        self.inject(SocketEvent::Error(message.to_string()));
    }

    pub fn closed_by_client(&self) -> bool {
        self.shared.closed_by_client.load(Ordering::SeqCst)
    }

    /// Every frame the client sent, in order.
    pub async fn sent(&self) -> Vec<Value> {
        self.shared.sent.lock().await.clone()
    }

    /// Take all sent frames, clearing the buffer.
    pub async fn take_sent(&self) -> Vec<Value> {
        std::mem::take(&mut *self.shared.sent.lock().await)
    }

    /// Sent frames with the given opcode.
    pub async fn sent_with_op(&self, op: u8) -> Vec<Value> {
        self.sent()
            .await
            .into_iter()
            .filter(|f| f["op"] == op)
            .collect()
    }

    /// Token from the first identify frame, if one was sent.
    pub async fn identified_token(&self) -> Option<String> {
        self.sent_with_op(opcode::IDENTIFY)
            .await
            .first()
            .and_then(|f| f["d"]["token"].as_str())
            .map(str::to_string)
    }
}

struct FakeSink {
    shared: Arc<Shared>,
}

#[async_trait]
impl FrameSink for FakeSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.shared.closed_by_client.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        let frame = serde_json::from_str(&text).unwrap_or(Value::String(text));
        self.shared.sent.lock().await.push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mode = CloseMode::from_u8(self.shared.close_mode.load(Ordering::SeqCst));
        if mode == CloseMode::Stall {
            return std::future::pending().await;
        }
        if !self.shared.closed_by_client.swap(true, Ordering::SeqCst) && mode == CloseMode::Echo {
            let _ = self
                .shared
                .inbound
                .send(SocketEvent::closed(Some(CLIENT_CLOSE_CODE)));
        }
        Ok(())
    }
}

struct FakeStream {
    rx: mpsc::UnboundedReceiver<SocketEvent>,
}

#[async_trait]
impl FrameStream for FakeStream {
    async fn next_event(&mut self) -> SocketEvent {
        match self.rx.recv().await {
            Some(event) => event,
            None => SocketEvent::closed(None),
        }
    }
}
