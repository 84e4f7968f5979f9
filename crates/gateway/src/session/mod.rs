//! One credential's connection.
//!
//! [`machine`] holds the pure transition function; [`runtime`] owns the socket
//! and timers and interprets the machine's effects.

pub mod machine;
pub(crate) mod runtime;

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use {
    serde::Serialize,
    tokio::{
        sync::{mpsc, watch},
        task::JoinHandle,
    },
};

use crate::credentials::CredentialId;

// ── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    AwaitingHello,
    Heartbeating,
    Closing,
    Reconnecting,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Heartbeating => "heartbeating",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Why a session reached `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "code")]
pub enum TerminalReason {
    /// Reconnect was disabled, by an explicit stop or shutdown.
    Stopped,
    /// The server closed with a code that forbids reconnecting.
    Fatal(u16),
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Fatal(code) => write!(f, "fatal close {code}"),
        }
    }
}

// ── Identity ─────────────────────────────────────────────────────────────────

/// Process-unique session identity. A replacement session gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Requests delivered to a running session.
#[derive(Debug)]
pub(crate) enum Control {
    /// Run the teardown sequence and terminate.
    Shutdown,
    /// Publish a freshly composed presence now.
    UpdatePresence,
}

/// How a session task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionExit {
    Terminated(TerminalReason),
    /// The reconnect delay elapsed; a replacement should take over.
    Respawn,
}

/// The supervisor's view of a live session.
#[derive(Debug)]
pub(crate) struct SessionHandle {
    pub id: SessionId,
    pub control: mpsc::UnboundedSender<Control>,
    pub reconnect: Arc<AtomicBool>,
    pub state: watch::Receiver<SessionState>,
    pub task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// The task is still running and has not reached `Terminated`.
    pub fn is_live(&self) -> bool {
        !self.task.is_finished() && self.state() != SessionState::Terminated
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect.load(Ordering::SeqCst)
    }

    pub fn disable_reconnect(&self) {
        self.reconnect.store(false, Ordering::SeqCst);
    }
}
