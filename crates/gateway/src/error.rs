use thiserror::Error;

use crate::{credentials::CredentialId, presence::Status};

/// Errors raised by the connection manager.
#[derive(Debug, Error)]
pub enum Error {
    /// A 1-based credential index outside `1..=count`.
    #[error("credential index {index} is out of range (1..={count})")]
    IndexOutOfRange { index: i64, count: usize },

    /// A raw credential value that is not configured. Carries the masked form.
    #[error("unknown credential {0}")]
    UnknownCredential(String),

    #[error("no credentials are configured")]
    NoCredentials,

    #[error("invalid status {0:?}, expected one of online, idle, dnd, invisible")]
    InvalidStatus(String),

    #[error("status {0} cannot be used for a live presence")]
    UnsupportedStatus(Status),

    #[error("activity type {0} is not supported while activities are enabled")]
    UnsupportedActivity(u8),

    #[error("credential {0} has no running session")]
    NotRunning(CredentialId),

    #[error("no sessions are running")]
    NothingRunning,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
