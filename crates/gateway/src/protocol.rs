//! Gateway wire frames.
//!
//! Every frame is a JSON object `{ "op": <u8>, "d": <payload> }`. Inbound
//! dispatch frames additionally carry `s` (sequence) and `t` (event name).

use std::time::Duration;

use {
    beacon_config::ClientProperties,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::error::{Error, Result};

pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const PRESENCE_UPDATE: u8 = 3;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Close codes after which a credential must not reconnect: authentication
/// failed, invalid shard, sharding required, invalid API version, invalid
/// intents, disallowed intents.
pub const FATAL_CLOSE_CODES: &[u16] = &[4004, 4010, 4011, 4012, 4013, 4014];

pub fn is_fatal_close(code: u16) -> bool {
    FATAL_CLOSE_CODES.contains(&code)
}

// ── Outbound ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Frame<T> {
    op: u8,
    d: T,
}

#[derive(Serialize)]
struct Identify<'a> {
    token: &'a str,
    properties: &'a ClientProperties,
}

fn encode<T: Serialize>(op: u8, d: T) -> Result<String> {
    Ok(serde_json::to_string(&Frame { op, d })?)
}

pub fn identify(token: &str, properties: &ClientProperties) -> Result<String> {
    encode(opcode::IDENTIFY, Identify { token, properties })
}

pub fn heartbeat() -> Result<String> {
    encode(opcode::HEARTBEAT, Value::Null)
}

pub fn presence_update<T: Serialize>(payload: &T) -> Result<String> {
    encode(opcode::PRESENCE_UPDATE, payload)
}

// ── Inbound ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Hello { heartbeat_interval: Duration },
    /// The server asks for an immediate heartbeat.
    HeartbeatRequest,
    HeartbeatAck,
    Dispatch {
        event: Option<String>,
        sequence: Option<u64>,
    },
    Other { op: u8 },
}

pub fn decode(text: &str) -> Result<Inbound> {
    let frame: RawFrame =
        serde_json::from_str(text).map_err(|e| Error::MalformedFrame(e.to_string()))?;

    Ok(match frame.op {
        opcode::HELLO => {
            let interval = frame
                .d
                .get("heartbeat_interval")
                .and_then(Value::as_u64)
                .filter(|ms| *ms > 0)
                .ok_or_else(|| {
                    Error::MalformedFrame("hello without a positive heartbeat_interval".into())
                })?;
            Inbound::Hello {
                heartbeat_interval: Duration::from_millis(interval),
            }
        },
        opcode::HEARTBEAT => Inbound::HeartbeatRequest,
        opcode::HEARTBEAT_ACK => Inbound::HeartbeatAck,
        opcode::DISPATCH => Inbound::Dispatch {
            event: frame.t,
            sequence: frame.s,
        },
        op => Inbound::Other { op },
    })
}
