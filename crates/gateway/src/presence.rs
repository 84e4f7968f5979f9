//! Presence payload composition.

use std::{fmt, str::FromStr};

use {
    beacon_config::PresenceConfig,
    serde::Serialize,
    serde_json::{Value, json},
    tracing::warn,
};

use crate::error::{Error, Result};

/// Activity type reserved for custom statuses, which cannot be set this way.
pub const CUSTOM_STATUS_ACTIVITY: u8 = 4;

// ── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Idle,
    Dnd,
    Invisible,
    Offline,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }

    /// `offline` cannot be held by a live session; it maps to `invisible`.
    pub fn normalized(self) -> Self {
        match self {
            Self::Offline => Self::Invisible,
            other => other,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "dnd" => Ok(Self::Dnd),
            "invisible" => Ok(Self::Invisible),
            "offline" => Ok(Self::Offline),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

// ── Spec ─────────────────────────────────────────────────────────────────────

/// The activity every session advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitySpec {
    pub name: String,
    pub kind: u8,
    pub details: Option<String>,
    pub state: Option<String>,
    pub large_image: Option<String>,
    pub large_text: Option<String>,
    pub small_image: Option<String>,
    pub small_text: Option<String>,
}

/// Validated, read-only presence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSpec {
    /// `None` publishes the status alone.
    pub activity: Option<ActivitySpec>,
    pub timestamps: bool,
    pub base_status: Status,
}

impl PresenceSpec {
    pub fn from_config(config: &PresenceConfig) -> Result<Self> {
        let configured: Status = config.status.parse()?;
        let base_status = configured.normalized();
        if base_status != configured {
            warn!(
                configured = %configured,
                using = %base_status,
                "base status cannot be offline for a live session"
            );
        }

        let activity = if config.activities_enabled {
            if config.activity_type == CUSTOM_STATUS_ACTIVITY {
                return Err(Error::UnsupportedActivity(config.activity_type));
            }
            Some(ActivitySpec {
                name: config.name.clone(),
                kind: config.activity_type,
                details: config.details.clone(),
                state: config.state.clone(),
                large_image: config.large_image.clone(),
                large_text: config.large_text.clone(),
                small_image: config.small_image.clone(),
                small_text: config.small_text.clone(),
            })
        } else {
            None
        };

        Ok(Self {
            activity,
            timestamps: config.timestamps,
            base_status,
        })
    }
}

// ── Payload ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresencePayload {
    pub since: i64,
    pub status: Status,
    pub afk: bool,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<Assets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timestamps {
    pub start: i64,
}

/// Build the presence for one credential at the current time.
pub fn compose(spec: &PresenceSpec, status_override: Option<Status>) -> Result<PresencePayload> {
    compose_at(spec, status_override, chrono::Utc::now().timestamp_millis())
}

/// Build the presence for one credential as of `now_ms` (epoch milliseconds).
pub fn compose_at(
    spec: &PresenceSpec,
    status_override: Option<Status>,
    now_ms: i64,
) -> Result<PresencePayload> {
    let status = status_override.unwrap_or(spec.base_status);
    if status == Status::Offline {
        return Err(Error::UnsupportedStatus(status));
    }

    let activities = spec
        .activity
        .iter()
        .map(|a| Activity {
            name: a.name.clone(),
            kind: a.kind,
            details: a.details.clone(),
            state: a.state.clone(),
            assets: assets(a),
            timestamps: spec.timestamps.then_some(Timestamps { start: now_ms }),
        })
        .collect();

    Ok(PresencePayload {
        since: now_ms,
        status,
        afk: false,
        activities,
    })
}

fn assets(a: &ActivitySpec) -> Option<Assets> {
    let assets = Assets {
        large_image: a.large_image.clone(),
        large_text: a.large_text.clone(),
        small_image: a.small_image.clone(),
        small_text: a.small_text.clone(),
    };
    let empty = assets.large_image.is_none()
        && assets.large_text.is_none()
        && assets.small_image.is_none()
        && assets.small_text.is_none();
    (!empty).then_some(assets)
}

/// First teardown frame: clear activities and go offline.
pub fn offline_clear() -> Value {
    json!({ "activities": [], "since": null, "status": "offline", "afk": false })
}

/// Second teardown frame: status only.
pub fn offline_status_only() -> Value {
    json!({ "status": "offline" })
}
