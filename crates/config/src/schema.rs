/// Config schema types (credentials, gateway, presence, server, console).
use serde::{Deserialize, Serialize};

/// Default gateway endpoint.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=9&encoding=json";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// Raw credentials, in the order operators address them (1-based).
    pub credentials: Vec<String>,
    pub gateway: GatewayConfig,
    pub presence: PresenceConfig,
    pub server: ServerConfig,
    pub console: ConsoleConfig,
}

impl BeaconConfig {
    /// Credentials with surrounding whitespace removed and blanks dropped.
    pub fn credentials(&self) -> Vec<String> {
        self.credentials
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// ── Gateway ──────────────────────────────────────────────────────────────────

/// Gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: String,

    /// Longest a single connect attempt (TCP, TLS, upgrade) may take before
    /// it counts as failed.
    pub connect_timeout_ms: u64,

    /// Delay before a dropped session is replaced.
    pub reconnect_delay_ms: u64,

    /// Delay between hello and the first presence update.
    pub presence_delay_ms: u64,

    /// Upper bound on a single session's graceful teardown.
    pub shutdown_timeout_ms: u64,

    pub properties: ClientProperties,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.into(),
            connect_timeout_ms: 15_000,
            reconnect_delay_ms: 5_000,
            presence_delay_ms: 1_000,
            shutdown_timeout_ms: 5_000,
            properties: ClientProperties::default(),
        }
    }
}

/// Client metadata sent in the identify frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientProperties {
    pub os: String,
    pub browser: String,
    pub device: Option<String>,
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            os: "Windows".into(),
            browser: "Chrome".into(),
            device: None,
        }
    }
}

// ── Presence ─────────────────────────────────────────────────────────────────

/// Presence broadcast by every session.
///
/// `status` is kept as the raw configured string; the gateway validates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// When false, only the status is published and the activity list is empty.
    pub activities_enabled: bool,
    pub name: String,
    pub activity_type: u8,
    pub details: Option<String>,
    pub state: Option<String>,
    pub large_image: Option<String>,
    pub large_text: Option<String>,
    pub small_image: Option<String>,
    pub small_text: Option<String>,
    pub timestamps: bool,
    pub status: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            activities_enabled: true,
            name: String::new(),
            activity_type: 0,
            details: None,
            state: None,
            large_image: None,
            large_text: None,
            small_image: None,
            small_text: None,
            timestamps: false,
            status: "online".into(),
        }
    }
}

// ── Keep-alive server ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

// ── Console ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Prefix every operator command must start with.
    pub prefix: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { prefix: "?".into() }
    }
}
