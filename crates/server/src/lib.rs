//! Keep-alive HTTP responder.
//!
//! Hosting platforms that idle processes without inbound traffic can be kept
//! awake by pinging these routes. Every response is a small JSON document
//! with the process uptime and the caller's address.

use std::{convert::Infallible, net::SocketAddr, time::Instant};

use {
    axum::{
        Json, Router,
        extract::{ConnectInfo, FromRequestParts},
        http::{HeaderMap, StatusCode, Version, request::Parts},
        response::{IntoResponse, Response},
        routing::any,
    },
    serde::Serialize,
    tokio::net::TcpListener,
    tracing::{debug, info},
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    started: Instant,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the router (shared between production startup and tests).
pub fn build_app(started: Instant) -> Router {
    Router::new()
        .route("/", any(root_handler))
        .route("/status", any(status_handler))
        .route("/hello", any(hello_handler))
        .fallback(not_found_handler)
        .with_state(AppState { started })
}

/// Bind and serve until the process exits.
pub async fn serve(bind: &str, port: u16, started: Instant) -> anyhow::Result<()> {
    let listener = TcpListener::bind((bind, port)).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "keep-alive server listening at http://{bind}:{port}");

    axum::serve(
        listener,
        build_app(started).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

// ── Response ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeepAlive {
    status: &'static str,
    code: u16,
    uptime: String,
    current_time: String,
    ip: String,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// What every handler reports about the caller.
struct Caller {
    ip: String,
    version: Version,
    method: String,
    path: String,
    uptime: String,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Infallible> {
        let peer = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let ip = forwarded_for(&parts.headers)
            .or(peer)
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            ip,
            version: parts.version,
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            uptime: format_uptime(state.started.elapsed().as_millis()),
        })
    }
}

impl Caller {
    fn reply(
        self,
        code: StatusCode,
        status: &'static str,
        error: Option<&'static str>,
    ) -> Response {
        debug!(
            ip = %self.ip,
            code = code.as_u16(),
            method = %self.method,
            path = %self.path,
            "keep-alive request"
        );
        let body = KeepAlive {
            status,
            code: code.as_u16(),
            uptime: self.uptime,
            current_time: chrono::Local::now()
                .format("%-m/%-d/%Y, %-I:%M:%S %p")
                .to_string(),
            ip: self.ip,
            version: http_version(self.version),
            error,
        };
        (code, Json(body)).into_response()
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// `Xh Ym Zs Wms`.
fn format_uptime(millis: u128) -> String {
    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let seconds = (millis % 60_000) / 1000;
    let ms = millis % 1000;
    format!("{hours}h {minutes}m {seconds}s {ms}ms")
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn root_handler(caller: Caller) -> Response {
    caller.reply(StatusCode::OK, "Connected", None)
}

async fn status_handler(caller: Caller) -> Response {
    caller.reply(StatusCode::OK, "Running", None)
}

async fn hello_handler(caller: Caller) -> Response {
    caller.reply(StatusCode::OK, "Hello! Welcome to the server!", None)
}

async fn not_found_handler(caller: Caller) -> Response {
    caller.reply(
        StatusCode::NOT_FOUND,
        "Not Found",
        Some("This endpoint does not exist here."),
    )
}
