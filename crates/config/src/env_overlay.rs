//! Legacy environment variables layered on top of the config file.

use anyhow::Context;

use crate::schema::BeaconConfig;

/// Apply environment overrides to `config`.
///
/// Empty values are ignored. `USER_TOKENS` only fills the credential list when
/// the config file did not provide one.
pub fn apply_env_overlay(
    config: &mut BeaconConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if config.credentials().is_empty()
        && let Some(tokens) = get("USER_TOKENS")
    {
        config.credentials = tokens
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(url) = get("GATEWAY_URL") {
        config.gateway.url = url;
    }

    let presence = &mut config.presence;
    if let Some(status) = get("STATUS") {
        presence.status = status;
    }
    if let Some(name) = get("NAME") {
        presence.name = name;
    }
    if let Some(kind) = get("TYPE") {
        presence.activity_type = kind
            .trim()
            .parse()
            .with_context(|| format!("TYPE must be a small integer, got {kind:?}"))?;
    }
    for (key, slot) in [
        ("DETAILS", &mut presence.details),
        ("STATE", &mut presence.state),
        ("LARGE_IMAGE_URL", &mut presence.large_image),
        ("LARGE_TEXT", &mut presence.large_text),
        ("SMALL_IMAGE_URL", &mut presence.small_image),
        ("SMALL_TEXT", &mut presence.small_text),
    ] {
        if let Some(value) = get(key) {
            *slot = Some(value);
        }
    }
    if let Some(flag) = get("TIMESTAMPS") {
        presence.timestamps = is_truthy(&flag);
    }
    if let Some(flag) = get("NO_ACTIVITY") {
        presence.activities_enabled = !is_truthy(&flag);
    }

    if let Some(prefix) = get("PREFIX") {
        config.console.prefix = prefix;
    }

    if let Some(flag) = get("START_SERVER") {
        config.server.enabled = is_truthy(&flag);
    }
    if let Some(host) = get("HOST") {
        config.server.bind = host;
    }
    if let Some(port) = get("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .with_context(|| format!("PORT must be a port number, got {port:?}"))?;
    }

    Ok(())
}

/// `true`, `yes`, `y` and `continue` (any case) count as enabled.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "continue"
    )
}
