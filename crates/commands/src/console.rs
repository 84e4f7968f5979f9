use std::{fmt::Write, time::Duration};

use {
    beacon_gateway::{ConnectionSupervisor, CredentialId, OperationReport, SessionSnapshot},
    tokio::time::Instant,
    tracing::{debug, warn},
};

use crate::{
    error::CommandError,
    parse::{Command, parse},
};

/// Runs operator commands against a supervisor.
#[derive(Clone)]
pub struct Console {
    supervisor: ConnectionSupervisor,
    prefix: String,
    started: Instant,
}

impl Console {
    pub fn new(supervisor: ConnectionSupervisor, prefix: impl Into<String>) -> Self {
        Self {
            supervisor,
            prefix: prefix.into(),
            started: Instant::now(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Reply to one input line, or `None` when the line is not a command.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let command = match parse(&self.prefix, line) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => return Some(e.to_string()),
        };

        debug!(command = command.name(), "operator command");
        match self.execute(command).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(error = %e, "operator command failed");
                Some(format!("There was an error executing that command: {e}"))
            },
        }
    }

    pub async fn execute(&self, command: Command) -> Result<String, CommandError> {
        let reply = match command {
            Command::Start(target) => {
                let report = self.supervisor.start(&target).await?;
                describe(&report, "Started", "Already running")
            },
            Command::Stop(target) => {
                let report = self.supervisor.stop(&target).await?;
                describe(&report, "Stopped", "Not running")
            },
            Command::Restart(target) => {
                let report = self.supervisor.restart(&target).await?;
                describe(&report, "Restarted", "Already running")
            },
            Command::Status { status, target } => {
                let change = self.supervisor.set_status(&target, &status).await?;
                format!(
                    "Status set to {} for {}. The change lasts until the session stops.",
                    change.status,
                    join_ids(&change.affected)
                )
            },
            Command::List => list(&self.supervisor.snapshot().await),
            Command::Ping => format!(
                "Pong! Up {}, {} of {} sessions running.",
                format_uptime(self.started.elapsed()),
                self.supervisor.running_count().await,
                self.supervisor.credentials().len()
            ),
            Command::Help => help(&self.prefix),
        };
        Ok(reply)
    }
}

fn join_ids(ids: &[CredentialId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(report: &OperationReport, done: &str, skipped: &str) -> String {
    let mut parts = Vec::new();
    if !report.affected.is_empty() {
        parts.push(format!("{done} {}.", join_ids(&report.affected)));
    }
    if !report.skipped.is_empty() {
        parts.push(format!("{skipped}: {}.", join_ids(&report.skipped)));
    }
    if parts.is_empty() {
        "Nothing to do.".to_string()
    } else {
        parts.join(" ")
    }
}

fn list(snapshot: &[SessionSnapshot]) -> String {
    if snapshot.is_empty() {
        return "No credentials are configured.".to_string();
    }
    let mut out = String::new();
    for entry in snapshot {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, "{} {} ", entry.credential, entry.masked);
        match (entry.state, entry.session) {
            (Some(state), Some(session)) => {
                let _ = write!(out, "{state} ({session})");
            },
            _ => out.push_str("stopped"),
        }
        if let Some(status) = entry.status_override {
            let _ = write!(out, " status={status}");
        }
        if entry.state.is_none()
            && let Some(reason) = entry.last_termination
        {
            let _ = write!(out, " last={reason}");
        }
    }
    out
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn help(prefix: &str) -> String {
    format!(
        "Commands (prefix {prefix}):\n\
         {prefix}start [token]            start sessions\n\
         {prefix}stop [token]             stop sessions\n\
         {prefix}restart [token]          stop, then start sessions\n\
         {prefix}status <status> [token]  override online, idle, dnd or invisible\n\
         {prefix}list                     show every credential\n\
         {prefix}ping                     uptime and running sessions\n\
         {prefix}help                     this message\n\
         [token] is all (default), a 1-based number, a number word or the raw value."
    )
}
