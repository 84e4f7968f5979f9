//! Starts, stops and restarts sessions for all or one credential.

use std::{
    collections::HashMap,
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};

use {
    beacon_config::{BeaconConfig, ClientProperties, GatewayConfig},
    dashmap::DashMap,
    tokio::sync::{Mutex, mpsc, watch},
    tracing::{debug, info},
};

use crate::{
    credentials::{CredentialId, CredentialRegistry, Target},
    error::{Error, Result},
    overrides::{self, StatusOverrideStore},
    presence::{PresenceSpec, Status},
    session::{
        Control, SessionExit, SessionHandle, SessionId, SessionState, TerminalReason,
        runtime::{SessionContext, SessionRuntime},
    },
    shutdown::ShutdownCoordinator,
    transport::Connector,
};

// ── Settings ─────────────────────────────────────────────────────────────────

/// Endpoint and timings shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub url: String,
    pub properties: ClientProperties,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub presence_delay: Duration,
    pub shutdown_timeout: Duration,
}

impl From<&GatewayConfig> for GatewaySettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            url: config.url.clone(),
            properties: config.properties.clone(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            presence_delay: Duration::from_millis(config.presence_delay_ms),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

// ── Reports ──────────────────────────────────────────────────────────────────

/// Outcome of a start, stop or restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationReport {
    /// Credentials the operation acted on.
    pub affected: Vec<CredentialId>,
    /// Credentials already in the requested condition.
    pub skipped: Vec<CredentialId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// The stored status, after normalization.
    pub status: Status,
    pub affected: Vec<CredentialId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub credential: CredentialId,
    pub masked: String,
    /// `None` when no session is live for the credential.
    pub state: Option<SessionState>,
    pub session: Option<SessionId>,
    pub status_override: Option<Status>,
    pub last_termination: Option<TerminalReason>,
}

// ── Supervisor ───────────────────────────────────────────────────────────────

/// Owns the session registry. Clones share it.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    credentials: CredentialRegistry,
    ctx: Arc<SessionContext>,
    sessions: Mutex<HashMap<CredentialId, SessionHandle>>,
    terminations: DashMap<CredentialId, TerminalReason>,
    shutdown: ShutdownCoordinator,
}

impl ConnectionSupervisor {
    pub fn new(
        credentials: CredentialRegistry,
        spec: PresenceSpec,
        settings: GatewaySettings,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let shutdown = ShutdownCoordinator::new(settings.shutdown_timeout);
        let ctx = SessionContext {
            connector,
            settings,
            spec,
            overrides: StatusOverrideStore::new(),
        };
        Self {
            inner: Arc::new(Inner {
                credentials,
                ctx: Arc::new(ctx),
                sessions: Mutex::new(HashMap::new()),
                terminations: DashMap::new(),
                shutdown,
            }),
        }
    }

    /// Build a supervisor from loaded configuration. Fails on invalid presence
    /// settings.
    pub fn from_config(config: &BeaconConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let spec = PresenceSpec::from_config(&config.presence)?;
        Ok(Self::new(
            CredentialRegistry::new(config.credentials()),
            spec,
            GatewaySettings::from(&config.gateway),
            connector,
        ))
    }

    pub fn credentials(&self) -> &CredentialRegistry {
        &self.inner.credentials
    }

    pub fn overrides(&self) -> &StatusOverrideStore {
        &self.inner.ctx.overrides
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.inner.ctx.settings
    }

    /// Start a session for every targeted credential that has none.
    pub async fn start(&self, target: &Target) -> Result<OperationReport> {
        let ids = self.inner.credentials.resolve_target(target)?;
        if ids.is_empty() {
            return Err(Error::NoCredentials);
        }

        let mut report = OperationReport::default();
        let mut sessions = self.inner.sessions.lock().await;
        for id in ids {
            if sessions.get(&id).is_some_and(SessionHandle::is_live) {
                debug!(credential = %id, "already running");
                report.skipped.push(id);
                continue;
            }
            let Some(handle) = self.inner.spawn_session(id) else {
                continue;
            };
            info!(credential = %id, session = %handle.id, "session started");
            self.inner.terminations.remove(&id);
            sessions.insert(id, handle);
            report.affected.push(id);
        }
        Ok(report)
    }

    /// Tear down every targeted live session. Stopping a credential that is
    /// not running is a no-op.
    pub async fn stop(&self, target: &Target) -> Result<OperationReport> {
        let ids = self.inner.credentials.resolve_target(target)?;

        let mut report = OperationReport::default();
        let mut handles = Vec::new();
        {
            let mut sessions = self.inner.sessions.lock().await;
            for id in ids {
                match sessions.remove(&id) {
                    Some(handle) => {
                        handle.disable_reconnect();
                        handles.push((id, handle));
                    },
                    None => report.skipped.push(id),
                }
            }
        }

        for id in self.inner.shutdown.teardown_all(handles).await {
            self.inner.ctx.overrides.delete(id);
            self.inner.terminations.insert(id, TerminalReason::Stopped);
            info!(credential = %id, "session stopped");
            report.affected.push(id);
        }
        Ok(report)
    }

    /// Stop, then start, the targeted credentials. The stop, teardown frames
    /// included, completes before anything is started.
    pub async fn restart(&self, target: &Target) -> Result<OperationReport> {
        self.stop(target).await?;
        self.start(target).await
    }

    /// Override the status of targeted live sessions and republish their
    /// presence immediately.
    pub async fn set_status(&self, target: &Target, raw: &str) -> Result<StatusChange> {
        let status = overrides::validate(raw)?;
        let ids = self.inner.credentials.resolve_target(target)?;

        let sessions = self.inner.sessions.lock().await;
        let live: Vec<CredentialId> = ids
            .iter()
            .copied()
            .filter(|id| sessions.get(id).is_some_and(SessionHandle::is_live))
            .collect();
        if live.is_empty() {
            return Err(match (target, ids.first()) {
                (Target::One(_), Some(id)) => Error::NotRunning(*id),
                _ => Error::NothingRunning,
            });
        }

        for id in &live {
            self.inner.ctx.overrides.insert(*id, status);
            if let Some(handle) = sessions.get(id) {
                let _ = handle.control.send(Control::UpdatePresence);
            }
        }
        info!(status = %status, count = live.len(), "status override applied");
        Ok(StatusChange {
            status,
            affected: live,
        })
    }

    /// Current state of the credential's live session.
    pub async fn state(&self, id: CredentialId) -> Option<SessionState> {
        self.inner.sessions.lock().await.get(&id).map(SessionHandle::state)
    }

    pub async fn session_id(&self, id: CredentialId) -> Option<SessionId> {
        self.inner.sessions.lock().await.get(&id).map(|h| h.id)
    }

    /// Why the credential's last session ended, if it ended on its own or was
    /// stopped.
    pub fn last_termination(&self, id: CredentialId) -> Option<TerminalReason> {
        self.inner.terminations.get(&id).map(|r| *r)
    }

    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        let sessions = self.inner.sessions.lock().await;
        self.inner
            .credentials
            .iter()
            .map(|credential| {
                let id = credential.id();
                let handle = sessions.get(&id);
                SessionSnapshot {
                    credential: id,
                    masked: credential.masked().to_string(),
                    state: handle.map(SessionHandle::state),
                    session: handle.map(|h| h.id),
                    status_override: self.inner.ctx.overrides.get(id),
                    last_termination: self.last_termination(id),
                }
            })
            .collect()
    }

    /// Whether any session is registered.
    pub async fn is_running(&self) -> bool {
        !self.inner.sessions.lock().await.is_empty()
    }

    pub async fn running_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Tear down every session and clear the registry.
    pub async fn shutdown_all(&self) {
        let handles: Vec<_> = self.inner.sessions.lock().await.drain().collect();
        if handles.is_empty() {
            return;
        }
        info!(count = handles.len(), "shutting down all sessions");
        for id in self.inner.shutdown.teardown_all(handles).await {
            self.inner.terminations.insert(id, TerminalReason::Stopped);
        }
        self.inner.ctx.overrides.clear();
    }
}

impl Inner {
    fn spawn_session(self: &Arc<Self>, id: CredentialId) -> Option<SessionHandle> {
        let credential = self.credentials.get(id)?.clone();
        let session = SessionId::next();
        let (control, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState::Idle);
        let reconnect = Arc::new(AtomicBool::new(true));

        let runtime = SessionRuntime::new(
            session,
            credential,
            Arc::clone(&self.ctx),
            Arc::clone(&reconnect),
            state_tx,
            control_rx,
        );
        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let exit = runtime.run().await;
            inner.handle_exit(id, session, exit).await;
        });

        Some(SessionHandle {
            id: session,
            control,
            reconnect,
            state,
            task,
        })
    }

    /// Runs on the exiting session's task. Only acts when the registry still
    /// holds that exact session, so a concurrent stop or restart wins.
    async fn handle_exit(self: &Arc<Self>, id: CredentialId, session: SessionId, exit: SessionExit) {
        let mut sessions = self.sessions.lock().await;
        let registered = sessions.get(&id).filter(|h| h.id == session);

        match exit {
            SessionExit::Respawn => {
                if !registered.is_some_and(SessionHandle::reconnect_enabled) {
                    debug!(credential = %id, session = %session, "replacement skipped");
                    return;
                }
                let Some(handle) = self.spawn_session(id) else {
                    return;
                };
                info!(
                    credential = %id,
                    previous = %session,
                    session = %handle.id,
                    "replacement session started"
                );
                sessions.insert(id, handle);
            },
            SessionExit::Terminated(reason) => {
                if registered.is_none() {
                    return;
                }
                sessions.remove(&id);
                drop(sessions);
                self.ctx.overrides.delete(id);
                self.terminations.insert(id, reason);
            },
        }
    }
}
