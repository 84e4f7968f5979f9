use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    tokio::{
        sync::{mpsc, watch},
        time::{Instant, sleep_until, timeout},
    },
    tracing::{debug, error, info, trace, warn},
};

use crate::{
    credentials::Credential,
    error::Result,
    heartbeat::HeartbeatTimer,
    overrides::StatusOverrideStore,
    presence::{self, PresenceSpec},
    protocol::{self, Inbound},
    session::{
        Control, SessionExit, SessionId, SessionState, TerminalReason,
        machine::{self, Effect, Event, Outbound, StepContext},
    },
    supervisor::GatewaySettings,
    transport::{Connector, FrameStream, SocketEvent, SocketPair},
};

/// Everything a session needs that is shared across sessions.
pub(crate) struct SessionContext {
    pub connector: Arc<dyn Connector>,
    pub settings: GatewaySettings,
    pub spec: PresenceSpec,
    pub overrides: StatusOverrideStore,
}

enum Wake {
    Socket(SocketEvent),
    Heartbeat,
    PresenceDue,
    ReconnectDue,
    ClosingTimedOut,
    Control(Option<Control>),
}

enum ConnectOutcome {
    Done(Result<SocketPair>),
    TimedOut,
    Control(Option<Control>),
}

/// Owns one session's socket and timers for its whole life.
pub(crate) struct SessionRuntime {
    id: SessionId,
    credential: Credential,
    ctx: Arc<SessionContext>,
    reconnect: Arc<AtomicBool>,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    control: mpsc::UnboundedReceiver<Control>,
    control_open: bool,
    socket: Option<SocketPair>,
    heartbeat: HeartbeatTimer,
    presence_at: Option<Instant>,
    reconnect_at: Option<Instant>,
    closing_deadline: Option<Instant>,
    queue: VecDeque<Event>,
}

impl SessionRuntime {
    pub fn new(
        id: SessionId,
        credential: Credential,
        ctx: Arc<SessionContext>,
        reconnect: Arc<AtomicBool>,
        state_tx: watch::Sender<SessionState>,
        control: mpsc::UnboundedReceiver<Control>,
    ) -> Self {
        Self {
            id,
            credential,
            ctx,
            reconnect,
            state: SessionState::Idle,
            state_tx,
            control,
            control_open: true,
            socket: None,
            heartbeat: HeartbeatTimer::new(),
            presence_at: None,
            reconnect_at: None,
            closing_deadline: None,
            queue: VecDeque::new(),
        }
    }

    pub async fn run(mut self) -> SessionExit {
        self.queue.push_back(Event::Connect);
        loop {
            while let Some(event) = self.queue.pop_front() {
                if let Some(exit) = self.apply(event).await {
                    return exit;
                }
            }
            let wake = self.wait().await;
            if let Some(event) = self.interpret(wake) {
                self.queue.push_back(event);
            }
        }
    }

    async fn apply(&mut self, event: Event) -> Option<SessionExit> {
        let ctx = StepContext {
            reconnect: self.reconnect.load(Ordering::SeqCst),
        };
        let transition = machine::step(self.state, &event, &ctx);
        if transition.next != self.state {
            debug!(
                credential = %self.credential.masked(),
                session = %self.id,
                from = %self.state,
                to = %transition.next,
                event = ?event,
                "session transition"
            );
            self.state = transition.next;
            self.state_tx.send_replace(transition.next);
        }

        for effect in transition.effects {
            if let Some(exit) = self.execute(effect).await {
                return Some(exit);
            }
        }
        None
    }

    async fn execute(&mut self, effect: Effect) -> Option<SessionExit> {
        match effect {
            Effect::OpenSocket => self.open().await,
            Effect::Send(outbound) => self.send(outbound).await,
            Effect::StartHeartbeat(period) => {
                info!(
                    credential = %self.credential.masked(),
                    session = %self.id,
                    interval_ms = period.as_millis() as u64,
                    "hello received, heartbeating"
                );
                self.heartbeat.install(period);
            },
            Effect::CancelHeartbeat => self.heartbeat.cancel(),
            Effect::SchedulePresence => {
                self.presence_at = Some(Instant::now() + self.ctx.settings.presence_delay);
            },
            Effect::DisableReconnect => self.reconnect.store(false, Ordering::SeqCst),
            Effect::CloseSocket => {
                self.closing_deadline = Some(Instant::now() + self.ctx.settings.shutdown_timeout);
                if let Some(socket) = self.socket.as_mut()
                    && let Err(e) = socket.sink.close().await
                {
                    warn!(
                        credential = %self.credential.masked(),
                        session = %self.id,
                        error = %e,
                        "failed to close socket"
                    );
                }
            },
            Effect::ReleaseSocket => {
                self.socket = None;
                self.presence_at = None;
                self.closing_deadline = None;
            },
            Effect::ScheduleReconnect => {
                warn!(
                    credential = %self.credential.masked(),
                    session = %self.id,
                    delay_ms = self.ctx.settings.reconnect_delay.as_millis() as u64,
                    "connection lost, reconnecting"
                );
                self.reconnect_at = Some(Instant::now() + self.ctx.settings.reconnect_delay);
            },
            Effect::Respawn => return Some(SessionExit::Respawn),
            Effect::Terminate(reason) => {
                match reason {
                    TerminalReason::Stopped => info!(
                        credential = %self.credential.masked(),
                        session = %self.id,
                        "session stopped"
                    ),
                    TerminalReason::Fatal(code) => error!(
                        credential = %self.credential.masked(),
                        session = %self.id,
                        code,
                        "gateway refused the session, not reconnecting"
                    ),
                }
                return Some(SessionExit::Terminated(reason));
            },
        }
        None
    }

    async fn open(&mut self) {
        let connector = Arc::clone(&self.ctx.connector);
        let url = self.ctx.settings.url.clone();
        let limit = self.ctx.settings.connect_timeout;
        let connect = timeout(limit, connector.connect(&url));
        tokio::pin!(connect);

        loop {
            let outcome = tokio::select! {
                result = &mut connect => match result {
                    Ok(result) => ConnectOutcome::Done(result),
                    Err(_) => ConnectOutcome::TimedOut,
                },
                control = self.control.recv(), if self.control_open => ConnectOutcome::Control(control),
            };
            match outcome {
                ConnectOutcome::Done(Ok(pair)) => {
                    debug!(
                        credential = %self.credential.masked(),
                        session = %self.id,
                        "socket opened"
                    );
                    self.socket = Some(pair);
                    self.queue.push_back(Event::Opened);
                    return;
                },
                ConnectOutcome::Done(Err(e)) => {
                    warn!(
                        credential = %self.credential.masked(),
                        session = %self.id,
                        error = %e,
                        "connect failed"
                    );
                    self.queue.push_back(Event::ConnectFailed);
                    return;
                },
                ConnectOutcome::TimedOut => {
                    warn!(
                        credential = %self.credential.masked(),
                        session = %self.id,
                        timeout_ms = limit.as_millis() as u64,
                        "connect timed out"
                    );
                    self.queue.push_back(Event::ConnectFailed);
                    return;
                },
                // Presence requests are moot before hello; only shutdown
                // abandons the attempt.
                ConnectOutcome::Control(control) => {
                    if let Some(Event::ShutdownRequested) = self.control_event(control) {
                        self.queue.push_back(Event::ShutdownRequested);
                        return;
                    }
                },
            }
        }
    }

    async fn wait(&mut self) -> Wake {
        let stream = self.socket.as_mut().map(|s| &mut s.stream);
        tokio::select! {
            event = next_event(stream) => Wake::Socket(event),
            () = self.heartbeat.tick() => Wake::Heartbeat,
            () = sleep_opt(self.presence_at) => Wake::PresenceDue,
            () = sleep_opt(self.reconnect_at) => Wake::ReconnectDue,
            () = sleep_opt(self.closing_deadline) => Wake::ClosingTimedOut,
            control = self.control.recv(), if self.control_open => Wake::Control(control),
        }
    }

    fn interpret(&mut self, wake: Wake) -> Option<Event> {
        match wake {
            Wake::Socket(SocketEvent::Text(text)) => self.decode(&text),
            Wake::Socket(SocketEvent::Closed { code, reason }) => {
                info!(
                    credential = %self.credential.masked(),
                    session = %self.id,
                    code = ?code,
                    reason = %reason,
                    "socket closed"
                );
                Some(Event::Closed { code })
            },
            Wake::Socket(SocketEvent::Error(e)) => {
                warn!(
                    credential = %self.credential.masked(),
                    session = %self.id,
                    error = %e,
                    "socket error"
                );
                Some(Event::SocketError)
            },
            Wake::Heartbeat => Some(Event::HeartbeatDue),
            Wake::PresenceDue => {
                self.presence_at = None;
                Some(Event::PresenceDue)
            },
            Wake::ReconnectDue => {
                self.reconnect_at = None;
                Some(Event::ReconnectDelayElapsed)
            },
            Wake::ClosingTimedOut => {
                self.closing_deadline = None;
                warn!(
                    credential = %self.credential.masked(),
                    session = %self.id,
                    "close handshake timed out"
                );
                Some(Event::Closed { code: None })
            },
            Wake::Control(control) => self.control_event(control),
        }
    }

    fn control_event(&mut self, control: Option<Control>) -> Option<Event> {
        match control {
            Some(Control::Shutdown) => Some(Event::ShutdownRequested),
            Some(Control::UpdatePresence) => Some(Event::PresenceRequested),
            // The supervisor is gone; nobody can stop us any more.
            None => {
                self.control_open = false;
                Some(Event::ShutdownRequested)
            },
        }
    }

    fn decode(&self, text: &str) -> Option<Event> {
        match protocol::decode(text) {
            Ok(Inbound::Hello { heartbeat_interval }) => Some(Event::Hello { heartbeat_interval }),
            Ok(Inbound::HeartbeatRequest) => Some(Event::HeartbeatRequested),
            Ok(Inbound::HeartbeatAck) => {
                trace!(session = %self.id, "heartbeat acknowledged");
                None
            },
            Ok(Inbound::Dispatch { event, sequence }) => {
                trace!(session = %self.id, event = ?event, sequence = ?sequence, "dispatch ignored");
                None
            },
            Ok(Inbound::Other { op }) => {
                trace!(session = %self.id, op, "frame ignored");
                None
            },
            Err(e) => {
                warn!(
                    credential = %self.credential.masked(),
                    session = %self.id,
                    error = %e,
                    "discarding malformed frame"
                );
                None
            },
        }
    }

    async fn send(&mut self, outbound: Outbound) {
        if self.socket.is_none() {
            debug!(session = %self.id, frame = ?outbound, "no socket, frame dropped");
            return;
        }
        let frame = match self.encode(outbound) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    credential = %self.credential.masked(),
                    session = %self.id,
                    frame = ?outbound,
                    error = %e,
                    "cannot build frame"
                );
                return;
            },
        };
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        match socket.sink.send_text(frame).await {
            Ok(()) => trace!(session = %self.id, frame = ?outbound, "frame sent"),
            Err(e) => warn!(
                credential = %self.credential.masked(),
                session = %self.id,
                frame = ?outbound,
                error = %e,
                "send failed"
            ),
        }
    }

    fn encode(&self, outbound: Outbound) -> Result<String> {
        match outbound {
            Outbound::Identify => protocol::identify(
                self.credential.expose(),
                &self.ctx.settings.properties,
            ),
            Outbound::Heartbeat => protocol::heartbeat(),
            Outbound::Presence => {
                let status_override = self.ctx.overrides.get(self.credential.id());
                let payload = presence::compose(&self.ctx.spec, status_override)?;
                info!(
                    credential = %self.credential.masked(),
                    session = %self.id,
                    status = %payload.status,
                    "publishing presence"
                );
                protocol::presence_update(&payload)
            },
            Outbound::OfflineClear => protocol::presence_update(&presence::offline_clear()),
            Outbound::OfflineStatus => protocol::presence_update(&presence::offline_status_only()),
        }
    }
}

async fn next_event(stream: Option<&mut Box<dyn FrameStream>>) -> SocketEvent {
    match stream {
        Some(stream) => stream.next_event().await,
        None => std::future::pending().await,
    }
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
