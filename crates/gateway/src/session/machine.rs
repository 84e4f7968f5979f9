//! Session transition function.
//!
//! `step` never performs I/O. It maps the current state and one event to the
//! next state plus the effects the runtime must carry out, in order.

use std::time::Duration;

use crate::{
    protocol::is_fatal_close,
    session::{SessionState, TerminalReason},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Kick off the first connection attempt.
    Connect,
    Opened,
    ConnectFailed,
    Hello { heartbeat_interval: Duration },
    /// The server asked for an immediate heartbeat.
    HeartbeatRequested,
    HeartbeatDue,
    /// The post-hello delay elapsed.
    PresenceDue,
    /// An operator changed this credential's status.
    PresenceRequested,
    SocketError,
    Closed { code: Option<u16> },
    ShutdownRequested,
    ReconnectDelayElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    Identify,
    Heartbeat,
    Presence,
    OfflineClear,
    OfflineStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    OpenSocket,
    Send(Outbound),
    StartHeartbeat(Duration),
    CancelHeartbeat,
    SchedulePresence,
    DisableReconnect,
    CloseSocket,
    /// Drop the socket and any timers bound to it.
    ReleaseSocket,
    ScheduleReconnect,
    Respawn,
    Terminate(TerminalReason),
}

/// Inputs the transition reads besides state and event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepContext {
    pub reconnect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: SessionState, effects: impl Into<Vec<Effect>>) -> Self {
        Self {
            next,
            effects: effects.into(),
        }
    }

    fn stay(state: SessionState) -> Self {
        Self::to(state, Vec::new())
    }
}

pub fn step(state: SessionState, event: &Event, ctx: &StepContext) -> Transition {
    use {self::Effect::*, self::Event as E, crate::session::SessionState as S};

    match (state, event) {
        (S::Terminated, _) => Transition::stay(state),

        (S::Idle, E::Connect) => Transition::to(S::Connecting, [OpenSocket]),
        (S::Connecting, E::Opened) => Transition::to(S::AwaitingHello, [Send(Outbound::Identify)]),
        (S::Connecting, E::ConnectFailed) => on_close(None, ctx),

        (S::AwaitingHello | S::Heartbeating, E::Hello { heartbeat_interval }) => Transition::to(
            S::Heartbeating,
            [
                CancelHeartbeat,
                StartHeartbeat(*heartbeat_interval),
                SchedulePresence,
            ],
        ),
        (S::Heartbeating, E::HeartbeatDue)
        | (S::AwaitingHello | S::Heartbeating, E::HeartbeatRequested) => {
            Transition::to(state, [Send(Outbound::Heartbeat)])
        },
        (S::Heartbeating, E::PresenceDue | E::PresenceRequested) => {
            Transition::to(state, [Send(Outbound::Presence)])
        },

        (S::Connecting | S::AwaitingHello | S::Heartbeating | S::Closing, E::Closed { code }) => {
            on_close(*code, ctx)
        },

        (S::AwaitingHello | S::Heartbeating, E::ShutdownRequested) => Transition::to(
            S::Closing,
            [
                CancelHeartbeat,
                Send(Outbound::OfflineClear),
                Send(Outbound::OfflineStatus),
                DisableReconnect,
                CloseSocket,
            ],
        ),
        (S::Idle | S::Connecting | S::Reconnecting, E::ShutdownRequested) => Transition::to(
            S::Terminated,
            [
                DisableReconnect,
                ReleaseSocket,
                Terminate(TerminalReason::Stopped),
            ],
        ),

        (S::Reconnecting, E::ReconnectDelayElapsed) if ctx.reconnect => {
            Transition::to(S::Reconnecting, [Respawn])
        },
        (S::Reconnecting, E::ReconnectDelayElapsed) => {
            Transition::to(S::Terminated, [Terminate(TerminalReason::Stopped)])
        },

        _ => Transition::stay(state),
    }
}

/// The close decision: stop, give up on a fatal code, or schedule a retry.
fn on_close(code: Option<u16>, ctx: &StepContext) -> Transition {
    use {self::Effect::*, crate::session::SessionState as S};

    if !ctx.reconnect {
        return Transition::to(
            S::Terminated,
            [
                CancelHeartbeat,
                ReleaseSocket,
                Terminate(TerminalReason::Stopped),
            ],
        );
    }
    if let Some(code) = code
        && is_fatal_close(code)
    {
        return Transition::to(
            S::Terminated,
            [
                CancelHeartbeat,
                ReleaseSocket,
                Terminate(TerminalReason::Fatal(code)),
            ],
        );
    }
    Transition::to(
        S::Reconnecting,
        [CancelHeartbeat, ReleaseSocket, ScheduleReconnect],
    )
}

#[cfg(test)]
mod tests {
    use {super::*, super::Effect::*, crate::session::SessionState as S};

    const RECONNECT: StepContext = StepContext { reconnect: true };
    const STOPPED: StepContext = StepContext { reconnect: false };

    fn hello(ms: u64) -> Event {
        Event::Hello {
            heartbeat_interval: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_happy_path() {
        let t = step(S::Idle, &Event::Connect, &RECONNECT);
        assert_eq!(t, Transition::to(S::Connecting, [OpenSocket]));

        let t = step(S::Connecting, &Event::Opened, &RECONNECT);
        assert_eq!(t.next, S::AwaitingHello);
        assert_eq!(t.effects, vec![Send(Outbound::Identify)]);

        let t = step(S::AwaitingHello, &hello(41_250), &RECONNECT);
        assert_eq!(t.next, S::Heartbeating);
        assert_eq!(
            t.effects,
            vec![
                CancelHeartbeat,
                StartHeartbeat(Duration::from_millis(41_250)),
                SchedulePresence
            ]
        );

        let t = step(S::Heartbeating, &Event::HeartbeatDue, &RECONNECT);
        assert_eq!(t, Transition::to(S::Heartbeating, [Send(Outbound::Heartbeat)]));

        let t = step(S::Heartbeating, &Event::PresenceDue, &RECONNECT);
        assert_eq!(t.effects, vec![Send(Outbound::Presence)]);
    }

    #[test]
    fn test_repeated_hello_replaces_timer() {
        let t = step(S::Heartbeating, &hello(5_000), &RECONNECT);
        assert_eq!(t.next, S::Heartbeating);
        assert_eq!(t.effects[0], CancelHeartbeat);
        assert_eq!(t.effects[1], StartHeartbeat(Duration::from_secs(5)));
    }

    #[test]
    fn test_close_decision() {
        for state in [S::Connecting, S::AwaitingHello, S::Heartbeating] {
            let t = step(state, &Event::Closed { code: Some(1006) }, &RECONNECT);
            assert_eq!(t.next, S::Reconnecting, "from {state}");
            assert_eq!(
                t.effects,
                vec![CancelHeartbeat, ReleaseSocket, ScheduleReconnect]
            );
        }

        let t = step(S::Heartbeating, &Event::Closed { code: Some(1000) }, &STOPPED);
        assert_eq!(t.next, S::Terminated);
        assert!(t.effects.contains(&Terminate(TerminalReason::Stopped)));
    }

    #[test]
    fn test_fatal_close_never_schedules_reconnect() {
        for code in [4004, 4010, 4011, 4012, 4013, 4014] {
            let t = step(S::Heartbeating, &Event::Closed { code: Some(code) }, &RECONNECT);
            assert_eq!(t.next, S::Terminated);
            assert!(!t.effects.contains(&ScheduleReconnect));
            assert!(t.effects.contains(&Terminate(TerminalReason::Fatal(code))));
        }
    }

    #[test]
    fn test_close_without_code_reconnects() {
        let t = step(S::Heartbeating, &Event::Closed { code: None }, &RECONNECT);
        assert_eq!(t.next, S::Reconnecting);
    }

    #[test]
    fn test_connect_failure_follows_reconnect_branch() {
        let t = step(S::Connecting, &Event::ConnectFailed, &RECONNECT);
        assert_eq!(t.next, S::Reconnecting);
        let t = step(S::Connecting, &Event::ConnectFailed, &STOPPED);
        assert_eq!(t.next, S::Terminated);
    }

    #[test]
    fn test_shutdown_sequence() {
        let t = step(S::Heartbeating, &Event::ShutdownRequested, &RECONNECT);
        assert_eq!(t.next, S::Closing);
        assert_eq!(
            t.effects,
            vec![
                CancelHeartbeat,
                Send(Outbound::OfflineClear),
                Send(Outbound::OfflineStatus),
                DisableReconnect,
                CloseSocket,
            ]
        );

        let t = step(S::Closing, &Event::Closed { code: Some(1000) }, &STOPPED);
        assert_eq!(t.next, S::Terminated);
        assert!(t.effects.contains(&Terminate(TerminalReason::Stopped)));
    }

    #[test]
    fn test_shutdown_without_socket_terminates_at_once() {
        for state in [S::Idle, S::Connecting, S::Reconnecting] {
            let t = step(state, &Event::ShutdownRequested, &RECONNECT);
            assert_eq!(t.next, S::Terminated, "from {state}");
            assert_eq!(t.effects[0], DisableReconnect);
        }
    }

    #[test]
    fn test_reconnect_delay_respects_flag() {
        let t = step(S::Reconnecting, &Event::ReconnectDelayElapsed, &RECONNECT);
        assert_eq!(t.effects, vec![Respawn]);

        let t = step(S::Reconnecting, &Event::ReconnectDelayElapsed, &STOPPED);
        assert_eq!(t.next, S::Terminated);
        assert!(!t.effects.contains(&Respawn));
    }

    #[test]
    fn test_ignored_events() {
        let t = step(S::AwaitingHello, &Event::HeartbeatDue, &RECONNECT);
        assert_eq!(t, Transition::stay(S::AwaitingHello));

        let t = step(S::Heartbeating, &Event::SocketError, &RECONNECT);
        assert_eq!(t, Transition::stay(S::Heartbeating));

        let t = step(S::Closing, &hello(100), &RECONNECT);
        assert_eq!(t, Transition::stay(S::Closing));

        let t = step(S::Terminated, &Event::Connect, &RECONNECT);
        assert_eq!(t, Transition::stay(S::Terminated));
    }
}
