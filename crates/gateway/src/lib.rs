//! Multi-credential gateway connection manager.
//!
//! Each configured credential gets its own [`session`] that identifies with
//! the gateway, heartbeats on the server-announced interval and publishes a
//! presence. The [`supervisor::ConnectionSupervisor`] starts, stops and
//! restarts sessions for all or one credential.

pub mod credentials;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod heartbeat;
pub mod overrides;
pub mod presence;
pub mod protocol;
pub mod session;
pub mod shutdown;
pub mod supervisor;
pub mod transport;

pub use {
    credentials::{Credential, CredentialId, CredentialRef, CredentialRegistry, Target},
    error::{Error, Result},
    overrides::StatusOverrideStore,
    presence::{PresenceSpec, Status},
    session::{SessionId, SessionState, TerminalReason},
    supervisor::{
        ConnectionSupervisor, GatewaySettings, OperationReport, SessionSnapshot, StatusChange,
    },
    transport::{Connector, TungsteniteConnector},
};
