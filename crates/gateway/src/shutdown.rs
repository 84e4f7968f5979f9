use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    credentials::CredentialId,
    session::{Control, SessionHandle},
};

/// Graceful teardown of sessions already removed from the registry.
///
/// The session itself publishes the offline presence, disables reconnect and
/// closes its socket. The coordinator asks for that, waits a bounded time and
/// aborts sessions that do not finish.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownCoordinator {
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// `close_timeout` is the session's own close deadline. The coordinator
    /// waits twice that so the session's deadline fires first.
    pub fn new(close_timeout: Duration) -> Self {
        Self {
            timeout: close_timeout * 2,
        }
    }

    pub(crate) async fn teardown(&self, id: CredentialId, mut handle: SessionHandle) -> CredentialId {
        handle.disable_reconnect();
        if handle.control.send(Control::Shutdown).is_err() {
            debug!(credential = %id, session = %handle.id, "session already finished");
        }

        match tokio::time::timeout(self.timeout, &mut handle.task).await {
            Ok(Ok(())) => debug!(credential = %id, session = %handle.id, "teardown complete"),
            Ok(Err(e)) => warn!(credential = %id, session = %handle.id, error = %e, "session task failed"),
            Err(_) => {
                warn!(
                    credential = %id,
                    session = %handle.id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "teardown timed out, aborting session"
                );
                handle.task.abort();
            },
        }
        id
    }

    /// Tear down several sessions concurrently.
    pub(crate) async fn teardown_all(
        &self,
        handles: Vec<(CredentialId, SessionHandle)>,
    ) -> Vec<CredentialId> {
        futures::future::join_all(
            handles
                .into_iter()
                .map(|(id, handle)| self.teardown(id, handle)),
        )
        .await
    }
}
