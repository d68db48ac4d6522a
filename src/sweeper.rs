//! Background expiration sweeper
//!
//! Every store owns exactly one sweeper. The sweeper sleeps for one max age,
//! purges expired records, then sleeps again for a full max age measured from
//! the end of that purge. A record can therefore outlive its expiration by up
//! to one more max age before it is removed.
//!
//! Shutdown is a rendezvous: [`Sweeper::stop`] hands the task an
//! acknowledgement channel, the task answers on it and leaves its loop, and
//! `stop` returns only after the task has finished.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::SessionError;

/// Storage that can delete its own expired records in one pass
#[async_trait]
pub(crate) trait Purge: Send + Sync + 'static {
    /// Backend name used in logs
    fn backend(&self) -> &'static str;

    /// Delete every record whose expiration is before now.
    /// Returns the number of records removed.
    async fn purge_expired(&self) -> Result<u64, SessionError>;
}

type ShutdownSender = oneshot::Sender<oneshot::Sender<()>>;

struct Running {
    shutdown: ShutdownSender,
    handle: JoinHandle<()>,
}

/// Handle to a running sweeper task
pub(crate) struct Sweeper {
    running: Mutex<Option<Running>>,
}

impl Sweeper {
    /// Spawn the sweeper on the current Tokio runtime
    pub(crate) fn spawn<P: Purge>(target: P, interval: Duration) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(run(target, interval, shutdown_rx));
        Ok(Self {
            running: Mutex::new(Some(Running { shutdown, handle })),
        })
    }

    /// Stop the sweeper and wait until its task has exited.
    ///
    /// Calling this again after it returned is a no-op.
    pub(crate) async fn stop(&self) -> Result<(), SessionError> {
        let running = self.running.lock().take();
        let Some(Running { shutdown, handle }) = running else {
            return Ok(());
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if shutdown.send(ack_tx).is_ok() {
            // An Err here means the task dropped the ack without answering,
            // which only happens if it panicked; the join below reports that.
            let _ = ack_rx.await;
        }

        handle
            .await
            .map_err(|e| SessionError::Sweeper(e.to_string()))
    }

    /// Whether the sweeper task is still alive
    pub(crate) fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

async fn run<P: Purge>(
    target: P,
    interval: Duration,
    mut shutdown: oneshot::Receiver<oneshot::Sender<()>>,
) {
    let backend = target.backend();
    info!(backend, ?interval, "session expiration sweeper started");

    loop {
        tokio::select! {
            // Shutdown wins over a timer that fired at the same moment.
            biased;

            request = &mut shutdown => {
                if let Ok(ack) = request {
                    let _ = ack.send(());
                }
                // Err: the store was dropped without close.
                break;
            }
            _ = tokio::time::sleep(interval) => {
                match target.purge_expired().await {
                    Ok(removed) => debug!(backend, removed, "swept expired sessions"),
                    Err(e) => error!(backend, error = %e, "session sweep failed"),
                }
            }
        }
    }

    info!(backend, "session expiration sweeper stopped");
}
