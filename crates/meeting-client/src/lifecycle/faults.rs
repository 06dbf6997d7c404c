//! Supervision of facade-driven background tasks.
//!
//! Installed when a meeting is joined and removed on leave. Every task spawned
//! through the monitor is awaited by a supervisor; an `Err` or a panic is
//! logged as an asynchronous fault and counted, and the session carries on.

use crate::errors::ClientError;
use crate::observability::metrics;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Supervisor mailbox size.
const FAULT_CHANNEL_BUFFER: usize = 64;

struct Supervised {
    name: &'static str,
    task: BoxFuture<'static, Result<(), ClientError>>,
}

/// Session-scoped supervisor for fire-and-forget tasks.
pub struct AsyncFaultMonitor {
    sender: mpsc::Sender<Supervised>,
    cancel_token: CancellationToken,
    faults: Arc<AtomicUsize>,
    supervisor: JoinHandle<()>,
}

impl AsyncFaultMonitor {
    /// Start the supervisor. It stops when `cancel_token` is cancelled or on
    /// [`AsyncFaultMonitor::uninstall`].
    #[must_use]
    pub fn install(cancel_token: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(FAULT_CHANNEL_BUFFER);
        let faults = Arc::new(AtomicUsize::new(0));

        let supervisor = tokio::spawn(supervise(
            receiver,
            cancel_token.clone(),
            Arc::clone(&faults),
        ));
        debug!(target: "client.lifecycle", "Async fault monitor installed");

        Self {
            sender,
            cancel_token,
            faults,
            supervisor,
        }
    }

    /// Run `task` under supervision.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Internal` if the monitor has been removed.
    pub async fn spawn<F>(&self, name: &'static str, task: F) -> Result<(), ClientError>
    where
        F: Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        self.sender
            .send(Supervised {
                name,
                task: Box::pin(task),
            })
            .await
            .map_err(|e| ClientError::Internal(format!("fault monitor closed: {e}")))
    }

    /// Number of tasks that failed so far.
    #[must_use]
    pub fn fault_count(&self) -> usize {
        self.faults.load(Ordering::SeqCst)
    }

    /// Stop supervising. Tasks still running are aborted.
    pub async fn uninstall(self) {
        self.cancel_token.cancel();
        if let Err(e) = self.supervisor.await {
            warn!(target: "client.lifecycle", error = %e, "Fault supervisor exited abnormally");
        }
        debug!(target: "client.lifecycle", "Async fault monitor removed");
    }
}

async fn supervise(
    mut receiver: mpsc::Receiver<Supervised>,
    cancel_token: CancellationToken,
    faults: Arc<AtomicUsize>,
) {
    let mut tasks: JoinSet<(&'static str, Result<(), ClientError>)> = JoinSet::new();
    let mut accepting = true;

    // Runs until cancelled, or until the monitor is dropped and the last
    // task finishes.
    loop {
        if !accepting && tasks.is_empty() {
            break;
        }
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => break,
            next = receiver.recv(), if accepting => match next {
                Some(Supervised { name, task }) => {
                    tasks.spawn(async move { (name, task.await) });
                }
                None => accepting = false,
            },
            Some(joined) = tasks.join_next() => {
                match joined {
                    Ok((_, Ok(()))) => {}
                    Ok((name, Err(e))) => record_fault(&faults, name, &e.to_string()),
                    Err(e) => record_fault(&faults, "unknown", &e.to_string()),
                }
            }
        }
    }

    tasks.abort_all();
}

fn record_fault(faults: &AtomicUsize, task: &'static str, error: &str) {
    faults.fetch_add(1, Ordering::SeqCst);
    metrics::record_async_fault();
    warn!(
        target: "client.lifecycle",
        task,
        error,
        "Asynchronous fault in background task"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn settle(monitor: &AsyncFaultMonitor, expected: usize) {
        for _ in 0..100 {
            if monitor.fault_count() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_failed_task_is_counted_and_monitor_survives() {
        let monitor = AsyncFaultMonitor::install(CancellationToken::new());

        monitor
            .spawn("choose_audio_input", async {
                Err(ClientError::Facade("device busy".to_string()))
            })
            .await
            .unwrap();
        settle(&monitor, 1).await;
        assert_eq!(monitor.fault_count(), 1);

        let (tx, rx) = tokio::sync::oneshot::channel();
        monitor
            .spawn("ok_task", async move {
                tx.send(()).ok();
                Ok(())
            })
            .await
            .unwrap();
        rx.await.unwrap();
        assert_eq!(monitor.fault_count(), 1);

        monitor.uninstall().await;
    }

    #[tokio::test]
    async fn test_parent_cancellation_closes_monitor() {
        let parent = CancellationToken::new();
        let monitor = AsyncFaultMonitor::install(parent.child_token());

        parent.cancel();
        let sender = monitor.sender.clone();
        sender.closed().await;

        let result = monitor.spawn("late", async { Ok(()) }).await;
        assert!(matches!(result, Err(ClientError::Internal(_))));
        monitor.uninstall().await;
    }

    #[tokio::test]
    async fn test_spawn_after_uninstall_fails() {
        let monitor = AsyncFaultMonitor::install(CancellationToken::new());
        let sender = monitor.sender.clone();
        monitor.uninstall().await;

        let result = sender
            .send(Supervised {
                name: "late",
                task: Box::pin(async { Ok(()) }),
            })
            .await;
        assert!(result.is_err());
    }
}
