//! Background execution of workflow runs.
//!
//! A [`TaskQueue`] hands out opaque task handles and runs submitted units in
//! the background. The handle is persisted on the workflow record so a later
//! request can ask the queue to abort the unit. [`LocalTaskQueue`] keeps
//! everything in-process: units run as tokio tasks behind a semaphore and
//! each handle maps to a `CancellationToken`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// A unit of background work. Receives the token that signals abort.
pub type RunUnit =
    Box<dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Box an async closure as a [`RunUnit`].
pub fn run_unit<F, Fut>(f: F) -> RunUnit
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move |token: CancellationToken| -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(f(token))
    })
}

/// Queue of background workflow runs.
pub trait TaskQueue: Send + Sync {
    /// Reserve a handle for a unit that will be submitted later.
    fn allocate_handle(&self) -> String;

    /// Start `unit` under `handle`. Returns immediately.
    fn submit(&self, handle: &str, unit: RunUnit) -> Result<()>;

    /// Give back a handle whose unit will never be submitted.
    fn release_handle(&self, handle: &str);

    /// Ask the unit under `handle` to stop. Returns `false` if the handle is
    /// unknown to this queue.
    fn request_abort(&self, handle: &str) -> bool;
}

/// In-process queue backed by tokio tasks.
pub struct LocalTaskQueue {
    slots: Arc<Semaphore>,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl LocalTaskQueue {
    pub fn new(max_concurrent_runs: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of handles that are allocated or running.
    pub fn active(&self) -> usize {
        self.tokens.lock().len()
    }
}

impl TaskQueue for LocalTaskQueue {
    fn allocate_handle(&self) -> String {
        let handle = Uuid::new_v4().to_string();
        self.tokens
            .lock()
            .insert(handle.clone(), CancellationToken::new());
        handle
    }

    fn submit(&self, handle: &str, unit: RunUnit) -> Result<()> {
        let token = self.tokens.lock().get(handle).cloned().ok_or_else(|| {
            PipelineError::ExecutionFailed(format!("unknown task handle {handle}"))
        })?;

        let slots = self.slots.clone();
        let tokens = self.tokens.clone();
        let handle = handle.to_string();
        tokio::spawn(async move {
            // A closed semaphore would only mean shutdown; run anyway.
            let _permit = slots.acquire_owned().await.ok();
            tracing::debug!(task_handle = %handle, "Run unit started");
            unit(token).await;
            tokens.lock().remove(&handle);
            tracing::debug!(task_handle = %handle, "Run unit finished");
        });
        Ok(())
    }

    fn release_handle(&self, handle: &str) {
        if self.tokens.lock().remove(handle).is_some() {
            tracing::debug!(task_handle = %handle, "Task handle released");
        }
    }

    fn request_abort(&self, handle: &str) -> bool {
        match self.tokens.lock().get(handle) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_submit_runs_unit_and_releases_handle() {
        let queue = LocalTaskQueue::new(2);
        let handle = queue.allocate_handle();
        assert_eq!(queue.active(), 1);

        let (tx, rx) = oneshot::channel();
        queue
            .submit(&handle, run_unit(move |_| async move {
                let _ = tx.send(());
            }))
            .unwrap();
        rx.await.unwrap();

        for _ in 0..100 {
            if queue.active() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(queue.active(), 0);
        assert!(!queue.request_abort(&handle));
    }

    #[tokio::test]
    async fn test_released_handle_cannot_be_submitted() {
        let queue = LocalTaskQueue::new(1);
        let handle = queue.allocate_handle();
        queue.release_handle(&handle);
        assert_eq!(queue.active(), 0);

        let err = queue.submit(&handle, run_unit(|_| async {})).unwrap_err();
        assert!(matches!(err, PipelineError::ExecutionFailed(_)));
        queue.release_handle(&handle);
    }

    #[tokio::test]
    async fn test_unknown_handle_is_rejected() {
        let queue = LocalTaskQueue::new(1);
        let err = queue.submit("nope", run_unit(|_| async {})).unwrap_err();
        assert!(matches!(err, PipelineError::ExecutionFailed(_)));
        assert!(!queue.request_abort("nope"));
    }

    #[tokio::test]
    async fn test_abort_reaches_running_unit() {
        let queue = LocalTaskQueue::new(1);
        let handle = queue.allocate_handle();
        let (tx, rx) = oneshot::channel();
        queue
            .submit(&handle, run_unit(move |token| async move {
                token.cancelled().await;
                let _ = tx.send(());
            }))
            .unwrap();

        assert!(queue.request_abort(&handle));
        tokio::time::timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_abort_before_slot_is_visible_to_unit() {
        let queue = LocalTaskQueue::new(1);

        // Occupy the only slot.
        let blocker = queue.allocate_handle();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        queue
            .submit(&blocker, run_unit(move |_| async move {
                let _ = release_rx.await;
            }))
            .unwrap();

        let waiting = queue.allocate_handle();
        let (seen_tx, seen_rx) = oneshot::channel();
        queue
            .submit(&waiting, run_unit(move |token| async move {
                let _ = seen_tx.send(token.is_cancelled());
            }))
            .unwrap();

        assert!(queue.request_abort(&waiting));
        release_tx.send(()).unwrap();
        assert!(seen_rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let queue = LocalTaskQueue::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut done = Vec::new();

        for _ in 0..6 {
            let handle = queue.allocate_handle();
            let (tx, rx) = oneshot::channel();
            let running = running.clone();
            let peak = peak.clone();
            queue
                .submit(&handle, run_unit(move |_| async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    let _ = tx.send(());
                }))
                .unwrap();
            done.push(rx);
        }
        for rx in done {
            rx.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
