//! Tracking of outstanding background work so a process can drain it before exiting.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::{sync::Notify, task::JoinHandle};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Counts outstanding background tasks and lets a caller block until all of them have finished.
///
/// Every task is registered before it starts and deregistered exactly once when it finishes,
/// whether it succeeded, failed or panicked. [`ShutdownCoordinator::wait`] returns only once the
/// count has reached zero, so tasks registered while a drain is already in progress are honored
/// as well.
///
/// ## Example
///
/// ```
/// # use sandutils::ShutdownCoordinator;
/// # #[tokio::main]
/// # async fn main() {
/// let coordinator = ShutdownCoordinator::new();
///
/// coordinator.spawn(async {
///     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
/// });
///
/// coordinator.wait().await;
/// assert_eq!(coordinator.outstanding(), 0);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    state: Arc<DrainState>,
}

/// A registration of one unit of background work.
///
/// Dropping the guard deregisters the work, which also covers tasks that unwind.
#[derive(Debug)]
#[must_use = "dropping the guard immediately deregisters the task"]
pub struct TaskGuard {
    state: Option<Arc<DrainState>>,
}

#[derive(Debug, Default)]
struct DrainState {
    /// Number of registered tasks that have not finished yet.
    outstanding: AtomicUsize,

    /// Signalled whenever the outstanding count drops to zero.
    drained: Notify,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShutdownCoordinator {
    /// Creates a coordinator with no outstanding tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one unit of work. Call this before the work is spawned.
    pub fn register(&self) -> TaskGuard {
        self.state.outstanding.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            state: Some(Arc::clone(&self.state)),
        }
    }

    /// Registers and spawns `future` on the tokio runtime as one step.
    ///
    /// The registration happens before the task exists, so a concurrent [`wait`](Self::wait)
    /// can never miss it.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.register();
        tokio::spawn(async move {
            let _guard = guard;
            future.await
        })
    }

    /// Returns the number of registered tasks that have not finished.
    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::SeqCst)
    }

    /// Waits until every registered task has called [`TaskGuard::done`] or dropped its guard.
    pub async fn wait(&self) {
        loop {
            let notified = self.state.drained.notified();
            tokio::pin!(notified);

            // Subscribe before reading the counter so a release in between is not lost.
            notified.as_mut().enable();

            let outstanding = self.outstanding();
            if outstanding == 0 {
                return;
            }

            tracing::debug!(outstanding, "waiting for background tasks to finish");
            notified.await;
        }
    }
}

impl TaskGuard {
    /// Marks the unit of work as finished.
    pub fn done(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(state) = self.state.take() {
            if state.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
                state.drained.notify_waiters();
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.release();
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
