//! Tracked background work.
//!
//! Cache writes and revalidations run detached from the request that caused
//! them. Each one is registered here so the host can wait for all of them to
//! settle before it shuts the agent down.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinSet;

/// List of in-flight side effects the host must await before recycling the agent.
#[derive(Clone, Default)]
pub struct PendingTasks {
    inner: Arc<Mutex<JoinSet<()>>>,
    in_flight: Arc<AtomicUsize>,
}

/// Counts one task as in flight until dropped, whether the task finishes,
/// panics or is aborted.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PendingTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current runtime and track it until it finishes.
    pub fn wait_until<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = InFlight::enter(&self.in_flight);
        let mut set = self.lock();
        while let Some(done) = set.try_join_next() {
            log_join(done);
        }
        set.spawn(async move {
            let _guard = guard;
            task.await;
            tracing::trace!(task = label, "background task settled");
        });
    }

    /// Tasks registered and not yet finished.
    pub fn len(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every tracked task, including ones registered while waiting.
    pub async fn settle(&self) {
        loop {
            let mut set = std::mem::take(&mut *self.lock());
            if set.is_empty() {
                return;
            }
            while let Some(done) = set.join_next().await {
                log_join(done);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "background task did not complete");
    }
}
