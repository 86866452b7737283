//! Fire-and-forget background work
//!
//! [`BackgroundTasks::run`] returns immediately. Errors and panics inside a
//! task are logged, never propagated. [`BackgroundTasks::wait`] joins every
//! task registered before it was called and is only used during shutdown.

use std::fmt::Display;
use std::future::Future;

use tokio_util::task::TaskTracker;

#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` and register it with the tracker.
    ///
    /// Registration happens before this returns, so a later `wait` always
    /// observes it.
    pub fn run<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        // The inner spawn isolates panics; the tracked outer task observes
        // them through the JoinError.
        self.tracker.spawn(async move {
            match tokio::spawn(task).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Background task completed"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task failed"),
                Err(join_err) if join_err.is_panic() => {
                    let panic = join_err.into_panic();
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_owned())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic payload".to_owned());
                    tracing::error!(task = name, panic = %message, "Background task panicked");
                }
                Err(join_err) => {
                    tracing::warn!(task = name, error = %join_err, "Background task cancelled");
                }
            }
        });
    }

    /// Number of tasks still running
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Close the tracker and wait for every task to finish.
    ///
    /// No timeout: outstanding work runs to completion.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_joins_all_tasks() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..10u64 {
            let done = done.clone();
            tasks.run("count", async move {
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
        }

        tasks.wait().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        tasks.run("boom", async {
            if true {
                panic!("mail relay exploded");
            }
            Ok::<(), String>(())
        });
        let counter = done.clone();
        tasks.run("after", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });

        tasks.wait().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_is_not_propagated() {
        let tasks = BackgroundTasks::new();
        tasks.run("fails", async { Err::<(), _>("smtp unavailable") });
        tasks.wait().await;
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_wait_with_no_tasks() {
        let tasks = BackgroundTasks::new();
        tokio::time::timeout(Duration::from_secs(1), tasks.wait())
            .await
            .unwrap();
    }
}
