//! Task spawning abstraction for single-threaded environments.

use async_trait::async_trait;
use std::future::Future;

/// Provider for spawning local tasks in single-threaded context.
///
/// This trait abstracts task spawning so connection code can run loop
/// bodies on the real runtime or under test schedulers while keeping the
/// single-threaded execution guarantees the connection layer relies on.
#[async_trait(?Send)]
pub trait TaskProvider: Clone {
    /// Spawn a named task that runs on the current thread.
    ///
    /// The task is executed with `spawn_local` to maintain the
    /// single-threaded execution guarantees; callers must be inside a
    /// local task set.
    fn spawn_task<F>(&self, name: &str, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + 'static;

    /// Yield control to allow other tasks to run.
    async fn yield_now(&self);
}

/// Real task provider spawning onto the current thread's local set.
#[derive(Debug, Clone, Default)]
pub struct TokioTaskProvider;

#[async_trait(?Send)]
impl TaskProvider for TokioTaskProvider {
    fn spawn_task<F>(&self, name: &str, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + 'static,
    {
        tracing::trace!(task = name, "spawning local task");
        tokio::task::spawn_local(future)
    }

    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[tokio::test]
    async fn spawned_tasks_run_on_the_local_set() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let provider = TokioTaskProvider;
                let ran = Rc::new(Cell::new(false));
                let ran_in_task = Rc::clone(&ran);

                let handle = provider.spawn_task("marker", async move {
                    ran_in_task.set(true);
                });
                provider.yield_now().await;

                handle.await.expect("task completes");
                assert!(ran.get());
            })
            .await;
    }
}
