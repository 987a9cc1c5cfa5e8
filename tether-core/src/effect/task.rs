//! Completion handle for the effects started by one `send`.

use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

struct Task {
    join: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

/// Handle to the effects started while processing a `send`.
///
/// Dropping the handle detaches from the effects; they keep running.
#[derive(Default)]
#[must_use = "a task handle can be awaited with `finish` or dropped to detach"]
pub struct TaskHandle {
    tasks: Vec<Task>,
}

impl TaskHandle {
    /// A handle with no effects; `finish` resolves immediately.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, join: JoinHandle<()>, cancelled: Arc<AtomicBool>) {
        self.tasks.push(Task { join, cancelled });
    }

    /// Absorb the effects tracked by `other`.
    pub fn merge(&mut self, other: TaskHandle) {
        self.tasks.extend(other.tasks);
    }

    /// Number of tracked effect tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether every tracked effect completed or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|task| task.join.is_finished())
    }

    /// Cancel every tracked effect. Actions they send afterwards are
    /// discarded.
    pub fn cancel(&self) {
        for task in &self.tasks {
            task.cancelled.store(true, Ordering::SeqCst);
            task.join.abort();
        }
    }

    /// Wait until every tracked effect completed or was cancelled.
    ///
    /// A panic inside an effect is resumed here.
    pub async fn finish(self) {
        for task in self.tasks {
            if let Err(err) = task.join.await {
                if err.is_panic() {
                    panic::resume_unwind(err.into_panic());
                }
            }
        }
    }

    /// Like `finish`, but cancels whatever is still running if the awaiting
    /// future is dropped first.
    pub(crate) async fn finish_scoped(self) {
        let mut guard = CancelGuard {
            handle: self,
            armed: true,
        };
        for task in &mut guard.handle.tasks {
            if let Err(err) = (&mut task.join).await {
                if err.is_panic() {
                    panic::resume_unwind(err.into_panic());
                }
            }
        }
        guard.armed = false;
    }
}

/// Cancels the tasks of a handle whose scoped wait was abandoned.
struct CancelGuard {
    handle: TaskHandle,
    armed: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.handle.cancel();
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("tasks", &self.tasks.len())
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::task::LocalSet;

    fn spawn(handle: &mut TaskHandle, delay: Duration, done: Arc<AtomicBool>) {
        let join = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            done.store(true, Ordering::SeqCst);
        });
        handle.push(join, Arc::new(AtomicBool::new(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn finish_waits_for_every_task() {
        LocalSet::new()
            .run_until(async {
                let first = Arc::new(AtomicBool::new(false));
                let second = Arc::new(AtomicBool::new(false));

                let mut handle = TaskHandle::empty();
                spawn(&mut handle, Duration::from_millis(10), first.clone());
                let mut other = TaskHandle::empty();
                spawn(&mut other, Duration::from_millis(30), second.clone());
                handle.merge(other);

                assert_eq!(handle.len(), 2);
                handle.finish().await;

                assert!(first.load(Ordering::SeqCst));
                assert!(second.load(Ordering::SeqCst));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_tasks() {
        LocalSet::new()
            .run_until(async {
                let done = Arc::new(AtomicBool::new(false));
                let mut handle = TaskHandle::empty();
                spawn(&mut handle, Duration::from_secs(1), done.clone());

                handle.cancel();
                handle.finish().await;

                assert!(!done.load(Ordering::SeqCst));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_scoped_wait_cancels_the_tasks() {
        LocalSet::new()
            .run_until(async {
                let done = Arc::new(AtomicBool::new(false));
                let mut handle = TaskHandle::empty();
                spawn(&mut handle, Duration::from_secs(1), done.clone());

                let waiter = tokio::task::spawn_local(handle.finish_scoped());
                tokio::task::yield_now().await;
                waiter.abort();
                let _ = waiter.await;

                tokio::time::sleep(Duration::from_secs(2)).await;
                assert!(!done.load(Ordering::SeqCst));
            })
            .await;
    }

    #[tokio::test]
    async fn empty_handle_is_finished() {
        let handle = TaskHandle::empty();
        assert!(handle.is_empty());
        assert!(handle.is_finished());
        handle.finish().await;
    }
}
