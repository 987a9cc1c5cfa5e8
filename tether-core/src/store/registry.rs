//! In-flight effect registry.
//!
//! Each root store core owns one registry. Every effect task it spawns is
//! recorded under a fresh [`EffectId`] together with the cancel ids of every
//! `cancellable` wrapper around it. Cancelling an id flips the cancelled flag
//! of each matching entry (so its [`ActionSender`](crate::effect::ActionSender)
//! stops delivering at once) and aborts the task.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::effect::CancelId;

/// Identifier of one running effect task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(Uuid);

impl EffectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Entry {
    cancel_ids: SmallVec<[CancelId; 2]>,
    abort: AbortHandle,
    cancelled: Arc<AtomicBool>,
}

impl Entry {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.abort.abort();
    }

    fn is_live(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && !self.abort.is_finished()
    }
}

#[derive(Default)]
pub(crate) struct EffectRegistry {
    entries: IndexMap<EffectId, Entry>,
}

impl EffectRegistry {
    pub(crate) fn register(
        &mut self,
        id: EffectId,
        cancel_ids: &[CancelId],
        abort: AbortHandle,
        cancelled: Arc<AtomicBool>,
    ) {
        self.entries.insert(
            id,
            Entry {
                cancel_ids: cancel_ids.iter().cloned().collect(),
                abort,
                cancelled,
            },
        );
    }

    /// Forget an effect that ran to completion.
    pub(crate) fn finish(&mut self, id: EffectId) {
        self.entries.shift_remove(&id);
    }

    /// Cancel every effect registered under `cancel_id`. Returns how many
    /// were cancelled; cancelling an unknown id is a no-op.
    pub(crate) fn cancel(&mut self, cancel_id: &CancelId) -> usize {
        let mut cancelled = 0;
        self.entries.retain(|_, entry| {
            if entry.cancel_ids.contains(cancel_id) {
                entry.cancel();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        cancelled
    }

    /// Cancel everything.
    pub(crate) fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain(..) {
            entry.cancel();
        }
        count
    }

    /// Number of effects still running. Entries are only pruned here, so
    /// registering stays constant time.
    pub(crate) fn len(&mut self) -> usize {
        self.prune();
        self.entries.len()
    }

    /// Drop entries whose task ended without going through `finish`, e.g.
    /// after `TaskHandle::cancel`.
    fn prune(&mut self) {
        self.entries.retain(|_, entry| entry.is_live());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::task::LocalSet;

    fn pending_task() -> (AbortHandle, Arc<AtomicBool>) {
        let join = tokio::task::spawn_local(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        (join.abort_handle(), Arc::new(AtomicBool::new(false)))
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_by_id_only_touches_matching_entries() {
        LocalSet::new()
            .run_until(async {
                let mut registry = EffectRegistry::default();
                let (abort_a, flag_a) = pending_task();
                let (abort_b, flag_b) = pending_task();

                registry.register(EffectId::new(), &["timer".into()], abort_a, flag_a.clone());
                registry.register(EffectId::new(), &["fetch".into()], abort_b, flag_b.clone());
                assert_eq!(registry.len(), 2);

                assert_eq!(registry.cancel(&"timer".into()), 1);
                assert!(flag_a.load(Ordering::SeqCst));
                assert!(!flag_b.load(Ordering::SeqCst));
                assert_eq!(registry.len(), 1);

                // Idempotent.
                assert_eq!(registry.cancel(&"timer".into()), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn nested_ids_are_all_matched() {
        LocalSet::new()
            .run_until(async {
                let mut registry = EffectRegistry::default();
                let (abort, flag) = pending_task();
                registry.register(EffectId::new(), &["outer".into(), "inner".into()], abort, flag);

                assert_eq!(registry.cancel(&"inner".into()), 1);
                assert_eq!(registry.len(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_tasks_are_pruned_on_len() {
        LocalSet::new()
            .run_until(async {
                let mut registry = EffectRegistry::default();
                let (abort, flag) = pending_task();
                registry.register(EffectId::new(), &[], abort.clone(), flag);
                for _ in 0..3 {
                    let (abort, flag) = pending_task();
                    registry.register(EffectId::new(), &[], abort, flag);
                }
                assert_eq!(registry.entries.len(), 4);

                abort.abort();
                tokio::time::sleep(Duration::from_millis(1)).await;
                assert_eq!(registry.len(), 3);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn finish_and_cancel_all() {
        LocalSet::new()
            .run_until(async {
                let mut registry = EffectRegistry::default();
                let done = EffectId::new();
                let (abort_a, flag_a) = pending_task();
                let (abort_b, flag_b) = pending_task();
                registry.register(done, &[], abort_a, flag_a);
                registry.register(EffectId::new(), &[], abort_b, flag_b.clone());

                registry.finish(done);
                assert_eq!(registry.len(), 1);

                assert_eq!(registry.cancel_all(), 1);
                assert!(flag_b.load(Ordering::SeqCst));
                assert_eq!(registry.len(), 0);
            })
            .await;
    }
}
