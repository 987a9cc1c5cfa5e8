//! Store Cores
//!
//! A [`Store`](super::Store) is a thin handle around a core. There are four
//! kinds:
//!
//! - [`RootCore`] owns the state, the reducer, the action queue, the effect
//!   registry and the did-change notifier.
//! - [`ScopedCore`] owns nothing but a lens, a case path and a link to its
//!   parent core. Reads go through the lens into the parent; actions are
//!   embedded and sent to the parent.
//! - [`OptionalScopedCore`] is a scoped core over `Option<C>` state. It
//!   remembers the last present value so observers can still read it after
//!   the state went away.
//! - [`InvalidCore`] backs placeholder stores and panics on use.
//!
//! # Ownership
//!
//! Children never hold their root strongly. The link handed to a child of
//! the root is a [`RootLink`] with a weak reference; dropping every handle to
//! the root store therefore drops the state and cancels its effects, and any
//! surviving child panics with [`StoreError::Deallocated`] when used.
//! Scoped cores hold their own parents strongly since they carry no state.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::config::StoreConfig;
use super::registry::{EffectId, EffectRegistry};
use crate::effect::{ActionSender, CancelId, Effect, Operation, TaskHandle, Work};
use crate::error::StoreError;
use crate::isolation::Isolation;
use crate::path::{CasePath, Lens};
use crate::reducer::Reducer;
use crate::subscriber::{Notifier, Subscription};

pub(crate) type Callback = Box<dyn Fn() + Send + Sync>;

/// The operations every store core supports.
pub(crate) trait Core<S, A>: Send + Sync {
    /// Call `f` with the current state.
    fn with_state(&self, f: &mut dyn FnMut(&S));

    /// Reduce `action` and start its effects.
    fn send(&self, action: A) -> TaskHandle;

    /// Register a callback on the root's did-change notifier.
    fn subscribe(&self, callback: Callback) -> Subscription;

    fn is_valid(&self) -> bool;

    fn effect_count(&self) -> usize;

    /// The link a child scope keeps to this core.
    fn link(self: Arc<Self>) -> Arc<dyn Core<S, A>>;
}

/// Read the state of `core` through `f`.
pub(crate) fn read<S, A, R>(core: &dyn Core<S, A>, f: impl FnOnce(&S) -> R) -> R {
    let mut f = Some(f);
    let mut output = None;
    core.with_state(&mut |state| {
        if let Some(f) = f.take() {
            output = Some(f(state));
        }
    });
    output.expect("store core did not provide its state")
}

// ----------------------------------------------------------------------------
// Root
// ----------------------------------------------------------------------------

/// Resets the re-entrancy flag of the send loop, also when a reducer panics.
/// Actions queued behind a panicking one are discarded with it.
struct SendingGuard<'a, A> {
    sending: &'a AtomicBool,
    queue: &'a Mutex<VecDeque<A>>,
}

impl<A> Drop for SendingGuard<'_, A> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let dropped = std::mem::take(&mut *self.queue.lock()).len();
            if dropped > 0 {
                tracing::warn!(dropped, "send loop panicked, discarding queued actions");
            }
        }
        self.sending.store(false, Ordering::SeqCst);
    }
}

#[track_caller]
fn reentrant(operation: &'static str) -> ! {
    panic!("{}", StoreError::ReentrantStoreAccess { operation })
}

pub(crate) struct RootCore<S, A> {
    state: RwLock<S>,
    reducer: Box<dyn Reducer<S, A>>,
    queue: Mutex<VecDeque<A>>,
    sending: AtomicBool,
    effects: Mutex<EffectRegistry>,
    did_change: Notifier,
    isolation: Isolation,
    config: StoreConfig,
    this: Weak<Self>,
}

impl<S, A> RootCore<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    pub(crate) fn new(
        state: S,
        reducer: Box<dyn Reducer<S, A>>,
        config: StoreConfig,
        isolation: Isolation,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            state: RwLock::new(state),
            reducer,
            queue: Mutex::new(VecDeque::new()),
            sending: AtomicBool::new(false),
            effects: Mutex::new(EffectRegistry::default()),
            did_change: Notifier::new(),
            isolation,
            config,
            this: this.clone(),
        })
    }

    /// Process `action` and every action queued while doing so.
    ///
    /// Each action is reduced, its mutation committed, observers notified and
    /// its effects started before the next action is taken off the queue.
    fn process(&self, action: A) -> TaskHandle {
        self.queue.lock().push_back(action);
        if self.sending.swap(true, Ordering::SeqCst) {
            // Re-entrant send: the running loop picks the action up.
            return TaskHandle::empty();
        }
        let _guard = SendingGuard {
            sending: &self.sending,
            queue: &self.queue,
        };

        let mut tasks = TaskHandle::empty();
        loop {
            let next = self.queue.lock().pop_front();
            let Some(action) = next else {
                break;
            };

            if self.config.trace_actions {
                tracing::trace!(
                    store = %self.config.label,
                    action = std::any::type_name::<A>(),
                    "reducing action"
                );
            }

            let effect = {
                let Some(mut state) = self.state.try_write() else {
                    reentrant("send");
                };
                self.reducer.reduce(&mut state, action)
            };

            self.did_change.notify();
            self.start(effect, &mut tasks, &[]);
        }
        tasks
    }

    fn start(&self, effect: Effect<A>, tasks: &mut TaskHandle, cancel_ids: &[CancelId]) {
        match effect.operation {
            Operation::None => {}
            Operation::Send(action) => tasks.merge(self.process(action)),
            Operation::Run(work) => self.spawn(work, tasks, cancel_ids),
            Operation::Cancellable {
                id,
                cancel_in_flight,
                effect,
            } => {
                if cancel_in_flight {
                    self.cancel(&id);
                }
                let mut ids: SmallVec<[CancelId; 2]> = cancel_ids.iter().cloned().collect();
                ids.push(id);
                self.start(*effect, tasks, &ids);
            }
            Operation::Cancel(id) => self.cancel(&id),
            Operation::Merge(effects) => {
                for effect in effects {
                    self.start(effect, tasks, cancel_ids);
                }
            }
            Operation::Concatenate(effects) => {
                let this = self.this.clone();
                let ids: SmallVec<[CancelId; 2]> = cancel_ids.iter().cloned().collect();
                let sequence: Work<A> = Box::new(move |_| {
                    async move {
                        for effect in effects {
                            let Some(core) = this.upgrade() else {
                                return;
                            };
                            let mut step = TaskHandle::empty();
                            core.start(effect, &mut step, &ids);
                            drop(core);
                            step.finish_scoped().await;
                        }
                    }
                    .boxed_local()
                });
                self.spawn(sequence, tasks, cancel_ids);
            }
        }
    }

    fn spawn(&self, work: Work<A>, tasks: &mut TaskHandle, cancel_ids: &[CancelId]) {
        let id = EffectId::new();
        let cancelled = Arc::new(AtomicBool::new(false));
        let future = work(self.sender(Arc::clone(&cancelled)));

        let this = self.this.clone();
        let join = tokio::task::spawn_local(async move {
            future.await;
            if let Some(core) = this.upgrade() {
                core.effects.lock().finish(id);
                tracing::trace!(store = %core.config.label, effect = %id, "effect finished");
            }
        });

        tracing::trace!(store = %self.config.label, effect = %id, "effect started");
        self.effects
            .lock()
            .register(id, cancel_ids, join.abort_handle(), Arc::clone(&cancelled));
        tasks.push(join, cancelled);
    }

    fn sender(&self, cancelled: Arc<AtomicBool>) -> ActionSender<A> {
        let this = self.this.clone();
        ActionSender::new(
            Arc::new(move |action: A| {
                if let Some(core) = this.upgrade() {
                    let _detached = core.send(action);
                }
            }),
            cancelled,
        )
    }

    fn cancel(&self, id: &CancelId) {
        let count = self.effects.lock().cancel(id);
        if count > 0 {
            tracing::debug!(store = %self.config.label, cancel_id = %id, count, "cancelled effects");
        }
    }
}

impl<S, A> Core<S, A> for RootCore<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    fn with_state(&self, f: &mut dyn FnMut(&S)) {
        self.isolation.assert_current("with_state");
        // Nested reads are fine; a read during a reduce is not.
        let Some(state) = self.state.try_read_recursive() else {
            reentrant("with_state");
        };
        f(&state);
    }

    fn send(&self, action: A) -> TaskHandle {
        self.isolation.assert_current("send");
        self.process(action)
    }

    fn subscribe(&self, callback: Callback) -> Subscription {
        self.did_change.subscribe(callback)
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn effect_count(&self) -> usize {
        self.effects.lock().len()
    }

    fn link(self: Arc<Self>) -> Arc<dyn Core<S, A>> {
        Arc::new(RootLink {
            root: Arc::downgrade(&self),
        })
    }
}

impl<S, A> Drop for RootCore<S, A> {
    fn drop(&mut self) {
        let count = self.effects.get_mut().cancel_all();
        if count > 0 {
            tracing::debug!(store = %self.config.label, count, "store dropped, cancelled in-flight effects");
        }
    }
}

/// Non-owning link from a child scope to the root core.
struct RootLink<S, A> {
    root: Weak<RootCore<S, A>>,
}

impl<S, A> RootLink<S, A> {
    #[track_caller]
    fn root(&self, operation: &'static str) -> Arc<RootCore<S, A>> {
        match self.root.upgrade() {
            Some(root) => root,
            None => panic!("{}", StoreError::Deallocated { operation }),
        }
    }
}

impl<S, A> Core<S, A> for RootLink<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    fn with_state(&self, f: &mut dyn FnMut(&S)) {
        self.root("with_state").with_state(f);
    }

    fn send(&self, action: A) -> TaskHandle {
        self.root("send").send(action)
    }

    fn subscribe(&self, callback: Callback) -> Subscription {
        self.root("subscribe").subscribe(callback)
    }

    fn is_valid(&self) -> bool {
        self.root.strong_count() > 0
    }

    fn effect_count(&self) -> usize {
        self.root.upgrade().map_or(0, |root| root.effect_count())
    }

    fn link(self: Arc<Self>) -> Arc<dyn Core<S, A>> {
        self
    }
}

// ----------------------------------------------------------------------------
// Scopes
// ----------------------------------------------------------------------------

pub(crate) struct ScopedCore<PS, PA, S, A> {
    parent: Arc<dyn Core<PS, PA>>,
    state: Lens<PS, S>,
    action: CasePath<PA, A>,
}

impl<PS, PA, S, A> ScopedCore<PS, PA, S, A> {
    pub(crate) fn new(parent: Arc<dyn Core<PS, PA>>, state: Lens<PS, S>, action: CasePath<PA, A>) -> Self {
        Self { parent, state, action }
    }
}

impl<PS, PA, S, A> Core<S, A> for ScopedCore<PS, PA, S, A>
where
    PS: 'static,
    PA: 'static,
    S: 'static,
    A: 'static,
{
    fn with_state(&self, f: &mut dyn FnMut(&S)) {
        self.parent.with_state(&mut |parent| f(self.state.get(parent)));
    }

    fn send(&self, action: A) -> TaskHandle {
        self.parent.send(self.action.embed(action))
    }

    fn subscribe(&self, callback: Callback) -> Subscription {
        self.parent.subscribe(callback)
    }

    fn is_valid(&self) -> bool {
        self.parent.is_valid()
    }

    fn effect_count(&self) -> usize {
        self.parent.effect_count()
    }

    fn link(self: Arc<Self>) -> Arc<dyn Core<S, A>> {
        self
    }
}

pub(crate) struct OptionalScopedCore<PS, PA, S, A> {
    parent: Arc<dyn Core<PS, PA>>,
    state: Lens<PS, Option<S>>,
    action: CasePath<PA, A>,
    last: RwLock<S>,
}

impl<PS, PA, S, A> OptionalScopedCore<PS, PA, S, A> {
    pub(crate) fn new(
        parent: Arc<dyn Core<PS, PA>>,
        state: Lens<PS, Option<S>>,
        action: CasePath<PA, A>,
        initial: S,
    ) -> Self {
        Self {
            parent,
            state,
            action,
            last: RwLock::new(initial),
        }
    }
}

impl<PS, PA, S, A> Core<S, A> for OptionalScopedCore<PS, PA, S, A>
where
    PS: 'static,
    PA: 'static,
    S: Clone + Send + Sync + 'static,
    A: 'static,
{
    fn with_state(&self, f: &mut dyn FnMut(&S)) {
        let mut delivered = false;
        self.parent.with_state(&mut |parent| {
            if let Some(state) = self.state.get(parent) {
                *self.last.write() = state.clone();
                f(state);
                delivered = true;
            }
        });
        if !delivered {
            let last = self.last.read().clone();
            f(&last);
        }
    }

    fn send(&self, action: A) -> TaskHandle {
        if !self.is_valid() {
            tracing::warn!(
                action = std::any::type_name::<A>(),
                state = std::any::type_name::<S>(),
                "action sent to a scope whose optional state is absent; ignoring"
            );
            return TaskHandle::empty();
        }
        self.parent.send(self.action.embed(action))
    }

    fn subscribe(&self, callback: Callback) -> Subscription {
        self.parent.subscribe(callback)
    }

    fn is_valid(&self) -> bool {
        self.parent.is_valid() && read(self.parent.as_ref(), |parent| self.state.get(parent).is_some())
    }

    fn effect_count(&self) -> usize {
        self.parent.effect_count()
    }

    fn link(self: Arc<Self>) -> Arc<dyn Core<S, A>> {
        self
    }
}

// ----------------------------------------------------------------------------
// Placeholder
// ----------------------------------------------------------------------------

pub(crate) struct InvalidCore<S, A>(PhantomData<fn() -> (S, A)>);

impl<S, A> InvalidCore<S, A> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<S: 'static, A: 'static> Core<S, A> for InvalidCore<S, A> {
    fn with_state(&self, _: &mut dyn FnMut(&S)) {
        panic!("{}", StoreError::InvalidCore { operation: "with_state" });
    }

    fn send(&self, _: A) -> TaskHandle {
        panic!("{}", StoreError::InvalidCore { operation: "send" });
    }

    fn subscribe(&self, _: Callback) -> Subscription {
        panic!("{}", StoreError::InvalidCore { operation: "subscribe" });
    }

    fn is_valid(&self) -> bool {
        false
    }

    fn effect_count(&self) -> usize {
        0
    }

    fn link(self: Arc<Self>) -> Arc<dyn Core<S, A>> {
        panic!("{}", StoreError::InvalidCore { operation: "scope" });
    }
}
