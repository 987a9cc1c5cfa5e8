//! Stores
//!
//! A [`Store`] owns application state, runs the reducer for every action sent
//! to it, starts and tracks the effects the reducer returns, and notifies
//! observers after each committed mutation.
//!
//! # Scoping
//!
//! [`Store::scope`] derives a child store that sees a part of the parent
//! state through a [`Lens`] and speaks a part of the parent action through a
//! [`CasePath`]. The child holds no state of its own: reads go through the
//! lens into the root, actions are embedded and run through the root reducer.
//!
//! Children are memoized by [`ScopeId`]. Scoping a live parent twice with the
//! same paths yields the same child, so observers attached to it are shared:
//!
//! ```rust
//! use tether_core::effect::Effect;
//! use tether_core::store::Store;
//! use tether_core::{case, lens};
//!
//! #[derive(Default)]
//! struct App { counter: Counter }
//! #[derive(Default)]
//! struct Counter { count: i32 }
//! enum AppAction { Counter(CounterAction) }
//! enum CounterAction { Increment }
//!
//! let store = Store::new(App::default(), |app: &mut App, action: AppAction| {
//!     match action {
//!         AppAction::Counter(CounterAction::Increment) => app.counter.count += 1,
//!     }
//!     Effect::none()
//! });
//!
//! let first = store.scope(lens!(App => counter), case!(AppAction::Counter));
//! let second = store.scope(lens!(App => counter), case!(AppAction::Counter));
//! assert!(first.ptr_eq(&second));
//!
//! let _ = second.send(CounterAction::Increment);
//! assert_eq!(first.with_state(|counter| counter.count), 1);
//! ```
//!
//! # Threading
//!
//! A store tree is bound to the thread that created its root. Every
//! operation on the root, on any scope and on its effects' senders panics
//! when called from another thread. Asynchronous effects are spawned with
//! `tokio::task::spawn_local`, so a store whose reducer returns them must be
//! driven inside a [`tokio::task::LocalSet`].

mod config;
mod cores;
mod observe;
mod registry;
mod scope;

pub use config::StoreConfig;
pub use observe::StateStream;
pub use registry::EffectId;
pub use scope::ScopeId;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use self::cores::{read, Core, InvalidCore, OptionalScopedCore, RootCore, ScopedCore};
use crate::effect::TaskHandle;
use crate::isolation::Isolation;
use crate::path::{CasePath, Lens};
use crate::reducer::Reducer;

type ChildCache = HashMap<ScopeId, Weak<dyn Any + Send + Sync>>;

struct StoreNode<S, A> {
    core: Arc<dyn Core<S, A>>,
    children: Mutex<ChildCache>,
    isolation: Isolation,
}

impl<S: 'static, A: 'static> StoreNode<S, A> {
    fn new(core: Arc<dyn Core<S, A>>, isolation: Isolation) -> Arc<Self> {
        Arc::new(Self {
            core,
            children: Mutex::new(HashMap::new()),
            isolation,
        })
    }
}

/// Handle to a root or scoped store.
///
/// Cloning is cheap and yields a handle to the same store.
pub struct Store<S, A> {
    node: Arc<StoreNode<S, A>>,
}

impl<S, A> Store<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    /// Create a root store bound to the calling thread.
    pub fn new<R>(state: S, reducer: R) -> Self
    where
        R: Reducer<S, A> + 'static,
    {
        Self::with_config(state, reducer, StoreConfig::default())
    }

    pub fn with_config<R>(state: S, reducer: R, config: StoreConfig) -> Self
    where
        R: Reducer<S, A> + 'static,
    {
        let isolation = Isolation::current();
        tracing::debug!(store = %config.label, state = std::any::type_name::<S>(), "store created");
        let core: Arc<dyn Core<S, A>> = RootCore::new(state, Box::new(reducer), config, isolation);
        Self {
            node: StoreNode::new(core, isolation),
        }
    }

    /// A store that is not wired to any state yet. Every operation on it
    /// except [`is_valid`](Self::is_valid) panics.
    pub fn placeholder() -> Self {
        let core: Arc<dyn Core<S, A>> = Arc::new(InvalidCore::new());
        Self {
            node: StoreNode::new(core, Isolation::current()),
        }
    }

    /// Process `action` synchronously and start its effects.
    ///
    /// When called while the store is already processing an action (from an
    /// observer, for instance), the action is queued behind the current one
    /// and the returned handle is empty; its effects join the handle of the
    /// outer `send`.
    #[track_caller]
    pub fn send(&self, action: A) -> TaskHandle {
        self.node.isolation.assert_current("send");
        self.node.core.send(action)
    }

    /// Read the current state.
    #[track_caller]
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.node.isolation.assert_current("with_state");
        read(self.node.core.as_ref(), f)
    }

    /// A copy of the current state.
    #[track_caller]
    pub fn state(&self) -> S
    where
        S: Clone,
    {
        self.with_state(S::clone)
    }

    /// Derive a child store over part of this store's state and actions.
    ///
    /// Repeated calls with equal path ids return the same child while it is
    /// alive.
    #[track_caller]
    pub fn scope<C, CA>(&self, state: Lens<S, C>, action: CasePath<A, CA>) -> Store<C, CA>
    where
        C: Send + Sync + 'static,
        CA: Send + 'static,
    {
        self.node.isolation.assert_current("scope");
        let id = ScopeId::new(state.id(), action.id());

        let mut children = self.node.children.lock();
        children.retain(|_, child| child.strong_count() > 0);
        if let Some(node) = cached::<C, CA>(&children, &id) {
            if node.core.is_valid() {
                return Store { node };
            }
        }

        let parent = Arc::clone(&self.node.core).link();
        let core: Arc<dyn Core<C, CA>> = Arc::new(ScopedCore::new(parent, state, action));
        let node = StoreNode::new(core, self.node.isolation);
        cache(&mut children, id, &node);
        Store { node }
    }

    /// Derive a child store over optional state.
    ///
    /// Returns `None` while the state is absent. A cached child whose state
    /// went away is evicted, so the next call after the state reappears
    /// builds a fresh child.
    #[track_caller]
    pub fn scope_optional<C, CA>(&self, state: Lens<S, Option<C>>, action: CasePath<A, CA>) -> Option<Store<C, CA>>
    where
        C: Clone + Send + Sync + 'static,
        CA: Send + 'static,
    {
        let initial = self.with_state(|parent| state.get(parent).clone());
        let id = ScopeId::new(state.id(), action.id());

        let mut children = self.node.children.lock();
        children.retain(|_, child| child.strong_count() > 0);
        let Some(initial) = initial else {
            children.remove(&id);
            return None;
        };
        if let Some(node) = cached::<C, CA>(&children, &id) {
            if node.core.is_valid() {
                return Some(Store { node });
            }
            children.remove(&id);
        }

        let parent = Arc::clone(&self.node.core).link();
        let core: Arc<dyn Core<C, CA>> = Arc::new(OptionalScopedCore::new(parent, state, action, initial));
        let node = StoreNode::new(core, self.node.isolation);
        cache(&mut children, id, &node);
        Some(Store { node })
    }

    /// Whether the store is backed by live state.
    ///
    /// `false` for placeholders, for scopes whose root was dropped and for
    /// optional scopes whose state is currently absent.
    pub fn is_valid(&self) -> bool {
        self.node.core.is_valid()
    }

    /// Number of effects currently running on the root of this store tree.
    pub fn effect_count(&self) -> usize {
        self.node.core.effect_count()
    }

    /// Whether both handles point at the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// The thread this store tree is bound to.
    pub fn isolation(&self) -> Isolation {
        self.node.isolation
    }
}

fn cached<C: 'static, CA: 'static>(children: &ChildCache, id: &ScopeId) -> Option<Arc<StoreNode<C, CA>>> {
    children
        .get(id)
        .and_then(Weak::upgrade)
        .and_then(|child| child.downcast::<StoreNode<C, CA>>().ok())
}

fn cache<C, CA>(children: &mut ChildCache, id: ScopeId, node: &Arc<StoreNode<C, CA>>)
where
    C: Send + Sync + 'static,
    CA: Send + 'static,
{
    let erased: Arc<dyn Any + Send + Sync> = Arc::clone(node) as Arc<dyn Any + Send + Sync>;
    children.insert(id, Arc::downgrade(&erased));
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<S, A> fmt::Debug for Store<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &std::any::type_name::<S>())
            .field("valid", &self.node.core.is_valid())
            .field("children", &self.node.children.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use crate::error::StoreError;
    use crate::shared::Shared;
    use crate::{case, lens};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::task::LocalSet;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        count: i32,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct App {
        counter: Counter,
        detail: Option<Counter>,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum CounterAction {
        Increment,
        Delayed,
        Loaded(i32),
    }

    #[derive(Debug, Clone, PartialEq)]
    enum AppAction {
        Counter(CounterAction),
        Detail(CounterAction),
        ShowDetail,
        HideDetail,
    }

    fn counter(state: &mut Counter, action: CounterAction) -> Effect<CounterAction> {
        match action {
            CounterAction::Increment => {
                state.count += 1;
                Effect::none()
            }
            CounterAction::Delayed => Effect::run(|send| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                send.send(CounterAction::Loaded(42));
            }),
            CounterAction::Loaded(value) => {
                state.count = value;
                Effect::none()
            }
        }
    }

    fn app(state: &mut App, action: AppAction) -> Effect<AppAction> {
        match action {
            AppAction::Counter(action) => counter(&mut state.counter, action).map(AppAction::Counter),
            AppAction::Detail(action) => match state.detail.as_mut() {
                Some(detail) => counter(detail, action).map(AppAction::Detail),
                None => Effect::none(),
            },
            AppAction::ShowDetail => {
                state.detail = Some(Counter::default());
                Effect::none()
            }
            AppAction::HideDetail => {
                state.detail = None;
                Effect::none()
            }
        }
    }

    #[test]
    fn send_mutates_synchronously() {
        let store = Store::new(Counter::default(), counter);
        let handle = store.send(CounterAction::Increment);
        assert!(handle.is_empty());
        assert_eq!(store.state(), Counter { count: 1 });
    }

    #[test]
    fn scope_is_memoized() {
        let store = Store::new(App::default(), app);
        let first = store.scope(lens!(App => counter), case!(AppAction::Counter));
        let second = store.scope(lens!(App => counter), case!(AppAction::Counter));
        assert!(first.ptr_eq(&second));

        let _ = second.send(CounterAction::Increment);
        assert_eq!(store.with_state(|app| app.counter.count), 1);
        assert_eq!(first.with_state(|counter| counter.count), 1);
    }

    #[test]
    fn dropped_children_are_rebuilt() {
        let store = Store::new(App::default(), app);
        let lens = lens!(App => counter);
        let case = case!(AppAction::Counter);

        let first = store.scope(lens.clone(), case.clone());
        let witness = Arc::downgrade(&first.node);
        drop(first);
        assert!(witness.upgrade().is_none());

        let second = store.scope(lens, case);
        assert!(second.is_valid());
    }

    #[test]
    fn optional_scope_follows_presence() {
        let store = Store::new(App::default(), app);
        let lens = lens!(App => detail);
        let case = case!(AppAction::Detail);

        assert!(store.scope_optional(lens.clone(), case.clone()).is_none());

        let _ = store.send(AppAction::ShowDetail);
        let detail = store
            .scope_optional(lens.clone(), case.clone())
            .expect("detail is present");
        let _ = detail.send(CounterAction::Increment);
        assert_eq!(detail.state(), Counter { count: 1 });

        let _ = store.send(AppAction::HideDetail);
        assert!(!detail.is_valid());
        // Last seen value stays readable; sends are dropped.
        assert_eq!(detail.state(), Counter { count: 1 });
        let _ = detail.send(CounterAction::Increment);
        assert!(store.scope_optional(lens.clone(), case.clone()).is_none());

        let _ = store.send(AppAction::ShowDetail);
        let fresh = store.scope_optional(lens, case).expect("detail is present again");
        assert!(!fresh.ptr_eq(&detail));
        assert_eq!(fresh.state(), Counter { count: 0 });
    }

    #[test]
    fn placeholder_panics_with_invalid_core() {
        let store: Store<Counter, CounterAction> = Store::placeholder();
        assert!(!store.is_valid());

        let panic = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| store.state()))
            .expect_err("placeholder must panic");
        let message = panic.downcast_ref::<String>().cloned().unwrap_or_default();
        assert_eq!(message, StoreError::InvalidCore { operation: "with_state" }.to_string());
    }

    #[test]
    fn child_outliving_root_reports_deallocation() {
        let store = Store::new(App::default(), app);
        let child = store.scope(lens!(App => counter), case!(AppAction::Counter));
        drop(store);

        assert!(!child.is_valid());
        let panic = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| child.state()))
            .expect_err("child of a dropped root must panic");
        let message = panic.downcast_ref::<String>().cloned().unwrap_or_default();
        assert!(message.contains("root store was dropped"));
    }

    #[test]
    fn wrong_thread_panics() {
        let store = Store::new(Counter::default(), counter);
        let remote = store.clone();
        let result = std::thread::spawn(move || {
            let _ = remote.send(CounterAction::Increment);
        })
        .join();

        assert!(result.is_err());
        assert_eq!(store.state(), Counter { count: 0 });
    }

    #[test]
    fn observers_see_every_committed_action() {
        let store = Store::new(Counter::default(), counter);
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let _subscription = store.observe(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..3 {
            let _ = store.send(CounterAction::Increment);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    #[should_panic(expected = "`send` re-entered a store")]
    fn sending_from_inside_with_state_panics() {
        let store = Store::new(Counter::default(), counter);
        let inner = store.clone();
        store.with_state(|_| {
            let _ = inner.send(CounterAction::Increment);
        });
    }

    #[test]
    fn reading_from_inside_a_reduce_panics() {
        let mirror = Shared::new(0);
        let writer = mirror.clone();
        let store = Store::new(Counter::default(), move |state: &mut Counter, _: CounterAction| {
            state.count += 1;
            writer.set(state.count);
            Effect::none()
        });

        let reader = store.clone();
        let subscription = mirror.subscribe(move |_| {
            let _ = reader.state();
        });

        let panic = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.send(CounterAction::Increment);
        }))
        .expect_err("reading during a reduce must panic");
        let message = panic.downcast_ref::<String>().cloned().unwrap_or_default();
        assert_eq!(message, StoreError::ReentrantStoreAccess { operation: "with_state" }.to_string());

        // The lock is released on unwind and the store keeps working.
        drop(subscription);
        let _ = store.send(CounterAction::Increment);
        assert_eq!(store.state(), Counter { count: 2 });
        assert_eq!(mirror.get(), 2);
    }

    #[test]
    fn actions_queued_behind_a_panicking_reducer_are_discarded() {
        let store = Store::new(Vec::<&'static str>::new(), |log: &mut Vec<&'static str>, entry: &'static str| {
            match entry {
                "start" => {
                    log.push(entry);
                    Effect::merge([Effect::send("boom"), Effect::send("late")])
                }
                "boom" => panic!("reducer failed"),
                _ => {
                    log.push(entry);
                    Effect::none()
                }
            }
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.send("start");
        }));
        assert!(result.is_err());

        let _ = store.send("after");
        assert_eq!(store.state(), vec!["start", "after"]);
    }

    #[tokio::test(start_paused = true)]
    async fn effects_feed_actions_back() {
        LocalSet::new()
            .run_until(async {
                let store = Store::new(App::default(), app);
                let handle = store.send(AppAction::Counter(CounterAction::Delayed));
                assert_eq!(store.effect_count(), 1);

                handle.finish().await;
                assert_eq!(store.with_state(|app| app.counter.count), 42);
                assert_eq!(store.effect_count(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_root_cancels_effects() {
        LocalSet::new()
            .run_until(async {
                let store = Store::new(Counter::default(), counter);
                let handle = store.send(CounterAction::Delayed);
                drop(store);

                handle.finish().await;
            })
            .await;
    }
}
