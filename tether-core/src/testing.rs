//! Step-by-step store testing.
//!
//! [`TestStore`] wraps a [`Store`] and checks every state transition against
//! an expectation. It remembers the state after the last checked step, so a
//! change that nobody described (an effect delivering an action between two
//! sends, say) makes the next check fail.
//!
//! ```rust
//! use tether_core::effect::Effect;
//! use tether_core::testing::TestStore;
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Counter { count: i32 }
//!
//! let store = TestStore::new(Counter::default(), |state: &mut Counter, step: i32| {
//!     state.count += step;
//!     Effect::none()
//! });
//!
//! let _ = store.send(2, |expected| expected.count = 2).unwrap();
//! assert!(store.send(1, |expected| expected.count = 10).is_err());
//! ```

use std::fmt::{self, Debug};

use parking_lot::Mutex;

use crate::effect::TaskHandle;
use crate::error::AssertionFailure;
use crate::reducer::Reducer;
use crate::store::Store;

/// A store that checks each step against an expected mutation.
pub struct TestStore<S, A> {
    store: Store<S, A>,
    last: Mutex<S>,
}

impl<S, A> TestStore<S, A>
where
    S: Clone + PartialEq + Debug + Send + Sync + 'static,
    A: Debug + Send + 'static,
{
    pub fn new<R>(state: S, reducer: R) -> Self
    where
        R: Reducer<S, A> + 'static,
    {
        Self::from_store(Store::new(state, reducer))
    }

    /// Wrap an existing store, taking its current state as the starting
    /// point.
    pub fn from_store(store: Store<S, A>) -> Self {
        let last = Mutex::new(store.state());
        Self { store, last }
    }

    /// Send `action` and check the resulting state.
    ///
    /// `expected` receives the state from the last checked step and must
    /// turn it into the state after `action`, including any action the
    /// reducer sent back synchronously with `Effect::send`. On a mismatch
    /// the effects of `action` are cancelled.
    pub fn send(&self, action: A, expected: impl FnOnce(&mut S)) -> Result<TaskHandle, AssertionFailure> {
        let label = format!("{action:?}");
        tracing::debug!(action = %label, "test store step");
        let handle = self.store.send(action);
        match self.check(&label, expected) {
            Ok(()) => Ok(handle),
            Err(failure) => {
                handle.cancel();
                Err(failure)
            }
        }
    }

    /// Check changes made since the last step by effects, which run outside
    /// of `send`.
    pub fn assert_state(&self, expected: impl FnOnce(&mut S)) -> Result<(), AssertionFailure> {
        self.check("<effects>", expected)
    }

    fn check(&self, label: &str, expected: impl FnOnce(&mut S)) -> Result<(), AssertionFailure> {
        let mut last = self.last.lock();
        let mut want = last.clone();
        expected(&mut want);
        let actual = self.store.state();
        // Later steps are checked against what actually happened.
        *last = actual.clone();

        if want == actual {
            Ok(())
        } else {
            Err(AssertionFailure::StateMismatch {
                action: label.to_string(),
                expected: format!("{want:#?}"),
                actual: format!("{actual:#?}"),
            })
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.store.with_state(f)
    }

    pub fn state(&self) -> S {
        self.store.state()
    }

    /// The wrapped store, for scoping or observing.
    pub fn store(&self) -> &Store<S, A> {
        &self.store
    }
}

impl<S, A> fmt::Debug for TestStore<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStore").field("store", &self.store).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use std::time::Duration;
    use tokio::task::LocalSet;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Search {
        query: String,
        results: Vec<String>,
    }

    #[derive(Debug, Clone)]
    enum SearchAction {
        Query(String),
        Results(Vec<String>),
        Clear,
    }

    fn search(state: &mut Search, action: SearchAction) -> Effect<SearchAction> {
        match action {
            SearchAction::Query(query) => {
                state.query = query.clone();
                Effect::run(move |send| async move {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    send.send(SearchAction::Results(vec![format!("{query}!")]));
                })
                .cancellable("search", true)
            }
            SearchAction::Results(results) => {
                state.results = results;
                Effect::none()
            }
            SearchAction::Clear => {
                *state = Search::default();
                Effect::cancel("search")
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn effects_are_checked_separately() {
        LocalSet::new()
            .run_until(async {
                let store = TestStore::new(Search::default(), search);

                let handle = store
                    .send(SearchAction::Query("rust".into()), |s| s.query = "rust".into())
                    .unwrap();
                handle.finish().await;

                store
                    .assert_state(|s| s.results = vec!["rust!".into()])
                    .unwrap();
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn mismatch_is_reported() {
        LocalSet::new()
            .run_until(async {
                let store = TestStore::new(Search::default(), search);

                let failure = store
                    .send(SearchAction::Query("a".into()), |s| s.query = "b".into())
                    .unwrap_err();
                match failure {
                    AssertionFailure::StateMismatch { action, .. } => assert!(action.contains("Query")),
                    other => panic!("unexpected failure: {other}"),
                }

                // The next step starts from the real state.
                let _ = store.send(SearchAction::Clear, |s| s.query.clear()).unwrap();
            })
            .await;
    }
}
