//! Observation bridge.
//!
//! Observers hang off the root's did-change notifier. Each notification is
//! delivered after an action's mutation is committed and before the next
//! queued action is reduced. Scoped stores project the state before handing
//! it to the observer.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::Store;
use crate::subscriber::Subscription;

impl<S, A> Store<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    /// Call `observer` with the state after every processed action.
    ///
    /// No de-duplication: an action that leaves the state unchanged is still
    /// reported. The observer stays registered while the subscription lives.
    /// An observer of a scope that became invalid is skipped.
    #[track_caller]
    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.node.isolation.assert_current("observe");
        let core = Arc::downgrade(&self.node.core);
        self.node.core.subscribe(Box::new(move || {
            let Some(core) = core.upgrade() else {
                return;
            };
            if !core.is_valid() {
                return;
            }
            core.with_state(&mut |state| observer(state));
        }))
    }

    /// Like [`observe`](Self::observe), but skips states equal to the one
    /// delivered last. The first notification is always delivered.
    #[track_caller]
    pub fn observe_distinct<F>(&self, observer: F) -> Subscription
    where
        S: Clone + PartialEq,
        F: Fn(&S) + Send + Sync + 'static,
    {
        let last: Mutex<Option<S>> = Mutex::new(None);
        self.observe(move |state| {
            {
                let mut last = last.lock();
                if last.as_ref() == Some(state) {
                    return;
                }
                *last = Some(state.clone());
            }
            observer(state);
        })
    }

    /// A stream of the state after every processed action.
    #[track_caller]
    pub fn changes(&self) -> StateStream<S>
    where
        S: Clone,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = self.observe(move |state: &S| {
            let _ = sender.send(state.clone());
        });
        StateStream {
            receiver,
            _subscription: subscription,
        }
    }

    /// A stream of the state, skipping consecutive equal values.
    #[track_caller]
    pub fn distinct_changes(&self) -> StateStream<S>
    where
        S: Clone + PartialEq,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = self.observe_distinct(move |state: &S| {
            let _ = sender.send(state.clone());
        });
        StateStream {
            receiver,
            _subscription: subscription,
        }
    }
}

/// Stream of store states, produced by [`Store::changes`] and
/// [`Store::distinct_changes`].
///
/// The stream observes the store while it is alive. It ends once the store
/// tree is dropped and every buffered state has been yielded.
pub struct StateStream<S> {
    receiver: mpsc::UnboundedReceiver<S>,
    _subscription: Subscription,
}

impl<S> StateStream<S> {
    /// Wait for the next state.
    pub async fn recv(&mut self) -> Option<S> {
        self.receiver.recv().await
    }

    /// The next buffered state, if any.
    pub fn try_recv(&mut self) -> Option<S> {
        self.receiver.try_recv().ok()
    }
}

impl<S> Stream for StateStream<S> {
    type Item = S;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        self.receiver.poll_recv(cx)
    }
}

impl<S> fmt::Debug for StateStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStream").finish_non_exhaustive()
    }
}
