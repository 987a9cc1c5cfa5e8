//! Delivery of effect output back into a store.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Deliver<A> = dyn Fn(A) + Send + Sync;

/// Sends actions produced by a running effect back into its store.
///
/// Once the effect is cancelled, or its store is dropped, further actions
/// are discarded.
pub struct ActionSender<A> {
    deliver: Arc<Deliver<A>>,
    cancelled: Arc<AtomicBool>,
}

impl<A: 'static> ActionSender<A> {
    pub(crate) fn new(deliver: Arc<Deliver<A>>, cancelled: Arc<AtomicBool>) -> Self {
        Self { deliver, cancelled }
    }

    /// Feed `action` back into the store.
    ///
    /// Must be called on the store's thread, which is where effects run.
    pub fn send(&self, action: A) {
        if self.is_cancelled() {
            tracing::trace!(
                action = std::any::type_name::<A>(),
                "discarding action from cancelled effect"
            );
            return;
        }
        (self.deliver)(action);
    }

    /// Whether the effect owning this sender has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// A sender for child actions that embeds them with `embed` first.
    pub(crate) fn contramap<C: 'static>(
        self,
        embed: Arc<dyn Fn(C) -> A + Send + Sync>,
    ) -> ActionSender<C> {
        let deliver = self.deliver;
        ActionSender {
            deliver: Arc::new(move |action: C| deliver(embed(action))),
            cancelled: self.cancelled,
        }
    }
}

impl<A> Clone for ActionSender<A> {
    fn clone(&self) -> Self {
        Self {
            deliver: Arc::clone(&self.deliver),
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

impl<A> fmt::Debug for ActionSender<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSender")
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .finish()
    }
}
