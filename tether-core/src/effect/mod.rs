//! Effects
//!
//! An [`Effect`] describes work a reducer wants done after it returns. The
//! reducer itself stays synchronous: it mutates state and hands back a value
//! describing follow-up work, which the store then starts, tracks and, when
//! asked, cancels.
//!
//! # Variants
//!
//! - [`Effect::none`]: nothing to do.
//! - [`Effect::send`]: feed an action back in right after the current one.
//! - [`Effect::fire_and_forget`]: run a future and ignore its result.
//! - [`Effect::run`]: run a future that may send any number of actions back
//!   through an [`ActionSender`].
//! - [`Effect::cancellable`]: tag an effect with a [`CancelId`].
//! - [`Effect::cancel`]: cancel everything in flight under an id.
//! - [`Effect::merge`]: run effects concurrently.
//! - [`Effect::concatenate`]: run effects one after another.
//!
//! # Execution
//!
//! Asynchronous effects run as tokio local tasks on the store's thread, so a
//! store that starts them must be driven inside a [`tokio::task::LocalSet`].
//! An effect may hand blocking or parallel work to other threads and await
//! it; actions it sends are always delivered on the store's thread.

mod sender;
mod task;

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use uuid::Uuid;

pub use sender::ActionSender;
pub use task::TaskHandle;

pub(crate) type Work<A> = Box<dyn FnOnce(ActionSender<A>) -> LocalBoxFuture<'static, ()>>;

/// Identifier under which effects can be cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CancelId(CancelKey);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CancelKey {
    Name(Cow<'static, str>),
    Number(u64),
    Uuid(Uuid),
}

impl From<&'static str> for CancelId {
    fn from(name: &'static str) -> Self {
        Self(CancelKey::Name(Cow::Borrowed(name)))
    }
}

impl From<String> for CancelId {
    fn from(name: String) -> Self {
        Self(CancelKey::Name(Cow::Owned(name)))
    }
}

impl From<u64> for CancelId {
    fn from(number: u64) -> Self {
        Self(CancelKey::Number(number))
    }
}

impl From<Uuid> for CancelId {
    fn from(uuid: Uuid) -> Self {
        Self(CancelKey::Uuid(uuid))
    }
}

impl fmt::Display for CancelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            CancelKey::Name(name) => write!(f, "{name}"),
            CancelKey::Number(number) => write!(f, "#{number}"),
            CancelKey::Uuid(uuid) => write!(f, "{uuid}"),
        }
    }
}

pub(crate) enum Operation<A> {
    None,
    Send(A),
    Run(Work<A>),
    Cancellable {
        id: CancelId,
        cancel_in_flight: bool,
        effect: Box<Effect<A>>,
    },
    Cancel(CancelId),
    Merge(Vec<Effect<A>>),
    Concatenate(Vec<Effect<A>>),
}

/// Work returned by a reducer.
#[must_use = "an effect does nothing unless returned to the store"]
pub struct Effect<A> {
    pub(crate) operation: Operation<A>,
}

impl<A: 'static> Effect<A> {
    /// No work.
    pub fn none() -> Self {
        Self {
            operation: Operation::None,
        }
    }

    /// Send `action` back into the store as soon as the current action has
    /// been processed, in queue order.
    pub fn send(action: A) -> Self {
        Self {
            operation: Operation::Send(action),
        }
    }

    /// Run `future` and ignore its output.
    pub fn fire_and_forget<F>(future: F) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        Self::run(move |_| future)
    }

    /// Run asynchronous work that feeds actions back through `send`.
    ///
    /// ```rust
    /// use tether_core::effect::Effect;
    ///
    /// enum Action { Loaded(u32) }
    ///
    /// let effect: Effect<Action> = Effect::run(|send| async move {
    ///     send.send(Action::Loaded(42));
    /// });
    /// ```
    pub fn run<F, Fut>(work: F) -> Self
    where
        F: FnOnce(ActionSender<A>) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        Self {
            operation: Operation::Run(Box::new(move |send| work(send).boxed_local())),
        }
    }

    /// Cancel every effect in flight under `id`.
    pub fn cancel(id: impl Into<CancelId>) -> Self {
        Self {
            operation: Operation::Cancel(id.into()),
        }
    }

    /// Run every effect concurrently.
    pub fn merge(effects: impl IntoIterator<Item = Effect<A>>) -> Self {
        let mut effects: Vec<_> = effects.into_iter().filter(|e| !e.is_none()).collect();
        match effects.len() {
            0 => Self::none(),
            1 => effects.remove(0),
            _ => Self {
                operation: Operation::Merge(effects),
            },
        }
    }

    /// Run each effect after the previous one finished.
    pub fn concatenate(effects: impl IntoIterator<Item = Effect<A>>) -> Self {
        let mut effects: Vec<_> = effects.into_iter().filter(|e| !e.is_none()).collect();
        match effects.len() {
            0 => Self::none(),
            1 => effects.remove(0),
            _ => Self {
                operation: Operation::Concatenate(effects),
            },
        }
    }

    /// Tag this effect so that [`Effect::cancel`] with the same id stops it.
    ///
    /// With `cancel_in_flight`, effects already running under `id` are
    /// cancelled before this one starts.
    pub fn cancellable(self, id: impl Into<CancelId>, cancel_in_flight: bool) -> Self {
        if self.is_none() && !cancel_in_flight {
            return self;
        }
        Self {
            operation: Operation::Cancellable {
                id: id.into(),
                cancel_in_flight,
                effect: Box::new(self),
            },
        }
    }

    /// Run this effect and `other` concurrently.
    pub fn merge_with(self, other: Effect<A>) -> Self {
        Self::merge([self, other])
    }

    /// Run `other` after this effect finished.
    pub fn concatenate_with(self, other: Effect<A>) -> Self {
        Self::concatenate([self, other])
    }

    /// Transform the actions this effect produces.
    pub fn map<B: 'static>(self, f: impl Fn(A) -> B + Send + Sync + 'static) -> Effect<B> {
        self.map_with(Arc::new(f))
    }

    pub(crate) fn map_with<B: 'static>(self, f: Arc<dyn Fn(A) -> B + Send + Sync>) -> Effect<B> {
        let operation = match self.operation {
            Operation::None => Operation::None,
            Operation::Send(action) => Operation::Send(f(action)),
            Operation::Run(work) => {
                Operation::Run(Box::new(move |send: ActionSender<B>| work(send.contramap(f))))
            }
            Operation::Cancellable {
                id,
                cancel_in_flight,
                effect,
            } => Operation::Cancellable {
                id,
                cancel_in_flight,
                effect: Box::new(effect.map_with(f)),
            },
            Operation::Cancel(id) => Operation::Cancel(id),
            Operation::Merge(effects) => Operation::Merge(
                effects
                    .into_iter()
                    .map(|e| e.map_with(Arc::clone(&f)))
                    .collect(),
            ),
            Operation::Concatenate(effects) => Operation::Concatenate(
                effects
                    .into_iter()
                    .map(|e| e.map_with(Arc::clone(&f)))
                    .collect(),
            ),
        };
        Effect { operation }
    }
}

impl<A> Effect<A> {
    pub fn is_none(&self) -> bool {
        matches!(self.operation, Operation::None)
    }
}

impl<A: 'static> Default for Effect<A> {
    fn default() -> Self {
        Self::none()
    }
}

impl<A> fmt::Debug for Effect<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Operation::None => f.write_str("Effect::None"),
            Operation::Send(_) => f.write_str("Effect::Send"),
            Operation::Run(_) => f.write_str("Effect::Run"),
            Operation::Cancellable {
                id,
                cancel_in_flight,
                effect,
            } => f
                .debug_struct("Effect::Cancellable")
                .field("id", id)
                .field("cancel_in_flight", cancel_in_flight)
                .field("effect", effect)
                .finish(),
            Operation::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            Operation::Merge(effects) => f.debug_tuple("Effect::Merge").field(effects).finish(),
            Operation::Concatenate(effects) => {
                f.debug_tuple("Effect::Concatenate").field(effects).finish()
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
