//! Reducers
//!
//! A reducer is the single place where state changes in response to an
//! action. It runs synchronously, mutates the state it is given and returns
//! an [`Effect`] describing any follow-up work.
//!
//! Reducers never fail. Anything that can go wrong in the domain is modeled
//! as state or as another action.
//!
//! # Composition
//!
//! Larger reducers are built from smaller ones:
//!
//! - [`Combine`] runs several reducers on the same state and action, in
//!   declared order, and merges their effects.
//! - [`Pullback`] lifts a reducer over a child state and child action into
//!   one over the parent, via a [`Lens`] and a [`CasePath`].
//! - [`OptionalPullback`] does the same for a child state held in an
//!   `Option`.
//!
//! # Unhandled actions
//!
//! By convention a reducer returns [`Effect::none`] for actions it does not
//! handle. Pullbacks ignore actions outside their case silently; an optional
//! pullback ignores actions for absent state and logs a warning, because that
//! usually means an effect outlived the feature that started it.

mod combine;
mod pullback;

pub use combine::Combine;
pub use pullback::{OptionalPullback, Pullback};

use crate::effect::Effect;
use crate::path::{CasePath, Lens};

/// A state transition function.
///
/// Any `Fn(&mut S, A) -> Effect<A>` closure is a reducer.
pub trait Reducer<S, A>: Send + Sync {
    fn reduce(&self, state: &mut S, action: A) -> Effect<A>;
}

impl<S, A, F> Reducer<S, A> for F
where
    F: Fn(&mut S, A) -> Effect<A> + Send + Sync,
{
    fn reduce(&self, state: &mut S, action: A) -> Effect<A> {
        self(state, action)
    }
}

/// Combinators available on every reducer.
pub trait ReducerExt<S, A>: Reducer<S, A> + Sized + 'static {
    /// Lift this reducer into a parent domain.
    fn pullback<PS, PA>(self, state: Lens<PS, S>, action: CasePath<PA, A>) -> Pullback<PS, PA, S, A, Self> {
        Pullback::new(state, action, self)
    }

    /// Lift this reducer into a parent domain where the child state is
    /// optional.
    fn optional<PS, PA>(
        self,
        state: Lens<PS, Option<S>>,
        action: CasePath<PA, A>,
    ) -> OptionalPullback<PS, PA, S, A, Self> {
        OptionalPullback::new(state, action, self)
    }

    /// Run `other` after this reducer on the same state and action.
    fn combine<R>(self, other: R) -> Combine<S, A>
    where
        S: 'static,
        A: Clone + 'static,
        R: Reducer<S, A> + 'static,
    {
        Combine::new().with(self).with(other)
    }
}

impl<S, A, R> ReducerExt<S, A> for R where R: Reducer<S, A> + 'static {}

/// Combine reducers, run in the order given.
///
/// ```rust
/// use tether_core::combine;
/// use tether_core::effect::Effect;
///
/// let reducer = combine![
///     |count: &mut i32, step: i32| { *count += step; Effect::none() },
///     |count: &mut i32, _step: i32| { *count *= 10; Effect::none() },
/// ];
/// # let _ = reducer;
/// ```
#[macro_export]
macro_rules! combine {
    ($($reducer:expr),+ $(,)?) => {
        $crate::reducer::Combine::new()$(.with($reducer))+
    };
}
