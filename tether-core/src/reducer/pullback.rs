//! Lifting child reducers into a parent domain.

use std::fmt;

use super::Reducer;
use crate::effect::Effect;
use crate::path::{CasePath, Lens};

/// A child reducer running on a field of the parent state, for actions in
/// one case of the parent action.
///
/// Parent actions outside the case are ignored and leave the state
/// untouched. Actions produced by the child's effects are embedded back into
/// the parent action type.
pub struct Pullback<PS, PA, S, A, R> {
    state: Lens<PS, S>,
    action: CasePath<PA, A>,
    child: R,
}

impl<PS, PA, S, A, R> Pullback<PS, PA, S, A, R> {
    pub fn new(state: Lens<PS, S>, action: CasePath<PA, A>, child: R) -> Self {
        Self { state, action, child }
    }
}

impl<PS, PA, S, A, R> Reducer<PS, PA> for Pullback<PS, PA, S, A, R>
where
    PA: 'static,
    A: 'static,
    R: Reducer<S, A>,
{
    fn reduce(&self, state: &mut PS, action: PA) -> Effect<PA> {
        let Some(action) = self.action.extract(action) else {
            return Effect::none();
        };
        self.child
            .reduce(self.state.get_mut(state), action)
            .map_with(self.action.embedder())
    }
}

impl<PS, PA, S, A, R> fmt::Debug for Pullback<PS, PA, S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pullback")
            .field("state", &self.state)
            .field("action", &self.action)
            .finish()
    }
}

/// A child reducer running on optional parent state.
///
/// When the child state is `None` the action is dropped with a warning.
pub struct OptionalPullback<PS, PA, S, A, R> {
    state: Lens<PS, Option<S>>,
    action: CasePath<PA, A>,
    child: R,
}

impl<PS, PA, S, A, R> OptionalPullback<PS, PA, S, A, R> {
    pub fn new(state: Lens<PS, Option<S>>, action: CasePath<PA, A>, child: R) -> Self {
        Self { state, action, child }
    }
}

impl<PS, PA, S, A, R> Reducer<PS, PA> for OptionalPullback<PS, PA, S, A, R>
where
    PA: 'static,
    A: 'static,
    R: Reducer<S, A>,
{
    fn reduce(&self, state: &mut PS, action: PA) -> Effect<PA> {
        let Some(action) = self.action.extract(action) else {
            return Effect::none();
        };
        let Some(child) = self.state.get_mut(state).as_mut() else {
            tracing::warn!(
                action = std::any::type_name::<A>(),
                state = std::any::type_name::<S>(),
                "action received for absent optional state; ignoring"
            );
            return Effect::none();
        };
        self.child
            .reduce(child, action)
            .map_with(self.action.embedder())
    }
}

impl<PS, PA, S, A, R> fmt::Debug for OptionalPullback<PS, PA, S, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionalPullback")
            .field("state", &self.state)
            .field("action", &self.action)
            .finish()
    }
}
