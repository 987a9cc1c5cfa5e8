//! Sequential composition of reducers.

use std::fmt;

use super::Reducer;
use crate::effect::Effect;

/// Runs each reducer in order against one shared mutation of the state.
///
/// Later reducers observe the changes made by earlier ones. The effects they
/// return are merged and run concurrently.
pub struct Combine<S, A> {
    reducers: Vec<Box<dyn Reducer<S, A>>>,
}

impl<S: 'static, A: Clone + 'static> Combine<S, A> {
    pub fn new() -> Self {
        Self { reducers: Vec::new() }
    }

    /// Append a reducer; it runs after the ones already added.
    pub fn with<R>(mut self, reducer: R) -> Self
    where
        R: Reducer<S, A> + 'static,
    {
        self.reducers.push(Box::new(reducer));
        self
    }

    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S: 'static, A: Clone + 'static> Default for Combine<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A: Clone + 'static> Reducer<S, A> for Combine<S, A> {
    fn reduce(&self, state: &mut S, action: A) -> Effect<A> {
        let Some((last, rest)) = self.reducers.split_last() else {
            return Effect::none();
        };

        let mut effects = Vec::with_capacity(self.reducers.len());
        for reducer in rest {
            effects.push(reducer.reduce(state, action.clone()));
        }
        effects.push(last.reduce(state, action));

        Effect::merge(effects)
    }
}

impl<S, A> fmt::Debug for Combine<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combine")
            .field("reducers", &self.reducers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine;
    use crate::effect::Operation;
    use crate::reducer::ReducerExt;

    fn add(state: &mut Vec<&'static str>, action: u8) -> Effect<u8> {
        state.push("add");
        Effect::send(action + 1)
    }

    fn double(state: &mut Vec<&'static str>, action: u8) -> Effect<u8> {
        state.push("double");
        Effect::send(action * 2)
    }

    fn quiet(state: &mut Vec<&'static str>, _action: u8) -> Effect<u8> {
        state.push("quiet");
        Effect::none()
    }

    #[test]
    fn runs_in_declared_order() {
        let reducer = combine![add, quiet, double];
        let mut log = Vec::new();
        let _ = reducer.reduce(&mut log, 3);
        assert_eq!(log, vec!["add", "quiet", "double"]);
    }

    #[test]
    fn merges_effects_of_every_reducer() {
        let reducer = add.combine(double);
        let mut log = Vec::new();
        let effect = reducer.reduce(&mut log, 3);

        match effect.operation {
            Operation::Merge(effects) => {
                let sent: Vec<u8> = effects
                    .into_iter()
                    .filter_map(|e| match e.operation {
                        Operation::Send(a) => Some(a),
                        _ => None,
                    })
                    .collect();
                assert_eq!(sent, vec![4, 6]);
            }
            _ => panic!("expected merged effects"),
        }
    }

    #[test]
    fn later_reducers_see_earlier_mutations() {
        let reducer = combine![
            |n: &mut i32, _: ()| {
                *n += 1;
                Effect::none()
            },
            |n: &mut i32, _: ()| {
                *n *= 10;
                Effect::none()
            },
        ];
        let mut n = 1;
        let _ = reducer.reduce(&mut n, ());
        assert_eq!(n, 20);
    }

    #[test]
    fn empty_combine_is_inert() {
        let reducer: Combine<i32, ()> = Combine::new();
        let mut n = 5;
        assert!(reducer.reduce(&mut n, ()).is_none());
        assert_eq!(n, 5);
    }
}
