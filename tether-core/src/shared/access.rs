//! Accessor chains.
//!
//! A handle is an [`Access`] chain ending in a
//! [`ReferenceCore`](super::reference::ReferenceCore). Each link narrows the
//! value: [`Projected`] through a lens, [`Defaulted`] from `Option<V>` to
//! `V`. Reads and writes travel down the chain to the single owning value,
//! so no link ever holds a copy of the state.

use std::sync::Arc;

use super::reference::Reference;
use crate::path::Lens;

pub(crate) trait Access<V>: Send + Sync {
    fn read(&self, f: &mut dyn FnMut(&V));

    fn write(&self, f: &mut dyn FnMut(&mut V));

    /// The reference at the end of the chain.
    fn reference(&self) -> &dyn Reference;
}

/// Read through `access`.
pub(crate) fn read_with<V, R>(access: &dyn Access<V>, f: impl FnOnce(&V) -> R) -> R {
    let mut f = Some(f);
    let mut output = None;
    access.read(&mut |value| {
        if let Some(f) = f.take() {
            output = Some(f(value));
        }
    });
    output.expect("shared accessor did not provide its value")
}

/// Write through `access`.
pub(crate) fn write_with<V, R>(access: &dyn Access<V>, f: impl FnOnce(&mut V) -> R) -> R {
    let mut f = Some(f);
    let mut output = None;
    access.write(&mut |value| {
        if let Some(f) = f.take() {
            output = Some(f(value));
        }
    });
    output.expect("shared accessor did not provide its value")
}

pub(crate) struct Projected<P, V> {
    parent: Arc<dyn Access<P>>,
    lens: Lens<P, V>,
}

impl<P, V> Projected<P, V> {
    pub(crate) fn new(parent: Arc<dyn Access<P>>, lens: Lens<P, V>) -> Self {
        Self { parent, lens }
    }
}

impl<P: 'static, V: 'static> Access<V> for Projected<P, V> {
    fn read(&self, f: &mut dyn FnMut(&V)) {
        self.parent.read(&mut |parent| f(self.lens.get(parent)));
    }

    fn write(&self, f: &mut dyn FnMut(&mut V)) {
        self.parent.write(&mut |parent| f(self.lens.get_mut(parent)));
    }

    fn reference(&self) -> &dyn Reference {
        self.parent.reference()
    }
}

/// Unwraps an optional value, falling back to the value seen when the
/// handle was created.
pub(crate) struct Defaulted<V> {
    parent: Arc<dyn Access<Option<V>>>,
    default: V,
}

impl<V> Defaulted<V> {
    pub(crate) fn new(parent: Arc<dyn Access<Option<V>>>, default: V) -> Self {
        Self { parent, default }
    }
}

impl<V> Access<V> for Defaulted<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn read(&self, f: &mut dyn FnMut(&V)) {
        self.parent.read(&mut |value| match value {
            Some(value) => f(value),
            None => f(&self.default),
        });
    }

    fn write(&self, f: &mut dyn FnMut(&mut V)) {
        self.parent
            .write(&mut |value| f(value.get_or_insert_with(|| self.default.clone())));
    }

    fn reference(&self) -> &dyn Reference {
        self.parent.reference()
    }
}
