//! Lens Implementation
//!
//! A lens is a pair of accessors that focus a `Root` value on a `Value`
//! stored inside it: one for shared borrows and one for mutable borrows.
//! Lenses compose with [`Lens::then`], so a handle several levels deep is
//! still a single accessor chain over the one owning value.

use std::fmt;
use std::sync::Arc;

use super::PathId;

type Getter<Root, Value> = dyn Fn(&Root) -> &Value + Send + Sync;
type GetterMut<Root, Value> = dyn Fn(&mut Root) -> &mut Value + Send + Sync;

fn getter<Root, Value, F>(get: F) -> Arc<Getter<Root, Value>>
where
    F: Fn(&Root) -> &Value + Send + Sync + 'static,
{
    Arc::new(get)
}

fn getter_mut<Root, Value, F>(get_mut: F) -> Arc<GetterMut<Root, Value>>
where
    F: Fn(&mut Root) -> &mut Value + Send + Sync + 'static,
{
    Arc::new(get_mut)
}

/// A path from a `Root` value to a `Value` inside it.
///
/// # Example
///
/// ```rust
/// use tether_core::path::Lens;
///
/// struct Counter { count: i32 }
///
/// let count = Lens::new(|c: &Counter| &c.count, |c: &mut Counter| &mut c.count);
/// let mut counter = Counter { count: 1 };
/// *count.get_mut(&mut counter) += 1;
/// assert_eq!(*count.get(&counter), 2);
/// ```
pub struct Lens<Root, Value> {
    id: PathId,
    get: Arc<Getter<Root, Value>>,
    get_mut: Arc<GetterMut<Root, Value>>,
}

impl<Root: 'static, Value: 'static> Lens<Root, Value> {
    /// Create an anonymous lens.
    ///
    /// Its id is unique to this value and its clones, so stores only reuse a
    /// child scope built from the same lens instance.
    pub fn new<G, M>(get: G, get_mut: M) -> Self
    where
        G: Fn(&Root) -> &Value + Send + Sync + 'static,
        M: Fn(&mut Root) -> &mut Value + Send + Sync + 'static,
    {
        Self::with_id(PathId::unique(), get, get_mut)
    }

    /// Create a named lens. Lenses with the same name and types share an id.
    pub fn named<G, M>(name: &str, get: G, get_mut: M) -> Self
    where
        G: Fn(&Root) -> &Value + Send + Sync + 'static,
        M: Fn(&mut Root) -> &mut Value + Send + Sync + 'static,
    {
        Self::with_id(PathId::named::<Root, Value>(name), get, get_mut)
    }

    fn with_id<G, M>(id: PathId, get: G, get_mut: M) -> Self
    where
        G: Fn(&Root) -> &Value + Send + Sync + 'static,
        M: Fn(&mut Root) -> &mut Value + Send + Sync + 'static,
    {
        Self {
            id,
            get: getter(get),
            get_mut: getter_mut(get_mut),
        }
    }

    /// Focus further, from `Value` to `Sub`.
    pub fn then<Sub: 'static>(&self, next: &Lens<Value, Sub>) -> Lens<Root, Sub> {
        let (outer, inner) = (Arc::clone(&self.get), Arc::clone(&next.get));
        let (outer_mut, inner_mut) = (Arc::clone(&self.get_mut), Arc::clone(&next.get_mut));

        Lens {
            id: self.id.join(&next.id),
            get: getter(move |root| inner(outer(root))),
            get_mut: getter_mut(move |root| inner_mut(outer_mut(root))),
        }
    }
}

impl<Root: 'static> Lens<Root, Root> {
    /// The lens that focuses on the whole value.
    pub fn identity() -> Self {
        Self::named("self", |root: &Root| root, |root: &mut Root| root)
    }
}

impl<Root, Value> Lens<Root, Value> {
    pub fn id(&self) -> &PathId {
        &self.id
    }

    pub fn get<'a>(&self, root: &'a Root) -> &'a Value {
        (self.get)(root)
    }

    pub fn get_mut<'a>(&self, root: &'a mut Root) -> &'a mut Value {
        (self.get_mut)(root)
    }
}

impl<Root, Value> Clone for Lens<Root, Value> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            get: Arc::clone(&self.get),
            get_mut: Arc::clone(&self.get_mut),
        }
    }
}

impl<Root, Value> fmt::Debug for Lens<Root, Value> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens;

    #[derive(Default)]
    struct Profile {
        name: String,
        age: u32,
    }

    #[derive(Default)]
    struct App {
        profile: Profile,
    }

    #[test]
    fn lens_reads_and_writes() {
        let age = lens!(Profile => age);
        let mut profile = Profile::default();

        *age.get_mut(&mut profile) = 41;
        assert_eq!(*age.get(&profile), 41);
    }

    #[test]
    fn composed_lens_reaches_nested_field() {
        let profile = lens!(App => profile);
        let name = lens!(Profile => name);
        let app_name = profile.then(&name);

        let mut app = App::default();
        app_name.get_mut(&mut app).push_str("Ada");
        assert_eq!(app.profile.name, "Ada");
        assert_eq!(app_name.id().depth(), 2);
    }

    #[test]
    fn named_lenses_share_identity() {
        assert_eq!(lens!(App => profile.age).id(), lens!(App => profile.age).id());
        assert_ne!(lens!(Profile => age).id(), lens!(Profile => name).id());
    }

    #[test]
    fn anonymous_lenses_are_distinct_but_clones_are_not() {
        let a = Lens::new(|p: &Profile| &p.age, |p: &mut Profile| &mut p.age);
        let b = Lens::new(|p: &Profile| &p.age, |p: &mut Profile| &mut p.age);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn identity_lens_returns_root() {
        let whole = Lens::<u32, u32>::identity();
        let mut value = 3;
        *whole.get_mut(&mut value) = 4;
        assert_eq!(value, 4);
    }
}
