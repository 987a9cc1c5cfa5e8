//! Projection Paths
//!
//! Stores and shared handles never copy the state they view. A child store or
//! a projected handle instead carries an explicit path from the owning value
//! down to the piece it exposes:
//!
//! - a [`Lens`] focuses a parent *state* on one of its fields;
//! - a [`CasePath`] relates a parent *action* enum to one of its cases.
//!
//! Both carry a [`PathId`]. Stores memoize child scopes by the pair of ids,
//! so two paths built separately for the same field must compare equal.
//! The [`lens!`](crate::lens) and [`case!`](crate::case) macros build named
//! paths whose ids depend only on the field path and the types involved.

mod case;
mod id;
mod lens;

pub use case::CasePath;
pub use id::PathId;
pub use lens::Lens;

/// Build a named [`Lens`] from a type and a field path.
///
/// ```rust
/// use tether_core::lens;
///
/// struct Settings { volume: u8 }
/// struct App { settings: Settings }
///
/// let volume = lens!(App => settings.volume);
/// let app = App { settings: Settings { volume: 3 } };
/// assert_eq!(*volume.get(&app), 3);
/// ```
#[macro_export]
macro_rules! lens {
    ($root:ty => $($field:ident).+) => {
        $crate::path::Lens::<$root, _>::named(
            stringify!($($field).+),
            |root: &$root| &root.$($field).+,
            |root: &mut $root| &mut root.$($field).+,
        )
    };
}

/// Build a named [`CasePath`] from a tuple variant with one field.
///
/// ```rust
/// use tether_core::case;
///
/// enum Action { Counter(i32), Reset }
///
/// let counter = case!(Action::Counter);
/// assert_eq!(counter.extract(Action::Counter(4)), Some(4));
/// assert_eq!(counter.extract(Action::Reset), None);
/// ```
#[macro_export]
macro_rules! case {
    ($($variant:ident)::+) => {
        $crate::path::CasePath::named(
            stringify!($($variant)::+),
            |action| match action {
                $($variant)::+(value) => Some(value),
                #[allow(unreachable_patterns)]
                _ => None,
            },
            $($variant)::+,
        )
    };
}
