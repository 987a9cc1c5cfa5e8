//! Shared State
//!
//! Shared values let parts of an application that do not know about each
//! other read and write one piece of state, outside the action cycle of a
//! store.
//!
//! # Model
//!
//! A reference owns the value. [`Shared`] (read-write) and [`SharedReader`]
//! (read-only) are handles: an accessor chain from the reference down to
//! the part of the value the handle looks at. Projecting a handle through a
//! [`Lens`](crate::path::Lens) extends the chain without copying anything,
//! and every handle from the same reference sees every write immediately.
//!
//! Each write notifies the reference's subscribers exactly once, after the
//! write is committed and on the writing thread. A reference is bound to the
//! thread that created it, like a store.
//!
//! # Assertions
//!
//! Tests describe expected mutations with an assertion scope:
//!
//! ```rust
//! use tether_core::shared::Shared;
//!
//! let count = Shared::new(0);
//! count.begin_assertion();
//!
//! count.set(1); // the code under test
//! count.assert(|count| *count = 1).unwrap();
//!
//! count.end_assertion().unwrap();
//! ```
//!
//! # Persistence
//!
//! A reference built with a [`PersistenceKey`] loads its value from the key
//! and saves every write through it. [`SharedContext`] hands out one
//! reference per key id.

mod access;
mod context;
mod handle;
mod persistence;
mod reference;
mod tracker;

pub use context::SharedContext;
pub use handle::{Shared, SharedReader};
pub use persistence::{MemoryStorage, PersistenceKey, StorageKey};
