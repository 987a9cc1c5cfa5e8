//! Tether Core
//!
//! This crate provides the runtime for the Tether unidirectional UI
//! architecture. It implements:
//!
//! - Stores that own state, run reducers and track effects
//! - Child stores scoped to part of a parent's state and actions
//! - Shared values with independent handles and change tracking
//! - A step-by-step harness for testing state transitions
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reducer`: the state transition contract and its combinators
//! - `effect`: work returned by reducers, cancellation, completion handles
//! - `path`: lenses and case paths used for scoping and projection
//! - `store`: the store runtime, scoping and the observation bridge
//! - `shared`: shared references, persistence keys and their registry
//! - `testing`: `TestStore`
//!
//! A store tree and every shared reference is bound to the thread that
//! created it. Asynchronous effects run as local tokio tasks on that thread,
//! so stores with effects are driven inside a `tokio::task::LocalSet`.
//!
//! # Example
//!
//! ```rust
//! use tether_core::prelude::*;
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Counter { count: i32 }
//!
//! enum Action { Increment, Decrement }
//!
//! fn counter(state: &mut Counter, action: Action) -> Effect<Action> {
//!     match action {
//!         Action::Increment => state.count += 1,
//!         Action::Decrement => state.count -= 1,
//!     }
//!     Effect::none()
//! }
//!
//! let store = Store::new(Counter::default(), counter);
//! let _changes = store.observe(|state| println!("count: {}", state.count));
//!
//! let _ = store.send(Action::Increment);
//! let _ = store.send(Action::Increment);
//! assert_eq!(store.state(), Counter { count: 2 });
//! ```

pub mod effect;
pub mod error;
pub mod isolation;
pub mod path;
pub mod reducer;
pub mod shared;
pub mod store;
pub mod subscriber;
pub mod testing;

pub use error::{AssertionFailure, PersistenceError, StoreError};

/// The types most applications need.
pub mod prelude {
    pub use crate::effect::{ActionSender, CancelId, Effect, TaskHandle};
    pub use crate::path::{CasePath, Lens};
    pub use crate::reducer::{Reducer, ReducerExt};
    pub use crate::shared::{Shared, SharedContext, SharedReader};
    pub use crate::store::{Store, StoreConfig};
    pub use crate::subscriber::Subscription;
    pub use crate::{case, combine, lens};
}
