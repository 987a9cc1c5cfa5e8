//! Error Types
//!
//! Tether distinguishes three kinds of failure:
//!
//! - [`StoreError`]: programmer misuse. These are never returned; the runtime
//!   panics with the rendered error at the offending call site.
//! - [`AssertionFailure`]: a test expectation about state did not hold. These
//!   are returned as `Result` so the test harness can report them.
//! - [`PersistenceError`]: a persistence key could not load or save a value.
//!   These are logged by the shared layer and never cross the action boundary.

use std::thread::ThreadId;

use thiserror::Error;

/// Misuse of a store or shared reference.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An operation ran on a thread other than the one the store or
    /// reference was bound to at construction.
    #[error("`{operation}` called from thread {actual:?}, but this value is bound to thread {expected:?}")]
    WrongContext {
        operation: &'static str,
        expected: ThreadId,
        actual: ThreadId,
    },

    /// An operation ran on a placeholder store that was never initialized.
    #[error("`{operation}` called on a placeholder store")]
    InvalidCore { operation: &'static str },

    /// A scoped store outlived the root store that owns its state.
    #[error("`{operation}` called on a scoped store whose root store was dropped")]
    Deallocated { operation: &'static str },

    /// An assertion scope was opened on a reference that already has one.
    #[error("an assertion scope is already active on shared reference {reference}")]
    NestedAssertion { reference: u64 },

    /// A shared reference was accessed from inside its own write callback.
    #[error("shared reference {reference} accessed re-entrantly during a write")]
    ReentrantAccess { reference: u64 },

    /// A store was read or sent to while its own state was locked, e.g. from
    /// inside `with_state` or from a callback that runs during a reduce.
    #[error("`{operation}` re-entered a store whose state is locked by a running reducer or `with_state`")]
    ReentrantStoreAccess { operation: &'static str },

    /// A shared context key was requested with a value type other than the
    /// one its live reference holds.
    #[error("shared key `{key}` requested as `{requested}`, but its live reference holds another type")]
    KeyTypeMismatch { key: String, requested: &'static str },
}

/// A failed expectation about a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssertionFailure {
    #[error("no assertion scope is active on this shared reference")]
    NotTracking,

    #[error("expected the shared value to change, but it is unchanged: {value}")]
    NoChange { value: String },

    #[error("shared value does not match the expectation\n  expected: {expected}\n    actual: {actual}")]
    Mismatch { expected: String, actual: String },

    #[error("shared value changed without being asserted\n  asserted: {asserted}\n      live: {live}")]
    UnassertedChange { asserted: String, live: String },

    #[error("state after `{action}` does not match the expectation\n  expected: {expected}\n    actual: {actual}")]
    StateMismatch {
        action: String,
        expected: String,
        actual: String,
    },
}

/// Failure reported by a persistence key.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("could not (de)serialize persisted value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("persistence backend failed: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misuse_messages_name_the_operation() {
        let err = StoreError::InvalidCore { operation: "send" };
        assert_eq!(err.to_string(), "`send` called on a placeholder store");

        let err = StoreError::NestedAssertion { reference: 7 };
        assert!(err.to_string().contains("reference 7"));

        let err = StoreError::ReentrantStoreAccess { operation: "send" };
        assert!(err.to_string().starts_with("`send` re-entered a store"));
    }

    #[test]
    fn serde_errors_convert_into_persistence_errors() {
        let source = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let err: PersistenceError = source.into();
        assert!(matches!(err, PersistenceError::Serialization(_)));
    }
}
