//! Execution-Context Isolation
//!
//! Every store tree and every shared reference is bound to the thread that
//! created it. Reducers run, state is committed and observers are notified on
//! that thread only, which gives a race-free reducer model without locking
//! discipline in application code.
//!
//! The binding is checked at runtime: calling into a store or reference from
//! another thread panics with [`StoreError::WrongContext`] instead of
//! silently racing.

use std::thread::{self, ThreadId};

use crate::error::StoreError;

/// The execution context a store or reference is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Isolation {
    thread: ThreadId,
}

impl Isolation {
    /// Bind to the calling thread.
    pub fn current() -> Self {
        Self {
            thread: thread::current().id(),
        }
    }

    /// The bound thread.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Whether the calling thread is the bound thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Panic unless the calling thread is the bound thread.
    #[track_caller]
    pub fn assert_current(&self, operation: &'static str) {
        let actual = thread::current().id();
        if actual != self.thread {
            panic!(
                "{}",
                StoreError::WrongContext {
                    operation,
                    expected: self.thread,
                    actual,
                }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_thread_passes() {
        let isolation = Isolation::current();
        assert!(isolation.is_current());
        isolation.assert_current("read");
    }

    #[test]
    fn other_thread_is_detected() {
        let isolation = Isolation::current();
        let result = thread::spawn(move || {
            assert!(!isolation.is_current());
            std::panic::catch_unwind(|| isolation.assert_current("send")).is_err()
        })
        .join()
        .unwrap();
        assert!(result);
    }
}
