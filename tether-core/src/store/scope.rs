//! Scope identity.

use crate::path::PathId;

/// Key under which a parent store caches a child scope: the state path and
/// the action path the child was derived with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId {
    state: PathId,
    action: PathId,
}

impl ScopeId {
    pub fn new(state: &PathId, action: &PathId) -> Self {
        Self {
            state: state.clone(),
            action: action.clone(),
        }
    }

    pub fn state(&self) -> &PathId {
        &self.state
    }

    pub fn action(&self) -> &PathId {
        &self.action
    }
}
