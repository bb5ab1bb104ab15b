use serde::Serialize;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    error::RelayError,
    roles::{Action, RoleSet, allowed},
};

/// GateState
///
/// Visibility of one gated view for the lifetime of a page view. Starts at
/// `Checking` and moves forward exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum GateState {
    /// Identity not yet resolved.
    Checking,
    /// Identity resolved, role check failed.
    Forbidden,
    /// Identity resolved, role check passed.
    Allowed,
}

/// Gate
///
/// Role gate guarding one action. Advisory only: it decides what this service
/// renders, the backend still enforces its own rules.
#[derive(Debug, Clone)]
pub struct Gate {
    action: Action,
    state: GateState,
}

impl Gate {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            state: GateState::Checking,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Resolves the gate against the identity's role set. Once the gate has
    /// left `Checking` later calls return the settled state unchanged.
    pub fn resolve(&mut self, roles: &RoleSet) -> GateState {
        if self.state == GateState::Checking {
            self.state = if allowed(roles, self.action) {
                GateState::Allowed
            } else {
                GateState::Forbidden
            };
            tracing::debug!(action = ?self.action, state = ?self.state, "Gate resolved");
        }
        self.state
    }

    /// Converts the settled state into a handler result. An unresolved gate
    /// means there is no identity to check, which is reported as
    /// unauthenticated.
    pub fn require(&self) -> Result<(), RelayError> {
        match self.state {
            GateState::Allowed => Ok(()),
            GateState::Forbidden => Err(RelayError::Forbidden),
            GateState::Checking => Err(RelayError::Unauthenticated),
        }
    }
}

/// Resolves a fresh gate for `action` and requires it to pass.
pub fn require(roles: &RoleSet, action: Action) -> Result<(), RelayError> {
    let mut gate = Gate::new(action);
    gate.resolve(roles);
    gate.require()
}
