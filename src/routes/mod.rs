/// Router Module Index
///
/// Routes are split by access level. The session guard is applied to the
/// authenticated router as a whole in `create_router`, so a handler placed in
/// `authenticated` can never run without a resolved session.

/// Login flow, sign-out and health. No session required.
pub mod public;

/// Session introspection, permissions, the relay and the role-gated views.
pub mod authenticated;
