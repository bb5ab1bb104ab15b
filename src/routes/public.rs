use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: the authorization-code flow and
/// the liveness probe.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /auth/signin?callbackUrl=...
        // Redirects to the identity provider with a signed, cookie-bound state.
        .route("/auth/signin", get(handlers::signin))
        // GET /auth/callback?code=...&state=...
        // Provider redirect target; establishes the session.
        .route("/auth/callback", get(handlers::callback))
        // POST /auth/signout
        // Idempotent: clears the cookie whether or not a session exists.
        // POST only, so a cross-site link cannot end a session.
        .route("/auth/signout", post(handlers::signout))
}
