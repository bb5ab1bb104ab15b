use crate::{AppState, handlers, proxy, views};
use axum::{Router, extract::DefaultBodyLimit, routing::get};

/// Authenticated Router Module
///
/// Every route here sits behind the session guard. Handlers that need the
/// bearer token take `SessionContext`; those that need roles take `Identity`
/// and check their action through `gate::require`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Session ---
        // GET /auth/session
        // Current bearer token, expiry and scope.
        .route("/auth/session", get(handlers::get_session))
        // GET /auth/permissions?path=...
        // Identity, roles, capability table and visible menu.
        .route("/auth/permissions", get(handlers::get_permissions))
        // --- Relay ---
        // GET|POST|PUT|PATCH|DELETE /relay/{*path}
        // Forwarded to {API_BASE}/{API_PREFIX}/{path} with the session's token.
        // Bodies are uncapped: the backend owns upload limits.
        .route(
            "/relay/{*path}",
            get(proxy::relay)
                .post(proxy::relay)
                .put(proxy::relay)
                .patch(proxy::relay)
                .delete(proxy::relay)
                .layer(DefaultBodyLimit::disable()),
        )
        // --- Views ---
        .route("/views/nav", get(views::get_nav))
        .route("/views/patients", get(views::list_patients))
        .route("/views/patients/{id}", get(views::get_patient))
        .route("/views/preclinics", get(views::list_preclinics))
        .route("/views/invoices", get(views::list_invoices))
        .route("/views/cashier", get(views::get_cashier))
}
