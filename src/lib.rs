use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Session bridge and identity.
pub mod identity;
pub mod oauth;
pub mod session;

// Authorization.
pub mod gate;
pub mod nav;
pub mod roles;

// Backend access.
pub mod backend;
pub mod proxy;

// HTTP surface.
pub mod filter;
pub mod handlers;
pub mod routes;
pub mod views;

pub mod config;
pub mod error;
pub mod models;

use routes::{authenticated, public};
use session::SessionContext;

// --- Public Re-exports ---

pub use backend::BackendClient;
pub use config::AppConfig;
pub use error::RelayError;
pub use identity::{IdentityResolver, IdentityState};
pub use session::{InMemorySessionStore, SessionManager, SessionStore, SessionStoreState};

/// ApiDoc
///
/// OpenAPI document for every route this service exposes, served at
/// `/api-docs/openapi.json` behind the Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::signin, handlers::callback, handlers::signout,
        handlers::get_session, handlers::get_permissions,
        proxy::relay,
        views::get_nav, views::list_patients, views::get_patient,
        views::list_preclinics, views::list_invoices, views::get_cashier
    ),
    components(
        schemas(
            session::SessionView, handlers::PermissionsView,
            roles::Role, roles::Action, roles::Capability,
            gate::GateState, nav::Icon, nav::NavItem,
            models::MeUser, models::MeResponse, models::Patient, models::Preclinic,
            models::InvoiceStatus, models::InvoiceLine, models::InvoicePatient, models::Invoice,
            models::Location, models::CashRegister, models::CashSession,
            views::PatientControls, views::PatientListView, views::PatientDetailView,
            views::PreclinicControls, views::PreclinicListView,
            views::InvoiceRow, views::InvoiceListView, views::CashierView,
        )
    ),
    tags(
        (name = "clinic-relay", description = "Clinic front-end session relay")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable application state. Handlers slice out what they
/// need through the `FromRef` impls below.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Session/token bridge: the only holder of bearer tokens.
    pub sessions: SessionManager,
    /// Per-session `me` cache in front of the backend.
    pub identities: IdentityState,
    pub backend: BackendClient,
    /// Shared HTTP client for the provider and the relay.
    pub http: reqwest::Client,
}

impl AppState {
    /// Builds the state around the process-local session store.
    pub fn new(config: AppConfig) -> Self {
        Self::with_store(config, Arc::new(InMemorySessionStore::default()))
    }

    pub fn with_store(config: AppConfig, store: SessionStoreState) -> Self {
        let http = reqwest::Client::new();
        let backend = BackendClient::new(http.clone(), config.upstream.clone());
        let identities = Arc::new(IdentityResolver::new(
            backend.clone(),
            config.role_cache_ttl,
        ));
        let sessions = SessionManager::new(store, &config);

        Self {
            config,
            sessions,
            identities,
            backend,
            http,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(app_state: &AppState) -> SessionManager {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identities.clone()
    }
}

impl FromRef<AppState> for BackendClient {
    fn from_ref(app_state: &AppState) -> BackendClient {
        app_state.backend.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated router. Extracting `SessionContext` rejects with
/// 401 before the handler (and therefore before any upstream call) runs.
async fn auth_middleware(_session: SessionContext, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, the session guard and the observability layers
/// around the shared state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, correlated by `x-request-id`. Only the path is
/// recorded: query strings on relayed calls may carry patient identifiers.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
