use axum::{
    Json,
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    AppState,
    error::RelayError,
    identity::Identity,
    models::MeUser,
    nav::{NavItem, visible_menu},
    oauth::{self, LoginState, STATE_COOKIE},
    roles::{Capability, capabilities},
    session::{SessionContext, SessionManager, SessionView},
};

// --- Query Structs ---

/// SigninParams
///
/// `callbackUrl` is where the browser should land after a successful login.
/// Only same-origin paths are honoured.
#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SigninParams {
    pub callback_url: Option<String>,
}

/// CallbackParams
///
/// Query parameters the identity provider appends to the redirect URI.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// PathParams
///
/// Current front-end path, used to mark the active menu entry.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PathParams {
    pub path: Option<String>,
}

/// PermissionsView
///
/// Everything the front-end needs to gate its screens for the current user.
#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct PermissionsView {
    pub user: MeUser,
    pub roles: Vec<String>,
    pub capabilities: Vec<Capability>,
    pub menu: Vec<NavItem>,
}

// --- Handlers ---

/// signin
///
/// [Public Route] Starts the authorization-code flow: signs a fresh `state`
/// into a short-lived cookie and redirects to the provider.
#[utoipa::path(
    get,
    path = "/auth/signin",
    params(SigninParams),
    responses((status = 303, description = "Redirect to the identity provider"))
)]
pub async fn signin(
    State(state): State<AppState>,
    Query(params): Query<SigninParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), RelayError> {
    let login = LoginState::new(params.callback_url.as_deref());
    let target = oauth::authorize_url(
        &state.config.provider,
        &state.config.callback_url(),
        &login.state,
    )?;

    let signed = state.sessions.sign(&login)?;
    let jar = jar.add(oauth::state_cookie(signed, state.sessions.secure_cookies()));

    Ok((jar, Redirect::to(&target)))
}

/// callback
///
/// [Public Route] Provider redirect target. Verifies `state` against the
/// signed cookie, exchanges the code for the bearer token and establishes the
/// session. This is the only route that writes a token.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackParams),
    responses(
        (status = 303, description = "Session established, redirect to the return path"),
        (status = 400, description = "Provider error or state mismatch"),
        (status = 401, description = "Code rejected by the provider")
    )
)]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), RelayError> {
    if let Some(error) = params.error {
        return Err(RelayError::InvalidCallback(format!(
            "{error}: {}",
            params.error_description.unwrap_or_default()
        )));
    }

    let login: LoginState = jar
        .get(STATE_COOKIE)
        .and_then(|cookie| state.sessions.verify(cookie.value()))
        .ok_or_else(|| RelayError::InvalidCallback("missing or expired login state".into()))?;

    if params.state.as_deref() != Some(login.state.as_str()) {
        return Err(RelayError::InvalidCallback("state mismatch".into()));
    }

    let code = params
        .code
        .ok_or_else(|| RelayError::InvalidCallback("missing authorization code".into()))?;

    let grant = oauth::exchange_code(
        &state.http,
        &state.config.provider,
        &state.config.callback_url(),
        &code,
    )
    .await?;

    let session_cookie = state.sessions.establish(grant).await?;
    let jar = jar
        .remove(oauth::state_removal_cookie())
        .add(session_cookie);

    Ok((jar, Redirect::to(&login.return_to)))
}

/// signout
///
/// [Public Route] Destroys the server-held session and its cached identity
/// and clears the cookie. Safe to call without a session.
#[utoipa::path(
    post,
    path = "/auth/signout",
    responses((status = 303, description = "Signed out, redirect to /"))
)]
pub async fn signout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(session_id) = state.sessions.destroy(&jar).await {
        state.identities.evict(session_id).await;
    }
    let jar = jar.remove(SessionManager::removal_cookie());
    (jar, Redirect::to("/"))
}

/// get_session
///
/// [Authenticated Route] Session introspection: the current bearer token, its
/// expiry and granted scope.
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Current session", body = SessionView),
        (status = 401, description = "No valid session")
    )
)]
pub async fn get_session(session: SessionContext) -> Json<SessionView> {
    Json(SessionView::from(&session))
}

/// get_permissions
///
/// [Authenticated Route] Resolved identity, role set, evaluated capability
/// table and the menu this user may see.
#[utoipa::path(
    get,
    path = "/auth/permissions",
    params(PathParams),
    responses(
        (status = 200, description = "Permissions", body = PermissionsView),
        (status = 401, description = "No valid session")
    )
)]
pub async fn get_permissions(
    Identity { me, .. }: Identity,
    Query(params): Query<PathParams>,
) -> Json<PermissionsView> {
    let path = params.path.as_deref().unwrap_or("/");
    Json(PermissionsView {
        capabilities: capabilities(&me.roles),
        menu: visible_menu(&me.roles, path),
        roles: me.roles.iter().map(str::to_string).collect(),
        user: me.user,
    })
}
