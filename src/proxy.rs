use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Uri, header},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    config::UpstreamConfig,
    error::RelayError,
    session::{BearerToken, SessionContext},
};

/// Route prefix of the generic relay; everything after it is the upstream
/// path suffix.
pub const RELAY_PREFIX: &str = "/relay/";

/// ProxiedRequest
///
/// A browser request as the relay forwards it. Nothing here is rewritten; the
/// only thing the relay adds upstream is the `Authorization` header.
#[derive(Debug, Clone)]
pub struct ProxiedRequest {
    pub method: Method,
    /// Path below `{API_BASE}/{API_PREFIX}/`, still percent-encoded.
    pub path_suffix: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl ProxiedRequest {
    /// GET and DELETE are forwarded without a body.
    pub fn carries_body(&self) -> bool {
        self.method != Method::GET && self.method != Method::DELETE
    }
}

/// forward
///
/// Sends one request upstream with `Authorization: Bearer <token>` and relays
/// the answer: status and body verbatim, the upstream content-type or JSON by
/// default. One attempt, no retry, no timeout beyond the client's own.
pub async fn forward(
    http: &reqwest::Client,
    upstream: &UpstreamConfig,
    bearer: &BearerToken,
    request: ProxiedRequest,
) -> Result<Response, RelayError> {
    let target = upstream.url_for(&request.path_suffix, request.query.as_deref());
    let carries_body = request.carries_body();

    let mut outbound = http
        .request(request.method.clone(), &target)
        .header(header::AUTHORIZATION, bearer.header_value());

    if carries_body {
        let content_type = request
            .content_type
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        outbound = outbound
            .header(header::CONTENT_TYPE, content_type)
            .body(request.body);
    }

    let upstream_response = outbound.send().await?;

    let status = upstream_response.status();
    let content_type = upstream_response
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    let body = upstream_response.bytes().await?;

    tracing::info!(
        method = %request.method,
        path = %request.path_suffix,
        status = status.as_u16(),
        "Relayed request"
    );

    Ok((status, [(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// relay
///
/// [Authenticated Route] Generic pass-through to the backend API. The
/// `SessionContext` extractor runs first, so a request without a valid session
/// is rejected with 401 before any upstream call. The destination path is not
/// allow-listed; the backend is the authority on what a token may reach.
/// The route carries no body size limit, so uploads of any size are relayed.
#[utoipa::path(
    method(get, post, put, patch, delete),
    path = "/relay/{path}",
    params(("path" = String, Path, description = "Backend path below the API prefix")),
    request_body(
        content = Vec<u8>,
        content_type = "application/octet-stream",
        description = "Forwarded unchanged for methods other than GET and DELETE"
    ),
    responses(
        (status = 200, description = "Upstream response, relayed verbatim"),
        (status = 401, description = "No valid session"),
        (status = 502, description = "Upstream unreachable")
    )
)]
pub async fn relay(
    session: SessionContext,
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    let request = ProxiedRequest {
        method,
        path_suffix: uri
            .path()
            .strip_prefix(RELAY_PREFIX)
            .unwrap_or_default()
            .to_string(),
        query: uri.query().map(str::to_string),
        content_type: headers.get(header::CONTENT_TYPE).cloned(),
        body,
    };

    forward(
        &state.http,
        &state.config.upstream,
        &session.bearer,
        request,
    )
    .await
}
