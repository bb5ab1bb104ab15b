use chrono::{DateTime, TimeDelta, Utc};
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::{
    config::ProviderConfig,
    error::RelayError,
    session::{BearerToken, TokenGrant},
};

/// Name of the short-lived cookie that carries the signed login state.
pub const STATE_COOKIE: &str = "relay_oauth_state";

const STATE_TTL_SECS: i64 = 10 * 60;

/// LoginState
///
/// Signed into the state cookie when the login redirect is issued and checked
/// on the provider callback: `state` must match the query parameter, and
/// `return_to` is where the browser lands afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginState {
    pub state: String,
    pub return_to: String,
    pub exp: u64,
}

impl LoginState {
    pub fn new(return_to: Option<&str>) -> Self {
        Self {
            state: Uuid::new_v4().simple().to_string(),
            return_to: sanitize_return_to(return_to),
            exp: (Utc::now().timestamp() + STATE_TTL_SECS).max(0) as u64,
        }
    }
}

/// Only same-origin absolute paths are accepted as post-login destinations;
/// anything else falls back to `/`.
pub fn sanitize_return_to(return_to: Option<&str>) -> String {
    match return_to {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

pub fn state_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/auth")
        .max_age(time::Duration::seconds(STATE_TTL_SECS))
        .build()
}

pub fn state_removal_cookie() -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, "")).path("/auth").build()
}

/// authorize_url
///
/// Provider authorization endpoint for the code flow, carrying the client id,
/// redirect URI, scope, optional audience and the CSRF `state`.
pub fn authorize_url(
    provider: &ProviderConfig,
    redirect_uri: &str,
    state: &str,
) -> Result<String, RelayError> {
    let mut params = vec![
        ("response_type", "code"),
        ("client_id", provider.client_id.as_str()),
        ("redirect_uri", redirect_uri),
        ("scope", provider.scope.as_str()),
        ("state", state),
    ];
    if let Some(audience) = &provider.audience {
        params.push(("audience", audience.as_str()));
    }

    Url::parse_with_params(&provider.authorize_endpoint(), &params)
        .map(String::from)
        .map_err(|e| RelayError::Internal(format!("invalid authorize endpoint: {e}")))
}

/// TokenResponse
///
/// Successful answer of the provider token endpoint. Refresh tokens, if any,
/// are ignored: sessions are never renewed.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// exchange_code
///
/// Trades an authorization code for the upstream bearer token at the
/// provider token endpoint (client secret post).
pub async fn exchange_code(
    http: &reqwest::Client,
    provider: &ProviderConfig,
    redirect_uri: &str,
    code: &str,
) -> Result<TokenGrant, RelayError> {
    let params = [
        ("grant_type", "authorization_code"),
        ("client_id", provider.client_id.as_str()),
        ("client_secret", provider.client_secret.as_str()),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];

    tracing::debug!(
        token_endpoint = %provider.token_endpoint(),
        "Exchanging authorization code"
    );

    let response = http
        .post(provider.token_endpoint())
        .form(&params)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
            return Err(RelayError::TokenExchange(format!(
                "{}: {}",
                oauth_error.error,
                oauth_error.error_description.unwrap_or_default()
            )));
        }
        return Err(RelayError::TokenExchange(format!("HTTP {status} - {body}")));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| RelayError::TokenExchange(format!("unreadable token response: {e}")))?;

    if let Some(kind) = token.token_type.as_deref()
        && !kind.eq_ignore_ascii_case("bearer")
    {
        return Err(RelayError::TokenExchange(format!(
            "unsupported token type {kind}"
        )));
    }

    Ok(TokenGrant {
        access_token: BearerToken::new(token.access_token),
        expires_at: token.expires_in.and_then(|secs| expiry_from(Utc::now(), secs)),
        scope: token.scope,
    })
}

/// Absolute expiry for a relative `expires_in`. Values that do not fit a
/// timestamp are treated as "no expiry reported".
fn expiry_from(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(expires_in).and_then(|delta| now.checked_add_signed(delta))
}
