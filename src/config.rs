use std::{env, time::Duration};

use thiserror::Error;

const DEFAULT_SCOPE: &str = "openid profile email offline_access";
const LOCAL_SESSION_SECRET: &str = "clinic-relay-local-session-secret-value";

/// ConfigError
///
/// Startup configuration failures. Any of these is fatal: the process logs the
/// error and refuses to bind a listener.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "invalid or missing identity provider issuer; set AUTH0_ISSUER_BASE_URL (e.g. https://YOUR_DOMAIN) or AUTH0_DOMAIN"
    )]
    InvalidIssuer,
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { name: &'static str, value: String },
}

/// Env
///
/// Runtime context. `Local` enables developer fallbacks for secrets and plain
/// HTTP cookies; `Production` demands every secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// ProviderConfig
///
/// Identity provider (Auth0-style) client registration used by the login flow.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Absolute issuer URL without a trailing slash.
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    /// API audience requested alongside the scope, if any.
    pub audience: Option<String>,
    pub scope: String,
}

impl ProviderConfig {
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/authorize", self.issuer)
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth/token", self.issuer)
    }
}

/// UpstreamConfig
///
/// Location of the backend business API. Every relayed call lands under
/// `{base_url}/{prefix}/`.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub prefix: String,
}

impl UpstreamConfig {
    /// Builds `{base_url}/{prefix}/{path_suffix}?{query}`. The suffix and query
    /// are used as given; an empty query adds no `?`.
    pub fn url_for(&self, path_suffix: &str, query: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.prefix.trim_matches('/'),
            path_suffix.trim_start_matches('/')
        );
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// AppConfig
///
/// Immutable configuration loaded once at startup and shared through the
/// application state.
#[derive(Clone)]
pub struct AppConfig {
    pub env: Env,
    pub bind_addr: String,
    /// Public origin of this service, used to build the provider callback URL.
    pub app_base_url: String,
    pub provider: ProviderConfig,
    pub upstream: UpstreamConfig,
    /// HMAC key for the session and login-state cookies.
    pub session_secret: String,
    pub session_max_age: Duration,
    pub role_cache_ttl: Duration,
}

impl Default for AppConfig {
    /// Non-panicking local configuration for tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:3000".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
            provider: ProviderConfig {
                issuer: "https://clinic.example.auth0.com".to_string(),
                client_id: "test-client".to_string(),
                client_secret: "test-client-secret".to_string(),
                audience: Some("https://api.clinic.test".to_string()),
                scope: DEFAULT_SCOPE.to_string(),
            },
            upstream: UpstreamConfig {
                base_url: "http://localhost:8000".to_string(),
                prefix: "api".to_string(),
            },
            session_secret: LOCAL_SESSION_SECRET.to_string(),
            session_max_age: Duration::from_secs(30 * 24 * 60 * 60),
            role_cache_ttl: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the process environment. A missing or
    /// relative issuer is always an error. In production the client
    /// credentials, backend URL and session secret must be set explicitly.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match var("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        let issuer = resolve_issuer(var("AUTH0_ISSUER_BASE_URL"), var("AUTH0_DOMAIN"))?;

        let required = |name: &'static str, local_default: &str| match (var(name), &env) {
            (Some(value), _) => Ok(value),
            (None, Env::Local) => Ok(local_default.to_string()),
            (None, Env::Production) => Err(ConfigError::Missing(name)),
        };

        let provider = ProviderConfig {
            issuer,
            client_id: required("AUTH0_CLIENT_ID", "local-client")?,
            client_secret: required("AUTH0_CLIENT_SECRET", "local-client-secret")?,
            audience: var("AUTH0_AUDIENCE"),
            scope: var("AUTH0_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        };

        let upstream = UpstreamConfig {
            base_url: required("API_BASE_URL", "http://localhost:8000")?,
            prefix: var("API_PREFIX").unwrap_or_else(|| "api".to_string()),
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            app_base_url: var("APP_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            provider,
            upstream,
            session_secret: required("SESSION_SECRET", LOCAL_SESSION_SECRET)?,
            session_max_age: seconds("SESSION_MAX_AGE_SECS", 30 * 24 * 60 * 60)?,
            role_cache_ttl: seconds("ROLE_CACHE_TTL_SECS", 30)?,
            env,
        })
    }

    /// Absolute redirect URI registered with the identity provider.
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.app_base_url.trim_end_matches('/'))
    }

    pub fn secure_cookies(&self) -> bool {
        self.env == Env::Production
    }
}

/// resolve_issuer
///
/// Prefers the explicit issuer URL, falling back to `https://{domain}`. The
/// result must be an absolute http(s) URL; the provider endpoints are derived
/// from it.
pub fn resolve_issuer(
    issuer: Option<String>,
    domain: Option<String>,
) -> Result<String, ConfigError> {
    issuer
        .or_else(|| domain.map(|d| format!("https://{d}")))
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .map(|url| url.trim_end_matches('/').to_string())
        .ok_or(ConfigError::InvalidIssuer)
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn seconds(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match var(name) {
        None => Ok(Duration::from_secs(default)),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidSeconds { name, value }),
    }
}
