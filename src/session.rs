use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use cookie::{Cookie, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{config::AppConfig, error::RelayError};

/// Name of the cookie carrying the signed session claim.
pub const SESSION_COOKIE: &str = "relay_session";

/// BearerToken
///
/// Upstream access token issued by the identity provider. Opaque to this
/// service; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the upstream `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// TokenGrant
///
/// What a successful provider callback yields: the bearer token, when the
/// provider says it expires, and the scope it was granted for.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: BearerToken,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// SessionRecord
///
/// Server-held session. The browser only ever sees the signed id.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub grant: TokenGrant,
    pub created_at: DateTime<Utc>,
    /// End of the session itself. Independent of the bearer token's own
    /// expiry, which is never renewed.
    pub session_expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.session_expires_at <= now
    }
}

/// SessionStore
///
/// Persistence contract for server-held sessions, keyed by session id so no
/// two identities ever share an entry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, record: SessionRecord);
    /// Returns the live record. Expired records are dropped and reported absent.
    async fn get(&self, id: Uuid) -> Option<SessionRecord>;
    /// Returns true if a record was removed.
    async fn remove(&self, id: Uuid) -> bool;
}

pub type SessionStoreState = Arc<dyn SessionStore>;

/// InMemorySessionStore
///
/// Process-local store. Sessions do not survive a restart; users sign in again.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SessionRecord>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    /// Inserting also sweeps out expired records, so abandoned sessions do not
    /// accumulate.
    async fn insert(&self, record: SessionRecord) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, existing| !existing.is_expired(now));
        sessions.insert(record.id, record);
    }

    async fn get(&self, id: Uuid) -> Option<SessionRecord> {
        let record = self.sessions.read().await.get(&id).cloned()?;
        if record.is_expired(Utc::now()) {
            self.sessions.write().await.remove(&id);
            return None;
        }
        Some(record)
    }

    async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }
}

/// SessionClaims
///
/// Payload of the signed session cookie. Only names the server-held record;
/// the bearer token never leaves the server inside a cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sid: Uuid,
    pub iat: u64,
    pub exp: u64,
}

/// SessionContext
///
/// Per-request view of the caller's session, resolved from the cookie and
/// passed explicitly to the handlers that need the bearer token.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub bearer: BearerToken,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// SessionView
///
/// Session introspection payload for the front-end.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionView {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

impl From<&SessionContext> for SessionView {
    fn from(session: &SessionContext) -> Self {
        Self {
            token: session.bearer.as_str().to_string(),
            expires_at: session.expires_at,
            scope: session.scope.clone(),
        }
    }
}

/// SessionManager
///
/// The session/token bridge. `establish` is the only code path that writes a
/// bearer token; everything else reads through `resolve`.
#[derive(Clone)]
pub struct SessionManager {
    store: SessionStoreState,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age: Duration,
    secure: bool,
}

impl SessionManager {
    pub fn new(store: SessionStoreState, config: &AppConfig) -> Self {
        let secret = config.session_secret.as_bytes();
        Self {
            store,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            max_age: config.session_max_age,
            secure: config.secure_cookies(),
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure
    }

    /// Signs arbitrary claims with the session key (HS256).
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, RelayError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| RelayError::Internal(format!("failed to sign claims: {e}")))
    }

    /// Verifies a token produced by [`SessionManager::sign`]. Bad signatures,
    /// malformed tokens and expired claims all yield `None`.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<T>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected signed cookie");
                None
            }
        }
    }

    /// establish
    ///
    /// Stores the grant under a fresh session id and returns the signed cookie
    /// that names it.
    pub async fn establish(&self, grant: TokenGrant) -> Result<Cookie<'static>, RelayError> {
        let now = Utc::now();
        let max_age = chrono::Duration::from_std(self.max_age)
            .map_err(|e| RelayError::Internal(format!("session max age out of range: {e}")))?;
        let record = SessionRecord {
            id: Uuid::new_v4(),
            grant,
            created_at: now,
            session_expires_at: now + max_age,
        };

        let claims = SessionClaims {
            sid: record.id,
            iat: now.timestamp().max(0) as u64,
            exp: record.session_expires_at.timestamp().max(0) as u64,
        };
        let signed = self.sign(&claims)?;

        tracing::info!(
            session_id = %record.id,
            token_expires_at = ?record.grant.expires_at,
            "Session established"
        );
        self.store.insert(record).await;

        Ok(self.session_cookie(signed))
    }

    /// Resolves the caller's session from the cookie jar, or `None` if there is
    /// no cookie, the signature does not verify, or the record is gone.
    pub async fn resolve(&self, jar: &CookieJar) -> Option<SessionContext> {
        let cookie = jar.get(SESSION_COOKIE)?;
        let claims: SessionClaims = self.verify(cookie.value())?;
        let record = self.store.get(claims.sid).await?;

        Some(SessionContext {
            session_id: record.id,
            bearer: record.grant.access_token,
            expires_at: record.grant.expires_at,
            scope: record.grant.scope,
        })
    }

    /// Destroys the session named by the cookie, if any. Returns its id.
    pub async fn destroy(&self, jar: &CookieJar) -> Option<Uuid> {
        let cookie = jar.get(SESSION_COOKIE)?;
        let claims: SessionClaims = self.verify(cookie.value())?;
        if self.store.remove(claims.sid).await {
            tracing::info!(session_id = %claims.sid, "Session destroyed");
        }
        Some(claims.sid)
    }

    fn session_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(self.max_age.as_secs() as i64))
            .build()
    }

    /// Cookie template for [`CookieJar::remove`]; path must match the issued one.
    pub fn removal_cookie() -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, "")).path("/").build()
    }
}

/// SessionContext Extractor Implementation
///
/// Makes `SessionContext` usable as a handler argument. Rejects with
/// `RelayError::Unauthenticated` (401) before the handler body runs, so no
/// handler that takes a `SessionContext` can reach upstream without a token.
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
    SessionManager: FromRef<S>,
{
    type Rejection = RelayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = SessionManager::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        sessions
            .resolve(&jar)
            .await
            .ok_or(RelayError::Unauthenticated)
    }
}
