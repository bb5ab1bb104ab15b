use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    backend::BackendClient,
    error::RelayError,
    models::MeResponse,
    session::{SessionContext, SessionManager},
};

struct CachedIdentity {
    fetched_at: Instant,
    me: MeResponse,
}

/// IdentityResolver
///
/// Resolves the caller's profile and role set from the backend `me` endpoint.
/// Answers are cached per session id for a short window and never shared
/// between sessions.
pub struct IdentityResolver {
    backend: BackendClient,
    ttl: Duration,
    cache: RwLock<HashMap<Uuid, CachedIdentity>>,
}

pub type IdentityState = Arc<IdentityResolver>;

impl IdentityResolver {
    pub fn new(backend: BackendClient, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// resolve
    ///
    /// Returns the cached identity while it is fresh, otherwise asks the
    /// backend. A backend 401 surfaces as `RelayError::Upstream`, which the
    /// caller sees verbatim and answers by signing in again.
    pub async fn resolve(&self, session: &SessionContext) -> Result<MeResponse, RelayError> {
        if let Some(cached) = self.cache.read().await.get(&session.session_id)
            && cached.fetched_at.elapsed() < self.ttl
        {
            return Ok(cached.me.clone());
        }

        let me = self.backend.me(&session.bearer).await?;
        tracing::debug!(
            session_id = %session.session_id,
            roles = ?me.roles,
            "Resolved identity"
        );

        let mut cache = self.cache.write().await;
        cache.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
        cache.insert(
            session.session_id,
            CachedIdentity {
                fetched_at: Instant::now(),
                me: me.clone(),
            },
        );

        Ok(me)
    }

    /// Drops the cached identity of a session (used on sign-out).
    pub async fn evict(&self, session_id: Uuid) {
        self.cache.write().await.remove(&session_id);
    }
}

/// Identity
///
/// Extractor bundling the caller's session with their resolved identity. View
/// handlers take this instead of looking anything up themselves.
#[derive(Debug, Clone)]
pub struct Identity {
    pub session: SessionContext,
    pub me: MeResponse,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    SessionManager: FromRef<S>,
    IdentityState: FromRef<S>,
{
    type Rejection = RelayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = SessionContext::from_request_parts(parts, state).await?;
        let resolver = IdentityState::from_ref(state);
        let me = resolver.resolve(&session).await?;

        Ok(Identity { session, me })
    }
}
