use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Method, Request, StatusCode, Uri, header, request::Parts},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use clinic_relay::{
    AppConfig, AppState, RelayError,
    session::{
        BearerToken, SESSION_COOKIE, SessionClaims, SessionContext, SessionRecord, SessionStore,
        TokenGrant,
    },
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

// --- Recording Session Store ---

/// Session store that remembers every lookup, so tests can prove which ids
/// were (or were not) consulted.
#[derive(Default)]
struct RecordingStore {
    records: Mutex<HashMap<Uuid, SessionRecord>>,
    lookups: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn insert(&self, record: SessionRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    async fn get(&self, id: Uuid) -> Option<SessionRecord> {
        self.lookups.lock().unwrap().push(id);
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .filter(|record| !record.is_expired(Utc::now()))
            .cloned()
    }

    async fn remove(&self, id: Uuid) -> bool {
        self.records.lock().unwrap().remove(&id).is_some()
    }
}

// --- Helper Functions ---

const TEST_SESSION_SECRET: &str = "test-session-secret-1234567890";

fn create_app_state(store: Arc<RecordingStore>) -> AppState {
    let config = AppConfig {
        session_secret: TEST_SESSION_SECRET.to_string(),
        ..AppConfig::default()
    };
    AppState::with_store(config, store)
}

fn grant(token: &str) -> TokenGrant {
    TokenGrant {
        access_token: BearerToken::new(token),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scope: Some("openid profile email offline_access".to_string()),
    }
}

fn get_request_parts(cookie: Option<String>) -> Parts {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri("/auth/session".parse::<Uri>().unwrap());
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
    }
    let (parts, _) = builder.body(axum::body::Body::empty()).unwrap().into_parts();
    parts
}

fn sign_claims(secret: &str, claims: &SessionClaims) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

// --- Tests ---

#[tokio::test]
async fn test_session_resolves_from_valid_cookie() {
    let store = Arc::new(RecordingStore::default());
    let state = create_app_state(store.clone());
    let cookie = state.sessions.establish(grant("T1")).await.unwrap();

    let mut parts = get_request_parts(Some(format!("{SESSION_COOKIE}={}", cookie.value())));
    let session = SessionContext::from_request_parts(&mut parts, &state)
        .await
        .unwrap();

    assert_eq!(session.bearer.as_str(), "T1");
    assert!(session.expires_at.is_some());
    assert_eq!(store.lookups.lock().unwrap().as_slice(), &[session.session_id]);
}

#[tokio::test]
async fn test_missing_cookie_is_401_without_store_lookup() {
    let store = Arc::new(RecordingStore::default());
    let state = create_app_state(store.clone());

    let mut parts = get_request_parts(None);
    let rejection = SessionContext::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();

    assert!(matches!(rejection, RelayError::Unauthenticated));
    assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    assert!(store.lookups.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_forged_cookie_never_reaches_the_store() {
    let store = Arc::new(RecordingStore::default());
    let state = create_app_state(store.clone());
    state.sessions.establish(grant("T1")).await.unwrap();

    let now = Utc::now().timestamp() as u64;
    let forged = sign_claims(
        "attacker-chosen-secret",
        &SessionClaims {
            sid: Uuid::new_v4(),
            iat: now,
            exp: now + 3600,
        },
    );
    let mut parts = get_request_parts(Some(format!("{SESSION_COOKIE}={forged}")));
    let result = SessionContext::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(RelayError::Unauthenticated)));
    assert!(store.lookups.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_session_claim_is_rejected() {
    let store = Arc::new(RecordingStore::default());
    let state = create_app_state(store.clone());

    let now = Utc::now().timestamp() as u64;
    let expired = sign_claims(
        TEST_SESSION_SECRET,
        &SessionClaims {
            sid: Uuid::new_v4(),
            iat: now - 7200,
            exp: now - 3600,
        },
    );

    let mut parts = get_request_parts(Some(format!("{SESSION_COOKIE}={expired}")));
    let result = SessionContext::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(RelayError::Unauthenticated)));
}

#[tokio::test]
async fn test_valid_claim_for_unknown_session_is_rejected() {
    let store = Arc::new(RecordingStore::default());
    let state = create_app_state(store.clone());

    let now = Utc::now().timestamp() as u64;
    let sid = Uuid::new_v4();
    let orphan = sign_claims(
        TEST_SESSION_SECRET,
        &SessionClaims {
            sid,
            iat: now,
            exp: now + 3600,
        },
    );

    let mut parts = get_request_parts(Some(format!("{SESSION_COOKIE}={orphan}")));
    let result = SessionContext::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(RelayError::Unauthenticated)));
    assert_eq!(store.lookups.lock().unwrap().as_slice(), &[sid]);
}

#[tokio::test]
async fn test_sessions_never_share_a_token() {
    let store = Arc::new(RecordingStore::default());
    let state = create_app_state(store);
    let first = state.sessions.establish(grant("T1")).await.unwrap();
    let second = state.sessions.establish(grant("T2")).await.unwrap();

    let mut parts = get_request_parts(Some(format!("{SESSION_COOKIE}={}", first.value())));
    let one = SessionContext::from_request_parts(&mut parts, &state)
        .await
        .unwrap();
    let mut parts = get_request_parts(Some(format!("{SESSION_COOKIE}={}", second.value())));
    let two = SessionContext::from_request_parts(&mut parts, &state)
        .await
        .unwrap();

    assert_ne!(one.session_id, two.session_id);
    assert_eq!(one.bearer.as_str(), "T1");
    assert_eq!(two.bearer.as_str(), "T2");
}
