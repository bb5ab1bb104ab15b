use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use clinic_relay::{
    AppConfig, AppState, create_router,
    session::{BearerToken, SESSION_COOKIE, TokenGrant},
};
use tower::util::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, header as header_eq, method, path, query_param},
};

// --- Helper Functions ---

fn state_for(upstream: &str) -> AppState {
    let mut config = AppConfig::default();
    config.upstream.base_url = upstream.to_string();
    AppState::new(config)
}

/// Establishes a session holding `token` and returns the `Cookie` header
/// value that names it.
async fn session_cookie(state: &AppState, token: &str) -> String {
    let cookie = state
        .sessions
        .establish(TokenGrant {
            access_token: BearerToken::new(token),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            scope: None,
        })
        .await
        .unwrap();
    format!("{SESSION_COOKIE}={}", cookie.value())
}

fn app(state: &AppState) -> Router {
    create_router(state.clone())
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

// --- Tests ---

#[tokio::test]
async fn test_relay_without_session_is_401_and_never_calls_upstream() {
    let upstream = MockServer::start().await;
    let state = state_for(&upstream.uri());

    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri("/relay/patients?limit=5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, serde_json::json!({ "error": "unauthorized" }));
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_relay_post_without_session_is_401_and_never_calls_upstream() {
    let upstream = MockServer::start().await;
    let state = state_for(&upstream.uri());

    let response = app(&state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/relay/cash/sessions/open")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"registerId":"r1","openingFloat":"100.00"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, serde_json::json!({ "error": "unauthorized" }));
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_relay_get_carries_session_token_and_query() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/patients"))
        .and(query_param("limit", "5"))
        .and(header_eq("authorization", "Bearer T1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"[{"id":"p1"}]"#, "application/json"),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let state = state_for(&upstream.uri());
    let cookie = session_cookie(&state, "T1").await;

    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri("/relay/patients?limit=5")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_bytes(response).await, br#"[{"id":"p1"}]"#);
}

#[tokio::test]
async fn test_relay_post_forwards_body_byte_for_byte() {
    let upstream = MockServer::start().await;
    let payload = r#"{"firstName":"Ana","notes":"  spaced  ","n":1.50}"#;
    Mock::given(method("POST"))
        .and(path("/api/preclinics"))
        .and(header_eq("content-type", "application/json; charset=utf-8"))
        .and(body_string(payload))
        .respond_with(ResponseTemplate::new(201).set_body_raw(r#"{"id":"pc1"}"#, "application/json"))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = state_for(&upstream.uri());
    let cookie = session_cookie(&state, "T1").await;

    let response = app(&state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/relay/preclinics")
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_bytes(response).await, br#"{"id":"pc1"}"#);
}

#[tokio::test]
async fn test_relay_defaults_content_type_to_json() {
    let upstream = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/invoices/i1"))
        .and(header_eq("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = state_for(&upstream.uri());
    let cookie = session_cookie(&state, "T1").await;

    let response = app(&state)
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/relay/invoices/i1")
                .header(header::COOKIE, cookie)
                .body(Body::from(r#"{"status":"posted"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_relay_delete_sends_no_body() {
    let upstream = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/patients/p1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = state_for(&upstream.uri());
    let cookie = session_cookie(&state, "T1").await;

    let response = app(&state)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/relay/patients/p1")
                .header(header::COOKIE, cookie)
                .body(Body::from("ignored"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].body.is_empty());
}

#[tokio::test]
async fn test_relay_passes_upstream_errors_through_verbatim() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/patients/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("no such patient", "text/plain"))
        .mount(&upstream)
        .await;

    let state = state_for(&upstream.uri());
    let cookie = session_cookie(&state, "T1").await;

    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri("/relay/patients/missing")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(body_bytes(response).await, b"no such patient");
}

#[tokio::test]
async fn test_relay_passes_json_not_found_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/invoices/unknown"))
        .respond_with(
            ResponseTemplate::new(404).set_body_raw(r#"{"error":"not found"}"#, "application/json"),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let state = state_for(&upstream.uri());
    let cookie = session_cookie(&state, "T1").await;

    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri("/relay/invoices/unknown")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_bytes(response).await, br#"{"error":"not found"}"#);
}

#[tokio::test]
async fn test_relay_forwards_bodies_larger_than_the_default_limit() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = state_for(&upstream.uri());
    let cookie = session_cookie(&state, "T1").await;
    let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

    let response = app(&state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/relay/uploads")
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(Body::from(payload.clone()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body.len(), payload.len());
    assert!(received[0].body == payload);
}

#[tokio::test]
async fn test_relay_keeps_encoded_path_segments() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/invoices/INV%202024/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.7".to_vec(), "application/pdf"))
        .expect(1)
        .mount(&upstream)
        .await;

    let state = state_for(&upstream.uri());
    let cookie = session_cookie(&state, "T1").await;

    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri("/relay/invoices/INV%202024/pdf")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    assert_eq!(body_bytes(response).await, b"%PDF-1.7");
}

#[tokio::test]
async fn test_relay_unreachable_upstream_is_502() {
    // Nothing listens on port 1.
    let state = state_for("http://127.0.0.1:1");
    let cookie = session_cookie(&state, "T1").await;

    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri("/relay/patients")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_signed_out_session_cannot_relay() {
    let upstream = MockServer::start().await;
    let state = state_for(&upstream.uri());
    let cookie = session_cookie(&state, "T1").await;

    let signout = app(&state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/signout")
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(signout.status(), StatusCode::SEE_OTHER);

    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri("/relay/patients")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_api_doc_describes_relay_body_as_octet_stream() {
    let upstream = MockServer::start().await;
    let state = state_for(&upstream.uri());

    let response = app(&state)
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let relay = &doc["paths"]["/relay/{path}"];
    assert!(relay["get"].is_object());
    assert!(
        relay["post"]["requestBody"]["content"]["application/octet-stream"].is_object()
    );
    assert!(doc["paths"]["/auth/signout"]["post"].is_object());
    assert!(doc["paths"]["/auth/signout"]["get"].is_null());
}
