//! Integration tests for HTTP Basic authentication.
//!
//! Verifies that:
//! - `/api/*` requires credentials when a credential set is configured
//! - failures carry the `WWW-Authenticate` challenge
//! - `/health` stays open

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use common::{TestApp, body_json};
use xfer_axum::Credentials;
use xfer_session::testing::ScriptedEngine;

fn secured() -> TestApp {
    TestApp::with_credentials(
        ScriptedEngine::new(),
        Credentials::parse(["alice:secret"]).unwrap(),
    )
}

fn with_auth(uri: &str, user: &str, password: &str) -> Request<Body> {
    let token = STANDARD.encode(format!("{user}:{password}"));
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Basic {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_no_auth_required() {
    let app = secured();
    assert_eq!(app.get("/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_endpoint_requires_auth() {
    let app = secured();
    let response = app.get("/api/completed").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        "Basic realm=\"xferd\""
    );
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = secured();
    let response = app
        .send(with_auth("/api/completed", "alice", "guess"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_credentials_pass() {
    let app = secured();
    let response = app
        .send(with_auth("/api/completed", "alice", "secret"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn no_credentials_means_open_api() {
    let app = TestApp::new(ScriptedEngine::new());
    assert_eq!(app.get("/api/completed").await.status(), StatusCode::OK);
}
