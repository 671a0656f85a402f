//! Shared fixtures for router integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use xfer_axum::{AxumContext, CorsConfig, Credentials, ServerConfig, bootstrap_with_engine, create_router};
use xfer_session::SessionManager;
use xfer_session::testing::ScriptedEngine;

/// A router over a scripted engine and a temporary download root.
pub struct TestApp {
    pub dir: TempDir,
    pub engine: ScriptedEngine,
    pub manager: Arc<SessionManager>,
    pub router: Router,
}

impl TestApp {
    pub fn new(engine: ScriptedEngine) -> Self {
        Self::with_credentials(engine, Credentials::none())
    }

    pub fn with_credentials(engine: ScriptedEngine, credentials: Credentials) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new(dir.path()).with_credentials(credentials);
        let ctx: AxumContext = bootstrap_with_engine(&config, Arc::new(engine.clone()));
        let manager = Arc::clone(&ctx.manager);
        let router = create_router(ctx, &CorsConfig::AllowAll);
        Self {
            dir,
            engine,
            manager,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, json: serde_json::Value) -> Response<Body> {
        self.send(json_request("POST", uri, &json)).await
    }

    pub async fn put_json(&self, uri: &str, json: serde_json::Value) -> Response<Body> {
        self.send(json_request("PUT", uri, &json)).await
    }
}

pub fn json_request(method: &str, uri: &str, json: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
