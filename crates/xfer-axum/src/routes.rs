//! Route definitions and router construction.
//!
//! Handlers delegate to the session service held in [`AppState`].

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::auth::require_basic_auth;
use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// All API routes without the `/api` prefix, state not yet applied.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        // Sessions API
        .route("/sessions", post(handlers::sessions::start))
        .route(
            "/sessions/{id}",
            get(handlers::sessions::progress).put(handlers::sessions::restart),
        )
        .route("/sessions/{id}/cancel", post(handlers::sessions::cancel))
        // Completed artifacts
        .route("/completed", get(handlers::artifacts::list_completed))
        .route(
            "/completed/{id}/artifact",
            get(handlers::artifacts::by_session),
        )
        .route("/artifacts/{*path}", get(handlers::artifacts::by_path))
        // Download directory listing
        .route("/files", get(handlers::files::list))
        // Events (SSE)
        .route("/events", get(handlers::events::stream))
}

/// Create the main router: `/health` plus everything under `/api`.
///
/// When the context carries credentials, every `/api` route requires
/// Basic auth. `/health` is always open.
pub fn create_router(ctx: AxumContext, cors_config: &CorsConfig) -> Router {
    let credentials = Arc::clone(&ctx.credentials);
    let state: AppState = Arc::new(ctx);
    let cors = build_cors_layer(cors_config);

    let mut api = api_routes().with_state(state);
    if credentials.is_enabled() {
        api = api.route_layer(middleware::from_fn_with_state(
            credentials,
            require_basic_auth,
        ));
    }

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api.layer(cors))
        .layer(TraceLayer::new_for_http())
}

/// Create a router with API routes and a static UI.
///
/// Unmatched paths fall back to files under `static_dir`, then to its
/// `index.html`.
pub fn create_spa_router<P: AsRef<Path>>(
    ctx: AxumContext,
    static_dir: P,
    cors_config: &CorsConfig,
) -> Router {
    let static_path = static_dir.as_ref();
    let serve_dir = ServeDir::new(static_path).fallback(ServeFile::new(static_path.join("index.html")));
    create_router(ctx, cors_config).fallback_service(serve_dir)
}

/// Health check endpoint.
pub(crate) async fn health_check() -> &'static str {
    "OK"
}
