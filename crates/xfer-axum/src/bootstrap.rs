//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where the engine, the session manager and
//! the SSE broadcaster are wired together for the web adapter.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use xfer_core::{SessionConfig, SessionServicePort, TransferEngine};
use xfer_engine::{HttpEngineConfig, SchemeRouter};
use xfer_session::{SessionManager, SessionManagerDeps, build_session_manager};

use crate::auth::Credentials;
use crate::listing::DEFAULT_EXTENSIONS;
use crate::sse::SseBroadcaster;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the HTTP server.
    pub port: u16,
    /// Address to bind.
    pub bind: IpAddr,
    /// Session manager settings, including the download root.
    pub session: SessionConfig,
    /// Users allowed on `/api/*`. Empty disables auth.
    pub credentials: Credentials,
    /// Optional path to static assets for a browser UI.
    pub static_dir: Option<PathBuf>,
    /// CORS configuration.
    pub cors: CorsConfig,
    /// File extensions shown by the directory listing.
    pub listing_extensions: Vec<String>,
}

impl ServerConfig {
    /// Config serving `download_root` on the default port, auth disabled.
    pub fn new(download_root: impl Into<PathBuf>) -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            session: SessionConfig::new(download_root),
            credentials: Credentials::none(),
            static_dir: None,
            cors: CorsConfig::default(),
            listing_extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Set the listen port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bind address.
    #[must_use]
    pub const fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Require these credentials on `/api/*`.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the static directory for UI serving.
    #[must_use]
    pub fn with_static_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(path.into());
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }

    /// Replace the listed extensions.
    #[must_use]
    pub fn with_listing_extensions(mut self, extensions: Vec<String>) -> Self {
        self.listing_extensions = extensions;
        self
    }

    /// Socket address to listen on.
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    /// Session service as trait object (what handlers call).
    pub sessions: Arc<dyn SessionServicePort>,
    /// Concrete manager, for shutdown and waiting.
    pub manager: Arc<SessionManager>,
    /// SSE broadcaster for real-time events.
    pub sse: Arc<SseBroadcaster>,
    /// Users allowed on `/api/*`.
    pub credentials: Arc<Credentials>,
    /// Root the listing and path-based artifact fetch are confined to.
    pub download_root: PathBuf,
    /// File extensions shown by the directory listing.
    pub listing_extensions: Vec<String>,
}

/// Wire a context around an already-built engine.
pub fn bootstrap_with_engine<T>(config: &ServerConfig, engine: Arc<T>) -> AxumContext
where
    T: TransferEngine + 'static,
{
    let sse = Arc::new(SseBroadcaster::with_defaults());
    let manager = Arc::new(build_session_manager(SessionManagerDeps {
        engine,
        event_emitter: Arc::clone(&sse),
        config: config.session.clone(),
    }));
    let sessions: Arc<dyn SessionServicePort> = manager.clone();

    AxumContext {
        sessions,
        manager,
        sse,
        credentials: Arc::new(config.credentials.clone()),
        download_root: config.session.download_root.clone(),
        listing_extensions: config.listing_extensions.clone(),
    }
}

/// Bootstrap the server with the default engines.
///
/// Creates the download root if needed.
pub async fn bootstrap(config: &ServerConfig) -> Result<AxumContext> {
    let root = &config.session.download_root;
    tokio::fs::create_dir_all(root)
        .await
        .with_context(|| format!("creating download root {}", root.display()))?;

    let engine = Arc::new(SchemeRouter::with_defaults(HttpEngineConfig::default())?);
    tracing::info!(
        download_root = %root.display(),
        schemes = ?engine.schemes(),
        auth_enabled = config.credentials.is_enabled(),
        "Axum bootstrap resolved configuration"
    );
    Ok(bootstrap_with_engine(config, engine))
}

/// Start the web server and run until Ctrl-C.
///
/// On shutdown every session is cancelled and the call returns only after
/// all workers have cleaned up.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let ctx = bootstrap(&config).await?;
    let manager = Arc::clone(&ctx.manager);

    let app = if let Some(ref static_dir) = config.static_dir {
        tracing::info!("Serving static assets from: {}", static_dir.display());
        crate::routes::create_spa_router(ctx, static_dir, &config.cors)
    } else {
        crate::routes::create_router(ctx, &config.cors)
    };

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("xferd listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
