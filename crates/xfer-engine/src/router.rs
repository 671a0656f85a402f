//! Scheme-based engine dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use xfer_core::{EngineError, TransferEngine, TransferHandle};

use crate::config::HttpEngineConfig;
use crate::http::HttpEngine;
use crate::local::LocalEngine;

/// Scheme used for locators that are not URLs (plain paths).
const PATH_SCHEME: &str = "file";

/// Routes each locator to the engine registered for its scheme.
///
/// Locators that do not parse as a URL, or whose scheme is a single letter
/// (a Windows drive), are treated as plain paths and go to `file`.
#[derive(Clone, Default)]
pub struct SchemeRouter {
    engines: HashMap<String, Arc<dyn TransferEngine>>,
}

impl SchemeRouter {
    /// Router with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with the HTTP and local engines registered.
    pub fn with_defaults(http: HttpEngineConfig) -> Result<Self, EngineError> {
        let http: Arc<dyn TransferEngine> = Arc::new(HttpEngine::new(http)?);
        Ok(Self::new()
            .route("http", Arc::clone(&http))
            .route("https", http)
            .route(PATH_SCHEME, Arc::new(LocalEngine::new())))
    }

    /// Register `engine` for `scheme` (case-insensitive), replacing any previous one.
    #[must_use]
    pub fn route(mut self, scheme: &str, engine: Arc<dyn TransferEngine>) -> Self {
        self.engines.insert(scheme.to_ascii_lowercase(), engine);
        self
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.engines.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    fn scheme_of(locator: &str) -> String {
        match Url::parse(locator) {
            Ok(url) if url.scheme().len() > 1 => url.scheme().to_string(),
            _ => PATH_SCHEME.to_string(),
        }
    }
}

#[async_trait]
impl TransferEngine for SchemeRouter {
    async fn open(&self, locator: &str) -> Result<Box<dyn TransferHandle>, EngineError> {
        let scheme = Self::scheme_of(locator);
        let engine = self.engines.get(&scheme).ok_or_else(|| EngineError::Unsupported {
            locator: locator.to_string(),
        })?;
        tracing::trace!(%scheme, "routing locator");
        engine.open(locator).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_detection() {
        assert_eq!(SchemeRouter::scheme_of("https://h/x"), "https");
        assert_eq!(SchemeRouter::scheme_of("HTTP://h/x"), "http");
        assert_eq!(SchemeRouter::scheme_of("magnet:?xt=urn:btih:abc"), "magnet");
        assert_eq!(SchemeRouter::scheme_of("/srv/movie.mkv"), "file");
        assert_eq!(SchemeRouter::scheme_of("relative/movie.mkv"), "file");
        assert_eq!(SchemeRouter::scheme_of(r"C:\media\movie.mkv"), "file");
    }

    #[test]
    fn defaults_register_three_schemes() {
        let router = SchemeRouter::with_defaults(HttpEngineConfig::default()).unwrap();
        assert_eq!(router.schemes(), vec!["file", "http", "https"]);
    }

    #[tokio::test]
    async fn unknown_scheme_is_unsupported() {
        let router = SchemeRouter::with_defaults(HttpEngineConfig::default()).unwrap();
        let err = router.open("magnet:?xt=urn:btih:abc").await.err().unwrap();
        assert!(matches!(err, EngineError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn empty_router_rejects_everything() {
        let err = SchemeRouter::new().open("/tmp/x").await.err().unwrap();
        assert!(matches!(err, EngineError::Unsupported { .. }));
    }
}
