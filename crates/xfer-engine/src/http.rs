//! HTTP(S) transfer engine.
//!
//! One URL is one file. Resolution issues the `GET` (with retry for
//! transient errors) and reads the size from `Content-Length`; the open
//! response is then handed to the first stream so the body is fetched once.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_LENGTH;
use url::Url;

use xfer_core::{EngineError, ReadOutcome, ResolvedFile, TransferEngine, TransferHandle, TransferStream};

use crate::config::HttpEngineConfig;

/// File name used when the URL path has no usable last segment.
const FALLBACK_FILE_NAME: &str = "download.bin";

/// Engine for `http://` and `https://` locators.
#[derive(Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    config: HttpEngineConfig,
}

impl HttpEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: HttpEngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| EngineError::io("ClientBuild", e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TransferEngine for HttpEngine {
    async fn open(&self, locator: &str) -> Result<Box<dyn TransferHandle>, EngineError> {
        let url = Url::parse(locator).map_err(|e| EngineError::resolve(locator, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EngineError::Unsupported {
                locator: locator.to_string(),
            });
        }
        Ok(Box::new(HttpHandle {
            client: self.client.clone(),
            config: self.config.clone(),
            url,
            file: None,
            response: None,
            closed: false,
        }))
    }
}

/// Extract the target file name from the last path segment of `url`.
///
/// Percent-encoding is decoded; empty, `.` and `..` segments fall back to
/// `download.bin`.
pub fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| urlencoding::decode(last).ok())
        .map(|name| name.replace(['/', '\\'], "_"))
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// Longest wait between two attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (1-based): the base delay doubled per
/// earlier retry, saturating and capped at [`MAX_RETRY_DELAY`].
fn retry_delay(base_ms: u64, attempt: u8) -> Duration {
    let factor = 2u64.saturating_pow(u32::from(attempt.saturating_sub(1)));
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_RETRY_DELAY)
}

struct HttpHandle {
    client: reqwest::Client,
    config: HttpEngineConfig,
    url: Url,
    file: Option<ResolvedFile>,
    response: Option<reqwest::Response>,
    closed: bool,
}

impl HttpHandle {
    /// `GET` the URL, retrying 5xx and network errors with exponential backoff.
    async fn get_with_retry(&self) -> Result<reqwest::Response, EngineError> {
        let locator = self.url.as_str();
        let mut last_error: Option<EngineError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay(self.config.retry_base_delay_ms, attempt)).await;
            }

            match self.client.get(self.url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let err = EngineError::resolve(locator, format!("server returned {status}"));
                    if status.is_server_error() && attempt < self.config.max_retries {
                        tracing::debug!(url = %self.url, %status, attempt, "retrying request");
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = EngineError::resolve(locator, e.to_string());
                    if attempt < self.config.max_retries {
                        tracing::debug!(url = %self.url, error = %e, attempt, "retrying request");
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| EngineError::resolve(locator, "request was not attempted")))
    }
}

fn content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

#[async_trait]
impl TransferHandle for HttpHandle {
    async fn resolve(&mut self) -> Result<Vec<ResolvedFile>, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        if let Some(file) = &self.file {
            return Ok(vec![file.clone()]);
        }

        let response = self.get_with_retry().await?;
        let size = content_length(&response).ok_or_else(|| {
            EngineError::resolve(self.url.as_str(), "server did not report Content-Length")
        })?;
        let file = ResolvedFile::new(file_name_from_url(&self.url), size);

        tracing::debug!(url = %self.url, file = %file.path, size, "resolved http resource");
        self.file = Some(file.clone());
        self.response = Some(response);
        Ok(vec![file])
    }

    async fn open_stream(&mut self, file: &ResolvedFile) -> Result<Box<dyn TransferStream>, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        if self.file.as_ref() != Some(file) {
            return Err(EngineError::resolve(
                self.url.as_str(),
                format!("'{}' is not part of this resource", file.path),
            ));
        }
        let response = match self.response.take() {
            Some(response) => response,
            None => self.get_with_retry().await?,
        };
        Ok(Box::new(HttpStream {
            response: Some(response),
            pending: Bytes::new(),
        }))
    }

    async fn close(&mut self) {
        self.response = None;
        self.closed = true;
    }
}

struct HttpStream {
    response: Option<reqwest::Response>,
    pending: Bytes,
}

#[async_trait]
impl TransferStream for HttpStream {
    async fn read(&mut self, max: usize) -> Result<ReadOutcome, EngineError> {
        if self.pending.is_empty() {
            let Some(response) = self.response.as_mut() else {
                return Err(EngineError::Closed);
            };
            match response.chunk().await {
                Ok(Some(chunk)) if chunk.is_empty() => return Ok(ReadOutcome::Empty),
                Ok(Some(chunk)) => self.pending = chunk,
                Ok(None) => {
                    self.response = None;
                    return Ok(ReadOutcome::EndOfStream);
                }
                Err(e) => return Err(EngineError::io("Network", e.to_string())),
            }
        }

        let take = self.pending.len().min(max.max(1));
        Ok(ReadOutcome::Data(self.pending.split_to(take)))
    }

    async fn abort(&mut self) {
        self.response = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(url: &str) -> String {
        file_name_from_url(&Url::parse(url).unwrap())
    }

    #[test]
    fn retry_delay_doubles_then_caps() {
        assert_eq!(retry_delay(250, 1), Duration::from_millis(250));
        assert_eq!(retry_delay(250, 3), Duration::from_millis(1000));
        assert_eq!(retry_delay(250, 200), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(u64::MAX, 255), MAX_RETRY_DELAY);
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(name("https://host/media/movie.mkv"), "movie.mkv");
        assert_eq!(name("https://host/a/b/clip.mp4?token=1"), "clip.mp4");
    }

    #[test]
    fn file_name_is_percent_decoded() {
        assert_eq!(name("http://host/My%20Show.mkv"), "My Show.mkv");
        assert_eq!(name("http://host/a%2Fb.bin"), "a_b.bin");
    }

    #[test]
    fn file_name_falls_back() {
        assert_eq!(name("http://host/"), FALLBACK_FILE_NAME);
        assert_eq!(name("http://host"), FALLBACK_FILE_NAME);
        assert_eq!(name("http://host/dir/.."), FALLBACK_FILE_NAME);
    }

    #[tokio::test]
    async fn non_http_scheme_is_unsupported() {
        let engine = HttpEngine::new(HttpEngineConfig::default()).unwrap();
        let err = engine.open("ftp://host/file").await.err().unwrap();
        assert!(matches!(err, EngineError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn malformed_url_is_resolution_error() {
        let engine = HttpEngine::new(HttpEngineConfig::default()).unwrap();
        let err = engine.open("not a url").await.err().unwrap();
        assert!(matches!(err, EngineError::Resolve { .. }));
    }
}
