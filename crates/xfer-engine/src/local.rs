//! Local filesystem transfer engine.
//!
//! Copies a file, or every regular file below a directory, into the
//! download root. Directory resources keep their own name as the first
//! path component so a copy of `/srv/show` lands under `show/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use url::Url;
use walkdir::WalkDir;

use xfer_core::{EngineError, ReadOutcome, ResolvedFile, TransferEngine, TransferHandle, TransferStream};

/// Engine for `file://` locators and plain filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEngine;

impl LocalEngine {
    /// Create a local engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn source_path(locator: &str) -> Result<PathBuf, EngineError> {
    if locator.is_empty() {
        return Err(EngineError::resolve(locator, "empty path"));
    }
    // Single-letter schemes are Windows drive letters, not URLs.
    match Url::parse(locator) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|()| EngineError::resolve(locator, "not a local file URL")),
        Ok(url) if url.scheme().len() > 1 => Err(EngineError::Unsupported {
            locator: locator.to_string(),
        }),
        _ => Ok(PathBuf::from(locator)),
    }
}

#[async_trait]
impl TransferEngine for LocalEngine {
    async fn open(&self, locator: &str) -> Result<Box<dyn TransferHandle>, EngineError> {
        let source = source_path(locator)?;
        Ok(Box::new(LocalHandle {
            locator: locator.to_string(),
            source,
            sources: HashMap::new(),
            closed: false,
        }))
    }
}

struct LocalHandle {
    locator: String,
    source: PathBuf,
    /// Resolved relative path -> absolute source file.
    sources: HashMap<String, PathBuf>,
    closed: bool,
}

/// Relative path with `/` separators regardless of platform.
fn relative_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk `source` and list its regular files, sorted by path.
fn scan(locator: &str, source: &Path) -> Result<Vec<(ResolvedFile, PathBuf)>, EngineError> {
    let metadata = std::fs::metadata(source)
        .map_err(|e| EngineError::resolve(locator, format!("{}: {e}", source.display())))?;

    if metadata.is_file() {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| EngineError::resolve(locator, "path has no file name"))?;
        return Ok(vec![(ResolvedFile::new(name, metadata.len()), source.to_path_buf())]);
    }

    if !metadata.is_dir() {
        return Err(EngineError::resolve(locator, "not a regular file or directory"));
    }

    let base = source.parent().unwrap_or(source);
    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| EngineError::resolve(locator, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry
            .metadata()
            .map_err(|e| EngineError::resolve(locator, e.to_string()))?
            .len();
        let relative = entry
            .path()
            .strip_prefix(base)
            .map_err(|e| EngineError::resolve(locator, e.to_string()))?;
        files.push((ResolvedFile::new(relative_string(relative), size), entry.path().to_path_buf()));
    }
    Ok(files)
}

#[async_trait]
impl TransferHandle for LocalHandle {
    async fn resolve(&mut self) -> Result<Vec<ResolvedFile>, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }

        let locator = self.locator.clone();
        let source = self.source.clone();
        let scanned = tokio::task::spawn_blocking(move || scan(&locator, &source))
            .await
            .map_err(|e| EngineError::resolve(&self.locator, e.to_string()))??;

        tracing::debug!(source = %self.source.display(), files = scanned.len(), "resolved local resource");

        let mut files = Vec::with_capacity(scanned.len());
        self.sources.clear();
        for (file, path) in scanned {
            self.sources.insert(file.path.clone(), path);
            files.push(file);
        }
        Ok(files)
    }

    async fn open_stream(&mut self, file: &ResolvedFile) -> Result<Box<dyn TransferStream>, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        let path = self.sources.get(&file.path).ok_or_else(|| {
            EngineError::resolve(&self.locator, format!("'{}' is not part of this resource", file.path))
        })?;
        let handle = tokio::fs::File::open(path)
            .await
            .map_err(|e| EngineError::from_io_error(&e))?;
        Ok(Box::new(LocalStream { file: Some(handle) }))
    }

    async fn close(&mut self) {
        self.sources.clear();
        self.closed = true;
    }
}

struct LocalStream {
    file: Option<tokio::fs::File>,
}

#[async_trait]
impl TransferStream for LocalStream {
    async fn read(&mut self, max: usize) -> Result<ReadOutcome, EngineError> {
        let Some(file) = self.file.as_mut() else {
            return Err(EngineError::Closed);
        };
        let limit = max.max(1);
        let mut buf = BytesMut::with_capacity(limit);
        let n = (&mut *file)
            .take(limit as u64)
            .read_buf(&mut buf)
            .await
            .map_err(|e| EngineError::from_io_error(&e))?;
        if n == 0 {
            self.file = None;
            return Ok(ReadOutcome::EndOfStream);
        }
        Ok(ReadOutcome::Data(buf.freeze()))
    }

    async fn abort(&mut self) {
        self.file = None;
    }
}
