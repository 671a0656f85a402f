//! Session manager configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default read size requested from an engine stream.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Default number of terminal snapshots kept for progress queries.
pub const DEFAULT_FINISHED_RETENTION: usize = 256;

/// Default minimum spacing of progress events per session.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory all session files are written under.
    pub download_root: PathBuf,
    /// Maximum bytes requested per read.
    pub chunk_size: usize,
    /// How many terminal snapshots to keep before evicting the oldest.
    pub finished_retention: usize,
    /// Minimum spacing between progress events for one session.
    pub progress_interval: Duration,
}

impl SessionConfig {
    /// Configuration rooted at `download_root` with default limits.
    pub fn new(download_root: impl Into<PathBuf>) -> Self {
        Self {
            download_root: download_root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            finished_retention: DEFAULT_FINISHED_RETENTION,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Set the read size. Zero is bumped to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the terminal snapshot retention.
    #[must_use]
    pub const fn with_finished_retention(mut self, retention: usize) -> Self {
        self.finished_retention = retention;
        self
    }

    /// Set the progress event spacing.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
