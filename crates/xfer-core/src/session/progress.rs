//! Per-session byte accounting.
//!
//! `Progress` is a plain value: the registry owns one per active session and
//! mutates it only while holding its lock.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected progress mutation.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    /// `set_total` was already called for this session.
    #[error("total size already set to {total} bytes")]
    TotalAlreadySet {
        /// The total recorded by the first call.
        total: u64,
    },

    /// The update would push `downloaded` past the known total.
    #[error("{downloaded} bytes exceeds resolved total of {total} bytes")]
    ExceedsTotal {
        /// Downloaded bytes the update would have produced.
        downloaded: u64,
        /// Resolved total.
        total: u64,
    },
}

/// Bytes transferred against the expected total.
///
/// Maintains `downloaded <= total` once the total is known. The total is
/// `0` until [`Progress::set_total`] runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    downloaded: u64,
    total: u64,
    total_known: bool,
}

impl Progress {
    /// Fresh accumulator: nothing downloaded, total unknown.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            downloaded: 0,
            total: 0,
            total_known: false,
        }
    }

    /// Bytes transferred so far.
    #[must_use]
    pub const fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Expected total bytes (`0` until known).
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Whether [`Progress::set_total`] has run.
    #[must_use]
    pub const fn total_known(&self) -> bool {
        self.total_known
    }

    /// Record the resolved total. Allowed once.
    pub const fn set_total(&mut self, total: u64) -> Result<(), ProgressError> {
        if self.total_known {
            return Err(ProgressError::TotalAlreadySet { total: self.total });
        }
        if self.downloaded > total {
            return Err(ProgressError::ExceedsTotal {
                downloaded: self.downloaded,
                total,
            });
        }
        self.total = total;
        self.total_known = true;
        Ok(())
    }

    /// Add `n` transferred bytes.
    ///
    /// Before the total is known bytes simply accumulate. Afterwards an
    /// update that would exceed the total is rejected and leaves the
    /// counter untouched.
    pub fn advance(&mut self, n: u64) -> Result<u64, ProgressError> {
        let next = self.downloaded.saturating_add(n);
        if self.total_known && next > self.total {
            return Err(ProgressError::ExceedsTotal {
                downloaded: next,
                total: self.total,
            });
        }
        self.downloaded = next;
        Ok(next)
    }

    /// Whole-number percentage, `floor(downloaded * 100 / total)`.
    ///
    /// Pinned to `0` while the total is zero; no division happens in that case.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = u128::from(self.downloaded) * 100 / u128::from(self.total);
        u8::try_from(pct.min(100)).unwrap_or(100)
    }

    /// Whether every expected byte has arrived.
    ///
    /// True immediately for a known total of zero.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total_known && self.downloaded == self.total
    }
}
