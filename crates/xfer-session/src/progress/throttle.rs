//! Progress throttling.
//!
//! Keeps a fast transfer from flooding event subscribers.

use std::time::{Duration, Instant};

/// Rate-limiter for progress events of one session.
///
/// The first check always passes; afterwards at most one check per
/// `min_interval` does.
#[derive(Debug)]
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    /// Create a throttle with the given minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    /// Whether an event may go out now. Records the emission if so.
    pub fn should_emit(&mut self) -> bool {
        let now = Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Let the next check pass regardless of timing.
    pub const fn reset(&mut self) {
        self.last_emit = None;
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(xfer_core::config::DEFAULT_PROGRESS_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_check_passes() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert!(throttle.should_emit());
        assert!(!throttle.should_emit());
    }

    #[test]
    fn passes_again_after_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(20));
        assert!(throttle.should_emit());
        std::thread::sleep(Duration::from_millis(30));
        assert!(throttle.should_emit());
    }

    #[test]
    fn zero_interval_never_blocks() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO);
        assert!(throttle.should_emit());
        assert!(throttle.should_emit());
    }

    #[test]
    fn reset_reopens() {
        let mut throttle = ProgressThrottle::default();
        throttle.should_emit();
        throttle.reset();
        assert!(throttle.should_emit());
    }
}
