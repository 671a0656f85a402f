//! Progress event helpers.

mod throttle;

pub use throttle::ProgressThrottle;
