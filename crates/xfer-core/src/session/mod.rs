//! Session domain types, progress accounting, events, and errors.
//!
//! # Structure
//!
//! - `types` - `SessionId` and the `SessionState` machine
//! - `progress` - the per-session byte accumulator
//! - `snapshot` - copies of session state handed out to callers
//! - `events` - session lifecycle events
//! - `errors` - error taxonomy for session operations

pub mod errors;
pub mod events;
pub mod progress;
pub mod snapshot;
pub mod types;

pub use errors::{SessionError, SessionResult};
pub use events::SessionEvent;
pub use progress::{Progress, ProgressError};
pub use snapshot::{ProgressReport, SessionSnapshot};
pub use types::{SessionId, SessionState};
