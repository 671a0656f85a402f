//! Session event emitter port.
//!
//! Lets the session worker publish events without knowing the transport
//! (SSE, terminal, nothing).

use crate::session::SessionEvent;

/// Port for emitting session events.
///
/// Implementations must not block.
pub trait SessionEventEmitterPort: Send + Sync {
    /// Emit a session event.
    fn emit(&self, event: SessionEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn SessionEventEmitterPort>;
}

/// Emitter that discards everything. Used by the CLI and in tests.
#[derive(Debug, Clone, Default)]
pub struct NoopSessionEmitter;

impl NoopSessionEmitter {
    /// Create a new no-op emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SessionEventEmitterPort for NoopSessionEmitter {
    fn emit(&self, _event: SessionEvent) {}

    fn clone_box(&self) -> Box<dyn SessionEventEmitterPort> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;

    #[test]
    fn noop_emitter_accepts_events() {
        let emitter = NoopSessionEmitter::new();
        emitter.emit(SessionEvent::SessionCancelled {
            id: SessionId::generate(),
        });
        let boxed = emitter.clone_box();
        boxed.emit(SessionEvent::SessionCancelled {
            id: SessionId::generate(),
        });
    }
}
