//! SSE event broadcaster for real-time session updates.
//!
//! The broadcaster implements [`SessionEventEmitterPort`], so the session
//! manager publishes straight into it and every connected client receives
//! the same events.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use xfer_core::{SessionEvent, SessionEventEmitterPort};

/// Default broadcast buffer, in events.
const DEFAULT_CAPACITY: usize = 256;

/// SSE broadcaster that implements the session event emitter port.
///
/// Slow clients may miss events if the buffer overflows; they are skipped,
/// not disconnected.
#[derive(Debug, Clone)]
pub struct SseBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl SseBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a broadcaster with the default capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Create an SSE stream for a new client connection.
    ///
    /// Each event's SSE name is its `type` tag. A keep-alive ping goes out
    /// every 30 seconds to keep proxies from timing the connection out.
    pub fn subscribe(
        self: Arc<Self>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        let receiver = self.sender.subscribe();
        let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event_name(&event)).data(json))),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize session event");
                    None
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "SSE client lagged");
                None
            }
        });

        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
    }

    /// Number of connected clients.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

const fn event_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::SessionStarted { .. } => "session_started",
        SessionEvent::SessionResolved { .. } => "session_resolved",
        SessionEvent::SessionProgress { .. } => "session_progress",
        SessionEvent::SessionCompleted { .. } => "session_completed",
        SessionEvent::SessionCancelled { .. } => "session_cancelled",
        SessionEvent::SessionFailed { .. } => "session_failed",
    }
}

impl SessionEventEmitterPort for SseBroadcaster {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    fn clone_box(&self) -> Box<dyn SessionEventEmitterPort> {
        Box::new(self.clone())
    }
}
