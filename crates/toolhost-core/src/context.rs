//! Cancellable, logger-carrying context threaded through every I/O-performing
//! call, per the concurrency model: no hidden globals for cancellation.

use tokio_util::sync::CancellationToken;

/// Per-request context. Adapters accept this as their first argument and
/// must observe cancellation, returning a `BACKEND_ERROR` when it fires.
#[derive(Debug, Clone)]
pub struct Context {
    cancellation: CancellationToken,
    request_id: String,
}

impl Context {
    /// Build a fresh, non-cancelled context for one request.
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            request_id: request_id.into(),
        }
    }

    /// The request id, for log correlation.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The cancellation token backend calls should race against.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Cancel this context's in-flight work.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether this context has already been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// A child context sharing this one's cancellation but scoped to a
    /// sub-operation's own request id (e.g. one upstream call within a
    /// larger invocation).
    #[must_use]
    pub fn child(&self, request_id: impl Into<String>) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            request_id: request_id.into(),
        }
    }
}
