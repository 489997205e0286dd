//! Error notification sinks
//!
//! The poll loop recovers from frame errors on its own, but every one of
//! them is reported here first so failures stay visible to whoever drives
//! the loop (a UI status line, a log file, a counter).

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::FrameError;

/// One failed poll cycle.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// Poll cycle number, starting at 1
    pub cycle: u64,
    /// Failures in a row including this one
    pub consecutive: u32,
    pub error: Arc<FrameError>,
}

impl ErrorEvent {
    pub fn is_fatal(&self) -> bool {
        self.error.is_fatal()
    }
}

/// Receiver of poll failures.
///
/// Called from the poll task; implementations must not block.
pub trait ErrorSink: Send + Sync + 'static {
    fn report(&self, event: &ErrorEvent);
}

/// Discards events. The driver still logs them.
impl ErrorSink for () {
    fn report(&self, _event: &ErrorEvent) {}
}

/// Forwards events to a channel; a dropped receiver is ignored.
impl ErrorSink for mpsc::UnboundedSender<ErrorEvent> {
    fn report(&self, event: &ErrorEvent) {
        let _ = self.send(event.clone());
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> ErrorSink for FnSink<F>
where
    F: Fn(&ErrorEvent) + Send + Sync + 'static,
{
    fn report(&self, event: &ErrorEvent) {
        (self.0)(event)
    }
}
