//! Error types for sensor polling.
//!
//! Two layers of errors exist:
//!
//! - [`FrameError`] covers everything that can go wrong inside one poll cycle:
//!   waiting for a start byte, collecting a frame, and validating it. All
//!   variants except [`FrameError::TransportClosed`] are transient; the poll
//!   loop reports them and carries on.
//! - [`LinkError`] covers set-up and shutdown: opening a port, loading a
//!   configuration file, joining the poll task. Frame errors convert into it
//!   with `?`.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use sensorlink::FrameError;
//!
//! let error = FrameError::checksum_mismatch(0x1234, 0x4321, vec![0x01, 0x03]);
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for set-up level operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Failure of a single frame exchange.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FrameError {
    #[error("No start byte within {waited:?} ({discarded} bytes discarded)")]
    Timeout { waited: Duration, discarded: usize },

    #[error("Incomplete frame: expected {expected} bytes, received {received}")]
    IncompleteFrame { expected: usize, received: usize, bytes: Vec<u8> },

    #[error("Unexpected device address {found:#04x} (expected {expected:#04x})")]
    UnexpectedAddress { expected: u8, found: u8, bytes: Vec<u8> },

    #[error("CRC mismatch: received {received:#06x}, calculated {calculated:#06x}")]
    ChecksumMismatch { calculated: u16, received: u16, bytes: Vec<u8> },

    #[error("Transport closed: {reason}")]
    TransportClosed {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FrameError {
    /// Returns whether the poll loop may retry after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            FrameError::Timeout { .. } => true,
            FrameError::IncompleteFrame { .. } => true,
            FrameError::UnexpectedAddress { .. } => true,
            FrameError::ChecksumMismatch { .. } => true,
            FrameError::TransportClosed { .. } => false,
        }
    }

    /// Returns whether this error terminates the poll loop.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// Raw bytes of the offending frame, when one was collected.
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        match self {
            FrameError::IncompleteFrame { bytes, .. }
            | FrameError::UnexpectedAddress { bytes, .. }
            | FrameError::ChecksumMismatch { bytes, .. } => Some(bytes),
            FrameError::Timeout { .. } | FrameError::TransportClosed { .. } => None,
        }
    }

    /// Short stable label, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::Timeout { .. } => "timeout",
            FrameError::IncompleteFrame { .. } => "incomplete_frame",
            FrameError::UnexpectedAddress { .. } => "unexpected_address",
            FrameError::ChecksumMismatch { .. } => "checksum_mismatch",
            FrameError::TransportClosed { .. } => "transport_closed",
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            FrameError::Timeout { .. } => vec![
                "Check the sensor is powered and wired to the port",
                "Verify the baud rate matches the device",
                "Increase the scan timeout",
            ],
            FrameError::IncompleteFrame { .. } => vec![
                "Increase the frame timeout",
                "Check for loose wiring or intermittent contact",
                "Verify the configured response length",
            ],
            FrameError::UnexpectedAddress { .. } => vec![
                "Check for other devices talking on the shared bus",
                "Verify the configured device address",
            ],
            FrameError::ChecksumMismatch { .. } => vec![
                "Check cable shielding and termination",
                "Lower the baud rate on noisy lines",
                "Verify the configured response layout",
            ],
            FrameError::TransportClosed { .. } => vec![
                "Check the adapter is still plugged in",
                "Reopen the serial port",
                "Check port permissions",
            ],
        }
    }

    /// Helper constructor for checksum failures.
    pub fn checksum_mismatch(calculated: u16, received: u16, bytes: Vec<u8>) -> Self {
        FrameError::ChecksumMismatch { calculated, received, bytes }
    }

    /// Helper constructor for transport loss.
    pub fn transport_closed(reason: impl Into<String>) -> Self {
        FrameError::TransportClosed { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport loss with source.
    pub fn transport_closed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        FrameError::TransportClosed { reason: reason.into(), source: Some(source) }
    }
}

/// Io failures that leave the link usable; the cycle is retried.
pub(crate) fn is_transient_io(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(kind, ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock)
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        if is_transient_io(err.kind()) {
            return FrameError::Timeout { waited: Duration::ZERO, discarded: 0 };
        }
        FrameError::transport_closed_with_source(err.to_string(), Box::new(err))
    }
}

/// Errors raised while setting up or tearing down a sensor link.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Failed to open sensor link: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid configuration in {context}: {details}")]
    Config { context: String, details: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Poll task failed: {details}")]
    Task { details: String },
}

impl LinkError {
    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        LinkError::File { path, source }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LinkError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config(context: impl Into<String>, details: impl Into<String>) -> Self {
        LinkError::Config { context: context.into(), details: details.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn messages_carry_their_context(
            expected in any::<u8>(),
            found in any::<u8>(),
            calculated in any::<u16>(),
            received in any::<u16>(),
            reason in ".*",
          ) {
            let address = FrameError::UnexpectedAddress { expected, found, bytes: vec![found] };
            let msg = address.to_string();
            let expected_hex = format!("{:#04x}", expected);
            let found_hex = format!("{:#04x}", found);
            prop_assert!(msg.contains(&expected_hex));
            prop_assert!(msg.contains(&found_hex));

            let crc = FrameError::checksum_mismatch(calculated, received, vec![]);
            let msg = crc.to_string();
            let calculated_hex = format!("{:#06x}", calculated);
            let received_hex = format!("{:#06x}", received);
            prop_assert!(msg.contains(&calculated_hex));
            prop_assert!(msg.contains(&received_hex));

            let closed = FrameError::transport_closed(reason.clone());
            prop_assert!(closed.to_string().contains(&reason));
          }

          #[test]
          fn only_transport_loss_is_fatal(waited_ms in 0u64..10_000, discarded in 0usize..1024) {
            let timeout = FrameError::Timeout { waited: Duration::from_millis(waited_ms), discarded };
            prop_assert!(timeout.is_retryable());
            prop_assert!(!timeout.is_fatal());
            prop_assert!(FrameError::transport_closed("gone").is_fatal());
          }
        }
    }

    #[test]
    fn raw_bytes_exposed_for_frame_failures() {
        let err = FrameError::IncompleteFrame { expected: 7, received: 3, bytes: vec![1, 3, 2] };
        assert_eq!(err.raw_bytes(), Some(&[1u8, 3, 2][..]));

        let err = FrameError::Timeout { waited: Duration::from_secs(1), discarded: 4 };
        assert_eq!(err.raw_bytes(), None);
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<FrameError>();
        assert_send_sync_static::<LinkError>();

        let error = FrameError::transport_closed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_suggestions_are_descriptive() {
        let errors = [
            FrameError::Timeout { waited: Duration::from_millis(10), discarded: 0 },
            FrameError::IncompleteFrame { expected: 7, received: 1, bytes: vec![1] },
            FrameError::UnexpectedAddress { expected: 1, found: 2, bytes: vec![2] },
            FrameError::checksum_mismatch(1, 2, vec![]),
            FrameError::transport_closed("unplugged"),
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
            assert!(!error.kind().is_empty());
        }
    }

    #[test]
    fn io_errors_become_transport_loss() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "device removed");
        let err: FrameError = io_err.into();
        assert!(matches!(err, FrameError::TransportClosed { .. }));
        assert!(std::error::Error::source(&err).is_some());

        let link: LinkError = err.into();
        assert!(matches!(link, LinkError::Frame(FrameError::TransportClosed { .. })));
        assert!(link.to_string().contains("device removed"));
    }

    #[test]
    fn transient_io_errors_are_retryable() {
        use std::io::{Error, ErrorKind};
        for kind in [ErrorKind::TimedOut, ErrorKind::Interrupted, ErrorKind::WouldBlock] {
            let err = FrameError::from(Error::from(kind));
            assert_eq!(err.kind(), "timeout", "{kind:?}");
            assert!(err.is_retryable());
        }
        for kind in [ErrorKind::BrokenPipe, ErrorKind::NotFound, ErrorKind::PermissionDenied] {
            assert!(FrameError::from(Error::from(kind)).is_fatal(), "{kind:?}");
        }
    }
}
