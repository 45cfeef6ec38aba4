//! Durable destinations for captures.
//!
//! The pipeline only knows the [`Sink`] trait. Two implementations ship with
//! the crate:
//! - [`MemorySink`]: in-process collector for tests and demos
//! - [`DirectorySink`]: one directory per capture on the local filesystem

mod directory;
mod memory;

use std::fmt;

pub use directory::{CaptureManifest, DirectorySink, StoredCapture};
pub use memory::MemorySink;

use crate::unit::Capture;

/// Error returned when a sink fails to commit a capture.
///
/// # Examples
///
/// ```
/// use payload_capture::{SinkError, SinkErrorKind};
///
/// let error = SinkError::with_message(SinkErrorKind::Io, "disk full");
/// assert_eq!(error.kind(), SinkErrorKind::Io);
/// assert_eq!(error.to_string(), "sink error (I/O error): disk full");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    kind: SinkErrorKind,
    message: Option<String>,
}

impl SinkError {
    /// Creates a new sink error with the specified kind.
    pub fn new(kind: SinkErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a new sink error with a custom message.
    pub fn with_message(kind: SinkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> SinkErrorKind {
        self.kind
    }

    /// Returns the error message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(msg) = &self.message {
            write!(f, "sink error ({}): {}", self.kind, msg)
        } else {
            write!(f, "sink error ({})", self.kind)
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::with_message(SinkErrorKind::Io, err.to_string())
    }
}

/// Kind of sink error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    /// I/O error while persisting.
    Io,
    /// Sink is full or has reached capacity.
    Full,
    /// The sink refused this capture.
    Rejected,
    /// The sink no longer accepts captures.
    Closed,
}

impl fmt::Display for SinkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::Full => write!(f, "sink full"),
            Self::Rejected => write!(f, "rejected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A durable destination for captures.
///
/// `commit` persists payload and metadata as one logical unit: after a
/// successful return a reader sees both, after a failure it sees neither.
/// Retrying is the sink's own business; the pipeline never retries.
pub trait Sink: Send + Sync {
    /// Persists one capture.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the capture could not be persisted.
    fn commit(&self, capture: &Capture) -> Result<(), SinkError>;
}

impl<S: Sink + ?Sized> Sink for std::sync::Arc<S> {
    fn commit(&self, capture: &Capture) -> Result<(), SinkError> {
        (**self).commit(capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_error_creation() {
        let error = SinkError::new(SinkErrorKind::Rejected);
        assert_eq!(error.kind(), SinkErrorKind::Rejected);
        assert_eq!(error.message(), None);
    }

    #[test]
    fn sink_error_with_message() {
        let error = SinkError::with_message(SinkErrorKind::Io, "disk full");
        assert_eq!(error.kind(), SinkErrorKind::Io);
        assert_eq!(error.message(), Some("disk full"));
    }

    #[test]
    fn sink_error_kinds_display() {
        assert_eq!(format!("{}", SinkErrorKind::Io), "I/O error");
        assert_eq!(format!("{}", SinkErrorKind::Full), "sink full");
        assert_eq!(format!("{}", SinkErrorKind::Rejected), "rejected");
        assert_eq!(format!("{}", SinkErrorKind::Closed), "closed");
    }

    #[test]
    fn io_errors_map_to_io_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let error = SinkError::from(io);
        assert_eq!(error.kind(), SinkErrorKind::Io);
        assert_eq!(error.message(), Some("nope"));
    }
}
