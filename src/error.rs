use thiserror::Error;

use crate::content::ContentType;
use crate::sink::SinkError;

/// Errors that can occur while preparing or committing a capture.
///
/// None of these ever reach the observed operation: [`CapturePipeline`]
/// folds them into a [`WriteOutcome`] and logs them.
///
/// [`CapturePipeline`]: crate::CapturePipeline
/// [`WriteOutcome`]: crate::WriteOutcome
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The payload could not be serialized in the declared content type.
    #[error("failed to encode payload as {content_type}: {source}")]
    Encode {
        /// The content type the payload was encoded as
        content_type: ContentType,
        /// The underlying serializer error
        #[source]
        source: serde_json::Error,
    },

    /// The payload has a shape the content type cannot carry.
    #[error("payload cannot be represented as {content_type}: {reason}")]
    UnsupportedPayload {
        /// The content type the payload was encoded as
        content_type: ContentType,
        /// Why the payload was rejected
        reason: String,
    },

    /// The sink refused or failed to persist the capture.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The TOML configuration could not be parsed.
    #[error("invalid capture configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid capture configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem error outside of a sink commit.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Returns `true` if the error happened while serializing the payload.
    pub fn is_encode(&self) -> bool {
        matches!(
            self,
            CaptureError::Encode { .. } | CaptureError::UnsupportedPayload { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = CaptureError> = std::result::Result<T, E>;
