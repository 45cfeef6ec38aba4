//! Capture configuration.
//!
//! The whole configuration surface is small: whether capture is on, the rate
//! gate's budget and window, the payload content type, and the size of the
//! background queue.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::content::ContentType;
use crate::error::{CaptureError, Result};

/// Default number of captures admitted per window.
pub const DEFAULT_BUDGET: u32 = 2;
/// Default window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 1_000;
/// Default background queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Settings for the capture subsystem.
///
/// Every field has a default, so an empty document is a valid configuration.
///
/// # Examples
///
/// ```
/// use payload_capture::{CaptureConfig, ContentType};
///
/// let config = CaptureConfig::from_toml_str(r#"
///     budget = 10
///     window_ms = 500
///     content_type = "json"
/// "#).unwrap();
///
/// assert!(config.enabled);
/// assert_eq!(config.budget, 10);
/// assert_eq!(config.window().as_millis(), 500);
/// assert_eq!(config.content_type, ContentType::Json);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Master switch; `false` behaves as if no sink were configured
    pub enabled: bool,
    /// Captures admitted per window
    pub budget: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Encoding used for payloads
    pub content_type: ContentType,
    /// Captures the background writer may hold before dropping
    pub queue_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            budget: DEFAULT_BUDGET,
            window_ms: DEFAULT_WINDOW_MS,
            content_type: ContentType::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl CaptureConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the document does not parse (including unknown
    /// keys) and `InvalidConfig` if a value is out of range.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: CaptureConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero window or a zero queue capacity.
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            return Err(CaptureError::InvalidConfig(
                "window_ms must be greater than zero".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(CaptureError::InvalidConfig(
                "queue_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Returns the window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}
