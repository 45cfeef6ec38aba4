//! Payload format and exchange-half tags.
//!
//! Both tags travel with every committed capture so that a reader of the sink
//! can decode the payload without any out-of-band knowledge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Serialization format of a captured payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ContentType {
    /// `application/json`
    #[default]
    Json,
    /// `text/plain`; the payload must serialize to a single string
    Text,
}

impl ContentType {
    /// Returns the MIME type for this content type.
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Text => "text/plain",
        }
    }

    /// Returns the file extension sinks should use for the payload.
    pub fn extension(&self) -> &'static str {
        match self {
            ContentType::Json => "json",
            ContentType::Text => "txt",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

impl FromStr for ContentType {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "application/json" => Ok(ContentType::Json),
            "text" | "txt" | "text/plain" => Ok(ContentType::Text),
            other => Err(CaptureError::InvalidConfig(format!(
                "unknown content type '{other}'"
            ))),
        }
    }
}

/// Which half of the exchange a capture holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    /// The payload sent by the client
    Request,
    /// The payload returned by the server
    Response,
}

impl CaptureKind {
    /// Returns the lowercase name used in keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureKind::Request => "request",
            CaptureKind::Response => "response",
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
