//! The unit of capture work and the record it produces.
//!
//! A [`CaptureUnit`] is handed out by the factory once admission succeeds.
//! [`CaptureUnit::prepare`] consumes it, encodes the payload, builds the
//! metadata and returns a [`Capture`]: plain data, ready to be committed on
//! any thread.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::content::{CaptureKind, ContentType};
use crate::context::OperationContext;
use crate::error::{CaptureError, Result};
use crate::metadata::Metadata;

/// One admitted capture attempt.
///
/// Units are only built by [`CaptureFactory`](crate::CaptureFactory), are not
/// `Clone`, and are consumed by [`prepare`](Self::prepare), so each one is
/// written at most once.
#[derive(Debug)]
pub struct CaptureUnit {
    context: Arc<OperationContext>,
    content_type: ContentType,
}

impl CaptureUnit {
    pub(crate) fn new(context: Arc<OperationContext>, content_type: ContentType) -> Self {
        Self {
            context,
            content_type,
        }
    }

    /// Returns the operation this unit captures for.
    pub fn context(&self) -> &OperationContext {
        &self.context
    }

    pub(crate) fn shared_context(&self) -> Arc<OperationContext> {
        Arc::clone(&self.context)
    }

    /// Returns the content type the payload will be encoded as.
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Encodes `payload` and attaches `metadata`, producing a committable record.
    ///
    /// # Errors
    ///
    /// Returns an encode error if `payload` cannot be serialized in the
    /// unit's content type. The unit is consumed either way.
    pub fn prepare<T>(
        self,
        kind: CaptureKind,
        payload: &T,
        metadata: impl Into<Metadata>,
    ) -> Result<Capture>
    where
        T: Serialize + ?Sized,
    {
        let payload = encode(self.content_type, payload)?;
        let key = format!(
            "{}_{}_{}_{}",
            self.context.service_name(),
            self.context.operation_name(),
            kind,
            Uuid::new_v4().simple()
        );

        Ok(Capture {
            key,
            kind,
            context: self.context,
            content_type: self.content_type,
            payload,
            metadata: metadata.into(),
            captured_at: Utc::now(),
        })
    }
}

/// A fully prepared capture, as handed to a [`Sink`](crate::Sink).
///
/// Payload and metadata travel together; a sink commits both or neither.
#[derive(Debug, Clone)]
pub struct Capture {
    key: String,
    kind: CaptureKind,
    context: Arc<OperationContext>,
    content_type: ContentType,
    payload: Vec<u8>,
    metadata: Metadata,
    captured_at: DateTime<Utc>,
}

impl Capture {
    /// Unique key: `{service}_{operation}_{kind}_{id}`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Which half of the exchange this is.
    pub fn kind(&self) -> CaptureKind {
        self.kind
    }

    /// The operation the capture was taken under.
    pub fn context(&self) -> &OperationContext {
        &self.context
    }

    /// Encoding of [`payload`](Self::payload).
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Encoded payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Metadata in insertion order.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// When the payload was encoded.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

fn encode<T>(content_type: ContentType, payload: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let encode_err = |source| CaptureError::Encode {
        content_type,
        source,
    };

    match content_type {
        ContentType::Json => serde_json::to_vec(payload).map_err(encode_err),
        ContentType::Text => match serde_json::to_value(payload).map_err(encode_err)? {
            serde_json::Value::String(text) => Ok(text.into_bytes()),
            other => Err(CaptureError::UnsupportedPayload {
                content_type,
                reason: format!("expected a string, got {}", json_type_name(&other)),
            }),
        },
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
