//! Rate-limited side-channel capture of request and response payloads.
//!
//! This crate copies the body of a request and/or response, together with
//! caller-supplied metadata, to a durable sink while the observed operation
//! carries on. Capturing is opportunistic:
//! - **Admission**: a shared [`RateGate`] caps how many captures happen per
//!   window; under load captures are skipped, never queued or blocked on
//! - **Isolation**: encode and sink failures are logged and counted, never
//!   returned to the observed operation
//! - **Atomicity**: a sink commits payload and metadata together or not at all
//!
//! # Core Types
//!
//! - [`CaptureFactory`]: hands out a [`CaptureUnit`] when a sink is configured
//!   and the gate admits the attempt
//! - [`CapturePipeline`]: encodes the payload, attaches [`Metadata`] and commits
//!   the resulting [`Capture`] to a [`Sink`]
//! - [`BackgroundWriter`]: moves the commit step onto a worker thread
//! - [`ExchangeRecorder`]: captures both halves of a request/response call
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use payload_capture::{
//!     CaptureFactory, CaptureKind, ContentType, MemorySink, OperationContext, RateGate,
//! };
//!
//! let sink = Arc::new(MemorySink::new());
//! let factory = CaptureFactory::new(sink.clone(), Arc::new(RateGate::new(2)));
//! let pipeline = factory.pipeline().expect("sink configured");
//!
//! let ctx = Arc::new(OperationContext::new("ServerService", "getMessageFromServer"));
//!
//! // Absence is the normal "skip" path, not an error.
//! if let Some(unit) = factory.create(&ctx) {
//!     pipeline.write(unit, CaptureKind::Request, &["hello"], [("name", "Alice")]);
//! }
//!
//! let captures = sink.captures();
//! assert_eq!(captures.len(), 1);
//! assert_eq!(captures[0].content_type(), ContentType::Json);
//! assert_eq!(captures[0].metadata().get("name"), Some(Some("Alice")));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod background;
mod config;
mod content;
mod context;
mod error;
mod exchange;
mod factory;
mod gate;
mod logging;
mod metadata;
mod pipeline;
mod sink;
mod unit;

pub use background::BackgroundWriter;
pub use config::{CaptureConfig, DEFAULT_BUDGET, DEFAULT_QUEUE_CAPACITY, DEFAULT_WINDOW_MS};
pub use content::{CaptureKind, ContentType};
pub use context::OperationContext;
pub use error::{CaptureError, Result};
pub use exchange::ExchangeRecorder;
pub use factory::CaptureFactory;
pub use gate::{Clock, ManualClock, RateGate, SystemClock, DEFAULT_WINDOW};
pub use metadata::Metadata;
pub use pipeline::{CapturePipeline, StatsSnapshot, WriteOutcome};
pub use sink::{
    CaptureManifest, DirectorySink, MemorySink, Sink, SinkError, SinkErrorKind, StoredCapture,
};
pub use unit::{Capture, CaptureUnit};
