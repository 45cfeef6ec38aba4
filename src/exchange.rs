//! Capturing both halves of one request/response exchange.
//!
//! The request is offered for capture before the primary call and the
//! response after it. Each half asks the factory separately, so either one
//! can be captured without the other. Whatever happens to the captures, the
//! primary call's return value is passed back untouched.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::background::BackgroundWriter;
use crate::content::CaptureKind;
use crate::context::OperationContext;
use crate::error::Result;
use crate::factory::CaptureFactory;
use crate::metadata::Metadata;
use crate::pipeline::{CapturePipeline, StatsSnapshot, WriteOutcome};

enum Committer {
    Disabled,
    Inline(CapturePipeline),
    Background(BackgroundWriter),
}

/// Wraps primary calls with request and response capture.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use payload_capture::{
///     CaptureFactory, ExchangeRecorder, MemorySink, Metadata, OperationContext, RateGate,
/// };
///
/// let sink = Arc::new(MemorySink::new());
/// let recorder = ExchangeRecorder::new(CaptureFactory::new(sink.clone(), Arc::new(RateGate::new(2))));
/// let ctx = Arc::new(OperationContext::new("ServerService", "getMessageFromServer"));
///
/// let reply = recorder.exchange(
///     &ctx,
///     &"ping",
///     Metadata::from([("name", "Alice")]),
///     |req| format!("{req}-pong"),
///     |resp| Metadata::from([("len", resp.len().to_string())]),
/// );
///
/// assert_eq!(reply, "ping-pong");
/// assert_eq!(sink.len(), 2);
/// ```
pub struct ExchangeRecorder {
    factory: CaptureFactory,
    committer: Committer,
}

impl ExchangeRecorder {
    /// Creates a recorder that commits on the calling thread.
    pub fn new(factory: CaptureFactory) -> Self {
        let committer = match factory.pipeline() {
            Some(pipeline) => Committer::Inline(pipeline),
            None => Committer::Disabled,
        };
        Self { factory, committer }
    }

    /// Creates a recorder that commits on a background worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker cannot be started.
    pub fn in_background(factory: CaptureFactory, queue_capacity: usize) -> Result<Self> {
        let committer = match factory.pipeline() {
            Some(pipeline) => {
                Committer::Background(BackgroundWriter::spawn(pipeline, queue_capacity)?)
            }
            None => Committer::Disabled,
        };
        Ok(Self { factory, committer })
    }

    /// Offers one payload for capture.
    ///
    /// `metadata` is only evaluated when the attempt is admitted. Returns
    /// `None` when no capture was attempted.
    pub fn capture<T, M>(
        &self,
        context: &Arc<OperationContext>,
        kind: CaptureKind,
        payload: &T,
        metadata: M,
    ) -> Option<WriteOutcome>
    where
        T: Serialize + ?Sized,
        M: FnOnce() -> Metadata,
    {
        let unit = self.factory.create(context)?;
        let outcome = match &self.committer {
            Committer::Inline(pipeline) => pipeline.write(unit, kind, payload, metadata()),
            Committer::Background(writer) => writer.write(unit, kind, payload, metadata()),
            // The factory has no sink, so `create` already returned.
            Committer::Disabled => return None,
        };
        Some(outcome)
    }

    /// Runs `call` with request capture before it and response capture after.
    ///
    /// The return value of `call` is returned as is.
    pub fn exchange<Req, Resp, F, M>(
        &self,
        context: &Arc<OperationContext>,
        request: &Req,
        request_metadata: Metadata,
        call: F,
        response_metadata: M,
    ) -> Resp
    where
        Req: Serialize + ?Sized,
        Resp: Serialize,
        F: FnOnce(&Req) -> Resp,
        M: FnOnce(&Resp) -> Metadata,
    {
        self.capture(context, CaptureKind::Request, request, || request_metadata);

        let response = call(request);

        self.capture(context, CaptureKind::Response, &response, || {
            response_metadata(&response)
        });

        response
    }

    /// Returns the factory in use.
    pub fn factory(&self) -> &CaptureFactory {
        &self.factory
    }

    /// Returns the counters so far, or `None` when capture is disabled.
    pub fn stats(&self) -> Option<StatsSnapshot> {
        match &self.committer {
            Committer::Disabled => None,
            Committer::Inline(pipeline) => Some(pipeline.stats()),
            Committer::Background(writer) => Some(writer.stats()),
        }
    }

    /// Stops the background worker, if any, after it drains, and returns
    /// the final counters.
    pub fn shutdown(self) -> Option<StatsSnapshot> {
        match self.committer {
            Committer::Disabled => None,
            Committer::Inline(pipeline) => Some(pipeline.stats()),
            Committer::Background(writer) => Some(writer.shutdown()),
        }
    }
}

impl fmt::Debug for ExchangeRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.committer {
            Committer::Disabled => "disabled",
            Committer::Inline(_) => "inline",
            Committer::Background(_) => "background",
        };
        f.debug_struct("ExchangeRecorder")
            .field("factory", &self.factory)
            .field("mode", &mode)
            .finish()
    }
}
