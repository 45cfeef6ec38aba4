use std::fmt;
use std::sync::Arc;

use crate::config::CaptureConfig;
use crate::content::ContentType;
use crate::context::OperationContext;
use crate::error::Result;
use crate::gate::RateGate;
use crate::logging::CaptureLog;
use crate::pipeline::CapturePipeline;
use crate::sink::Sink;
use crate::unit::CaptureUnit;

/// Hands out capture units, subject to configuration and admission.
///
/// `create` returns `None` in two normal situations, neither of which is an
/// error:
/// - no sink is configured (the gate is not consulted at all)
/// - the rate gate rejects the attempt
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use payload_capture::{CaptureFactory, MemorySink, OperationContext, RateGate};
///
/// let gate = Arc::new(RateGate::new(1));
/// let ctx = Arc::new(OperationContext::new("svc", "op"));
///
/// let disabled = CaptureFactory::with_optional_sink(None, Arc::clone(&gate));
/// assert!(disabled.create(&ctx).is_none());
///
/// let enabled = CaptureFactory::new(Arc::new(MemorySink::new()), gate);
/// assert!(enabled.create(&ctx).is_some()); // the disabled factory spent nothing
/// assert!(enabled.create(&ctx).is_none()); // budget of one is spent
/// ```
#[derive(Clone)]
pub struct CaptureFactory {
    sink: Option<Arc<dyn Sink>>,
    gate: Arc<RateGate>,
    content_type: ContentType,
}

impl CaptureFactory {
    /// Creates an enabled factory capturing to `sink`, gated by `gate`.
    pub fn new(sink: Arc<dyn Sink>, gate: Arc<RateGate>) -> Self {
        Self::with_optional_sink(Some(sink), gate)
    }

    /// Creates a factory that is disabled when `sink` is `None`.
    pub fn with_optional_sink(sink: Option<Arc<dyn Sink>>, gate: Arc<RateGate>) -> Self {
        Self {
            sink,
            gate,
            content_type: ContentType::default(),
        }
    }

    /// Creates a factory that never captures.
    pub fn disabled() -> Self {
        Self::with_optional_sink(None, Arc::new(RateGate::new(0)))
    }

    /// Builds a factory from configuration.
    ///
    /// A disabled configuration yields a factory without a sink even when one
    /// is supplied.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn from_config(config: &CaptureConfig, sink: Option<Arc<dyn Sink>>) -> Result<Self> {
        config.validate()?;
        let sink = if config.enabled { sink } else { None };
        let gate = Arc::new(RateGate::with_window(config.budget, config.window()));
        Ok(Self::with_optional_sink(sink, gate).with_content_type(config.content_type))
    }

    /// Sets the content type given to new units.
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Returns a unit for `context`, or `None` if capture is disabled or
    /// the attempt was not admitted.
    pub fn create(&self, context: &Arc<OperationContext>) -> Option<CaptureUnit> {
        let log = CaptureLog::new(context);
        if self.sink.is_none() {
            log.trace(format_args!("capture disabled: no sink configured"));
            return None;
        }
        if !self.gate.admit() {
            log.trace(format_args!("capture skipped: not admitted"));
            return None;
        }
        Some(CaptureUnit::new(Arc::clone(context), self.content_type))
    }

    /// Returns a pipeline writing to this factory's sink, if there is one.
    pub fn pipeline(&self) -> Option<CapturePipeline> {
        self.sink.clone().map(CapturePipeline::new)
    }

    /// Returns `true` if a sink is configured.
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Returns the content type given to new units.
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns the shared rate gate.
    pub fn gate(&self) -> &Arc<RateGate> {
        &self.gate
    }
}

impl fmt::Debug for CaptureFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureFactory")
            .field("enabled", &self.is_enabled())
            .field("gate", &self.gate)
            .field("content_type", &self.content_type)
            .finish()
    }
}
