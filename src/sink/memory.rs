use std::sync::{Mutex, MutexGuard};

use super::{Sink, SinkError, SinkErrorKind};
use crate::unit::Capture;

/// A sink that keeps committed captures in memory.
///
/// `MemorySink` is thread-safe and is mostly useful in tests and demos. It
/// can also be built in a failing mode where every commit is refused, to
/// exercise the pipeline's failure isolation.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use payload_capture::{
///     CaptureFactory, CaptureKind, CapturePipeline, MemorySink, OperationContext, RateGate,
/// };
///
/// let sink = Arc::new(MemorySink::new());
/// let factory = CaptureFactory::new(sink.clone(), Arc::new(RateGate::new(1)));
/// let pipeline = CapturePipeline::new(sink.clone());
///
/// let ctx = Arc::new(OperationContext::new("svc", "op"));
/// if let Some(unit) = factory.create(&ctx) {
///     pipeline.write(unit, CaptureKind::Request, &"hello", [("k", "v")]);
/// }
///
/// assert_eq!(sink.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    captures: Mutex<Vec<Capture>>,
    fail_with: Option<SinkErrorKind>,
}

impl MemorySink {
    /// Creates an empty sink that accepts every capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that refuses every capture with `kind`.
    pub fn failing(kind: SinkErrorKind) -> Self {
        Self {
            captures: Mutex::new(Vec::new()),
            fail_with: Some(kind),
        }
    }

    /// Returns the number of committed captures.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Provides borrowed access to the committed captures.
    pub fn with_captures<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[Capture]) -> R,
    {
        f(&self.lock())
    }

    /// Returns a snapshot of the committed captures, in commit order.
    pub fn captures(&self) -> Vec<Capture> {
        self.lock().clone()
    }

    /// Consumes the sink and returns the committed captures.
    pub fn into_captures(self) -> Vec<Capture> {
        self.captures
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Capture>> {
        self.captures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Sink for MemorySink {
    fn commit(&self, capture: &Capture) -> Result<(), SinkError> {
        if let Some(kind) = self.fail_with {
            return Err(SinkError::with_message(
                kind,
                format!("memory sink refused {}", capture.key()),
            ));
        }
        self.lock().push(capture.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{CaptureKind, ContentType};
    use crate::context::OperationContext;
    use crate::metadata::Metadata;
    use crate::unit::CaptureUnit;
    use std::sync::Arc;

    fn capture(n: u32) -> Capture {
        CaptureUnit::new(Arc::new(OperationContext::new("svc", "op")), ContentType::Json)
            .prepare(CaptureKind::Request, &n, Metadata::new())
            .unwrap()
    }

    #[test]
    fn memory_sink_starts_empty() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn memory_sink_keeps_commit_order() {
        let sink = MemorySink::new();
        for n in 0..3 {
            sink.commit(&capture(n)).unwrap();
        }

        let payloads: Vec<Vec<u8>> = sink.with_captures(|captures| {
            captures.iter().map(|c| c.payload().to_vec()).collect()
        });
        assert_eq!(payloads, vec![b"0".to_vec(), b"1".to_vec(), b"2".to_vec()]);
        assert_eq!(sink.into_captures().len(), 3);
    }

    #[test]
    fn failing_sink_refuses_and_stores_nothing() {
        let sink = MemorySink::failing(SinkErrorKind::Full);

        let err = sink.commit(&capture(1)).unwrap_err();

        assert_eq!(err.kind(), SinkErrorKind::Full);
        assert!(sink.is_empty());
    }
}
