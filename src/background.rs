//! Off-path commits.
//!
//! [`BackgroundWriter`] encodes on the caller's thread (the payload is only
//! borrowed) and hands the prepared [`Capture`] to a worker thread over a
//! bounded queue. Submitting never blocks: when the queue is full the capture
//! is dropped and counted, the same way the rate gate degrades by skipping.

use std::fmt;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{debug, warn};

use crate::content::CaptureKind;
use crate::error::{CaptureError, Result};
use crate::logging::CaptureLog;
use crate::metadata::Metadata;
use crate::pipeline::{CapturePipeline, StatsSnapshot, WriteOutcome};
use crate::unit::{Capture, CaptureUnit};

/// Commits captures on a dedicated worker thread.
///
/// Dropping the writer (or calling [`shutdown`](Self::shutdown)) closes the
/// queue and waits for the worker to commit whatever is still queued.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use payload_capture::{
///     BackgroundWriter, CaptureFactory, CaptureKind, MemorySink, OperationContext, RateGate,
///     WriteOutcome,
/// };
///
/// let sink = Arc::new(MemorySink::new());
/// let factory = CaptureFactory::new(sink.clone(), Arc::new(RateGate::new(1)));
/// let writer = BackgroundWriter::spawn(factory.pipeline().unwrap(), 16).unwrap();
///
/// let ctx = Arc::new(OperationContext::new("svc", "op"));
/// let unit = factory.create(&ctx).unwrap();
/// assert_eq!(writer.write(unit, CaptureKind::Request, &"body", [("k", "v")]), WriteOutcome::Queued);
///
/// let stats = writer.shutdown();
/// assert_eq!(stats.committed, 1);
/// assert_eq!(sink.len(), 1);
/// ```
pub struct BackgroundWriter {
    pipeline: CapturePipeline,
    sender: Option<SyncSender<Capture>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundWriter {
    /// Starts a worker committing through `pipeline`, queueing at most
    /// `capacity` captures.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero capacity, or an I/O error if the
    /// worker thread cannot be spawned.
    pub fn spawn(pipeline: CapturePipeline, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CaptureError::InvalidConfig(
                "background queue capacity must be greater than zero".into(),
            ));
        }

        let (sender, receiver) = mpsc::sync_channel(capacity);
        let worker_pipeline = pipeline.clone();
        let worker = thread::Builder::new()
            .name("capture-writer".into())
            .spawn(move || run_worker(worker_pipeline, receiver))?;

        debug!(capacity, "background capture writer started");
        Ok(Self {
            pipeline,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Encodes on the calling thread and queues the commit.
    ///
    /// Returns [`WriteOutcome::Queued`] on success; the final outcome shows
    /// up in the pipeline's counters.
    pub fn write<T>(
        &self,
        unit: CaptureUnit,
        kind: CaptureKind,
        payload: &T,
        metadata: impl Into<Metadata>,
    ) -> WriteOutcome
    where
        T: Serialize + ?Sized,
    {
        match self.pipeline.prepare(unit, kind, payload, metadata) {
            Some(capture) => self.submit(capture),
            None => WriteOutcome::EncodeFailed,
        }
    }

    /// Queues an already prepared capture. Never blocks.
    pub fn submit(&self, capture: Capture) -> WriteOutcome {
        let Some(sender) = &self.sender else {
            return self.drop_capture(&capture, "writer is shut down");
        };

        match sender.try_send(capture) {
            Ok(()) => WriteOutcome::Queued,
            Err(TrySendError::Full(capture)) => self.drop_capture(&capture, "queue is full"),
            Err(TrySendError::Disconnected(capture)) => {
                self.drop_capture(&capture, "worker has stopped")
            }
        }
    }

    /// Returns the pipeline's counters so far.
    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline.stats()
    }

    /// Closes the queue, waits for queued captures to be committed and
    /// returns the final counters.
    pub fn shutdown(mut self) -> StatsSnapshot {
        self.close();
        self.pipeline.stats()
    }

    fn drop_capture(&self, capture: &Capture, reason: &str) -> WriteOutcome {
        CaptureLog::for_kind(capture.context(), capture.kind())
            .warn(format_args!("capture {} dropped: {reason}", capture.key()));
        self.pipeline.record(WriteOutcome::Dropped);
        WriteOutcome::Dropped
    }

    fn close(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("background capture writer exited abnormally");
            }
        }
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for BackgroundWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundWriter")
            .field("pipeline", &self.pipeline)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

fn run_worker(pipeline: CapturePipeline, receiver: Receiver<Capture>) {
    for capture in receiver {
        pipeline.commit(capture);
    }
    debug!("background capture writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentType;
    use crate::context::OperationContext;
    use crate::sink::{MemorySink, Sink, SinkError};
    use crate::unit::tests::Unencodable;
    use std::sync::{Arc, Barrier};

    fn unit() -> CaptureUnit {
        CaptureUnit::new(Arc::new(OperationContext::new("svc", "op")), ContentType::Json)
    }

    /// Blocks every commit until the barrier is released.
    struct GatedSink {
        barrier: Arc<Barrier>,
        inner: MemorySink,
    }

    impl Sink for GatedSink {
        fn commit(&self, capture: &Capture) -> std::result::Result<(), SinkError> {
            self.barrier.wait();
            self.inner.commit(capture)
        }
    }

    struct PanickingSink;

    impl Sink for PanickingSink {
        fn commit(&self, _capture: &Capture) -> std::result::Result<(), SinkError> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let pipeline = CapturePipeline::new(Arc::new(MemorySink::new()));
        let err = BackgroundWriter::spawn(pipeline, 0).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfig(_)));
    }

    #[test]
    fn queued_captures_are_committed_before_shutdown_returns() {
        let sink = Arc::new(MemorySink::new());
        let writer = BackgroundWriter::spawn(CapturePipeline::new(sink.clone()), 8).unwrap();

        for n in 0..5 {
            assert_eq!(
                writer.write(unit(), CaptureKind::Request, &n, Metadata::new()),
                WriteOutcome::Queued
            );
        }

        let stats = writer.shutdown();
        assert_eq!(stats.committed, 5);
        assert_eq!(sink.len(), 5);
    }

    #[test]
    fn encode_failure_is_reported_synchronously() {
        let sink = Arc::new(MemorySink::new());
        let writer = BackgroundWriter::spawn(CapturePipeline::new(sink.clone()), 8).unwrap();

        let outcome = writer.write(unit(), CaptureKind::Request, &Unencodable, Metadata::new());

        assert_eq!(outcome, WriteOutcome::EncodeFailed);
        assert_eq!(writer.shutdown().encode_failures, 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let barrier = Arc::new(Barrier::new(2));
        let sink = Arc::new(GatedSink {
            barrier: Arc::clone(&barrier),
            inner: MemorySink::new(),
        });
        let writer = BackgroundWriter::spawn(CapturePipeline::new(sink.clone()), 1).unwrap();

        // The worker holds at most one capture (stuck on the barrier) and the
        // queue holds at most one more, so nearly every write must be dropped.
        let mut queued = 0;
        for n in 0..10 {
            match writer.write(unit(), CaptureKind::Request, &n, Metadata::new()) {
                WriteOutcome::Queued => queued += 1,
                WriteOutcome::Dropped => {}
                other => panic!("unexpected outcome {other}"),
            }
        }
        assert!((1..=2).contains(&queued));

        for _ in 0..queued {
            barrier.wait();
        }
        let stats = writer.shutdown();

        assert_eq!(stats.committed, queued);
        assert_eq!(stats.dropped, 10 - queued);
        assert_eq!(sink.inner.len() as u64, queued);
    }

    #[test]
    fn panicking_sink_counts_as_commit_failure() {
        let writer = BackgroundWriter::spawn(CapturePipeline::new(Arc::new(PanickingSink)), 4)
            .unwrap();

        writer.write(unit(), CaptureKind::Request, &1, Metadata::new());
        writer.write(unit(), CaptureKind::Response, &2, Metadata::new());

        let stats = writer.shutdown();
        assert_eq!(stats.commit_failures, 2);
        assert_eq!(stats.committed, 0);
    }
}
