//! The capture write protocol.
//!
//! Writing a capture takes three steps: encode the payload, build the
//! metadata, commit both to the sink. [`CaptureUnit::prepare`] does the first
//! two; [`CapturePipeline::commit`] does the last. [`CapturePipeline::write`]
//! runs all three and folds every failure into a [`WriteOutcome`], so nothing
//! that goes wrong while capturing can reach the observed operation.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::content::CaptureKind;
use crate::logging::CaptureLog;
use crate::metadata::Metadata;
use crate::sink::Sink;
use crate::unit::{Capture, CaptureUnit};

/// What became of one capture write.
///
/// This is informational only. The observed operation never needs to look
/// at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Payload and metadata were committed to the sink.
    Committed,
    /// The payload could not be encoded; nothing was committed.
    EncodeFailed,
    /// The sink failed to commit; nothing was committed.
    CommitFailed,
    /// Handed to a background writer; the final outcome is only counted.
    Queued,
    /// The background queue was full or closed; nothing was committed.
    Dropped,
}

impl WriteOutcome {
    /// Returns `true` for [`WriteOutcome::Committed`].
    pub fn is_committed(&self) -> bool {
        matches!(self, WriteOutcome::Committed)
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Committed => write!(f, "committed"),
            WriteOutcome::EncodeFailed => write!(f, "encode_failed"),
            WriteOutcome::CommitFailed => write!(f, "commit_failed"),
            WriteOutcome::Queued => write!(f, "queued"),
            WriteOutcome::Dropped => write!(f, "dropped"),
        }
    }
}

/// Counters shared by a pipeline and its clones.
#[derive(Debug, Default)]
pub(crate) struct PipelineStats {
    committed: AtomicU64,
    encode_failures: AtomicU64,
    commit_failures: AtomicU64,
    dropped: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn record(&self, outcome: WriteOutcome) {
        let counter = match outcome {
            WriteOutcome::Committed => &self.committed,
            WriteOutcome::EncodeFailed => &self.encode_failures,
            WriteOutcome::CommitFailed => &self.commit_failures,
            WriteOutcome::Dropped => &self.dropped,
            WriteOutcome::Queued => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            committed: self.committed.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a pipeline's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Captures committed to the sink
    pub committed: u64,
    /// Payloads that failed to encode
    pub encode_failures: u64,
    /// Commits the sink refused or failed
    pub commit_failures: u64,
    /// Captures dropped by a full or closed background queue
    pub dropped: u64,
}

/// Writes admitted captures to a sink.
///
/// Cloning is cheap; clones share the sink and the counters.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use payload_capture::{
///     CaptureFactory, CaptureKind, MemorySink, OperationContext, RateGate, WriteOutcome,
/// };
///
/// let sink = Arc::new(MemorySink::new());
/// let factory = CaptureFactory::new(sink.clone(), Arc::new(RateGate::new(5)));
/// let pipeline = factory.pipeline().expect("sink configured");
///
/// let ctx = Arc::new(OperationContext::new("ServerService", "getMessageFromServer"));
/// let unit = factory.create(&ctx).expect("admitted");
///
/// let outcome = pipeline.write(unit, CaptureKind::Request, &vec![1, 2, 3], [("name", "Alice")]);
///
/// assert_eq!(outcome, WriteOutcome::Committed);
/// assert_eq!(pipeline.stats().committed, 1);
/// ```
#[derive(Clone)]
pub struct CapturePipeline {
    sink: Arc<dyn Sink>,
    stats: Arc<PipelineStats>,
}

impl CapturePipeline {
    /// Creates a pipeline committing to `sink`.
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self {
            sink,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    /// Encodes, builds metadata and commits in one call.
    ///
    /// Never fails and never panics on encode or sink errors, including a
    /// panicking sink; the outcome is logged and counted.
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
        match self.prepare(unit, kind, payload, metadata) {
            Some(capture) => self.commit(capture),
            None => WriteOutcome::EncodeFailed,
        }
    }

    /// Runs the encode and metadata steps, recording an encode failure.
    ///
    /// Returns `None` if the payload could not be encoded.
    pub fn prepare<T>(
        &self,
        unit: CaptureUnit,
        kind: CaptureKind,
        payload: &T,
        metadata: impl Into<Metadata>,
    ) -> Option<Capture>
    where
        T: Serialize + ?Sized,
    {
        let context = unit.shared_context();
        match unit.prepare(kind, payload, metadata) {
            Ok(capture) => Some(capture),
            Err(err) => {
                CaptureLog::for_kind(&context, kind)
                    .warn(format_args!("capture abandoned: {err}"));
                self.stats.record(WriteOutcome::EncodeFailed);
                None
            }
        }
    }

    /// Commits a prepared capture to the sink.
    ///
    /// There is no retry; a failed commit is logged and counted. A sink that
    /// panics counts as a failed commit and the panic goes no further.
    pub fn commit(&self, capture: Capture) -> WriteOutcome {
        let log = CaptureLog::for_kind(capture.context(), capture.kind());
        let committed = panic::catch_unwind(AssertUnwindSafe(|| self.sink.commit(&capture)));
        let outcome = match committed {
            Ok(Ok(())) => {
                log.debug(format_args!(
                    "capture {} committed ({} bytes, {} metadata entries)",
                    capture.key(),
                    capture.payload().len(),
                    capture.metadata().len()
                ));
                WriteOutcome::Committed
            }
            Ok(Err(err)) => {
                log.warn(format_args!("capture {} not committed: {err}", capture.key()));
                WriteOutcome::CommitFailed
            }
            Err(_) => {
                log.warn(format_args!(
                    "capture {} not committed: sink panicked",
                    capture.key()
                ));
                WriteOutcome::CommitFailed
            }
        };
        self.stats.record(outcome);
        outcome
    }

    /// Returns a snapshot of the pipeline's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn record(&self, outcome: WriteOutcome) {
        self.stats.record(outcome);
    }
}

impl fmt::Debug for CapturePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturePipeline")
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
