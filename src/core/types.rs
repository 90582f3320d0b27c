// Shared types for the batch pipelines

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

/// Immutable snapshot of one batch run's directories.
///
/// Built once when a run is started and passed by value into the worker;
/// the worker never re-reads live controller state.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl BatchRequest {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }
}

/// Parameters for one background-removal run
#[derive(Debug, Clone)]
pub struct SegmentationRequest {
    pub batch: BatchRequest,
    pub api_key: String,
}

/// Parameters for one compositing run
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    pub batch: BatchRequest,
    pub logo_path: PathBuf,
    /// Vertical space reserved below the source image, in pixels.
    /// Signed; negative values grant the image extra room instead.
    pub bottom_reserve: i32,
}

/// Lifecycle events emitted by a batch worker, consumed by the controller
/// in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The file set was enumerated; `total` is the run's item count.
    Started { total: usize },
    /// One more item was attempted (successfully or not).
    Progress { done: usize },
    /// A single item failed; the batch continues.
    ItemError { path: PathBuf, message: String },
    /// Informational notice (e.g. nothing to process).
    Info(String),
    /// The run stopped early because cancellation was requested.
    Canceled,
    /// Every item was attempted without cancellation.
    Completed,
    /// A precondition failed; no items were processed.
    FatalError(String),
}

/// Producer half of a run's event channel.
///
/// Send failures mean the controller dropped its receiver; the worker
/// keeps going and the event is discarded.
#[derive(Clone)]
pub struct EventSink {
    tx: UnboundedSender<ProgressEvent>,
}

impl EventSink {
    /// Create a connected sink/receiver pair for one run.
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped, discarding event");
        }
    }
}

/// Per-run cancellation token.
///
/// Only ever transitions to cancelled; a new run gets a fresh token, so
/// cancelling one run can never leak into the next.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Controller-side handle to a running batch.
///
/// Owns the receiving half of the event channel and the run's
/// cancellation token. Dropping the handle does not stop the worker.
pub struct RunHandle {
    events: UnboundedReceiver<ProgressEvent>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl RunHandle {
    pub(crate) fn new(
        events: UnboundedReceiver<ProgressEvent>,
        cancel: CancellationToken,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            cancel,
            worker,
        }
    }

    /// Request cancellation; observed by the worker between items.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of this run's cancellation token, e.g. for a signal handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain all currently queued events without blocking.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut drained = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }

    /// Await the next event; `None` once the worker is done and the
    /// channel is drained.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Whether the worker task has finished.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}
