// Batch Runner: sequential, cancellable driver shared by both pipelines
//
// Walks the input tree, applies one operation per file, and reports
// lifecycle events on the run's channel. Item failures are isolated;
// only broken preconditions abort a run.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

use crate::core::types::{BatchRequest, CancellationToken, EventSink, ProgressEvent};
use crate::utils::fs_walk::collect_images;

/// Per-item unit of work plugged into the runner.
///
/// Implementations must be safe to call from the worker task; an error
/// returned from `process` never aborts the batch.
#[async_trait]
pub trait BatchOperation: Send + Sync {
    /// Accepted file extensions, lowercase without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Process a single file.
    async fn process(&self, path: &Path) -> Result<()>;
}

/// Drive one batch run to a terminal event.
///
/// Emits, in order: `FatalError` (bad input directory) | `Info` (empty
/// file set) | `Started`, then per item an optional `ItemError` followed
/// by `Progress`, then `Canceled` or `Completed`. The cancellation token
/// is read once before each item and never mutated here.
pub async fn run_batch<O: BatchOperation>(
    request: &BatchRequest,
    operation: &O,
    cancel: &CancellationToken,
    events: &EventSink,
) {
    if !request.input_dir.is_dir() {
        events.emit(ProgressEvent::FatalError(format!(
            "Input directory does not exist: {}",
            request.input_dir.display()
        )));
        return;
    }

    // A failure here is not checked separately; per-item directory
    // creation surfaces the problem as item errors.
    let _ = tokio::fs::create_dir_all(&request.output_dir).await;

    let files = match collect_images(request.input_dir.clone(), operation.extensions()).await {
        Ok(files) => files,
        Err(e) => {
            events.emit(ProgressEvent::FatalError(format!(
                "Failed to enumerate input directory: {e:#}"
            )));
            return;
        }
    };

    if files.is_empty() {
        events.emit(ProgressEvent::Info("No images to process.".to_string()));
        return;
    }

    let total = files.len();
    info!(total, input = %request.input_dir.display(), "batch started");
    events.emit(ProgressEvent::Started { total });

    let mut done = 0usize;
    for path in &files {
        if cancel.is_cancelled() {
            info!(done, total, "batch canceled");
            events.emit(ProgressEvent::Canceled);
            return;
        }

        if let Err(e) = operation.process(path).await {
            warn!(path = %path.display(), error = %format!("{e:#}"), "item failed");
            events.emit(ProgressEvent::ItemError {
                path: path.clone(),
                message: format!("{e:#}"),
            });
        }

        done += 1;
        events.emit(ProgressEvent::Progress { done });
    }

    info!(total, "batch completed");
    events.emit(ProgressEvent::Completed);
}
