// Compositing pipeline: resize each image into the fixed square canvas
// and overlay the logo at its bottom-anchored position
//
// The logo is decoded once per run and shared read-only across items.

use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::errors::{CompositeError, CompositeResult, StartError};
use crate::core::types::{
    CancellationToken, CompositeRequest, EventSink, ProgressEvent, RunHandle,
};
use crate::orchestration::batch_runner::{run_batch, BatchOperation};
use crate::utils::fs_walk::mirrored_path_composite;
use crate::utils::image_ops::{compose_and_save_async, compose_on_canvas, load_rgba_async};

/// Extensions accepted by the compositing pipeline
pub const COMPOSITE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Canvas/logo compositing pipeline: one worker task per run, at most one
/// active run at a time.
pub struct CompositingService {
    active: Arc<AtomicBool>,
}

impl CompositingService {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start one compositing run on a dedicated worker task.
    ///
    /// Fails fast with [`StartError::Busy`] while a previous run is still
    /// active; the returned handle carries the run's event channel and
    /// cancellation token.
    #[instrument(skip(self, request), fields(input = %request.batch.input_dir.display()))]
    pub fn start(&self, request: CompositeRequest) -> Result<RunHandle, StartError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StartError::Busy("compositing"));
        }

        let (sink, events) = EventSink::channel();
        let cancel = CancellationToken::new();

        let worker_cancel = cancel.clone();
        let active = Arc::clone(&self.active);

        let worker = tokio::spawn(async move {
            run_compositing(request, worker_cancel, sink).await;
            active.store(false, Ordering::SeqCst);
        });

        Ok(RunHandle::new(events, cancel, worker))
    }

    /// Compose a single image in memory, without writing anything:
    /// the same placement and overlay steps as a batch item, returned as
    /// the raw canvas for the caller to display.
    #[instrument(skip(self))]
    pub async fn preview(
        &self,
        image_path: &Path,
        logo_path: &Path,
        bottom_reserve: i32,
    ) -> CompositeResult<RgbaImage> {
        let logo = load_rgba_async(logo_path).await?;
        let source = load_rgba_async(image_path).await?;

        tokio::task::spawn_blocking(move || compose_on_canvas(&source, &logo, bottom_reserve))
            .await
            .map_err(|e| CompositeError::TaskJoinFailed(e.to_string()))
    }
}

impl Default for CompositingService {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_compositing(request: CompositeRequest, cancel: CancellationToken, events: EventSink) {
    if !request.logo_path.is_file() {
        events.emit(ProgressEvent::FatalError(format!(
            "Logo file does not exist: {}",
            request.logo_path.display()
        )));
        return;
    }

    let logo = match load_rgba_async(&request.logo_path).await {
        Ok(logo) => logo,
        Err(e) => {
            events.emit(ProgressEvent::FatalError(format!(
                "Cannot open logo file: {e}"
            )));
            return;
        }
    };

    let (logo_w, logo_h) = logo.dimensions();
    info!(logo_w, logo_h, logo = %request.logo_path.display(), "logo loaded");

    let operation = CompositeOperation {
        logo: Arc::new(logo),
        bottom_reserve: request.bottom_reserve,
        input_root: request.batch.input_dir.clone(),
        output_root: request.batch.output_dir.clone(),
    };

    run_batch(&request.batch, &operation, &cancel, &events).await;
}

/// Per-item compose-and-save operation
pub struct CompositeOperation {
    logo: Arc<RgbaImage>,
    bottom_reserve: i32,
    input_root: PathBuf,
    output_root: PathBuf,
}

impl CompositeOperation {
    async fn apply(&self, path: &Path) -> CompositeResult<()> {
        let output_path = mirrored_path_composite(path, &self.input_root, &self.output_root)?;
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        compose_and_save_async(
            path,
            Arc::clone(&self.logo),
            self.bottom_reserve,
            &output_path,
        )
        .await
    }
}

#[async_trait]
impl BatchOperation for CompositeOperation {
    fn extensions(&self) -> &'static [&'static str] {
        COMPOSITE_EXTENSIONS
    }

    async fn process(&self, path: &Path) -> Result<()> {
        Ok(self.apply(path).await?)
    }
}
