// Background removal via the remote segmentation endpoint
//
// Each item's raw bytes go up as a multipart upload; the response body
// comes back as the cut-out image and is written verbatim to the
// mirrored output path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::core::config::Config;
use crate::core::errors::{SegmentationError, SegmentationResult, StartError};
use crate::core::types::{
    CancellationToken, EventSink, ProgressEvent, RunHandle, SegmentationRequest,
};
use crate::orchestration::batch_runner::{run_batch, BatchOperation};
use crate::utils::fs_walk::mirrored_path_segmentation;

/// Extensions accepted by the segmentation pipeline
pub const SEGMENTATION_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Background-removal pipeline: one worker task per run, at most one
/// active run at a time.
pub struct SegmentationService {
    config: Arc<Config>,
    http_client: reqwest::Client,
    active: Arc<AtomicBool>,
}

impl SegmentationService {
    /// Create the service and its shared HTTP client.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.api_timeout())
            .pool_max_idle_per_host(10)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        info!(endpoint = config.endpoint(), "✓ Segmentation service ready");

        Ok(Self {
            config,
            http_client,
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start one background-removal run on a dedicated worker task.
    ///
    /// Fails fast with [`StartError::Busy`] while a previous run is still
    /// active; the returned handle carries the run's event channel and
    /// cancellation token.
    #[instrument(skip(self, request), fields(input = %request.batch.input_dir.display()))]
    pub fn start(&self, request: SegmentationRequest) -> Result<RunHandle, StartError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StartError::Busy("segmentation"));
        }

        let (sink, events) = EventSink::channel();
        let cancel = CancellationToken::new();

        let worker_cancel = cancel.clone();
        let client = self.http_client.clone();
        let endpoint = self.config.endpoint().to_string();
        let active = Arc::clone(&self.active);

        let worker = tokio::spawn(async move {
            run_segmentation(client, endpoint, request, worker_cancel, sink).await;
            active.store(false, Ordering::SeqCst);
        });

        Ok(RunHandle::new(events, cancel, worker))
    }
}

async fn run_segmentation(
    client: reqwest::Client,
    endpoint: String,
    request: SegmentationRequest,
    cancel: CancellationToken,
    events: EventSink,
) {
    let api_key = request.api_key.trim().to_string();
    if api_key.is_empty() {
        events.emit(ProgressEvent::FatalError(
            "PhotoRoom API key is required".to_string(),
        ));
        return;
    }

    let operation = SegmentationOperation::new(
        client,
        endpoint,
        api_key,
        request.batch.input_dir.clone(),
        request.batch.output_dir.clone(),
    );

    run_batch(&request.batch, &operation, &cancel, &events).await;
}

/// Per-item upload/write operation
pub struct SegmentationOperation {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    input_root: PathBuf,
    output_root: PathBuf,
}

impl SegmentationOperation {
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        input_root: PathBuf,
        output_root: PathBuf,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            input_root,
            output_root,
        }
    }

    async fn apply(&self, path: &Path) -> SegmentationResult<()> {
        let bytes = tokio::fs::read(path).await?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();
        let part = multipart::Part::bytes(bytes).file_name(file_name);
        let form = multipart::Form::new().part("image_file", part);

        debug!(path = %path.display(), "uploading");
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SegmentationError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let output_path = mirrored_path_segmentation(path, &self.input_root, &self.output_root)?;
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&output_path, &body).await?;

        Ok(())
    }
}

#[async_trait]
impl BatchOperation for SegmentationOperation {
    fn extensions(&self) -> &'static [&'static str] {
        SEGMENTATION_EXTENSIONS
    }

    async fn process(&self, path: &Path) -> Result<()> {
        Ok(self.apply(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ApiConfig, CompositeConfig, ControllerConfig};
    use crate::core::types::BatchRequest;
    use httpmock::prelude::*;
    use std::fs;

    fn test_config(endpoint: &str) -> Arc<Config> {
        Arc::new(Config {
            api: ApiConfig {
                endpoint: endpoint.to_string(),
                timeout_secs: 5,
                key_path: PathBuf::from("photoroom_api_key.txt"),
            },
            composite: CompositeConfig {
                bottom_reserve: -100,
            },
            controller: ControllerConfig {
                poll_interval_ms: 200,
            },
            log_level: tracing::Level::INFO,
        })
    }

    fn operation_for(server: &MockServer, input: &Path, output: &Path) -> SegmentationOperation {
        SegmentationOperation::new(
            reqwest::Client::new(),
            server.url("/v1/segment"),
            "test-key".to_string(),
            input.to_path_buf(),
            output.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn test_success_writes_mirrored_output() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/segment")
                    .header("x-api-key", "test-key");
                then.status(200).body("SEGMENTED");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(input.join("sub")).unwrap();
        fs::write(input.join("sub/a.png"), b"raw-image-bytes").unwrap();

        let operation = operation_for(&server, &input, &output);
        operation.apply(&input.join("sub/a.png")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(fs::read(output.join("sub/a.png")).unwrap(), b"SEGMENTED");
    }

    #[tokio::test]
    async fn test_non_success_status_becomes_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/segment");
                then.status(402).body("payment required");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.png"), b"raw").unwrap();

        let operation = operation_for(&server, &input, &output);
        let err = operation.apply(&input.join("a.png")).await.unwrap_err();

        assert!(matches!(err, SegmentationError::Status(402)));
        assert!(!output.join("a.png").exists());
    }

    #[tokio::test]
    async fn test_empty_api_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.png"), b"raw").unwrap();

        let config = test_config("http://127.0.0.1:9/v1/segment");
        let service = SegmentationService::new(config).unwrap();

        let request = SegmentationRequest {
            batch: BatchRequest::new(&input, dir.path().join("out")),
            api_key: "   ".to_string(),
        };
        let mut handle = service.start(request).unwrap();

        let mut events = Vec::new();
        while let Some(event) = handle.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProgressEvent::FatalError(_)));
    }

    #[tokio::test]
    async fn test_slot_is_released_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(&input).unwrap();

        let config = test_config("http://127.0.0.1:9/v1/segment");
        let service = SegmentationService::new(config).unwrap();

        let request = SegmentationRequest {
            batch: BatchRequest::new(&input, dir.path().join("out")),
            api_key: "k".to_string(),
        };

        // Empty input: the run ends after a single Info event
        let mut handle = service.start(request.clone()).unwrap();
        while handle.recv().await.is_some() {}
        handle_is_finished(&handle).await;

        assert!(service.start(request).is_ok());
    }

    async fn handle_is_finished(handle: &RunHandle) {
        for _ in 0..50 {
            if handle.is_finished() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("worker did not finish in time");
    }
}
