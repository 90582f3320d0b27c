// Library exports for the PhotoRoom batch workflow
//
// Two pipelines share one cancellable batch runner: background removal
// through the remote segmentation endpoint, and logo compositing onto a
// fixed square canvas.

// Core modules
pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{CompositeError, ConfigError, KeyStoreError, SegmentationError, StartError},
    types::{
        BatchRequest, CancellationToken, CompositeRequest, EventSink, ProgressEvent, RunHandle,
        SegmentationRequest,
    },
};

pub use orchestration::batch_runner::{run_batch, BatchOperation};

pub use services::{ApiKeyStore, CompositingService, SegmentationService};

pub use utils::{compose_on_canvas, logo_placement, placement, scaled_dimensions, CANVAS_SIZE};
