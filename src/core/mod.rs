pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    CompositeError, ConfigError, KeyStoreError, SegmentationError, StartError,
};
pub use types::{
    BatchRequest, CancellationToken, CompositeRequest, EventSink, ProgressEvent, RunHandle,
    SegmentationRequest,
};
