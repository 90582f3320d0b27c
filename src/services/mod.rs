pub mod api_key;
pub mod compositing;
pub mod segmentation;

// Re-export commonly used services
pub use api_key::ApiKeyStore;
pub use compositing::{CompositingService, COMPOSITE_EXTENSIONS};
pub use segmentation::{SegmentationService, SEGMENTATION_EXTENSIONS};
