pub mod fs_walk;
pub mod image_ops;

// Re-export commonly used items
pub use fs_walk::{collect_images, collect_images_sync, is_accepted, mirrored_path};
pub use image_ops::{
    compose_on_canvas, load_rgba_async, logo_placement, placement, save_canvas,
    scaled_dimensions, CANVAS_SIZE,
};
