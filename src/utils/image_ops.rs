// Canvas compositing primitives
//
// Fixed square canvas; the source is centered in the space left over
// after reserving room at the bottom, the logo pinned just above the
// bottom edge.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::Path;

use crate::core::errors::{CompositeError, CompositeResult};

/// Side length of the square output canvas, in pixels
pub const CANVAS_SIZE: u32 = 1000;

/// Gap between the logo's bottom edge and the canvas's bottom edge
pub const LOGO_BOTTOM_MARGIN: i64 = 15;

/// Dimensions of the source after the downscale step.
///
/// Images whose longest side exceeds the canvas are shrunk so that side
/// becomes exactly [`CANVAS_SIZE`]; smaller images keep their size. Both
/// results truncate toward zero.
pub fn scaled_dimensions(width: u32, height: u32) -> (u32, u32) {
    let max_dim = width.max(height);
    if max_dim > CANVAS_SIZE {
        let ratio = CANVAS_SIZE as f64 / max_dim as f64;
        ((width as f64 * ratio) as u32, (height as f64 * ratio) as u32)
    } else {
        (width, height)
    }
}

/// Top-left corner for the (already scaled) source image on the canvas.
///
/// Horizontally centered; vertically centered within the space that
/// remains after subtracting `bottom_reserve`. Floor division keeps the
/// math consistent for negative remainders, so any signed reserve value
/// is valid.
pub fn placement(scaled_w: u32, scaled_h: u32, bottom_reserve: i32) -> (i64, i64) {
    let left = (CANVAS_SIZE as i64 - scaled_w as i64).div_euclid(2);
    let remaining = CANVAS_SIZE as i64 - scaled_h as i64 - bottom_reserve as i64;
    let top = remaining.div_euclid(2);
    (left, top)
}

/// Top-left corner for the logo: horizontally centered, bottom-anchored
/// [`LOGO_BOTTOM_MARGIN`] px above the canvas edge. Depends only on the
/// canvas and logo dimensions.
pub fn logo_placement(logo_w: u32, logo_h: u32) -> (i64, i64) {
    let x = (CANVAS_SIZE as i64 - logo_w as i64).div_euclid(2);
    let y = CANVAS_SIZE as i64 - logo_h as i64 - LOGO_BOTTOM_MARGIN;
    (x, y)
}

/// Compose one source image and the logo onto a fresh opaque white canvas.
///
/// The source is downscaled if needed, alpha-composited at its computed
/// placement, then the unscaled logo is alpha-composited at its fixed
/// bottom-anchored position.
pub fn compose_on_canvas(source: &RgbaImage, logo: &RgbaImage, bottom_reserve: i32) -> RgbaImage {
    let (width, height) = source.dimensions();
    let (scaled_w, scaled_h) = scaled_dimensions(width, height);

    let resized;
    let placed: &RgbaImage = if (scaled_w, scaled_h) != (width, height) {
        resized = imageops::resize(source, scaled_w, scaled_h, FilterType::Lanczos3);
        &resized
    } else {
        source
    };

    let mut canvas =
        RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba([255, 255, 255, 255]));

    let (left, top) = placement(scaled_w, scaled_h, bottom_reserve);
    imageops::overlay(&mut canvas, placed, left, top);

    let (logo_w, logo_h) = logo.dimensions();
    let (logo_x, logo_y) = logo_placement(logo_w, logo_h);
    imageops::overlay(&mut canvas, logo, logo_x, logo_y);

    canvas
}

fn is_jpeg_output(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ext == "jpg" || ext == "jpeg"
        })
        .unwrap_or(false)
}

/// Encode the canvas to `path`, choosing the format from the extension.
/// JPEG has no alpha channel, so those outputs are flattened to RGB first.
pub fn save_canvas(canvas: RgbaImage, path: &Path) -> CompositeResult<()> {
    if is_jpeg_output(path) {
        DynamicImage::ImageRgba8(canvas).to_rgb8().save(path)?;
    } else {
        canvas.save(path)?;
    }
    Ok(())
}

/// Decode an image file to RGBA on the blocking pool.
pub async fn load_rgba_async(path: &Path) -> CompositeResult<RgbaImage> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || Ok(image::open(&path)?.to_rgba8()))
        .await
        .map_err(|e| CompositeError::TaskJoinFailed(e.to_string()))?
}

/// Decode, compose and encode one item in a single blocking task.
pub async fn compose_and_save_async(
    source_path: &Path,
    logo: std::sync::Arc<RgbaImage>,
    bottom_reserve: i32,
    output_path: &Path,
) -> CompositeResult<()> {
    let source_path = source_path.to_path_buf();
    let output_path = output_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let source = image::open(&source_path)?.to_rgba8();
        let canvas = compose_on_canvas(&source, &logo, bottom_reserve);
        save_canvas(canvas, &output_path)
    })
    .await
    .map_err(|e| CompositeError::TaskJoinFailed(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_small_images_keep_their_size() {
        assert_eq!(scaled_dimensions(800, 600), (800, 600));
        assert_eq!(scaled_dimensions(1000, 1000), (1000, 1000));
        assert_eq!(scaled_dimensions(1, 1), (1, 1));
    }

    #[test]
    fn test_scale_down_truncates() {
        assert_eq!(scaled_dimensions(2000, 1200), (1000, 600));
        assert_eq!(scaled_dimensions(1333, 2000), (666, 1000));
        assert_eq!(scaled_dimensions(2000, 2000), (1000, 1000));
    }

    #[test]
    fn test_placement_of_800x600_with_negative_reserve() {
        // logo 200x80, reserve -100, source 800x600
        assert_eq!(scaled_dimensions(800, 600), (800, 600));
        assert_eq!(placement(800, 600, -100), (100, 250));
        assert_eq!(logo_placement(200, 80), (400, 905));
    }

    #[test]
    fn test_placement_uses_floor_division_for_negative_remainders() {
        // remaining = 1000 - 999 - 2 = -1; floor(-1 / 2) = -1, not 0
        let (_, top) = placement(999, 999, 2);
        assert_eq!(top, -1);

        // Negative reserves grow the remaining space
        let (_, top) = placement(10, 10, -100);
        assert_eq!(top, 545);
    }

    #[test]
    fn test_logo_placement_is_independent_of_reserve() {
        let logo = solid(20, 8, [0, 0, 255, 255]);
        let source = solid(10, 10, [0, 0, 0, 0]);

        let a = compose_on_canvas(&source, &logo, -200);
        let b = compose_on_canvas(&source, &logo, 300);

        let (logo_x, logo_y) = logo_placement(20, 8);
        for dx in 0..20u32 {
            for dy in 0..8u32 {
                let x = (logo_x + dx as i64) as u32;
                let y = (logo_y + dy as i64) as u32;
                assert_eq!(a.get_pixel(x, y), b.get_pixel(x, y));
                assert_eq!(*a.get_pixel(x, y), Rgba([0, 0, 255, 255]));
            }
        }
    }

    #[test]
    fn test_compose_places_source_at_expected_bbox() {
        let source = solid(10, 10, [255, 0, 0, 255]);
        let logo = solid(1, 1, [0, 0, 0, 0]);
        let canvas = compose_on_canvas(&source, &logo, 7);

        // left = (1000-10)/2 = 495; remaining = 1000-10-7 = 983; top = 491
        assert_eq!(*canvas.get_pixel(495, 491), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(504, 500), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(494, 491), Rgba([255, 255, 255, 255]));
        assert_eq!(*canvas.get_pixel(505, 500), Rgba([255, 255, 255, 255]));
        assert_eq!(*canvas.get_pixel(495, 490), Rgba([255, 255, 255, 255]));
        assert_eq!(*canvas.get_pixel(495, 501), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_semi_transparent_source_blends_onto_white() {
        let source = solid(2, 2, [0, 0, 0, 0]);
        let logo = solid(1, 1, [0, 0, 0, 0]);
        let canvas = compose_on_canvas(&source, &logo, 0);

        // Fully transparent pixels leave the canvas white
        assert_eq!(*canvas.get_pixel(499, 499), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_jpeg_output_is_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let canvas = solid(CANVAS_SIZE, CANVAS_SIZE, [255, 255, 255, 255]);

        save_canvas(canvas, &path).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert!(matches!(reloaded, DynamicImage::ImageRgb8(_)));
        assert_eq!(reloaded.width(), CANVAS_SIZE);
        assert_eq!(reloaded.height(), CANVAS_SIZE);
    }

    #[test]
    fn test_png_output_keeps_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let canvas = solid(4, 4, [10, 20, 30, 255]);

        save_canvas(canvas, &path).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert!(matches!(reloaded, DynamicImage::ImageRgba8(_)));
    }
}
