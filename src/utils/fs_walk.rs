// Recursive image enumeration and mirrored output paths

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::core::errors::{CompositeError, SegmentationError};

/// Whether a path carries one of the accepted extensions (lowercase,
/// without the dot). Matching is case-insensitive.
pub fn is_accepted(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|accepted| *accepted == ext)
        })
        .unwrap_or(false)
}

/// Recursively enumerate the files under `root` that carry an accepted
/// extension, in natural walk order. Unreadable entries are skipped.
pub fn collect_images_sync(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_accepted(path, extensions))
        .collect()
}

/// Async wrapper over [`collect_images_sync`]; the walk hits the disk, so
/// it runs on the blocking pool.
pub async fn collect_images(
    root: PathBuf,
    extensions: &'static [&'static str],
) -> Result<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || collect_images_sync(&root, extensions))
        .await
        .context("Failed to spawn blocking task for directory walk")
}

/// Output location preserving `item`'s path relative to `input_root`.
///
/// `input_root/sub/dir/a.png` maps to `output_root/sub/dir/a.png`; the
/// extension is never changed.
pub fn mirrored_path(
    item: &Path,
    input_root: &Path,
    output_root: &Path,
) -> Result<PathBuf, std::path::StripPrefixError> {
    let relative = item.strip_prefix(input_root)?;
    Ok(output_root.join(relative))
}

/// [`mirrored_path`] with the error mapped for the segmentation pipeline
pub fn mirrored_path_segmentation(
    item: &Path,
    input_root: &Path,
    output_root: &Path,
) -> Result<PathBuf, SegmentationError> {
    mirrored_path(item, input_root, output_root)
        .map_err(|_| SegmentationError::OutsideInputRoot(item.to_path_buf()))
}

/// [`mirrored_path`] with the error mapped for the compositing pipeline
pub fn mirrored_path_composite(
    item: &Path,
    input_root: &Path,
    output_root: &Path,
) -> Result<PathBuf, CompositeError> {
    mirrored_path(item, input_root, output_root)
        .map_err(|_| CompositeError::OutsideInputRoot(item.to_path_buf()))
}
