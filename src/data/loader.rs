// ============================================================
// Layer 4 — Image Loader
// ============================================================
// Loads every image file from a directory using the image
// crate. Files are returned sorted by name so benchmark runs
// are reproducible regardless of directory iteration order.
//
// Supported extensions: jpg, jpeg, png, bmp, webp
// (case-insensitive). Anything else is ignored; files with a
// supported extension that fail to decode are skipped with a
// warning.
//
// Reference: image crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::traits::{ImageSource, LabeledImage};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Loads all images from a given directory.
pub struct ImageLoader {
    dir: String,
}

impl ImageLoader {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ImageSource for ImageLoader {
    fn load_all(&self) -> Result<Vec<LabeledImage>> {
        let dir = Path::new(&self.dir);

        if !dir.exists() {
            tracing::warn!("Image directory '{}' does not exist, returning no images", self.dir);
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir))?
        {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            match load_single_image(&path) {
                Ok(img) => {
                    tracing::debug!(
                        "Loaded: {} ({}x{})",
                        img.source,
                        img.image.width(),
                        img.image.height()
                    );
                    images.push(img);
                }
                Err(e) => {
                    tracing::warn!("Skipping '{}': {:#}", path.display(), e);
                }
            }
        }

        tracing::info!("Loaded {} images from '{}'", images.len(), self.dir);
        Ok(images)
    }
}

/// Decode one image file, labelled with its file name
pub fn load_single_image(path: &Path) -> Result<LabeledImage> {
    let image = image::open(path)
        .with_context(|| format!("Cannot decode image '{}'", path.display()))?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(LabeledImage::new(source, image))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
