//! Image/mask pairs loaded from disk.
//!
//! Expected layout:
//!
//! ```text
//! root/
//!   images/  scene_001.jpg  scene_002.png ...
//!   masks/   scene_001.png  scene_002.png ...
//! ```
//!
//! Masks are matched to images by file stem and read as 8-bit grayscale,
//! each gray value being a class id.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::DynamicImage;
use seg_core::{Error, ImageDimensions, Result};
use tracing::{debug, info};

use crate::dataset::SegmentationItem;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

/// Loader for a folder of image/mask pairs
#[derive(Debug, Clone)]
pub struct SegmentationFolder {
    root: PathBuf,
    dims: ImageDimensions,
}

impl SegmentationFolder {
    pub fn new(root: impl Into<PathBuf>, dims: ImageDimensions) -> Self {
        Self {
            root: root.into(),
            dims,
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn masks_dir(&self) -> PathBuf {
        self.root.join("masks")
    }

    /// Find every image that has a mask with the same stem, sorted by path
    pub fn scan_pairs(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        let images = scan_directory(&self.images_dir())?;
        let masks = scan_directory(&self.masks_dir())?;

        let mut pairs = Vec::new();
        for image in images {
            let stem = image.file_stem();
            match masks.iter().find(|m| m.file_stem() == stem) {
                Some(mask) => pairs.push((image, mask.clone())),
                None => debug!("Skipping {}: no matching mask", image.display()),
            }
        }
        Ok(pairs)
    }

    /// Load and resize one pair
    pub fn load_pair(
        &self,
        image_path: &Path,
        mask_path: &Path,
        num_classes: usize,
    ) -> Result<SegmentationItem> {
        let (w, h) = (self.dims.width as u32, self.dims.height as u32);

        let image = open_image(image_path)?.resize_exact(w, h, FilterType::Triangle);
        let image = to_chw(&image, self.dims.channels).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unsupported channel count {} (expected 1 or 3)",
                self.dims.channels
            ))
        })?;

        let mask = open_image(mask_path)?
            .resize_exact(w, h, FilterType::Nearest)
            .to_luma8()
            .into_raw();

        SegmentationItem::new(
            image,
            mask,
            self.dims,
            num_classes,
            image_path.to_string_lossy(),
        )
    }

    /// Load every pair found by [`scan_pairs`](Self::scan_pairs)
    pub fn load_all(&self, num_classes: usize) -> Result<Vec<SegmentationItem>> {
        let pairs = self.scan_pairs()?;
        info!(
            "Loading {} image/mask pairs from {}",
            pairs.len(),
            self.root.display()
        );
        pairs
            .iter()
            .map(|(image, mask)| self.load_pair(image, mask, num_classes))
            .collect()
    }
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path)
        .map_err(|e| Error::Image(format!("Failed to load image {}: {}", path.display(), e)))
}

/// Planar CHW floats in [0, 1]
fn to_chw(image: &DynamicImage, channels: usize) -> Option<Vec<f32>> {
    let raw = match channels {
        1 => image.to_luma8().into_raw(),
        3 => image.to_rgb8().into_raw(),
        _ => return None,
    };
    let plane = raw.len() / channels;
    let mut out = vec![0.0f32; raw.len()];
    for (i, value) in raw.iter().enumerate() {
        out[(i % channels) * plane + i / channels] = *value as f32 / 255.0;
    }
    Some(out)
}

fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Dataset(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }

    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let supported = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
        if path.is_file() && supported {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}
