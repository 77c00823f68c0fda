//! Reshaping flattened pixel rows into square single-channel image batches.

use crate::types::{SampleRecord, ShapeError};
use image::GrayImage;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Batch of `N` images of shape `(side, side, 1)`, stored row-major as `f32`.
///
/// With a single channel the buffer is also a valid NCHW `[N, 1, side, side]` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    sample_ids: Vec<String>,
    side: usize,
    data: Vec<f32>,
}

impl ImageBatch {
    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn pixels_per_image(&self) -> usize {
        self.side * self.side
    }

    /// `(N, side, side, 1)`.
    pub fn shape(&self) -> [usize; 4] {
        [self.len(), self.side, self.side, 1]
    }

    /// `(side, side, 1)`.
    pub fn image_shape(&self) -> [usize; 3] {
        [self.side, self.side, 1]
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn image(&self, index: usize) -> Option<&[f32]> {
        let n = self.pixels_per_image();
        self.data.get(index * n..(index + 1) * n)
    }

    /// Pixel at `(row, col)` of image `index`.
    pub fn pixel(&self, index: usize, row: usize, col: usize) -> Option<f32> {
        if row >= self.side || col >= self.side {
            return None;
        }
        self.image(index).map(|img| img[row * self.side + col])
    }

    /// Gather images by index into a contiguous buffer, in the given order.
    pub fn gather(&self, indices: &[usize]) -> Vec<f32> {
        let mut out = Vec::with_capacity(indices.len() * self.pixels_per_image());
        for &i in indices {
            if let Some(img) = self.image(i) {
                out.extend_from_slice(img);
            }
        }
        out
    }
}

/// Builds image batches for a fixed pixel count.
///
/// Pixels are taken as given: values are expected to be pre-scaled to [0, 1] upstream.
/// Raw 0-255 intensities are not rescaled here and will silently degrade training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTensorBuilder {
    pixel_count: usize,
    side: usize,
}

impl ImageTensorBuilder {
    pub fn new(pixel_count: usize) -> Result<Self, ShapeError> {
        if pixel_count == 0 {
            return Err(ShapeError::NoPixels);
        }
        let side = pixel_count.isqrt();
        if side * side != pixel_count {
            return Err(ShapeError::NotSquare {
                pixels: pixel_count,
            });
        }
        Ok(Self { pixel_count, side })
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    pub fn build(&self, rows: &[SampleRecord]) -> Result<ImageBatch, ShapeError> {
        let mut sample_ids = Vec::with_capacity(rows.len());
        let mut data = Vec::with_capacity(rows.len() * self.pixel_count);
        for row in rows {
            if row.pixels.len() != self.pixel_count {
                return Err(ShapeError::RowLength {
                    sample: row.sample.clone(),
                    expected: self.pixel_count,
                    found: row.pixels.len(),
                });
            }
            sample_ids.push(row.sample.clone());
            data.extend_from_slice(&row.pixels);
        }
        Ok(ImageBatch {
            sample_ids,
            side: self.side,
            data,
        })
    }
}

/// Intensity in [0, 1] as an 8-bit gray level; out-of-range values saturate.
pub(crate) fn intensity_byte(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Convert image `index` to an 8-bit grayscale image (intensity scaled by 255).
pub fn to_gray_image(batch: &ImageBatch, index: usize) -> Option<GrayImage> {
    let bytes: Vec<u8> = batch.image(index)?.iter().copied().map(intensity_byte).collect();
    let side = u32::try_from(batch.side()).ok()?;
    GrayImage::from_raw(side, side, bytes)
}

/// `<sample>.png`, or `None` when the id would not stay a single file name.
fn preview_file_name(sample: &str) -> Option<String> {
    if sample.is_empty() || sample.contains(['/', '\\']) {
        return None;
    }
    let name = format!("{sample}.png");
    let mut components = Path::new(&name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(name),
        _ => None,
    }
}

/// Write image `index` as `<dir>/<sampleId>.png` for manual inspection.
///
/// Best effort: failures are logged and reported as `None`. Sample ids that are not
/// plain file names (path separators, `..`, absolute paths) are refused.
pub fn write_preview(batch: &ImageBatch, index: usize, dir: &Path) -> Option<PathBuf> {
    let sample = batch.sample_ids().get(index)?;
    let Some(file_name) = preview_file_name(sample) else {
        warn!(sample = %sample, "sample id is not a plain file name, skipping preview");
        return None;
    };
    let Some(img) = to_gray_image(batch, index) else {
        warn!(sample = %sample, "no image data for preview");
        return None;
    };
    let path = dir.join(file_name);
    match img.save(&path) {
        Ok(()) => Some(path),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to write preview image");
            None
        }
    }
}
