//! Hilbert-curve encoding of one sample's genotype column into a square pixel row.
//!
//! Genotypes `0`, `1` and `2` (reference, heterozygous, homozygous alternate) map to
//! intensities `1.0`, `0.5` and `0.0`. Variants are laid out in file order along the
//! curve, so neighbouring variants stay neighbouring pixels. Cells past the last variant
//! keep the reference intensity.

use crate::tensor::intensity_byte;
use crate::types::{EncodeError, EncodeResult};
use flate2::read::GzDecoder;
use image::{GrayImage, Luma};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Largest supported curve order: a 4096 x 4096 image.
pub const MAX_ORDER: u32 = 12;

pub fn side_for_order(order: u32) -> usize {
    1usize << order
}

/// Smallest order whose grid holds `len` cells, capped at [`MAX_ORDER`].
pub fn order_for_len(len: usize) -> u32 {
    let mut order = 0;
    while order < MAX_ORDER && side_for_order(order).pow(2) < len {
        order += 1;
    }
    order
}

/// Cell `(x, y)` visited at step `index` of the order-`order` Hilbert curve.
///
/// The curve starts at `(0, 0)` and ends at `(side - 1, 0)`; `index` must be below
/// `side * side`.
pub fn index_to_point(index: usize, order: u32) -> (usize, usize) {
    let side = side_for_order(order);
    let (mut x, mut y) = (0usize, 0usize);
    let mut t = index;
    let mut s = 1usize;
    while s < side {
        let rx = 1 & (t / 2);
        let ry = 1 & (t ^ rx);
        if ry == 0 {
            if rx == 1 {
                x = s - 1 - x;
                y = s - 1 - y;
            }
            std::mem::swap(&mut x, &mut y);
        }
        x += s * rx;
        y += s * ry;
        t /= 4;
        s *= 2;
    }
    (x, y)
}

/// Reduce `genotypes` to `bins` cells, keeping the maximum of each contiguous chunk.
///
/// Inputs that already fit are returned unchanged.
pub fn bin_max(genotypes: &[u8], bins: usize) -> Vec<u8> {
    let len = genotypes.len();
    if len <= bins {
        return genotypes.to_vec();
    }
    (0..bins)
        .map(|i| {
            let start = i * len / bins;
            let end = (i + 1) * len / bins;
            genotypes[start..end].iter().copied().max().unwrap_or(0)
        })
        .collect()
}

pub fn genotype_intensity(genotype: u8) -> f32 {
    match genotype {
        0 => 1.0,
        1 => 0.5,
        _ => 0.0,
    }
}

/// Encoded image: row-major intensities of a `side x side` grid.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    order: u32,
    pixels: Vec<f32>,
}

impl EncodedImage {
    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn side(&self) -> usize {
        side_for_order(self.order)
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<f32> {
        let side = self.side();
        if x >= side || y >= side {
            return None;
        }
        self.pixels.get(y * side + x).copied()
    }

    pub fn to_gray_image(&self) -> GrayImage {
        let side = self.side() as u32;
        GrayImage::from_fn(side, side, |x, y| {
            let v = self.pixel(x as usize, y as usize).unwrap_or(1.0);
            Luma([intensity_byte(v)])
        })
    }
}

/// Lays genotype columns along a Hilbert curve.
///
/// Without a fixed order the smallest grid that holds every variant is used. Columns
/// longer than the grid are max-binned down to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HilbertEncoder {
    order: Option<u32>,
}

impl HilbertEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(order: u32) -> EncodeResult<Self> {
        if order > MAX_ORDER {
            return Err(EncodeError::Order {
                order,
                max: MAX_ORDER,
            });
        }
        Ok(Self { order: Some(order) })
    }

    pub fn order(&self) -> Option<u32> {
        self.order
    }

    pub fn encode(&self, genotypes: &[u8]) -> EncodedImage {
        let order = self
            .order
            .unwrap_or_else(|| order_for_len(genotypes.len()));
        let side = side_for_order(order);
        let cells = side * side;
        let binned = bin_max(genotypes, cells);
        if binned.len() < genotypes.len() {
            debug!(
                variants = genotypes.len(),
                cells, "binned genotypes to fit the curve"
            );
        }

        let mut pixels = vec![genotype_intensity(0); cells];
        for (index, &genotype) in binned.iter().enumerate() {
            let (x, y) = index_to_point(index, order);
            pixels[y * side + x] = genotype_intensity(genotype);
        }
        EncodedImage { order, pixels }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Read one genotype per line; `.gz` files are decompressed. Blank lines are skipped.
pub fn read_genotypes(path: &Path) -> EncodeResult<Vec<u8>> {
    let io_error = |source| EncodeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    let reader: Box<dyn BufRead> = if is_gzip(path) {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut genotypes = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error)?;
        let value = line.trim();
        if value.is_empty() {
            continue;
        }
        match value.parse::<u8>() {
            Ok(genotype) if genotype <= 2 => genotypes.push(genotype),
            _ => {
                return Err(EncodeError::Genotype {
                    path: path.to_path_buf(),
                    line: i + 1,
                    value: value.to_string(),
                })
            }
        }
    }
    if genotypes.is_empty() {
        return Err(EncodeError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(genotypes)
}

/// Sample id of a genotype file: its file name up to the first `.`.
pub fn sample_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Files produced for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFiles {
    pub table: PathBuf,
    pub image: Option<PathBuf>,
}

/// Write `<sample>.<side>x<side>.tsv` holding one image-table row, plus the matching
/// `.png` when `with_image` is set.
pub fn write_encoded(
    sample: &str,
    encoded: &EncodedImage,
    out_dir: &Path,
    with_image: bool,
) -> EncodeResult<EncodedFiles> {
    let side = encoded.side();
    let stem = format!("{sample}.{side}x{side}");
    let table = out_dir.join(format!("{stem}.tsv"));
    let table_error = |source| EncodeError::Table {
        path: table.clone(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(&table)
        .map_err(table_error)?;
    let mut row = Vec::with_capacity(encoded.pixels().len() + 1);
    row.push(sample.to_string());
    row.extend(encoded.pixels().iter().map(|v| v.to_string()));
    writer.write_record(&row).map_err(table_error)?;
    writer.flush().map_err(|source| EncodeError::Io {
        path: table.clone(),
        source,
    })?;

    let image = if with_image {
        let path = out_dir.join(format!("{stem}.png"));
        encoded
            .to_gray_image()
            .save(&path)
            .map_err(|source| EncodeError::Image {
                path: path.clone(),
                source,
            })?;
        Some(path)
    } else {
        None
    };
    info!(sample, side, table = %table.display(), "encoded genotypes");
    Ok(EncodedFiles { table, image })
}
