//! Core records, joined table and error definitions for genome_dataset.

use std::path::PathBuf;
use thiserror::Error;

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path}:{line}: expected {expected} columns, found {found}")]
    ColumnCount {
        path: PathBuf,
        line: u64,
        expected: String,
        found: usize,
    },
    #[error("{path}:{line}: column {column} is not numeric ({value:?})")]
    NotNumeric {
        path: PathBuf,
        line: u64,
        column: usize,
        value: String,
    },
    #[error("{path}:{line}: duplicate sample id {sample:?}")]
    DuplicateSample {
        path: PathBuf,
        line: u64,
        sample: String,
    },
    #[error("{path} contains no rows")]
    EmptyTable { path: PathBuf },
    #[error("join of {images} and {meta} produced no rows")]
    EmptyJoin { images: PathBuf, meta: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("pixel count {pixels} is not a perfect square")]
    NotSquare { pixels: usize },
    #[error("pixel count must be positive")]
    NoPixels,
    #[error("sample {sample} has {found} pixels, expected {expected}")]
    RowLength {
        sample: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnknownCategoryError {
    #[error("population {0:?} is not in the category table")]
    Label(String),
    #[error("class code {code} is outside the category table ({len} categories)")]
    Code { code: usize, len: usize },
}

pub type EncodeResult<T> = Result<T, EncodeError>;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: genotype must be 0, 1 or 2, found {value:?}")]
    Genotype {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("{path} contains no genotypes")]
    Empty { path: PathBuf },
    #[error("curve order {order} exceeds the maximum of {max}")]
    Order { order: u32, max: u32 },
    #[error("cannot derive a sample id from {path}")]
    SampleName { path: PathBuf },
    #[error("failed to write {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// One row of the joined image/metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub sample: String,
    /// Flattened pixel intensities, assumed pre-scaled to [0, 1].
    pub pixels: Vec<f32>,
    pub population: String,
    pub study: String,
}

/// Metadata row; `kind` and `sex` are parsed but not carried into the join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaRecord {
    pub sample: String,
    pub population: String,
    pub kind: String,
    pub sex: String,
    pub study: String,
}

/// Inner join of the image table and metadata, in image-table order.
#[derive(Debug, Clone, Default)]
pub struct JoinedTable {
    records: Vec<SampleRecord>,
    pixel_count: usize,
}

impl JoinedTable {
    pub fn new(records: Vec<SampleRecord>, pixel_count: usize) -> Self {
        Self {
            records,
            pixel_count,
        }
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SampleRecord> {
        self.records
    }

    /// Pixel columns per row (identical for every row of the table).
    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn populations(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.population.as_str())
    }

    /// Minimum and maximum pixel value over all rows, `None` when there are no pixels.
    pub fn pixel_range(&self) -> Option<(f32, f32)> {
        self.records
            .iter()
            .flat_map(|r| r.pixels.iter().copied())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
