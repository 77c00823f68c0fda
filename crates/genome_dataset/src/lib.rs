//! Variant-image table loading and tensor preparation for ancestry training.
//!
//! This crate provides utilities for:
//! - Loading the gzip image table and the sample metadata table, joined on sample id
//! - Splitting joined rows into training and evaluation cohorts by study label
//! - Fitting a stable population category table
//! - Reshaping flattened pixel rows into square single-channel image batches
//! - Encoding per-sample genotype columns into image-table rows along a Hilbert curve

pub mod cohort;
pub mod hilbert;
pub mod labels;
pub mod table;
pub mod tensor;
pub mod types;

pub use cohort::{population_counts, Cohort, CohortKind, CohortSplitter, DEFAULT_EVALUATION_STUDY};
pub use hilbert::{EncodedImage, HilbertEncoder};
pub use labels::CategoryTable;
pub use table::{join, load_joined, load_metadata, load_pixel_rows, PixelRow};
pub use tensor::{write_preview, ImageBatch, ImageTensorBuilder};
pub use types::*;
