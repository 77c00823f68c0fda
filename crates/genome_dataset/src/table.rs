//! Loading the gzip image table and the metadata table, and joining them on sample id.

use crate::types::{JoinedTable, LoadError, LoadResult, MetaRecord, SampleRecord};
use flate2::read::GzDecoder;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Column count of the metadata table: sample, population, type, sex, study.
pub const META_COLUMNS: usize = 5;

/// One row of the image table: sample id followed by its flattened pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelRow {
    pub sample: String,
    pub pixels: Vec<f32>,
}

fn open(path: &Path) -> LoadResult<File> {
    File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn record_line(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Read the headerless, gzip-compressed image table.
///
/// Every row must carry the same number of columns; the first column is the sample id.
pub fn load_pixel_rows(path: &Path) -> LoadResult<Vec<PixelRow>> {
    let file = open(path)?;
    let mut reader = tsv_reader(GzDecoder::new(BufReader::new(file)));
    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    let mut width: Option<usize> = None;

    for result in reader.records() {
        let record = result.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let line = record_line(&record);
        let found = record.len();
        match width {
            None if found < 2 => {
                return Err(LoadError::ColumnCount {
                    path: path.to_path_buf(),
                    line,
                    expected: "at least 2".to_string(),
                    found,
                });
            }
            None => width = Some(found),
            Some(expected) if expected != found => {
                return Err(LoadError::ColumnCount {
                    path: path.to_path_buf(),
                    line,
                    expected: expected.to_string(),
                    found,
                });
            }
            Some(_) => {}
        }

        let sample = record[0].to_string();
        if !seen.insert(sample.clone()) {
            return Err(LoadError::DuplicateSample {
                path: path.to_path_buf(),
                line,
                sample,
            });
        }
        let mut pixels = Vec::with_capacity(found - 1);
        for (column, cell) in record.iter().enumerate().skip(1) {
            let value = cell.parse::<f32>().map_err(|_| LoadError::NotNumeric {
                path: path.to_path_buf(),
                line,
                column,
                value: cell.to_string(),
            })?;
            pixels.push(value);
        }
        rows.push(PixelRow { sample, pixels });
    }

    if rows.is_empty() {
        return Err(LoadError::EmptyTable {
            path: path.to_path_buf(),
        });
    }
    Ok(rows)
}

/// Read the headerless five-column metadata table.
pub fn load_metadata(path: &Path) -> LoadResult<Vec<MetaRecord>> {
    let file = open(path)?;
    let mut reader = tsv_reader(BufReader::new(file));
    let mut rows = Vec::new();
    let mut seen = HashSet::new();

    for result in reader.records() {
        let record = result.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let line = record_line(&record);
        if record.len() != META_COLUMNS {
            return Err(LoadError::ColumnCount {
                path: path.to_path_buf(),
                line,
                expected: META_COLUMNS.to_string(),
                found: record.len(),
            });
        }
        let sample = record[0].to_string();
        if !seen.insert(sample.clone()) {
            return Err(LoadError::DuplicateSample {
                path: path.to_path_buf(),
                line,
                sample,
            });
        }
        rows.push(MetaRecord {
            sample,
            population: record[1].to_string(),
            kind: record[2].to_string(),
            sex: record[3].to_string(),
            study: record[4].to_string(),
        });
    }

    if rows.is_empty() {
        return Err(LoadError::EmptyTable {
            path: path.to_path_buf(),
        });
    }
    Ok(rows)
}

/// Inner join on sample id, keeping image-table order. Unmatched rows on either side are dropped.
pub fn join(pixels: Vec<PixelRow>, meta: &[MetaRecord]) -> JoinedTable {
    let pixel_count = pixels.first().map(|r| r.pixels.len()).unwrap_or(0);
    let by_sample: HashMap<&str, &MetaRecord> =
        meta.iter().map(|m| (m.sample.as_str(), m)).collect();
    let image_rows = pixels.len();

    let records: Vec<SampleRecord> = pixels
        .into_iter()
        .filter_map(|row| {
            let Some(m) = by_sample.get(row.sample.as_str()) else {
                debug!(sample = %row.sample, "image row has no metadata; dropped");
                return None;
            };
            Some(SampleRecord {
                population: m.population.clone(),
                study: m.study.clone(),
                sample: row.sample,
                pixels: row.pixels,
            })
        })
        .collect();

    let dropped_images = image_rows - records.len();
    let dropped_meta = meta.len() - records.len();
    if dropped_images > 0 || dropped_meta > 0 {
        info!(
            joined = records.len(),
            dropped_images, dropped_meta, "inner join dropped unmatched samples"
        );
    }
    JoinedTable::new(records, pixel_count)
}

/// Load both tables and join them. An empty join is an error.
pub fn load_joined(images: &Path, meta: &Path) -> LoadResult<JoinedTable> {
    let pixels = load_pixel_rows(images)?;
    let meta_rows = load_metadata(meta)?;
    let table = join(pixels, &meta_rows);
    if table.is_empty() {
        return Err(LoadError::EmptyJoin {
            images: images.to_path_buf(),
            meta: meta.to_path_buf(),
        });
    }

    info!(
        samples = table.len(),
        pixels = table.pixel_count(),
        "loaded joined image table"
    );
    if let Some((lo, hi)) = table.pixel_range() {
        info!(min = lo, max = hi, "pixel value range");
        if hi > 1.0 || lo < 0.0 {
            warn!(
                min = lo,
                max = hi,
                "pixel values fall outside [0, 1]; images are expected to be pre-scaled"
            );
        }
    }
    Ok(table)
}
