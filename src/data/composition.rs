//! Composition matrix: observations as rows, parts as columns.
//!
//! Censored (below-detection) cells are stored as `NaN`. Every other cell is a
//! non-negative measurement in the units of the input (fractions, percent, ppm).

use crate::error::{ImputeError, Result};
use nalgebra::DMatrix;
use std::path::Path;

/// Tokens that mark a censored cell in TSV input (case-sensitive).
const CENSORED_TOKENS: &[&str] = &["", "NA", "NaN", "nan", "BDL", "ND"];

/// A dense N × D matrix of compositions with part and sample identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionMatrix {
    /// Values (samples × parts). `NaN` marks a censored cell.
    data: DMatrix<f64>,
    /// Part identifiers (column names).
    part_ids: Vec<String>,
    /// Sample identifiers (row names).
    sample_ids: Vec<String>,
}

impl CompositionMatrix {
    /// Create a new CompositionMatrix from a dense matrix and identifiers.
    pub fn new(data: DMatrix<f64>, part_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if ncols != part_ids.len() {
            return Err(ImputeError::Configuration(format!(
                "expected {} part IDs, got {}",
                ncols,
                part_ids.len()
            )));
        }
        if nrows != sample_ids.len() {
            return Err(ImputeError::Configuration(format!(
                "expected {} sample IDs, got {}",
                nrows,
                sample_ids.len()
            )));
        }
        Ok(Self {
            data,
            part_ids,
            sample_ids,
        })
    }

    /// Wrap a matrix with generated identifiers (`P0..`, `S0..`).
    pub fn from_matrix(data: DMatrix<f64>) -> Self {
        let part_ids = (0..data.ncols()).map(|j| format!("P{}", j)).collect();
        let sample_ids = (0..data.nrows()).map(|i| format!("S{}", i)).collect();
        Self {
            data,
            part_ids,
            sample_ids,
        }
    }

    /// Load a composition matrix from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with part IDs (first column is the sample ID header)
    /// - Subsequent rows: sample ID followed by one value per part
    ///
    /// Empty cells, `NA`, `NaN`, `BDL`, `ND` and any token starting with `<`
    /// are read as censored.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(false)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(ImputeError::EmptyData(
                "TSV must have at least one part column".to_string(),
            ));
        }
        let part_ids: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();
        let n_parts = part_ids.len();

        let mut sample_ids = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            sample_ids.push(record.get(0).unwrap_or_default().to_string());
            for (col_idx, token) in record.iter().skip(1).enumerate() {
                values.push(parse_cell(token, row_idx, col_idx)?);
            }
        }

        if sample_ids.is_empty() {
            return Err(ImputeError::EmptyData("No samples in TSV".to_string()));
        }

        let data = DMatrix::from_row_slice(sample_ids.len(), n_parts, &values);
        Self::new(data, part_ids, sample_ids)
    }

    /// Write the matrix to a TSV file. Censored cells are written as `NA`.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)?;

        let mut header = vec!["sample_id".to_string()];
        header.extend(self.part_ids.iter().cloned());
        writer.write_record(&header)?;

        for (i, sample_id) in self.sample_ids.iter().enumerate() {
            let mut record = Vec::with_capacity(self.n_parts() + 1);
            record.push(sample_id.clone());
            for j in 0..self.n_parts() {
                let v = self.data[(i, j)];
                record.push(if v.is_nan() { "NA".to_string() } else { v.to_string() });
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Number of observations (rows).
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of parts (columns).
    pub fn n_parts(&self) -> usize {
        self.data.ncols()
    }

    /// Get a value; `NaN` if the cell is censored.
    pub fn get(&self, row: usize, part: usize) -> f64 {
        self.data[(row, part)]
    }

    /// Get a row as a vector.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.data.row(row).iter().cloned().collect()
    }

    /// Get a part (column) as a vector.
    pub fn part(&self, part: usize) -> Vec<f64> {
        self.data.column(part).iter().cloned().collect()
    }

    /// Get reference to the underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Part identifiers.
    pub fn part_ids(&self) -> &[String] {
        &self.part_ids
    }

    /// Sample identifiers.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Number of `NaN` cells.
    pub fn n_missing(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }

    /// Replace the values, keeping identifiers. Shape must match.
    pub fn with_values(&self, data: DMatrix<f64>) -> Result<Self> {
        if data.shape() != self.data.shape() {
            return Err(ImputeError::Configuration(format!(
                "shape mismatch: expected {:?}, got {:?}",
                self.data.shape(),
                data.shape()
            )));
        }
        Ok(Self {
            data,
            part_ids: self.part_ids.clone(),
            sample_ids: self.sample_ids.clone(),
        })
    }
}

/// Parse one TSV cell; censored tokens become `NaN`.
fn parse_cell(token: &str, row: usize, col: usize) -> Result<f64> {
    let trimmed = token.trim();
    if CENSORED_TOKENS.contains(&trimmed) || trimmed.starts_with('<') {
        return Ok(f64::NAN);
    }
    trimmed.parse::<f64>().map_err(|_| ImputeError::InvalidValue {
        value: token.to_string(),
        row,
        col,
    })
}
