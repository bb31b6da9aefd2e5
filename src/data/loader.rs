//! Data loading utilities

use crate::error::{Result, TransfusionError};
use polars::prelude::*;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// CSV loader producing an all-`f64` frame
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Field separator
    delimiter: u8,
    /// Rows used for schema inference
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            infer_schema_length: Some(1000),
        }
    }

    /// Set the field separator
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a delimited file with a header row.
    ///
    /// Every column is cast to `Float64`; a column that cannot be cast, or
    /// any missing field, is a `DataError`.
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TransfusionError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("data file not found: {}", path.display()),
            )));
        }

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let df = Self::to_numeric(df)?;
        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            "Loaded dataset"
        );
        Ok(df)
    }

    fn to_numeric(df: DataFrame) -> Result<DataFrame> {
        let columns = df
            .get_columns()
            .iter()
            .map(|column| {
                if column.null_count() > 0 {
                    return Err(TransfusionError::DataError(format!(
                        "Column '{}' has {} missing or malformed values",
                        column.name(),
                        column.null_count()
                    )));
                }
                column.strict_cast(&DataType::Float64).map_err(|e| {
                    TransfusionError::DataError(format!(
                        "Column '{}' is not numeric: {}",
                        column.name(),
                        e
                    ))
                })
            })
            .collect::<Result<Vec<Column>>>()?;

        debug!(n_columns = columns.len(), "Cast all columns to Float64");
        Ok(DataFrame::new(columns)?)
    }
}

/// Raw first `n` lines of a text file
pub fn preview_lines(path: impl AsRef<Path>, n: usize) -> Result<Vec<String>> {
    let file = File::open(path.as_ref())?;
    BufReader::new(file)
        .lines()
        .take(n)
        .map(|line| line.map_err(TransfusionError::from))
        .collect()
}

/// Per-column summary used by [`DatasetInfo`]
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub non_null: usize,
    pub null_count: usize,
}

/// Shape and schema summary of a frame
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnInfo>,
}

impl DatasetInfo {
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name().to_string(),
                dtype: c.dtype().to_string(),
                non_null: c.len() - c.null_count(),
                null_count: c.null_count(),
            })
            .collect();

        Self {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        }
    }
}

impl fmt::Display for DatasetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} entries, {} columns", self.n_rows, self.n_cols)?;
        let width = self.columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
        for (i, c) in self.columns.iter().enumerate() {
            writeln!(
                f,
                "{:>2}  {:<width$}  {} non-null  {}",
                i,
                c.name,
                c.non_null,
                c.dtype,
                width = width
            )?;
        }
        Ok(())
    }
}
