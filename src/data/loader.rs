//! CSV Data Loader Module
//! Reads the raw input tables with Polars, keeping every cell as text so the
//! schema layer decides what each column means.

use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("{table} file not found: {}", path.display())]
    MissingFile { table: String, path: PathBuf },
    #[error("Failed to load {table} CSV from {}: {source}", path.display())]
    CsvError {
        table: String,
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
}

/// A table exactly as read from disk: header names plus string cells.
#[derive(Debug, Clone)]
pub struct RawTable {
    name: String,
    path: PathBuf,
    df: DataFrame,
}

impl RawTable {
    /// Wrap an in-memory frame; every column is cast to text.
    pub fn from_dataframe(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        df: DataFrame,
    ) -> PolarsResult<Self> {
        let columns = df
            .get_columns()
            .iter()
            .map(|col| col.cast(&DataType::String))
            .collect::<PolarsResult<Vec<_>>>()?;

        Ok(Self {
            name: name.into(),
            path: path.into(),
            df: DataFrame::new(columns)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header names in file order.
    pub fn get_columns(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn get_row_count(&self) -> usize {
        self.df.height()
    }

    /// Raw text of a cell, `None` for an empty field.
    pub fn cell(&self, column: usize, row: usize) -> Option<&str> {
        self.df
            .get_columns()
            .get(column)?
            .as_materialized_series()
            .str()
            .ok()?
            .get(row)
    }
}

/// Loads delimited text files into [`RawTable`]s.
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file using Polars with schema inference disabled.
    pub fn load_csv(table: &str, file_path: &Path) -> Result<RawTable, LoaderError> {
        if !file_path.is_file() {
            return Err(LoaderError::MissingFile {
                table: table.to_string(),
                path: file_path.to_path_buf(),
            });
        }

        let csv_error = |source| LoaderError::CsvError {
            table: table.to_string(),
            path: file_path.to_path_buf(),
            source,
        };

        // A zero-length inference window reads every column as String
        let df = LazyCsvReader::new(file_path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(csv_error)?;

        log::debug!(
            "Loaded {} from {}: {} rows x {} columns",
            table,
            file_path.display(),
            df.height(),
            df.width()
        );

        RawTable::from_dataframe(table, file_path, df).map_err(csv_error)
    }
}
