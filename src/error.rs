use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading and reshaping the price dataset.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A column header is not a `<month>.<year>` token.
    #[error("Malformed date token: {0:?}")]
    MalformedDateToken(String),

    /// Neither the normalized cache nor the raw wide source exists.
    #[error("No data available: neither {long_path} nor {raw_path} exists")]
    DataUnavailable { long_path: PathBuf, raw_path: PathBuf },

    /// A file exists but could not be opened.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache file header lacks a required column.
    #[error("{path} has no {column:?} column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
