//! Export error types.

use thiserror::Error;

/// Result type for grouped export operations.
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Fatal errors raised by the exporter.
///
/// Per-cell problems only surface here under `EnumCellErrorPolicy::Abort`;
/// otherwise they are collected in the export report.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Configuration failed validation.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Referenced column does not exist in the table.
    #[error("Column not found: {0:?}")]
    ColumnNotFound(String),

    /// Table shape is unusable (duplicate names, ragged rows, ...).
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    /// Layout does not fit in one worksheet.
    #[error("Excel limit exceeded: {0}")]
    ExcelLimit(String),

    /// Single cell could not be written.
    #[error("Cell write failed at row {row_idx}, column {col_idx}: {reason}")]
    Cell {
        /// Zero-based worksheet row.
        row_idx: usize,
        /// Zero-based column.
        col_idx: usize,
        /// Failure reason.
        reason: String,
    },

    /// Sink used after `close()`.
    #[error("Cannot write after close().")]
    Closed,

    /// Backend error.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Table source error.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// JSON config error.
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}
