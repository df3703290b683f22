//! `axiomkit_io_xlsx_grouped` v1:
//! Grouped single-sheet XLSX exporter.
//!
//! Rows are partitioned by one key column and written as blocks, each
//! preceded by blank padding rows and a merged group-header row. An
//! optional result column gets palette conditional formatting.
//!
//! Modules:
//! - `conf`        : constants and default presets
//! - `spec`        : specs/models/options
//! - `error`       : error types
//! - `util`        : pure helper functions
//! - `source`      : table input (`TableSource`, DataFrame adapter)
//! - `sink`        : workbook output (`XlsxSink`, workbook and memory sinks)
//! - `format`      : format resolution
//! - `layout`      : row layout planning
//! - `conditional` : result-column conditional formats
//! - `writer`      : exporter
pub mod conditional;
pub mod conf;
pub mod error;
pub mod format;
pub mod layout;
pub mod sink;
pub mod source;
pub mod spec;
pub mod util;
pub mod writer;

pub use conditional::plan_conditional_rules;
pub use conf::{
    C_GROUP_LABEL_PREFIX, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_EXCEL_ILLEGAL, TUP_RESULT_PALETTE, derive_default_export_config,
};
pub use error::{ExportError, ExportResult};
pub use format::plan_formats;
pub use layout::{derive_layout_height, plan_layout};
pub use sink::{EnumSinkOp, MemorySink, XlsxSink, XlsxWorkbookSink, derive_text_grid};
pub use source::{SpecTable, TableSource, derive_dataframe_from_ipc_bytes};
pub use spec::{
    EnumCellErrorPolicy, EnumCellValue, EnumGroupNameRule, EnumLayoutRowKind, SpecCellFormat,
    SpecColumnFormat, SpecColumnOptions, SpecColumnStyle, SpecConditionalRule, SpecExportConfig,
    SpecExportReport, SpecFormatPlan, SpecFormatSlot, SpecLayoutGroup, SpecLayoutPlan,
    SpecLayoutRow, SpecSheetConfig, SpecSkippedCell,
};
pub use util::{derive_column_letter, sanitize_sheet_name, split_column_selector};
pub use writer::{GroupedXlsxExporter, export_ipc_bytes};
