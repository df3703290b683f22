//! Grouped XLSX exporter that writes a table as merged-header group blocks.

use std::path::PathBuf;

use crate::conditional::plan_conditional_rules;
use crate::error::{ExportError, ExportResult};
use crate::format::plan_formats;
use crate::layout::plan_layout;
use crate::sink::{XlsxSink, XlsxWorkbookSink};
use crate::source::{TableSource, derive_dataframe_from_ipc_bytes};
use crate::spec::{
    EnumCellErrorPolicy, EnumCellValue, EnumLayoutRowKind, SpecConditionalRule, SpecExportConfig,
    SpecExportReport, SpecFormatPlan, SpecLayoutPlan, SpecSkippedCell,
};
use crate::util::{sanitize_sheet_name, validate_cell_value, validate_unique_columns};

/// Single-sheet exporter bound to one table, one sink and one config.
///
/// Everything that can fail before writing (config validation, column
/// lookup, format resolution, layout planning) runs in the constructor.
/// [`Self::export`] consumes the exporter, so the sink is closed once.
pub struct GroupedXlsxExporter<'a, T: TableSource + ?Sized, S: XlsxSink> {
    table: &'a T,
    sink: S,
    config: SpecExportConfig,
    l_colnames: Vec<String>,
    col_idx_result: Option<usize>,
    formats: SpecFormatPlan,
    layout: SpecLayoutPlan,
    l_rules: Vec<SpecConditionalRule>,
    report: SpecExportReport,
}

impl<'a, T: TableSource + ?Sized> GroupedXlsxExporter<'a, T, XlsxWorkbookSink> {
    /// Create an exporter writing a workbook to `path_file_out`.
    ///
    /// The workbook is buffered in memory and saved when the export finishes.
    pub fn new(
        table: &'a T,
        path_file_out: impl Into<PathBuf>,
        group_column: &str,
        config: SpecExportConfig,
    ) -> ExportResult<Self> {
        Self::with_sink(
            table,
            XlsxWorkbookSink::new(path_file_out),
            group_column,
            config,
        )
    }
}

impl<'a, T: TableSource + ?Sized, S: XlsxSink> GroupedXlsxExporter<'a, T, S> {
    /// Create an exporter writing into an arbitrary sink.
    pub fn with_sink(
        table: &'a T,
        sink: S,
        group_column: &str,
        mut config: SpecExportConfig,
    ) -> ExportResult<Self> {
        config.validate()?;
        let mut report = SpecExportReport::default();

        let c_sheet_name = sanitize_sheet_name(&config.sheet.name, "_");
        if c_sheet_name != config.sheet.name {
            log::warn!(
                "Sheet name {:?} sanitized to {c_sheet_name:?}.",
                config.sheet.name
            );
            report.warn(format!(
                "Sheet name {:?} sanitized to {c_sheet_name:?}.",
                config.sheet.name
            ));
            config.sheet.name = c_sheet_name;
        }
        report.sheet_name = config.sheet.name.clone();

        let l_colnames = table.column_names();
        validate_unique_columns(&l_colnames)?;

        let col_idx_group = table.column_index(group_column)?;
        let col_idx_result = match config.result_column.as_deref() {
            Some(name) => Some(table.column_index(name)?),
            None => None,
        };

        let formats = plan_formats(&config, &l_colnames, &mut report)?;
        let layout = plan_layout(
            table,
            col_idx_group,
            config.group_blank_rows,
            config.group_name_rule,
        )?;
        let l_rules = match col_idx_result {
            Some(col_idx) => plan_conditional_rules(&layout, col_idx, &config.result_palette),
            None => Vec::new(),
        };

        Ok(Self {
            table,
            sink,
            config,
            l_colnames,
            col_idx_result,
            formats,
            layout,
            l_rules,
            report,
        })
    }

    /// Effective config (sheet name already sanitized).
    pub fn config(&self) -> &SpecExportConfig {
        &self.config
    }

    /// Resolved formats.
    pub fn formats(&self) -> &SpecFormatPlan {
        &self.formats
    }

    /// Planned worksheet layout.
    pub fn layout(&self) -> &SpecLayoutPlan {
        &self.layout
    }

    /// Planned conditional-format rules.
    pub fn conditional_rules(&self) -> &[SpecConditionalRule] {
        &self.l_rules
    }

    /// Index of the result column, if conditional formatting is enabled.
    pub fn result_column_index(&self) -> Option<usize> {
        self.col_idx_result
    }

    /// Write the sheet, close the sink and return the report.
    pub fn export(self) -> ExportResult<SpecExportReport> {
        self.finish().map(|(report, _)| report)
    }

    /// Like [`Self::export`], also handing back the closed sink.
    pub fn finish(mut self) -> ExportResult<(SpecExportReport, S)> {
        self.sink.add_sheet(&self.config.sheet)?;
        self.write_column_settings()?;
        self.write_rows()?;
        for rule in &self.l_rules {
            self.sink.add_conditional_format(rule)?;
        }
        self.sink.close()?;

        self.report.cnt_rows = self.layout.height() as u64;
        self.report.cnt_groups = self.layout.groups.len() as u64;
        self.report.cnt_rows_data = self.layout.n_rows_data() as u64;
        self.report.cnt_conditional_rules = self.l_rules.len() as u64;
        log::info!("{}", self.report);

        Ok((self.report, self.sink))
    }

    fn write_column_settings(&mut self) -> ExportResult<()> {
        for (col_idx, col_format) in self.formats.fmts_by_col.iter().enumerate() {
            if col_format.width.is_none()
                && col_format.fmt_display.is_none()
                && !col_format.options.hidden
            {
                continue;
            }
            self.sink.set_column(
                col_idx,
                col_format.width,
                col_format.options,
                col_format.fmt_display.as_ref(),
            )?;
        }
        Ok(())
    }

    fn write_rows(&mut self) -> ExportResult<()> {
        let n_col_idx_last = self.layout.width.saturating_sub(1);

        for row in &self.layout.rows {
            match row.kind {
                EnumLayoutRowKind::Header => {
                    for (col_idx, c_name) in self.l_colnames.iter().enumerate() {
                        self.sink.write_cell(
                            row.row_idx,
                            col_idx,
                            &EnumCellValue::String(c_name.clone()),
                            self.formats.fmt_table_header.as_ref(),
                        )?;
                    }
                }
                EnumLayoutRowKind::Blank => {}
                EnumLayoutRowKind::GroupHeader { idx_group } => {
                    self.sink.merge_range(
                        row.row_idx,
                        0,
                        row.row_idx,
                        n_col_idx_last,
                        &self.layout.groups[idx_group].label,
                        self.formats.fmt_group_header.as_ref(),
                    )?;
                }
                EnumLayoutRowKind::Data { idx_row_source, .. } => {
                    let l_values = self.table.row_values(idx_row_source)?;
                    for (col_idx, value) in l_values.iter().enumerate() {
                        let fmt_cell = self.formats.fmts_by_col[col_idx].fmt_cell.as_ref();
                        let result = validate_cell_value(value)
                            .map_err(|reason| ExportError::Cell {
                                row_idx: row.row_idx,
                                col_idx,
                                reason,
                            })
                            .and_then(|()| {
                                self.sink
                                    .write_cell(row.row_idx, col_idx, value, fmt_cell)
                            });

                        match result {
                            Ok(()) => self.report.cnt_cells_written += 1,
                            Err(err) => match self.config.cell_error_policy {
                                EnumCellErrorPolicy::Abort => return Err(err),
                                EnumCellErrorPolicy::Skip => {
                                    let reason = match err {
                                        ExportError::Cell { reason, .. } => reason,
                                        other => other.to_string(),
                                    };
                                    let c_name = &self.l_colnames[col_idx];
                                    log::warn!(
                                        "Skipped cell at row {}, column {c_name:?}: {reason}",
                                        row.row_idx
                                    );
                                    self.report.skipped_cells.push(SpecSkippedCell {
                                        row_idx: row.row_idx,
                                        col_idx,
                                        col_name: c_name.clone(),
                                        reason,
                                    });
                                }
                            },
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Decode a Polars IPC payload and export it to `path_file_out`.
pub fn export_ipc_bytes(
    v_ipc_df: &[u8],
    path_file_out: impl Into<PathBuf>,
    group_column: &str,
    config: SpecExportConfig,
) -> ExportResult<SpecExportReport> {
    let df = derive_dataframe_from_ipc_bytes(v_ipc_df)?;
    GroupedXlsxExporter::new(&df, path_file_out, group_column, config)?.export()
}
