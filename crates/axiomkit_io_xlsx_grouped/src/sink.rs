//! Spreadsheet backends the exporter writes into.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use rust_xlsxwriter::{
    ConditionalFormatFormula, Format, FormatAlign, FormatBorder, Workbook, Worksheet,
};

use crate::error::{ExportError, ExportResult};
use crate::spec::{
    EnumCellValue, SpecCellFormat, SpecColumnOptions, SpecConditionalRule, SpecSheetConfig,
};
use crate::util::{cast_col_num, cast_row_num, derive_display_text};

/// Write capabilities needed by the exporter.
///
/// Row/column indices are zero-based. Formats are passed as specs; sinks
/// decide how to turn them into native format objects.
pub trait XlsxSink {
    /// Create the single target worksheet.
    fn add_sheet(&mut self, sheet: &SpecSheetConfig) -> ExportResult<()>;

    /// Write one scalar value.
    fn write_cell(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        value: &EnumCellValue,
        format: Option<&SpecCellFormat>,
    ) -> ExportResult<()>;

    /// Merge an inclusive range and write `text` into it.
    fn merge_range(
        &mut self,
        row_idx_first: usize,
        col_idx_first: usize,
        row_idx_last: usize,
        col_idx_last: usize,
        text: &str,
        format: Option<&SpecCellFormat>,
    ) -> ExportResult<()>;

    /// Set column width, display options and default format.
    fn set_column(
        &mut self,
        col_idx: usize,
        width: Option<f64>,
        options: SpecColumnOptions,
        format: Option<&SpecCellFormat>,
    ) -> ExportResult<()>;

    /// Register a formula conditional-format rule.
    fn add_conditional_format(&mut self, rule: &SpecConditionalRule) -> ExportResult<()>;

    /// Finalize the artifact. Idempotent.
    fn close(&mut self) -> ExportResult<()>;
}

////////////////////////////////////////////////////////////////////////////////
// #region WorkbookSink

/// `rust_xlsxwriter` backed sink saving to `path_file_out` on close.
pub struct XlsxWorkbookSink {
    path_file_out: PathBuf,
    workbook: Workbook,
    worksheet: Option<Worksheet>,
    dict_formats: HashMap<SpecCellFormat, Format>,
    if_closed: bool,
}

impl XlsxWorkbookSink {
    /// Create a sink bound to an output path. Nothing is written until close.
    pub fn new(path_file_out: impl Into<PathBuf>) -> Self {
        Self {
            path_file_out: path_file_out.into(),
            workbook: Workbook::new(),
            worksheet: None,
            dict_formats: HashMap::new(),
            if_closed: false,
        }
    }

    /// Return output file path as string.
    pub fn file_out(&self) -> String {
        self.path_file_out.to_string_lossy().to_string()
    }

    fn derive_format(&mut self, spec: Option<&SpecCellFormat>) -> ExportResult<Option<Format>> {
        let Some(spec) = spec else {
            return Ok(None);
        };
        if let Some(format) = self.dict_formats.get(spec) {
            return Ok(Some(format.clone()));
        }
        let format = derive_rust_xlsx_format(spec)?;
        self.dict_formats.insert(spec.clone(), format.clone());
        Ok(Some(format))
    }

    fn worksheet_mut(&mut self) -> ExportResult<&mut Worksheet> {
        if self.if_closed {
            return Err(ExportError::Closed);
        }
        self.worksheet
            .as_mut()
            .ok_or_else(|| ExportError::InvalidConfig("worksheet not created".to_string()))
    }
}

impl XlsxSink for XlsxWorkbookSink {
    fn add_sheet(&mut self, sheet: &SpecSheetConfig) -> ExportResult<()> {
        if self.if_closed {
            return Err(ExportError::Closed);
        }
        if self.worksheet.is_some() {
            return Err(ExportError::InvalidConfig(
                "worksheet already created".to_string(),
            ));
        }

        let mut worksheet = Worksheet::new();
        worksheet.set_name(&sheet.name)?;
        worksheet.set_zoom(sheet.zoom);
        if let Some(color) = &sheet.tab_color {
            worksheet.set_tab_color(color.as_str());
        }
        self.worksheet = Some(worksheet);
        Ok(())
    }

    fn write_cell(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        value: &EnumCellValue,
        format: Option<&SpecCellFormat>,
    ) -> ExportResult<()> {
        let format = self.derive_format(format)?;
        let n_row = cast_row_num(row_idx)?;
        let n_col = cast_col_num(col_idx)?;
        let worksheet = self.worksheet_mut()?;

        match (value, format.as_ref()) {
            (EnumCellValue::None, None) => {}
            (EnumCellValue::None, Some(fmt)) => {
                worksheet.write_blank(n_row, n_col, fmt)?;
            }
            (EnumCellValue::String(val), None) => {
                worksheet.write_string(n_row, n_col, val)?;
            }
            (EnumCellValue::String(val), Some(fmt)) => {
                worksheet.write_string_with_format(n_row, n_col, val, fmt)?;
            }
            (EnumCellValue::Number(val), None) => {
                worksheet.write_number(n_row, n_col, *val)?;
            }
            (EnumCellValue::Number(val), Some(fmt)) => {
                worksheet.write_number_with_format(n_row, n_col, *val, fmt)?;
            }
            (EnumCellValue::Boolean(val), None) => {
                worksheet.write_boolean(n_row, n_col, *val)?;
            }
            (EnumCellValue::Boolean(val), Some(fmt)) => {
                worksheet.write_boolean_with_format(n_row, n_col, *val, fmt)?;
            }
            (EnumCellValue::Unsupported(type_name), _) => {
                return Err(ExportError::Cell {
                    row_idx,
                    col_idx,
                    reason: format!("unsupported value type: {type_name}"),
                });
            }
        }
        Ok(())
    }

    fn merge_range(
        &mut self,
        row_idx_first: usize,
        col_idx_first: usize,
        row_idx_last: usize,
        col_idx_last: usize,
        text: &str,
        format: Option<&SpecCellFormat>,
    ) -> ExportResult<()> {
        let format = self.derive_format(format)?.unwrap_or_else(Format::new);
        let n_row_first = cast_row_num(row_idx_first)?;
        let n_col_first = cast_col_num(col_idx_first)?;
        let n_row_last = cast_row_num(row_idx_last)?;
        let n_col_last = cast_col_num(col_idx_last)?;
        let worksheet = self.worksheet_mut()?;

        // Excel rejects single-cell merges.
        if n_row_first == n_row_last && n_col_first == n_col_last {
            worksheet.write_string_with_format(n_row_first, n_col_first, text, &format)?;
            return Ok(());
        }
        worksheet.merge_range(n_row_first, n_col_first, n_row_last, n_col_last, text, &format)?;
        Ok(())
    }

    fn set_column(
        &mut self,
        col_idx: usize,
        width: Option<f64>,
        options: SpecColumnOptions,
        format: Option<&SpecCellFormat>,
    ) -> ExportResult<()> {
        let format = self.derive_format(format)?;
        let n_col = cast_col_num(col_idx)?;
        let worksheet = self.worksheet_mut()?;

        if let Some(val) = width {
            worksheet.set_column_width(n_col, val)?;
        }
        if options.hidden {
            worksheet.set_column_hidden(n_col)?;
        }
        if let Some(fmt) = &format {
            worksheet.set_column_format(n_col, fmt)?;
        }
        Ok(())
    }

    fn add_conditional_format(&mut self, rule: &SpecConditionalRule) -> ExportResult<()> {
        let format = derive_rust_xlsx_format(&rule.format)?;
        let n_row_first = cast_row_num(rule.row_idx_first)?;
        let n_row_last = cast_row_num(rule.row_idx_last)?;
        let n_col = cast_col_num(rule.col_idx)?;
        let worksheet = self.worksheet_mut()?;

        let conditional_format = ConditionalFormatFormula::new()
            .set_rule(rule.criteria.as_str())
            .set_format(format);
        worksheet.add_conditional_format(
            n_row_first,
            n_col,
            n_row_last,
            n_col,
            &conditional_format,
        )?;
        Ok(())
    }

    fn close(&mut self) -> ExportResult<()> {
        if self.if_closed {
            return Ok(());
        }
        if let Some(worksheet) = self.worksheet.take() {
            self.workbook.push_worksheet(worksheet);
        }
        self.workbook.save(&self.path_file_out)?;
        self.if_closed = true;
        log::debug!("Saved workbook {}.", self.file_out());
        Ok(())
    }
}

/// Convert a format spec into a `rust_xlsxwriter` format.
///
/// Border indices and alignment names the backend has no style for are
/// rejected rather than dropped.
pub fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> ExportResult<Format> {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.as_str());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold == Some(true) {
        format = format.set_bold();
    }
    if spec.italic == Some(true) {
        format = format.set_italic();
    }
    if spec.text_wrap == Some(true) {
        format = format.set_text_wrap();
    }

    if let Some(val) = &spec.align {
        let align =
            derive_format_align(val).ok_or_else(|| derive_unsupported_error("align", val))?;
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign {
        let valign =
            derive_format_valign(val).ok_or_else(|| derive_unsupported_error("valign", val))?;
        format = format.set_align(valign);
    }

    let l_borders: [(&str, Option<i64>, fn(Format, FormatBorder) -> Format); 5] = [
        ("border", spec.border, Format::set_border),
        ("top", spec.top, Format::set_border_top),
        ("bottom", spec.bottom, Format::set_border_bottom),
        ("left", spec.left, Format::set_border_left),
        ("right", spec.right, Format::set_border_right),
    ];
    for (c_key, value, set_side) in l_borders {
        if let Some(val) = value {
            let border =
                derive_format_border(val).ok_or_else(|| derive_unsupported_error(c_key, val))?;
            format = set_side(format, border);
        }
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.as_str());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    Ok(format)
}

fn derive_unsupported_error(c_key: &str, value: impl fmt::Debug) -> ExportError {
    ExportError::InvalidConfig(format!("unsupported {c_key} value {value:?}"))
}

/// Map an xlsxwriter border index (`0..=13`) to a border style.
pub fn derive_format_border(border: i64) -> Option<FormatBorder> {
    const TUP_BORDERS: [FormatBorder; 14] = [
        FormatBorder::None,
        FormatBorder::Thin,
        FormatBorder::Medium,
        FormatBorder::Dashed,
        FormatBorder::Dotted,
        FormatBorder::Thick,
        FormatBorder::Double,
        FormatBorder::Hair,
        FormatBorder::MediumDashed,
        FormatBorder::DashDot,
        FormatBorder::MediumDashDot,
        FormatBorder::DashDotDot,
        FormatBorder::MediumDashDotDot,
        FormatBorder::SlantDashDot,
    ];
    usize::try_from(border)
        .ok()
        .and_then(|n_idx| TUP_BORDERS.get(n_idx).cloned())
}

/// Map a horizontal alignment name.
pub fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        _ => None,
    }
}

/// Map a vertical alignment name (`top`, `vcenter`, ...).
pub fn derive_format_valign(valign: &str) -> Option<FormatAlign> {
    match valign.trim().to_ascii_lowercase().as_str() {
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MemorySink

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumSinkOp {
    /// [`XlsxSink::add_sheet`].
    AddSheet(SpecSheetConfig),
    /// [`XlsxSink::write_cell`].
    WriteCell {
        row_idx: usize,
        col_idx: usize,
        value: EnumCellValue,
        format: Option<SpecCellFormat>,
    },
    /// [`XlsxSink::merge_range`].
    MergeRange {
        row_idx_first: usize,
        col_idx_first: usize,
        row_idx_last: usize,
        col_idx_last: usize,
        text: String,
        format: Option<SpecCellFormat>,
    },
    /// [`XlsxSink::set_column`].
    SetColumn {
        col_idx: usize,
        width: Option<f64>,
        options: SpecColumnOptions,
        format: Option<SpecCellFormat>,
    },
    /// [`XlsxSink::add_conditional_format`].
    ConditionalFormat(SpecConditionalRule),
    /// [`XlsxSink::close`].
    Close,
}

/// Sink that records every call in memory instead of producing a file.
///
/// Useful for previews and for asserting layouts without parsing XLSX.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    ops: Vec<EnumSinkOp>,
    if_closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls in order.
    pub fn ops(&self) -> &[EnumSinkOp] {
        &self.ops
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.if_closed
    }

    /// Recorded cell write at `(row_idx, col_idx)`, if any.
    pub fn cell_at(
        &self,
        row_idx: usize,
        col_idx: usize,
    ) -> Option<(&EnumCellValue, Option<&SpecCellFormat>)> {
        self.ops.iter().find_map(|op| match op {
            EnumSinkOp::WriteCell {
                row_idx: r,
                col_idx: c,
                value,
                format,
            } if *r == row_idx && *c == col_idx => Some((value, format.as_ref())),
            _ => None,
        })
    }

    /// Display text of every merged range, with its first row.
    pub fn merged_labels(&self) -> Vec<(usize, String)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                EnumSinkOp::MergeRange {
                    row_idx_first,
                    text,
                    ..
                } => Some((*row_idx_first, text.clone())),
                _ => None,
            })
            .collect()
    }

    /// Registered conditional-format rules.
    pub fn conditional_rules(&self) -> Vec<&SpecConditionalRule> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                EnumSinkOp::ConditionalFormat(rule) => Some(rule),
                _ => None,
            })
            .collect()
    }

    /// Distinct worksheet rows that received a cell write or merge.
    pub fn rows_touched(&self) -> Vec<usize> {
        let mut l_rows: Vec<usize> = self
            .ops
            .iter()
            .filter_map(|op| match op {
                EnumSinkOp::WriteCell { row_idx, .. } => Some(*row_idx),
                EnumSinkOp::MergeRange { row_idx_first, .. } => Some(*row_idx_first),
                _ => None,
            })
            .collect();
        l_rows.sort_unstable();
        l_rows.dedup();
        l_rows
    }

    fn push(&mut self, op: EnumSinkOp) -> ExportResult<()> {
        if self.if_closed {
            return Err(ExportError::Closed);
        }
        self.ops.push(op);
        Ok(())
    }
}

impl XlsxSink for MemorySink {
    fn add_sheet(&mut self, sheet: &SpecSheetConfig) -> ExportResult<()> {
        self.push(EnumSinkOp::AddSheet(sheet.clone()))
    }

    fn write_cell(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        value: &EnumCellValue,
        format: Option<&SpecCellFormat>,
    ) -> ExportResult<()> {
        cast_row_num(row_idx)?;
        cast_col_num(col_idx)?;
        if let EnumCellValue::Unsupported(type_name) = value {
            return Err(ExportError::Cell {
                row_idx,
                col_idx,
                reason: format!("unsupported value type: {type_name}"),
            });
        }
        self.push(EnumSinkOp::WriteCell {
            row_idx,
            col_idx,
            value: value.clone(),
            format: format.cloned(),
        })
    }

    fn merge_range(
        &mut self,
        row_idx_first: usize,
        col_idx_first: usize,
        row_idx_last: usize,
        col_idx_last: usize,
        text: &str,
        format: Option<&SpecCellFormat>,
    ) -> ExportResult<()> {
        self.push(EnumSinkOp::MergeRange {
            row_idx_first,
            col_idx_first,
            row_idx_last,
            col_idx_last,
            text: text.to_string(),
            format: format.cloned(),
        })
    }

    fn set_column(
        &mut self,
        col_idx: usize,
        width: Option<f64>,
        options: SpecColumnOptions,
        format: Option<&SpecCellFormat>,
    ) -> ExportResult<()> {
        self.push(EnumSinkOp::SetColumn {
            col_idx,
            width,
            options,
            format: format.cloned(),
        })
    }

    fn add_conditional_format(&mut self, rule: &SpecConditionalRule) -> ExportResult<()> {
        self.push(EnumSinkOp::ConditionalFormat(rule.clone()))
    }

    fn close(&mut self) -> ExportResult<()> {
        if self.if_closed {
            return Ok(());
        }
        self.ops.push(EnumSinkOp::Close);
        self.if_closed = true;
        Ok(())
    }
}

/// Render recorded cells as a row-major text grid (blank for untouched cells).
pub fn derive_text_grid(sink: &MemorySink, height: usize, width: usize) -> Vec<Vec<String>> {
    let mut l_grid = vec![vec![String::new(); width]; height];
    for op in sink.ops() {
        match op {
            EnumSinkOp::WriteCell {
                row_idx,
                col_idx,
                value,
                ..
            } if *row_idx < height && *col_idx < width => {
                l_grid[*row_idx][*col_idx] = derive_display_text(value);
            }
            EnumSinkOp::MergeRange {
                row_idx_first,
                col_idx_first,
                text,
                ..
            } if *row_idx_first < height && *col_idx_first < width => {
                l_grid[*row_idx_first][*col_idx_first] = text.clone();
            }
            _ => {}
        }
    }
    l_grid
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_rejects_writes_after_close() {
        let mut sink = MemorySink::new();
        sink.add_sheet(&SpecSheetConfig::default()).expect("add sheet");
        sink.close().expect("close");
        sink.close().expect("close is idempotent");
        assert!(sink.is_closed());

        let err = sink
            .write_cell(0, 0, &EnumCellValue::Number(1.0), None)
            .expect_err("write after close");
        assert!(matches!(err, ExportError::Closed));
        assert_eq!(sink.ops().last(), Some(&EnumSinkOp::Close));
    }

    #[test]
    fn memory_sink_text_grid_places_cells_and_merges() {
        let mut sink = MemorySink::new();
        sink.write_cell(0, 1, &"h".into(), None).expect("write");
        sink.merge_range(1, 0, 1, 1, "GROUP #1", None).expect("merge");
        sink.write_cell(2, 0, &EnumCellValue::Number(2.0), None).expect("write");

        assert_eq!(
            derive_text_grid(&sink, 3, 2),
            vec![
                vec!["".to_string(), "h".to_string()],
                vec!["GROUP #1".to_string(), "".to_string()],
                vec!["2".to_string(), "".to_string()],
            ]
        );
        assert_eq!(sink.rows_touched(), vec![0, 1, 2]);
    }

    #[test]
    fn workbook_sink_writes_file_on_close() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.xlsx");

        let mut sink = XlsxWorkbookSink::new(&path);
        assert_eq!(sink.file_out(), path.to_string_lossy());
        sink.add_sheet(&SpecSheetConfig::default()).expect("add sheet");
        sink.write_cell(0, 0, &"a".into(), None).expect("write");
        sink.merge_range(1, 0, 1, 0, "GROUP #1", None)
            .expect("single-cell merge falls back to write");
        sink.close().expect("close");

        assert!(path.is_file());
        assert!(matches!(
            sink.write_cell(2, 0, &"b".into(), None),
            Err(ExportError::Closed)
        ));
    }

    #[test]
    fn border_and_align_names_map_to_native_styles() {
        assert!(matches!(derive_format_border(1), Some(FormatBorder::Thin)));
        assert!(matches!(derive_format_border(13), Some(FormatBorder::SlantDashDot)));
        assert!(derive_format_border(14).is_none());
        assert!(derive_format_border(-1).is_none());
        assert!(matches!(
            derive_format_align(" Center "),
            Some(FormatAlign::Center)
        ));
        assert!(derive_format_align("vcenter").is_none());
        assert!(matches!(
            derive_format_valign("vcenter"),
            Some(FormatAlign::VerticalCenter)
        ));
        assert!(derive_format_valign("sideways").is_none());
    }

    #[test]
    fn unmappable_format_values_are_rejected() {
        let spec = SpecCellFormat {
            border: Some(42),
            ..Default::default()
        };
        assert!(matches!(
            derive_rust_xlsx_format(&spec),
            Err(ExportError::InvalidConfig(_))
        ));

        let spec = SpecCellFormat {
            align: Some("top".to_string()),
            ..Default::default()
        };
        assert!(derive_rust_xlsx_format(&spec).is_err());

        let mut sink = XlsxWorkbookSink::new("unused.xlsx");
        sink.add_sheet(&SpecSheetConfig::default()).expect("add sheet");
        assert!(matches!(
            sink.write_cell(0, 0, &"a".into(), Some(&spec)),
            Err(ExportError::InvalidConfig(_))
        ));
    }
}
