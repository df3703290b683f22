//! Shared specification models for grouped XLSX export.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::conf::{
    C_GROUP_NAME_RULE_NUMBER, C_GROUP_NAME_RULE_TEXT, derive_default_formats,
    derive_default_result_palette,
};
use crate::error::{ExportError, ExportResult};
use crate::util::validate_hex_color;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification, using xlsxwriter property names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Top border override.
    pub top: Option<i64>,
    /// Bottom border override.
    pub bottom: Option<i64>,
    /// Left border override.
    pub left: Option<i64>,
    /// Right border override.
    pub right: Option<i64>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color (`#RRGGBB`).
    #[serde(alias = "fg_color")]
    pub bg_color: Option<String>,
    /// Font color (`#RRGGBB`).
    #[serde(alias = "color")]
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            top: other.top.or(self.top),
            bottom: other.bottom.or(self.bottom),
            left: other.left.or(self.left),
            right: other.right.or(self.right),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }

    /// Return a copy with the all-sides border forced to `border`.
    pub fn with_border(&self, border: i64) -> SpecCellFormat {
        self.with_(SpecCellFormat {
            border: Some(border),
            ..Default::default()
        })
    }
}

/// Generic format slot (`table_cell`, `table_header`, `group_header`).
///
/// Deserializes leniently: a malformed record keeps its parse error so the
/// resolver can drop the slot with a warning instead of failing the config.
/// JSON `null` leaves the slot empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFormatSlot {
    /// Parsed format, if any.
    pub format: Option<SpecCellFormat>,
    /// Parse error of a malformed record.
    pub error: Option<String>,
}

impl SpecFormatSlot {
    /// Parsed format, ignoring parse errors.
    pub fn as_format(&self) -> Option<&SpecCellFormat> {
        self.format.as_ref()
    }
}

impl From<SpecCellFormat> for SpecFormatSlot {
    fn from(format: SpecCellFormat) -> Self {
        Self {
            format: Some(format),
            error: None,
        }
    }
}

impl From<Option<SpecCellFormat>> for SpecFormatSlot {
    fn from(format: Option<SpecCellFormat>) -> Self {
        Self {
            format,
            error: None,
        }
    }
}

impl Serialize for SpecFormatSlot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.format.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SpecFormatSlot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(match serde_json::from_value::<SpecCellFormat>(value) {
            Ok(format) => format.into(),
            Err(err) => Self {
                format: None,
                error: Some(err.to_string()),
            },
        })
    }
}

/// Normalized cell value during layout/write pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Value with no scalar cell representation; carries the source type name.
    Unsupported(String),
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        EnumCellValue::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        EnumCellValue::String(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        EnumCellValue::Number(value)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        EnumCellValue::Number(value as f64)
    }
}

impl From<bool> for EnumCellValue {
    fn from(value: bool) -> Self {
        EnumCellValue::Boolean(value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportConfiguration

/// Rule used to label merged group-header rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumGroupNameRule {
    /// `"GROUP #1"`, `"GROUP #2"`, ... in group order (default).
    #[default]
    Number,
    /// The group key value rendered as text.
    Text,
}

impl EnumGroupNameRule {
    /// Parse a rule name, returning `None` for unrecognized names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            C_GROUP_NAME_RULE_NUMBER => Some(EnumGroupNameRule::Number),
            C_GROUP_NAME_RULE_TEXT => Some(EnumGroupNameRule::Text),
            _ => None,
        }
    }

    /// Parse a rule name, falling back to [`EnumGroupNameRule::Number`].
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            log::warn!("Unknown group name rule {name:?}; falling back to \"number\".");
            EnumGroupNameRule::Number
        })
    }
}

impl<'de> Deserialize<'de> for EnumGroupNameRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let c_name = String::deserialize(deserializer)?;
        Ok(EnumGroupNameRule::from_name_or_default(&c_name))
    }
}

/// What to do when a single data cell cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumCellErrorPolicy {
    /// Leave the cell empty, record it in the report and keep going (default).
    #[default]
    Skip,
    /// Fail the whole export on the first bad cell.
    Abort,
}

/// Worksheet-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecSheetConfig {
    /// Worksheet name; sanitized to Excel rules at construction.
    pub name: String,
    /// Zoom percentage, 10..=400.
    pub zoom: u16,
    /// Tab color (`#RRGGBB`).
    pub tab_color: Option<String>,
}

impl Default for SpecSheetConfig {
    fn default() -> Self {
        Self {
            name: "Manual control".to_string(),
            zoom: 100,
            tab_color: Some("#008000".to_string()),
        }
    }
}

/// Column display options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecColumnOptions {
    /// Hide the column.
    pub hidden: bool,
}

/// One style block shared by every column named in `selector`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecColumnStyle {
    /// Comma-separated column names, e.g. `"result, object, type"`.
    pub selector: String,
    /// Display format; data cells use it with a forced border.
    pub format: Option<SpecCellFormat>,
    /// Column width in character units.
    pub width: Option<f64>,
    /// Column display options.
    pub options: Option<SpecColumnOptions>,
}

impl SpecColumnStyle {
    /// Create an empty style block for `selector`.
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Default::default()
        }
    }

    /// Set the display format.
    pub fn format(mut self, format: SpecCellFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the column width.
    pub fn width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    /// Hide the column.
    pub fn hidden(mut self) -> Self {
        self.options = Some(SpecColumnOptions { hidden: true });
        self
    }
}

/// Complete, instance-owned export configuration.
///
/// Missing fields in a JSON document fall back to [`SpecExportConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecExportConfig {
    /// Worksheet settings.
    pub sheet: SpecSheetConfig,
    /// Generic cell format; used for unmatched columns only when
    /// `if_style_unmatched_columns` is set.
    pub table_cell: SpecFormatSlot,
    /// Header row format.
    pub table_header: SpecFormatSlot,
    /// Merged group-header format.
    pub group_header: SpecFormatSlot,
    /// Per-column style blocks, applied in order.
    pub columns: Vec<SpecColumnStyle>,
    /// Blank rows separating group blocks.
    pub group_blank_rows: usize,
    /// Group label rule.
    pub group_name_rule: EnumGroupNameRule,
    /// Column receiving palette conditional formatting; `None` disables it.
    pub result_column: Option<String>,
    /// Ordered palette; value `i` (1-based) maps to entry `i - 1`.
    pub result_palette: Vec<String>,
    /// Per-cell failure handling.
    pub cell_error_policy: EnumCellErrorPolicy,
    /// Write unmatched columns with `table_cell` instead of unstyled.
    pub if_style_unmatched_columns: bool,
}

impl SpecExportConfig {
    /// Parse a (possibly partial) JSON config over the defaults.
    pub fn from_json_str(txt: &str) -> ExportResult<Self> {
        Ok(serde_json::from_str(txt)?)
    }

    /// Check settings that cannot be degraded gracefully.
    ///
    /// Generic format slots are not checked here; invalid ones are dropped
    /// with a warning when formats are resolved.
    pub fn validate(&self) -> ExportResult<()> {
        if !(10..=400).contains(&self.sheet.zoom) {
            return Err(ExportError::InvalidConfig(format!(
                "sheet.zoom must be in 10..=400, got {}",
                self.sheet.zoom
            )));
        }
        if let Some(color) = &self.sheet.tab_color {
            validate_hex_color(color)
                .map_err(|err| ExportError::InvalidConfig(format!("sheet.tab_color: {err}")))?;
        }
        if let Some(name) = &self.result_column
            && name.trim().is_empty()
        {
            return Err(ExportError::InvalidConfig(
                "result_column must not be empty; use null to disable".to_string(),
            ));
        }
        for (n_idx, color) in self.result_palette.iter().enumerate() {
            validate_hex_color(color).map_err(|err| {
                ExportError::InvalidConfig(format!("result_palette[{n_idx}]: {err}"))
            })?;
        }
        Ok(())
    }
}

impl Default for SpecExportConfig {
    fn default() -> Self {
        let dict_fmt = derive_default_formats();
        Self {
            sheet: SpecSheetConfig::default(),
            table_cell: dict_fmt.get("table_cell").cloned().into(),
            table_header: dict_fmt.get("table_header").cloned().into(),
            group_header: dict_fmt.get("group_header").cloned().into(),
            columns: Vec::new(),
            group_blank_rows: 3,
            group_name_rule: EnumGroupNameRule::Number,
            result_column: Some("result".to_string()),
            result_palette: derive_default_result_palette(),
            cell_error_policy: EnumCellErrorPolicy::Skip,
            if_style_unmatched_columns: false,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ResolvedFormats

/// Formats derived for one table column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecColumnFormat {
    /// Raw style block, used as the column default format.
    pub fmt_display: Option<SpecCellFormat>,
    /// Bordered variant used for written data cells.
    pub fmt_cell: Option<SpecCellFormat>,
    /// Column width.
    pub width: Option<f64>,
    /// Column display options.
    pub options: SpecColumnOptions,
}

/// All formats resolved from one [`SpecExportConfig`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecFormatPlan {
    /// Header row format.
    pub fmt_table_header: Option<SpecCellFormat>,
    /// Group-header format.
    pub fmt_group_header: Option<SpecCellFormat>,
    /// Generic cell format.
    pub fmt_table_cell: Option<SpecCellFormat>,
    /// Per-column formats, aligned with table columns.
    pub fmts_by_col: Vec<SpecColumnFormat>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LayoutSpecification

/// Role of one worksheet row in the grouped layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumLayoutRowKind {
    /// Column-name header.
    Header,
    /// Padding row.
    Blank,
    /// Merged group label row.
    GroupHeader {
        /// Zero-based group index.
        idx_group: usize,
    },
    /// One source record.
    Data {
        /// Zero-based group index.
        idx_group: usize,
        /// Row index in the source table.
        idx_row_source: usize,
    },
}

/// One worksheet row in the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLayoutRow {
    /// Zero-based worksheet row index.
    pub row_idx: usize,
    /// Row role.
    pub kind: EnumLayoutRowKind,
}

/// One group block.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecLayoutGroup {
    /// Group key value.
    pub key: EnumCellValue,
    /// Text written into the merged header.
    pub label: String,
    /// Worksheet row of the merged header.
    pub row_idx_header: usize,
    /// Source row indices, original order.
    pub rows_source: Vec<usize>,
}

/// Planned worksheet layout for one export.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecLayoutPlan {
    /// Number of table columns.
    pub width: usize,
    /// Blank rows before each group block.
    pub n_blank_rows: usize,
    /// Groups in first-occurrence order.
    pub groups: Vec<SpecLayoutGroup>,
    /// Every worksheet row, contiguous from 0.
    pub rows: Vec<SpecLayoutRow>,
}

impl SpecLayoutPlan {
    /// Total worksheet rows covered by the layout.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Zero-based index of the last layout row.
    pub fn row_idx_last(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Number of data rows.
    pub fn n_rows_data(&self) -> usize {
        self.groups.iter().map(|group| group.rows_source.len()).sum()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConditionalFormatSpecification

/// Formula conditional-format rule over one column range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecConditionalRule {
    /// Zero-based column index.
    pub col_idx: usize,
    /// Zero-based first row (inclusive).
    pub row_idx_first: usize,
    /// Zero-based last row (inclusive).
    pub row_idx_last: usize,
    /// A1 range, e.g. `E2:E12`.
    pub range_ref: String,
    /// Formula criterion, e.g. `=$E2=1`.
    pub criteria: String,
    /// Format applied to matching cells.
    pub format: SpecCellFormat,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// One data cell left out of the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSkippedCell {
    /// Zero-based worksheet row.
    pub row_idx: usize,
    /// Zero-based column.
    pub col_idx: usize,
    /// Column name.
    pub col_name: String,
    /// Why the cell was not written.
    pub reason: String,
}

/// Result of one export run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExportReport {
    /// Sheet name actually used.
    pub sheet_name: String,
    /// Worksheet rows covered by the layout.
    pub cnt_rows: u64,
    /// Group blocks written.
    pub cnt_groups: u64,
    /// Data rows written.
    pub cnt_rows_data: u64,
    /// Data cells written.
    pub cnt_cells_written: u64,
    /// Conditional-format rules registered.
    pub cnt_conditional_rules: u64,
    /// Cells skipped under [`EnumCellErrorPolicy::Skip`].
    pub skipped_cells: Vec<SpecSkippedCell>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecExportReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Number of skipped cells.
    pub fn skipped_count(&self) -> usize {
        self.skipped_cells.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_rows".to_string(), self.cnt_rows);
        dict_counts.insert("cnt_groups".to_string(), self.cnt_groups);
        dict_counts.insert("cnt_rows_data".to_string(), self.cnt_rows_data);
        dict_counts.insert("cnt_cells_written".to_string(), self.cnt_cells_written);
        dict_counts.insert("cnt_cells_skipped".to_string(), self.skipped_count() as u64);
        dict_counts.insert(
            "cnt_conditional_rules".to_string(),
            self.cnt_conditional_rules,
        );
        dict_counts.insert("cnt_warnings".to_string(), self.warnings.len() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} sheet={:?} rows={} groups={} data={} written={} skipped={} rules={} warnings={}",
            self.sheet_name,
            dict_counts["cnt_rows"],
            dict_counts["cnt_groups"],
            dict_counts["cnt_rows_data"],
            dict_counts["cnt_cells_written"],
            dict_counts["cnt_cells_skipped"],
            dict_counts["cnt_conditional_rules"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for SpecExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[XLSX]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn merge_prefers_right_side_values() {
        let base = SpecCellFormat {
            bold: Some(true),
            align: Some("left".to_string()),
            ..Default::default()
        };
        let merged = base.with_(SpecCellFormat {
            align: Some("center".to_string()),
            ..Default::default()
        });
        assert_eq!(merged.bold, Some(true));
        assert_eq!(merged.align.as_deref(), Some("center"));
        assert_eq!(base.with_border(1).border, Some(1));
    }

    #[test]
    fn cell_format_accepts_xlsxwriter_color_aliases() {
        let fmt: SpecCellFormat =
            serde_json::from_str(r##"{"fg_color": "#D7E4BC", "color": "#FFFFFF", "bold": true}"##)
                .expect("parse format");
        assert_eq!(fmt.bg_color.as_deref(), Some("#D7E4BC"));
        assert_eq!(fmt.font_color.as_deref(), Some("#FFFFFF"));
        assert_eq!(fmt.bold, Some(true));
    }

    #[test]
    fn unknown_group_name_rule_falls_back_to_number() {
        let rule: EnumGroupNameRule = serde_json::from_str("\"roman\"").expect("parse rule");
        assert_eq!(rule, EnumGroupNameRule::Number);
        let rule: EnumGroupNameRule = serde_json::from_str("\"text\"").expect("parse rule");
        assert_eq!(rule, EnumGroupNameRule::Text);
        assert_eq!(EnumGroupNameRule::from_name("?"), None);
    }

    #[test]
    fn report_to_dict_and_format() {
        let report = SpecExportReport {
            sheet_name: "S".to_string(),
            cnt_rows: 12,
            cnt_groups: 2,
            cnt_rows_data: 3,
            cnt_cells_written: 8,
            cnt_conditional_rules: 8,
            skipped_cells: vec![SpecSkippedCell {
                row_idx: 5,
                col_idx: 1,
                col_name: "b".to_string(),
                reason: "non-finite number".to_string(),
            }],
            warnings: vec![],
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_cells_skipped"], 1);
        assert_eq!(dict_counts["cnt_warnings"], 0);
        assert_eq!(
            report.to_string(),
            "[XLSX] sheet=\"S\" rows=12 groups=2 data=3 written=8 skipped=1 rules=8 warnings=0"
        );
    }

    #[test]
    fn partial_json_config_merges_over_defaults() {
        let config = SpecExportConfig::from_json_str(
            r#"{"group_blank_rows": 1, "sheet": {"name": "Review"}, "result_column": null}"#,
        )
        .expect("parse config");
        assert_eq!(config.group_blank_rows, 1);
        assert_eq!(config.sheet.name, "Review");
        assert_eq!(config.sheet.zoom, 100);
        assert_eq!(config.result_column, None);
        assert_eq!(config.result_palette.len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        assert!(matches!(
            SpecExportConfig::from_json_str(r#"{"group_padding": 2}"#),
            Err(ExportError::Json(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_palette_and_zoom() {
        let mut config = SpecExportConfig::default();
        config.result_palette.push("teal".to_string());
        assert!(matches!(config.validate(), Err(ExportError::InvalidConfig(_))));

        let mut config = SpecExportConfig::default();
        config.sheet.zoom = 5;
        assert!(matches!(config.validate(), Err(ExportError::InvalidConfig(_))));

        let config = SpecExportConfig {
            result_column: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ExportError::InvalidConfig(_))));
    }

    #[test]
    fn generic_slots_keep_parse_errors_instead_of_failing() {
        let config = SpecExportConfig::from_json_str(
            r#"{
                "table_header": {"bold": "yes"},
                "group_header": {"bold": true, "merge": true},
                "table_cell": 5
            }"#,
        )
        .expect("parse config");
        for slot in [&config.table_header, &config.group_header, &config.table_cell] {
            assert_eq!(slot.format, None);
            assert!(slot.error.is_some());
        }

        let config = SpecExportConfig::from_json_str(r#"{"table_header": null}"#)
            .expect("parse config");
        assert_eq!(config.table_header, SpecFormatSlot::default());
        assert_eq!(
            config.group_header.as_format(),
            derive_default_formats().get("group_header")
        );
    }
}
