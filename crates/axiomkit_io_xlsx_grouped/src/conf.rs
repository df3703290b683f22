//! XLSX constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{SpecCellFormat, SpecExportConfig};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Excel cell text maximum length.
pub const N_LEN_EXCEL_CELL_STRING_MAX: usize = 32_767;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Border weight forced onto data-cell formats.
pub const N_BORDER_CELL: i64 = 1;
/// Label prefix used by the numeric group name rule.
pub const C_GROUP_LABEL_PREFIX: &str = "GROUP #";
/// Group name rule keys.
pub const C_GROUP_NAME_RULE_NUMBER: &str = "number";
pub const C_GROUP_NAME_RULE_TEXT: &str = "text";

/// Palette for result codes `1..=8`.
pub const TUP_RESULT_PALETTE: [&str; 8] = [
    "#006400", "#8B008B", "#8B0000", "#2F4F4F", "#000080", "#DC143C", "#800000", "#008080",
];

/// Build default named format presets for the generic slots.
///
/// Keys: `table_cell`, `table_header`, `group_header`.
pub fn derive_default_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        border: Some(1),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert("table_cell".to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        "table_header".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            text_wrap: Some(true),
            align: Some("center".to_string()),
            valign: Some("top".to_string()),
            bg_color: Some("#DDDDDD".to_string()),
            top: Some(8),
            bottom: Some(8),
            font_size: Some(12),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "group_header".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            valign: Some("vcenter".to_string()),
            bg_color: Some("#D7E4BC".to_string()),
            font_size: Some(12),
            ..Default::default()
        }),
    );

    dict_fmt
}

/// Default result-code palette as owned strings.
pub fn derive_default_result_palette() -> Vec<String> {
    TUP_RESULT_PALETTE.iter().map(ToString::to_string).collect()
}

/// Format applied to result cells matching palette entry `color`.
pub fn derive_result_format(color: &str) -> SpecCellFormat {
    SpecCellFormat {
        border: Some(N_BORDER_CELL),
        bold: Some(true),
        font_color: Some("#FFFFFF".to_string()),
        bg_color: Some(color.to_string()),
        ..Default::default()
    }
}

/// Build default export configuration.
pub fn derive_default_export_config() -> SpecExportConfig {
    SpecExportConfig::default()
}
