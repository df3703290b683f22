//! Stateless helper utilities used by the grouped export pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::conf::{
    C_GROUP_LABEL_PREFIX, N_LEN_EXCEL_CELL_STRING_MAX, N_LEN_EXCEL_SHEET_NAME_MAX,
    TUP_EXCEL_ILLEGAL,
};
use crate::error::{ExportError, ExportResult};
use crate::spec::{EnumCellValue, EnumGroupNameRule};

static RE_SELECTOR_SEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("selector separator pattern is valid"));

////////////////////////////////////////////////////////////////////////////////
// #region CellValueText

/// Render a cell value as display text.
///
/// Integral finite numbers drop the fractional part (`3.0` -> `"3"`).
pub fn derive_display_text(value: &EnumCellValue) -> String {
    match value {
        EnumCellValue::None => String::new(),
        EnumCellValue::String(val) => val.clone(),
        EnumCellValue::Number(val) => {
            if val.is_finite() && val.fract() == 0.0 && val.abs() < 1e15 {
                format!("{}", *val as i64)
            } else {
                val.to_string()
            }
        }
        EnumCellValue::Boolean(val) => if *val { "True" } else { "False" }.to_string(),
        EnumCellValue::Unsupported(type_name) => type_name.clone(),
    }
}

/// Check that a value has a scalar cell representation.
///
/// Returns the skip reason on failure.
pub fn validate_cell_value(value: &EnumCellValue) -> Result<(), String> {
    match value {
        EnumCellValue::Number(val) if !val.is_finite() => {
            Err(format!("non-finite number {val} is not supported"))
        }
        EnumCellValue::String(val) if val.chars().count() > N_LEN_EXCEL_CELL_STRING_MAX => {
            Err(format!(
                "string length {} exceeds Excel limit {N_LEN_EXCEL_CELL_STRING_MAX}",
                val.chars().count()
            ))
        }
        EnumCellValue::Unsupported(type_name) => {
            Err(format!("unsupported value type: {type_name}"))
        }
        _ => Ok(()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region GroupLabels

/// Label for group `idx_group` (zero-based) with key `key`.
pub fn derive_group_label(
    rule: EnumGroupNameRule,
    idx_group: usize,
    key: &EnumCellValue,
) -> String {
    match rule {
        EnumGroupNameRule::Number => format!("{C_GROUP_LABEL_PREFIX}{}", idx_group + 1),
        EnumGroupNameRule::Text => derive_display_text(key),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnRefs

/// Split a column selector (`"a, b,c"`) into column names.
pub fn split_column_selector(selector: &str) -> Vec<String> {
    RE_SELECTOR_SEP
        .split(selector.trim())
        .filter(|c_name| !c_name.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Convert zero-based column index to Excel letters (`0` -> `A`, `26` -> `AA`).
pub fn derive_column_letter(col_idx: usize) -> String {
    let mut l_chars = Vec::new();
    let mut n_rest = col_idx + 1;
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// Single-column A1 range for zero-based inclusive rows (`E2:E12`).
pub fn derive_column_range_ref(col_idx: usize, row_idx_first: usize, row_idx_last: usize) -> String {
    let c_col = derive_column_letter(col_idx);
    format!("{c_col}{}:{c_col}{}", row_idx_first + 1, row_idx_last + 1)
}

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> ExportResult<()> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter_map(|(c_name, l_pos)| {
            if l_pos.len() > 1 {
                Some(format!(
                    "{c_name:?} x{} at indices {:?}",
                    l_pos.len(),
                    l_pos
                ))
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    Err(ExportError::InvalidTable(format!(
        "Duplicate column names detected: {c_msg}"
    )))
}

pub fn cast_row_num(value: usize) -> ExportResult<u32> {
    u32::try_from(value).map_err(|_| ExportError::ExcelLimit(format!("row index overflow: {value}")))
}

pub fn cast_col_num(value: usize) -> ExportResult<u16> {
    u16::try_from(value)
        .map_err(|_| ExportError::ExcelLimit(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
///
/// Leading and trailing apostrophes are trimmed with whitespace, before and
/// after truncation.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let is_trimmed = |chr: char| chr.is_whitespace() || chr == '\'';

    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    let c_name: String = c_name
        .trim_matches(is_trimmed)
        .chars()
        .take(N_LEN_EXCEL_SHEET_NAME_MAX)
        .collect();
    let c_name = c_name.trim_end_matches(is_trimmed);
    if c_name.is_empty() {
        return "Sheet".to_string();
    }
    c_name.to_string()
}

/// Check `#RRGGBB` / `RRGGBB` color strings.
pub fn validate_hex_color(color: &str) -> Result<(), String> {
    let c_hex = color.strip_prefix('#').unwrap_or(color);
    if c_hex.len() == 6 && c_hex.chars().all(|chr| chr.is_ascii_hexdigit()) {
        return Ok(());
    }
    Err(format!("invalid color {color:?}; expected \"#RRGGBB\""))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
