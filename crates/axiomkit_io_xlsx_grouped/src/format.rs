//! Format resolution: config style blocks -> generic and per-column formats.

use crate::conf::N_BORDER_CELL;
use crate::error::{ExportError, ExportResult};
use crate::sink::{derive_format_align, derive_format_border, derive_format_valign};
use crate::spec::{
    SpecCellFormat, SpecColumnFormat, SpecExportConfig, SpecExportReport, SpecFormatPlan,
    SpecFormatSlot,
};
use crate::util::{split_column_selector, validate_hex_color};

/// Check a format spec for values the backend cannot represent.
pub fn validate_cell_format(spec: &SpecCellFormat) -> Result<(), String> {
    if let Some(val) = spec.font_size
        && !(1..=409).contains(&val)
    {
        return Err(format!("font_size must be in 1..=409, got {val}"));
    }

    for (c_key, value) in [
        ("border", spec.border),
        ("top", spec.top),
        ("bottom", spec.bottom),
        ("left", spec.left),
        ("right", spec.right),
    ] {
        if let Some(val) = value
            && derive_format_border(val).is_none()
        {
            return Err(format!("{c_key} must be in 0..=13, got {val}"));
        }
    }

    if let Some(val) = &spec.align
        && derive_format_align(val).is_none()
    {
        return Err(format!("unknown align value {val:?}"));
    }
    if let Some(val) = &spec.valign
        && derive_format_valign(val).is_none()
    {
        return Err(format!("unknown valign value {val:?}"));
    }

    for (c_key, value) in [("bg_color", &spec.bg_color), ("font_color", &spec.font_color)] {
        if let Some(val) = value {
            validate_hex_color(val).map_err(|err| format!("{c_key}: {err}"))?;
        }
    }

    Ok(())
}

/// Resolve one generic slot, degrading malformed or invalid records to `None`.
pub fn resolve_generic_format(
    slot_name: &str,
    slot: &SpecFormatSlot,
    report: &mut SpecExportReport,
) -> Option<SpecCellFormat> {
    let checked = match (&slot.format, &slot.error) {
        (_, Some(err)) => Err(err.clone()),
        (Some(spec), None) => validate_cell_format(spec).map(|()| spec.clone()),
        (None, None) => return None,
    };
    match checked {
        Ok(spec) => Some(spec),
        Err(err) => {
            log::warn!("Format {slot_name:?} ignored: {err}");
            report.warn(format!("Format {slot_name:?} ignored: {err}"));
            None
        }
    }
}

/// Resolve all formats for a table with `columns`.
///
/// Selectors are applied in config order, so a later block overrides an
/// earlier one for the attributes it sets. Names missing from `columns` are
/// ignored.
pub fn plan_formats(
    config: &SpecExportConfig,
    columns: &[String],
    report: &mut SpecExportReport,
) -> ExportResult<SpecFormatPlan> {
    let fmt_table_header =
        resolve_generic_format("table_header", &config.table_header, report);
    let fmt_group_header =
        resolve_generic_format("group_header", &config.group_header, report);
    let fmt_table_cell = resolve_generic_format("table_cell", &config.table_cell, report);

    let mut fmts_by_col = vec![SpecColumnFormat::default(); columns.len()];

    for style in &config.columns {
        if let Some(fmt) = &style.format {
            validate_cell_format(fmt).map_err(|err| {
                ExportError::InvalidConfig(format!("columns[{:?}].format: {err}", style.selector))
            })?;
        }
        if let Some(val) = style.width
            && !(val.is_finite() && val >= 0.0)
        {
            return Err(ExportError::InvalidConfig(format!(
                "columns[{:?}].width must be a non-negative number, got {val}",
                style.selector
            )));
        }

        for c_name in split_column_selector(&style.selector) {
            let Some(n_idx_col) = columns.iter().position(|col| *col == c_name) else {
                log::debug!("Column selector {c_name:?} matches no table column.");
                continue;
            };

            let col_format = &mut fmts_by_col[n_idx_col];
            if let Some(fmt) = &style.format {
                col_format.fmt_display = Some(fmt.clone());
                col_format.fmt_cell = Some(fmt.with_border(N_BORDER_CELL));
            }
            if style.width.is_some() {
                col_format.width = style.width;
            }
            if let Some(options) = style.options {
                col_format.options = options;
            }
        }
    }

    if config.if_style_unmatched_columns {
        for col_format in fmts_by_col.iter_mut().filter(|fmt| fmt.fmt_cell.is_none()) {
            col_format.fmt_cell = fmt_table_cell.clone();
        }
    }

    Ok(SpecFormatPlan {
        fmt_table_header,
        fmt_group_header,
        fmt_table_cell,
        fmts_by_col,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::spec::SpecColumnStyle;

    fn derive_columns() -> Vec<String> {
        ["group", "title", "a", "b", "result"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn derive_centered() -> SpecCellFormat {
        SpecCellFormat {
            text_wrap: Some(true),
            align: Some("center".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn shared_selector_gives_identical_formats() {
        let config = SpecExportConfig {
            columns: vec![SpecColumnStyle::new("a, b").format(derive_centered()).width(8.0)],
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let plan = plan_formats(&config, &derive_columns(), &mut report).expect("plan");

        assert_eq!(plan.fmts_by_col[2], plan.fmts_by_col[3]);
        assert_eq!(plan.fmts_by_col[2].width, Some(8.0));
        assert_eq!(plan.fmts_by_col[2].fmt_display, Some(derive_centered()));
        assert_eq!(
            plan.fmts_by_col[2].fmt_cell,
            Some(derive_centered().with_border(1))
        );
    }

    #[test]
    fn unmatched_columns_get_no_format() {
        let config = SpecExportConfig {
            columns: vec![SpecColumnStyle::new("title").format(derive_centered())],
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let plan = plan_formats(&config, &derive_columns(), &mut report).expect("plan");

        assert_eq!(plan.fmts_by_col[0], SpecColumnFormat::default());
        assert_eq!(plan.fmts_by_col[4].fmt_cell, None);
        assert!(plan.fmts_by_col[1].fmt_cell.is_some());
    }

    #[test]
    fn unmatched_columns_can_use_table_cell() {
        let config = SpecExportConfig {
            if_style_unmatched_columns: true,
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let plan = plan_formats(&config, &derive_columns(), &mut report).expect("plan");
        assert_eq!(plan.fmts_by_col[0].fmt_cell.as_ref(), config.table_cell.as_format());
        assert_eq!(plan.fmts_by_col[0].fmt_display, None);
    }

    #[test]
    fn unknown_selector_names_are_inert() {
        let config = SpecExportConfig {
            columns: vec![SpecColumnStyle::new("missing, title").hidden()],
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let plan = plan_formats(&config, &derive_columns(), &mut report).expect("plan");
        assert!(plan.fmts_by_col[1].options.hidden);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn later_selector_overrides_earlier() {
        let config = SpecExportConfig {
            columns: vec![
                SpecColumnStyle::new("a, b").format(derive_centered()).width(8.0),
                SpecColumnStyle::new("b").width(20.0),
            ],
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let plan = plan_formats(&config, &derive_columns(), &mut report).expect("plan");
        assert_eq!(plan.fmts_by_col[2].width, Some(8.0));
        assert_eq!(plan.fmts_by_col[3].width, Some(20.0));
        assert_eq!(plan.fmts_by_col[3].fmt_display, Some(derive_centered()));
    }

    #[test]
    fn invalid_generic_format_degrades_to_none() {
        let config = SpecExportConfig {
            group_header: SpecCellFormat {
                bg_color: Some("light green".to_string()),
                ..Default::default()
            }
            .into(),
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let plan = plan_formats(&config, &derive_columns(), &mut report).expect("plan");
        assert_eq!(plan.fmt_group_header, None);
        assert!(plan.fmt_table_header.is_some());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("group_header"));
    }

    #[test]
    fn invalid_column_format_is_fatal() {
        let config = SpecExportConfig {
            columns: vec![SpecColumnStyle::new("title").format(SpecCellFormat {
                border: Some(42),
                ..Default::default()
            })],
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let err = plan_formats(&config, &derive_columns(), &mut report)
            .expect_err("invalid column format");
        assert!(matches!(err, ExportError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_generic_slot_degrades_to_none() {
        let config = SpecExportConfig::from_json_str(
            r#"{"table_header": {"bold": "yes"}, "table_cell": 5}"#,
        )
        .expect("generic slots parse leniently");
        let mut report = SpecExportReport::default();
        let plan = plan_formats(&config, &derive_columns(), &mut report).expect("plan");

        assert_eq!(plan.fmt_table_header, None);
        assert_eq!(plan.fmt_table_cell, None);
        assert!(plan.fmt_group_header.is_some());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("table_header"));
    }

    #[test]
    fn vertical_names_are_rejected_for_horizontal_align() {
        let spec = SpecCellFormat {
            align: Some("vcenter".to_string()),
            ..Default::default()
        };
        assert!(validate_cell_format(&spec).is_err());

        let spec = SpecCellFormat {
            valign: Some("vcenter".to_string()),
            ..Default::default()
        };
        assert!(validate_cell_format(&spec).is_ok());
    }
}
