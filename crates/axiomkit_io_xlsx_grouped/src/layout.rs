//! Row layout planning for grouped export.
//!
//! Worksheet shape, with `n` blank padding rows:
//!
//! ```text
//! row 0            header
//! rows 1..=n       blank
//! row n+1          GROUP #1 (merged)
//! ...              group 1 records
//! next n rows      blank
//! next row         GROUP #2 (merged)
//! ...
//! ```
//!
//! No padding follows the last group, so the last layout row is the last
//! record of the last group.

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::error::{ExportError, ExportResult};
use crate::source::TableSource;
use crate::spec::{
    EnumGroupNameRule, EnumLayoutRowKind, SpecLayoutGroup, SpecLayoutPlan, SpecLayoutRow,
};
use crate::util::derive_group_label;

/// Worksheet rows used by a layout: header + per-group (padding + label) + records.
pub fn derive_layout_height(n_rows_data: usize, n_groups: usize, n_blank_rows: usize) -> usize {
    1 + n_groups * (1 + n_blank_rows) + n_rows_data
}

/// Plan the grouped layout of `table` keyed on column `col_idx_group`.
pub fn plan_layout<T: TableSource + ?Sized>(
    table: &T,
    col_idx_group: usize,
    n_blank_rows: usize,
    rule_group_name: EnumGroupNameRule,
) -> ExportResult<SpecLayoutPlan> {
    let n_width = table.width();
    if n_width > N_NCOLS_EXCEL_MAX {
        return Err(ExportError::ExcelLimit(format!(
            "table has {n_width} columns; Excel allows {N_NCOLS_EXCEL_MAX}"
        )));
    }
    if col_idx_group >= n_width {
        return Err(ExportError::InvalidTable(format!(
            "group column index {col_idx_group} out of bounds for width {n_width}"
        )));
    }

    let mut l_groups: Vec<SpecLayoutGroup> = table
        .group_rows(col_idx_group)?
        .into_iter()
        .enumerate()
        .map(|(idx_group, (key, rows_source))| SpecLayoutGroup {
            label: derive_group_label(rule_group_name, idx_group, &key),
            key,
            row_idx_header: 0,
            rows_source,
        })
        .collect();

    let n_rows_data: usize = l_groups.iter().map(|group| group.rows_source.len()).sum();
    let n_height = derive_layout_height(n_rows_data, l_groups.len(), n_blank_rows);
    if n_height > N_NROWS_EXCEL_MAX {
        return Err(ExportError::ExcelLimit(format!(
            "layout needs {n_height} rows; Excel allows {N_NROWS_EXCEL_MAX}"
        )));
    }

    let mut l_rows = Vec::with_capacity(n_height);
    l_rows.push(SpecLayoutRow {
        row_idx: 0,
        kind: EnumLayoutRowKind::Header,
    });

    let mut n_row_cursor = 1;
    for (idx_group, group) in l_groups.iter_mut().enumerate() {
        for _ in 0..n_blank_rows {
            l_rows.push(SpecLayoutRow {
                row_idx: n_row_cursor,
                kind: EnumLayoutRowKind::Blank,
            });
            n_row_cursor += 1;
        }

        group.row_idx_header = n_row_cursor;
        l_rows.push(SpecLayoutRow {
            row_idx: n_row_cursor,
            kind: EnumLayoutRowKind::GroupHeader { idx_group },
        });
        n_row_cursor += 1;

        for idx_row_source in &group.rows_source {
            l_rows.push(SpecLayoutRow {
                row_idx: n_row_cursor,
                kind: EnumLayoutRowKind::Data {
                    idx_group,
                    idx_row_source: *idx_row_source,
                },
            });
            n_row_cursor += 1;
        }
    }

    debug_assert_eq!(l_rows.len(), n_height);
    log::debug!(
        "Planned layout: {} groups, {n_rows_data} records, {n_height} rows.",
        l_groups.len()
    );

    Ok(SpecLayoutPlan {
        width: n_width,
        n_blank_rows,
        groups: l_groups,
        rows: l_rows,
    })
}
