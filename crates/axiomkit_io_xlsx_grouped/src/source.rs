//! Table sources consumed by the exporter.
//!
//! The exporter only needs column names, a row count and per-cell access;
//! grouping queries are provided on top of those.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::Cursor;

use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};

use crate::error::{ExportError, ExportResult};
use crate::spec::EnumCellValue;

/// Read-only tabular data with unique, ordered column names.
pub trait TableSource {
    /// Column names in table order.
    fn column_names(&self) -> Vec<String>;

    /// Number of rows.
    fn height(&self) -> usize;

    /// Value at zero-based `(row_idx, col_idx)`.
    fn cell_value(&self, row_idx: usize, col_idx: usize) -> ExportResult<EnumCellValue>;

    /// Number of columns.
    fn width(&self) -> usize {
        self.column_names().len()
    }

    /// Zero-based index of column `name`.
    fn column_index(&self, name: &str) -> ExportResult<usize> {
        self.column_names()
            .iter()
            .position(|c_name| c_name == name)
            .ok_or_else(|| ExportError::ColumnNotFound(name.to_string()))
    }

    /// All values of one row, aligned with [`Self::column_names`].
    fn row_values(&self, row_idx: usize) -> ExportResult<Vec<EnumCellValue>> {
        (0..self.width())
            .map(|col_idx| self.cell_value(row_idx, col_idx))
            .collect()
    }

    /// Row indices whose `col_idx` value equals `key`, in table order.
    fn rows_matching(&self, col_idx: usize, key: &EnumCellValue) -> ExportResult<Vec<usize>> {
        let mut l_rows = Vec::new();
        for row_idx in 0..self.height() {
            if is_same_key(&self.cell_value(row_idx, col_idx)?, key) {
                l_rows.push(row_idx);
            }
        }
        Ok(l_rows)
    }

    /// Distinct values of `col_idx` in first-occurrence order.
    fn distinct_values(&self, col_idx: usize) -> ExportResult<Vec<EnumCellValue>> {
        Ok(self
            .group_rows(col_idx)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Partition row indices by the value of `col_idx` in one pass.
    ///
    /// Groups keep first-occurrence order and rows keep table order; keys
    /// compare like [`is_same_key`].
    fn group_rows(&self, col_idx: usize) -> ExportResult<Vec<(EnumCellValue, Vec<usize>)>> {
        let mut dict_idx_group: HashMap<EnumGroupKey, usize> = HashMap::new();
        let mut l_groups: Vec<(EnumCellValue, Vec<usize>)> = Vec::new();
        for row_idx in 0..self.height() {
            let value = self.cell_value(row_idx, col_idx)?;
            match dict_idx_group.entry(EnumGroupKey::from(&value)) {
                Entry::Occupied(entry) => l_groups[*entry.get()].1.push(row_idx),
                Entry::Vacant(entry) => {
                    entry.insert(l_groups.len());
                    l_groups.push((value, vec![row_idx]));
                }
            }
        }
        Ok(l_groups)
    }
}

/// Hashable form of a group key.
///
/// Numbers are stored as bits with every NaN collapsed to one pattern and
/// `-0.0` folded into `0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum EnumGroupKey {
    None,
    String(String),
    Number(u64),
    Boolean(bool),
    Unsupported(String),
}

impl From<&EnumCellValue> for EnumGroupKey {
    fn from(value: &EnumCellValue) -> Self {
        match value {
            EnumCellValue::None => EnumGroupKey::None,
            EnumCellValue::String(val) => EnumGroupKey::String(val.clone()),
            EnumCellValue::Number(val) if val.is_nan() => EnumGroupKey::Number(f64::NAN.to_bits()),
            EnumCellValue::Number(val) if *val == 0.0 => EnumGroupKey::Number(0.0f64.to_bits()),
            EnumCellValue::Number(val) => EnumGroupKey::Number(val.to_bits()),
            EnumCellValue::Boolean(val) => EnumGroupKey::Boolean(*val),
            EnumCellValue::Unsupported(val) => EnumGroupKey::Unsupported(val.clone()),
        }
    }
}

/// Group-key equality; unlike `==`, NaN matches NaN.
pub fn is_same_key(lhs: &EnumCellValue, rhs: &EnumCellValue) -> bool {
    match (lhs, rhs) {
        (EnumCellValue::Number(a), EnumCellValue::Number(b)) => {
            a == b || (a.is_nan() && b.is_nan())
        }
        _ => lhs == rhs,
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region InMemoryTable

/// Simple row-major table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTable {
    columns: Vec<String>,
    rows: Vec<Vec<EnumCellValue>>,
}

impl SpecTable {
    /// Build a table; every row must have one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<EnumCellValue>>) -> ExportResult<Self> {
        if let Some((row_idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ExportError::InvalidTable(format!(
                "row {row_idx} has {} values, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }
}

impl TableSource for SpecTable {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn height(&self) -> usize {
        self.rows.len()
    }

    fn width(&self) -> usize {
        self.columns.len()
    }

    fn cell_value(&self, row_idx: usize, col_idx: usize) -> ExportResult<EnumCellValue> {
        self.rows
            .get(row_idx)
            .and_then(|row| row.get(col_idx))
            .cloned()
            .ok_or_else(|| {
                ExportError::InvalidTable(format!("cell ({row_idx}, {col_idx}) out of bounds"))
            })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PolarsTable

impl TableSource for DataFrame {
    fn column_names(&self) -> Vec<String> {
        self.get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    fn height(&self) -> usize {
        DataFrame::height(self)
    }

    fn width(&self) -> usize {
        DataFrame::width(self)
    }

    fn cell_value(&self, row_idx: usize, col_idx: usize) -> ExportResult<EnumCellValue> {
        let col = self.get_columns().get(col_idx).ok_or_else(|| {
            ExportError::InvalidTable(format!("column index {col_idx} out of bounds"))
        })?;
        Ok(derive_cell_value_from_any_value(col.get(row_idx)?))
    }
}

/// Decode Polars IPC bytes into a dataframe.
pub fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> ExportResult<DataFrame> {
    Ok(IpcReader::new(Cursor::new(v_ipc_df)).finish()?)
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int128(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        AnyValue::List(_) | AnyValue::Binary(_) | AnyValue::BinaryOwned(_) => {
            EnumCellValue::Unsupported(value.dtype().to_string())
        }
        _ => EnumCellValue::String(value.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use polars::prelude::{Column, IpcWriter, NamedFrom, SerWriter, Series};
    use pretty_assertions::assert_eq;

    use super::*;

    fn derive_sample_table() -> SpecTable {
        SpecTable::new(
            vec!["group".to_string(), "v".to_string()],
            vec![
                vec!["Y".into(), 1i64.into()],
                vec!["X".into(), 2i64.into()],
                vec!["Y".into(), 3i64.into()],
                vec!["Z".into(), 4i64.into()],
            ],
        )
        .expect("valid table")
    }

    fn derive_sample_dataframe() -> DataFrame {
        let columns: Vec<Column> = vec![
            Series::new("group".into(), &["b", "a", "b"]).into(),
            Series::new("n".into(), &[1i64, 2, 3]).into(),
        ];
        DataFrame::new(columns).expect("valid dataframe")
    }

    #[test]
    fn distinct_values_keep_first_occurrence_order() {
        let table = derive_sample_table();
        assert_eq!(
            table.distinct_values(0).expect("distinct"),
            vec!["Y".into(), "X".into(), "Z".into()]
        );
        assert_eq!(table.rows_matching(0, &"Y".into()).expect("match"), vec![0, 2]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = SpecTable::new(vec!["a".to_string()], vec![vec![1i64.into(), 2i64.into()]])
            .expect_err("ragged row must fail");
        assert!(matches!(err, ExportError::InvalidTable(_)));
    }

    #[test]
    fn missing_column_is_reported() {
        let err = derive_sample_table()
            .column_index("nope")
            .expect_err("missing column");
        assert!(matches!(err, ExportError::ColumnNotFound(ref name) if name == "nope"));
    }

    #[test]
    fn nan_keys_group_together() {
        assert!(is_same_key(
            &EnumCellValue::Number(f64::NAN),
            &EnumCellValue::Number(f64::NAN)
        ));
        assert!(!is_same_key(&EnumCellValue::Number(1.0), &"1".into()));
    }

    #[test]
    fn dataframe_source_reads_cells() {
        let df = derive_sample_dataframe();
        assert_eq!(
            TableSource::column_names(&df),
            vec!["group".to_string(), "n".to_string()]
        );
        assert_eq!(TableSource::height(&df), 3);
        assert_eq!(df.cell_value(1, 0).expect("cell"), "a".into());
        assert_eq!(df.cell_value(2, 1).expect("cell"), EnumCellValue::Number(3.0));
        assert_eq!(
            df.distinct_values(0).expect("distinct"),
            vec!["b".into(), "a".into()]
        );
    }

    #[test]
    fn ipc_bytes_round_trip_into_dataframe() {
        let mut df = derive_sample_dataframe();
        let mut v_buf: Vec<u8> = Vec::new();
        IpcWriter::new(&mut v_buf)
            .finish(&mut df)
            .expect("write ipc");

        let df_read = derive_dataframe_from_ipc_bytes(&v_buf).expect("read ipc");
        assert_eq!(
            TableSource::column_names(&df_read),
            TableSource::column_names(&df)
        );
        assert_eq!(df_read.cell_value(0, 0).expect("cell"), "b".into());
    }

    #[test]
    fn group_rows_agree_with_key_equality() {
        let table = SpecTable::new(
            vec!["k".to_string()],
            vec![
                vec![f64::NAN.into()],
                vec![0.0f64.into()],
                vec![EnumCellValue::None],
                vec![(-0.0f64).into()],
                vec![f64::NAN.into()],
                vec!["0".into()],
                vec![EnumCellValue::None],
            ],
        )
        .expect("valid table");

        let l_groups = table.group_rows(0).expect("group");
        let l_rows: Vec<Vec<usize>> = l_groups.iter().map(|(_, rows)| rows.clone()).collect();
        assert_eq!(l_rows, vec![vec![0, 4], vec![1, 3], vec![2, 6], vec![5]]);

        for (key, rows) in &l_groups {
            assert_eq!(&table.rows_matching(0, key).expect("match"), rows);
        }
    }

    #[test]
    fn group_rows_single_pass_handles_many_groups() {
        let n_rows = 60_000;
        let table = SpecTable::new(
            vec!["k".to_string()],
            (0..n_rows)
                .map(|n_idx| vec![EnumCellValue::from((n_idx % 30_000) as i64)])
                .collect(),
        )
        .expect("valid table");

        let l_groups = table.group_rows(0).expect("group");
        assert_eq!(l_groups.len(), 30_000);
        assert_eq!(l_groups[0], (EnumCellValue::Number(0.0), vec![0, 30_000]));
        assert_eq!(
            l_groups[29_999],
            (EnumCellValue::Number(29_999.0), vec![29_999, 59_999])
        );
    }
}
