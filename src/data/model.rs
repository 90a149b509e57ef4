use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a loaded table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value covering what the supported formats store.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Calendar value already rendered as text (ISO-8601).
    Date(String),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{d}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Text form used when cells are compared against names, `None` for nulls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Column / Table
// ---------------------------------------------------------------------------

/// One named column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// An ordered set of equally long columns.
///
/// Used for loaded datasets as well as for specification tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table from columns, rejecting ragged input.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != n_rows) {
            bail!(
                "column '{}' has {} values, expected {n_rows}",
                bad.name,
                bad.values.len()
            );
        }
        Ok(Self { columns, n_rows })
    }

    /// Build a table from a header and rows. Short rows are padded with nulls,
    /// surplus cells are dropped.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let n_rows = rows.len();
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(n_rows)))
            .collect();
        for row in rows {
            let mut cells = row.into_iter();
            for col in &mut columns {
                col.values.push(cells.next().unwrap_or(CellValue::Null));
            }
        }
        Self { columns, n_rows }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Column whose name equals `name` ignoring ASCII case (first one wins).
    pub fn column_ci(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column_ci(&self, name: &str) -> bool {
        self.column_ci(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.columns.get(col)?.values.get(row)
    }

    /// Copy of the table keeping only the rows for which `keep` is true.
    pub fn filter_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Table {
        let kept: Vec<usize> = (0..self.n_rows).filter(|&i| keep(i)).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = kept.iter().map(|&i| c.values[i].clone()).collect();
                Column::new(c.name.clone(), values)
            })
            .collect();
        Table {
            columns,
            n_rows: kept.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// NativeMetadata – variable attributes embedded in SAS files
// ---------------------------------------------------------------------------

/// Variable-level metadata read from the data file itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeMetadata {
    /// Column names in file order.
    pub column_names: Vec<String>,
    pub labels: BTreeMap<String, String>,
    /// Storage type per column: `"double"` or `"string"`.
    pub types: BTreeMap<String, String>,
    /// Storage width in bytes.
    pub widths: BTreeMap<String, usize>,
    /// Display formats, when the reader exposes them.
    pub formats: Option<BTreeMap<String, String>>,
    pub table_name: Option<String>,
    pub file_label: Option<String>,
}

/// The result of loading one data file.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub table: Table,
    pub native: Option<NativeMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            vec!["Dataset".into(), "Variable".into()],
            vec![
                vec![CellValue::String("DM".into()), CellValue::String("AGE".into())],
                vec![CellValue::String("AE".into())],
            ],
        )
    }

    #[test]
    fn short_rows_are_padded_with_nulls() {
        let t = sample();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.cell(1, 1), Some(&CellValue::Null));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Table::from_columns(vec![
            Column::new("a", vec![CellValue::Integer(1)]),
            Column::new("b", vec![]),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn column_lookup_ignores_case() {
        let t = sample();
        assert_eq!(t.column_ci("VARIABLE").map(|c| c.name.as_str()), Some("Variable"));
        assert!(!t.has_column_ci("label"));
    }

    #[test]
    fn filter_rows_keeps_selected_rows_only() {
        let t = sample().filter_rows(|i| i == 1);
        assert_eq!(t.n_rows(), 1);
        assert_eq!(t.cell(0, 0), Some(&CellValue::String("AE".into())));
    }

    #[test]
    fn floats_display_without_padding() {
        assert_eq!(CellValue::Float(35.0).to_string(), "35");
        assert_eq!(CellValue::Float(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Null.as_text(), None);
    }
}
