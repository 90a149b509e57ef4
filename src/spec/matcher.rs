use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use super::catalog::SpecCatalog;
use crate::data::model::{CellValue, Table};

/// Minimum share of dataset columns a specification must list to match by
/// overlap. The comparison is strict.
pub const OVERLAP_THRESHOLD: f64 = 0.3;

/// Which heuristic selected the specification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// The dataset's base name occurs in the specification file name, as a
    /// literal substring (no pattern syntax).
    FileName,
    /// A `Dataset` column mentions the dataset; only its rows are kept.
    DatasetColumn,
    /// Enough of the dataset's columns are listed as variables.
    ColumnOverlap,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchRule::FileName => "file name",
            MatchRule::DatasetColumn => "dataset column",
            MatchRule::ColumnOverlap => "column overlap",
        };
        f.write_str(s)
    }
}

/// A specification table chosen for a dataset.
#[derive(Debug, Clone)]
pub struct SpecMatch {
    /// Catalog key (file name) of the specification.
    pub source: String,
    pub rule: MatchRule,
    pub table: Table,
}

/// Pick the specification table describing `dataset`, loaded from `data_file`.
///
/// Candidates are the catalog tables with a column whose name contains
/// `variable`. The rules are tried in order over all candidates and the first
/// hit wins; see [`MatchRule`].
pub fn find_matching_spec(data_file: &str, dataset: &Table, catalog: &SpecCatalog) -> Option<SpecMatch> {
    let base = Path::new(data_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(data_file)
        .to_lowercase();

    let candidates: Vec<(&str, &Table)> = catalog
        .iter()
        .filter(|(_, t)| t.column_names().any(|c| c.to_lowercase().contains("variable")))
        .collect();

    let hit = |source: &str, rule: MatchRule, table: Table| {
        log::debug!("{data_file}: matched {source} by {rule}");
        Some(SpecMatch {
            source: source.to_string(),
            rule,
            table,
        })
    };

    for &(name, table) in &candidates {
        if name.to_lowercase().contains(&base) {
            return hit(name, MatchRule::FileName, table.clone());
        }
    }

    for &(name, table) in &candidates {
        if let Some(rows) = rows_for_dataset(table, &base) {
            return hit(name, MatchRule::DatasetColumn, rows);
        }
    }

    if dataset.n_cols() > 0 {
        let columns: HashSet<&str> = dataset.column_names().collect();
        for &(name, table) in &candidates {
            if overlap_ratio(table, &columns) > OVERLAP_THRESHOLD {
                return hit(name, MatchRule::ColumnOverlap, table.clone());
            }
        }
    }

    None
}

fn lowered(value: &CellValue) -> Option<String> {
    value.as_text().map(|s| s.to_lowercase())
}

/// Rows whose `Dataset` value equals `base`, if any value mentions `base`.
fn rows_for_dataset(table: &Table, base: &str) -> Option<Table> {
    let column = table.column_ci("dataset")?;
    let mentioned = column
        .values
        .iter()
        .filter_map(lowered)
        .any(|v| v.contains(base));
    if !mentioned {
        return None;
    }
    Some(table.filter_rows(|i| lowered(&column.values[i]).as_deref() == Some(base)))
}

fn overlap_ratio(table: &Table, dataset_columns: &HashSet<&str>) -> f64 {
    let Some(column) = table.column_ci("variable") else {
        return 0.0;
    };
    let listed: HashSet<String> = column.values.iter().filter_map(CellValue::as_text).collect();
    let common = listed
        .iter()
        .filter(|v| dataset_columns.contains(v.as_str()))
        .count();
    common as f64 / dataset_columns.len() as f64
}
