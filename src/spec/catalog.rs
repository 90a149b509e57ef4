use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Result};

use super::legacy::parse_legacy_file;
use crate::data::loader::{self, FileFormat};
use crate::data::model::Table;

/// Specification tables found in a data directory, keyed by file name.
///
/// Every entry has a column named `variable` or `label` (any case).
/// Iteration is sorted by file name.
#[derive(Debug, Clone, Default)]
pub struct SpecCatalog {
    entries: BTreeMap<String, Table>,
}

impl SpecCatalog {
    /// Insert `table` under `name` if it qualifies as a specification table.
    /// Returns whether it was kept.
    pub fn insert(&mut self, name: impl Into<String>, table: Table) -> bool {
        if !is_specification(&table) {
            return false;
        }
        self.entries.insert(name.into(), table);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn is_specification(table: &Table) -> bool {
    table.has_column_ci("variable") || table.has_column_ci("label")
}

/// File names from a directory listing that may hold a specification table.
pub fn candidate_files(files: &[String]) -> Vec<String> {
    files
        .iter()
        .filter(|name| !name.starts_with('.'))
        .filter(|name| {
            matches!(
                FileFormat::from_path(Path::new(name.as_str())),
                Some(FileFormat::Csv | FileFormat::Xlsx)
            )
        })
        .cloned()
        .collect()
}

/// Build the catalog from the `.csv`/`.xlsx` files of a directory listing.
///
/// `legacy_name` goes through the `$`-delimited parser, everything else is
/// loaded as a plain table. Files that fail to load are left out.
pub fn build_catalog(dir: &Path, files: &[String], legacy_name: &str) -> SpecCatalog {
    let mut catalog = SpecCatalog::default();
    for name in candidate_files(files) {
        let path = dir.join(&name);
        let table = if name == legacy_name {
            parse_legacy_file(&path).ok_or_else(|| anyhow!("unreadable legacy specification"))
        } else {
            load_table(&path)
        };
        match table {
            Ok(table) => {
                if !catalog.insert(name.clone(), table) {
                    log::debug!("{name}: no variable or label column, not a specification");
                }
            }
            Err(e) => log::debug!("skipping specification candidate {name}: {e:#}"),
        }
    }
    log::info!(
        "built specification catalog for {} with {} table(s)",
        dir.display(),
        catalog.len()
    );
    catalog
}

fn load_table(path: &Path) -> Result<Table> {
    match FileFormat::from_path(path) {
        Some(FileFormat::Xlsx) => loader::load_xlsx(path),
        _ => loader::load_csv(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::legacy::LEGACY_SPEC_FILE;

    fn names(catalog: &SpecCatalog) -> Vec<&str> {
        catalog.iter().map(|(name, _)| name).collect()
    }

    fn catalog_of(files: &[(&str, &str)]) -> SpecCatalog {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        let listing = loader::list_files(dir.path()).unwrap();
        build_catalog(dir.path(), &listing, LEGACY_SPEC_FILE)
    }

    #[test]
    fn keeps_only_tables_with_variable_or_label_columns() {
        let catalog = catalog_of(&[
            ("vars.csv", "Dataset,Variable,Label\nDM,AGE,Age\n"),
            ("labels.csv", "name,LABEL\nAGE,Age\n"),
            ("lookup.csv", "code,decode\n1,Yes\n"),
        ]);
        assert_eq!(names(&catalog), vec!["labels.csv", "vars.csv"]);
    }

    #[test]
    fn legacy_file_uses_the_dollar_parser() {
        let catalog = catalog_of(&[(LEGACY_SPEC_FILE, "H$0$DM$USUBJID$Subject ID$Char\n")]);
        let (name, table) = catalog.iter().next().unwrap();
        assert_eq!(name, LEGACY_SPEC_FILE);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["Dataset", "Variable", "Label", "Type"]
        );
        assert_eq!(table.n_rows(), 1);
    }

    #[test]
    fn broken_and_foreign_files_are_left_out() {
        let catalog = catalog_of(&[
            ("broken.xlsx", "not a workbook"),
            ("demo.xpt", "Variable"),
            (".hidden_vars.csv", "Variable\nAGE\n"),
            (LEGACY_SPEC_FILE, "too$short\n"),
            ("ok_vars.csv", "Variable\nAGE\n"),
        ]);
        assert_eq!(names(&catalog), vec!["ok_vars.csv"]);
    }

    #[test]
    fn xlsx_specification_is_kept_and_matched() {
        use crate::data::model::CellValue;
        use crate::spec::matcher::{find_matching_spec, MatchRule};

        let dir = tempfile::tempdir().unwrap();
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Variable").unwrap();
        sheet.write_string(0, 1, "Label").unwrap();
        sheet.write_string(1, 0, "AGE").unwrap();
        sheet.write_string(1, 1, "Age in years").unwrap();
        workbook.save(dir.path().join("demo_spec.xlsx")).unwrap();
        std::fs::write(dir.path().join("demo.csv"), "AGE\n30\n").unwrap();

        let listing = loader::list_files(dir.path()).unwrap();
        let catalog = build_catalog(dir.path(), &listing, LEGACY_SPEC_FILE);
        assert_eq!(names(&catalog), vec!["demo_spec.xlsx"]);

        let dataset = Table::from_rows(vec!["AGE".into()], vec![vec![CellValue::Integer(30)]]);
        let m = find_matching_spec("demo.csv", &dataset, &catalog).unwrap();
        assert_eq!(m.source, "demo_spec.xlsx");
        assert_eq!(m.rule, MatchRule::FileName);
        assert_eq!(m.table.cell(0, 1), Some(&CellValue::String("Age in years".into())));
    }

    #[test]
    fn candidate_extensions_ignore_case() {
        let files = vec![
            "A.CSV".to_string(),
            "b.Xlsx".to_string(),
            "c.xpt".to_string(),
            "d.txt".to_string(),
        ];
        assert_eq!(candidate_files(&files), vec!["A.CSV", "b.Xlsx"]);
    }
}
