use std::path::Path;

use crate::data::model::{CellValue, Table};

/// File name of the `$`-delimited legacy variable specification.
pub const LEGACY_SPEC_FILE: &str = "SDTM_spec_Variables.csv";

const DELIMITER: char = '$';
const MIN_FIELDS: usize = 5;

/// Parse a legacy specification file into `Dataset / Variable / Label / Type`.
///
/// Best effort: an unreadable file (missing, not UTF-8) yields `None` and is
/// only logged at debug level.
pub fn parse_legacy_file(path: &Path) -> Option<Table> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(parse_legacy_text(&text)),
        Err(e) => {
            log::debug!("skipping legacy spec {}: {e}", path.display());
            None
        }
    }
}

/// Parse legacy specification text.
///
/// Every line with at least five `$`-separated fields becomes one row:
/// field 2 → Dataset, 3 → Variable, 4 → Label, 5 → Type (empty when absent).
/// Shorter lines are skipped. A text without any accepted line gives a table
/// without columns.
pub fn parse_legacy_text(text: &str) -> Table {
    let rows: Vec<Vec<CellValue>> = text
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.trim().split(DELIMITER).collect();
            if fields.len() < MIN_FIELDS {
                return None;
            }
            let field = |i: usize| CellValue::String(fields.get(i).copied().unwrap_or("").to_string());
            Some(vec![field(2), field(3), field(4), field(5)])
        })
        .collect();

    if rows.is_empty() {
        return Table::default();
    }
    let headers = ["Dataset", "Variable", "Label", "Type"]
        .map(String::from)
        .to_vec();
    Table::from_rows(headers, rows)
}
