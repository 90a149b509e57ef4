use std::path::Path;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, DataType, Reader};

use super::model::{CellValue, LoadedFile, Table};
use super::{sas7bdat, xport};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// The data formats the viewer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xport,
    Sas7bdat,
    Csv,
    Xlsx,
}

impl FileFormat {
    /// Pick the format from the (case-insensitive) file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "xpt" => Some(FileFormat::Xport),
            "sas7bdat" => Some(FileFormat::Sas7bdat),
            "csv" => Some(FileFormat::Csv),
            "xlsx" => Some(FileFormat::Xlsx),
            _ => None,
        }
    }
}

/// Load a data file.  Dispatch by extension.
///
/// Supported formats:
/// * `.xpt`      – SAS transport V5, with native metadata
/// * `.sas7bdat` – SAS dataset, with native metadata
/// * `.csv`      – header row plus data rows
/// * `.xlsx`     – first worksheet, header row plus data rows
///
/// Any other extension yields `Ok(None)`.
pub fn load_file(path: &Path) -> Result<Option<LoadedFile>> {
    let Some(format) = FileFormat::from_path(path) else {
        return Ok(None);
    };
    let loaded = match format {
        FileFormat::Xport => xport::read(path).context("reading SAS transport file")?,
        FileFormat::Sas7bdat => sas7bdat::read(path).context("reading SAS7BDAT file")?,
        FileFormat::Csv => LoadedFile {
            table: load_csv(path)?,
            native: None,
        },
        FileFormat::Xlsx => LoadedFile {
            table: load_xlsx(path)?,
            native: None,
        },
    };
    Ok(Some(loaded))
}

/// Non-hidden regular files in `dir`, sorted by name.
pub fn list_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || !entry.path().is_file() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, then one record per row.
/// Short records are padded with nulls.
pub fn load_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(guess_cell_type).collect());
    }

    Ok(Table::from_rows(headers, rows))
}

fn guess_cell_type(s: &str) -> CellValue {
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" || s == "True" || s == "False" {
        return CellValue::Bool(s.eq_ignore_ascii_case("true"));
    }
    CellValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// XLSX loader
// ---------------------------------------------------------------------------

/// Load the first worksheet; its first row is the header.
pub fn load_xlsx(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| anyhow!("opening workbook: {e}"))?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheets")?
        .map_err(|e| anyhow!("reading first worksheet: {e}"))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::default());
    };
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| match excel_cell(cell).as_text() {
            Some(name) if !name.is_empty() => name,
            _ => format!("column_{}", i + 1),
        })
        .collect();
    let body: Vec<Vec<CellValue>> = rows.map(|r| r.iter().map(excel_cell).collect()).collect();

    Ok(Table::from_rows(headers, body))
}

fn excel_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) if s.is_empty() => CellValue::Null,
        Data::String(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => CellValue::Integer(*f as i64),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) if dt.format("%H:%M:%S").to_string() == "00:00:00" => {
                CellValue::Date(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => CellValue::Date(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::String(cell.to_string()),
        },
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}
