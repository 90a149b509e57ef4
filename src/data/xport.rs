//! SAS transport (XPORT V5) reader.
//!
//! The file is a sequence of 80-byte records: a library header, one member
//! header block per dataset, a NAMESTR block describing every variable and
//! the observations themselves. Numbers are IBM/370 hexadecimal floats,
//! big-endian, possibly truncated to fewer than 8 bytes. Only the first
//! member of a library is read.

use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::WINDOWS_1252;

use super::error::{ReadError, Result};
use super::model::{CellValue, Column, LoadedFile, NativeMetadata, Table};
use super::sasdate;

const RECORD: usize = 80;
const HEADER_PREFIX: &[u8] = b"HEADER RECORD*******";
const HEADER_SUFFIX: &[u8] = b"HEADER RECORD!!!!!!!";

/// One entry of the NAMESTR block.
#[derive(Debug, Clone)]
struct Variable {
    numeric: bool,
    length: usize,
    name: String,
    label: String,
    format: String,
    position: usize,
}

pub fn read(path: &Path) -> Result<LoadedFile> {
    let bytes = std::fs::read(path)?;
    parse(&bytes)
}

pub fn parse(bytes: &[u8]) -> Result<LoadedFile> {
    let mut pos = 0;

    match header_kind(record(bytes, pos, "library header")?) {
        Some("LIBRARY") => {}
        Some("LIBV8") => return Err(ReadError::UnsupportedVersion("8".into())),
        _ => return Err(ReadError::BadMagic { format: "SAS transport" }),
    }
    // library header + two real-header records
    pos += 3 * RECORD;

    let member = record(bytes, pos, "member header")?;
    expect_header(member, "MEMBER")?;
    let namestr_len = ascii_number(&member[74..78]).unwrap_or(140);
    if namestr_len < 88 {
        return Err(ReadError::InvalidFormat(format!(
            "NAMESTR length {namestr_len} is too short"
        )));
    }
    pos += RECORD;

    expect_header(record(bytes, pos, "descriptor header")?, "DSCRPTR")?;
    pos += RECORD;

    let descriptor = record(bytes, pos, "member descriptor")?;
    let table_name = trimmed_text(&descriptor[8..16]);
    pos += RECORD;
    let descriptor2 = record(bytes, pos, "member descriptor")?;
    let file_label = trimmed_text(&descriptor2[32..72]);
    pos += RECORD;

    let namestr_header = record(bytes, pos, "NAMESTR header")?;
    expect_header(namestr_header, "NAMESTR")?;
    let n_vars = ascii_number(&namestr_header[54..58]).ok_or_else(|| {
        ReadError::InvalidFormat("NAMESTR header has no variable count".into())
    })?;
    pos += RECORD;

    let block = slice(bytes, pos, n_vars * namestr_len, "NAMESTR block")?;
    let variables: Vec<Variable> = block
        .chunks_exact(namestr_len)
        .map(parse_namestr)
        .collect();
    pos += (n_vars * namestr_len).div_ceil(RECORD) * RECORD;

    expect_header(record(bytes, pos, "observation header")?, "OBS")?;
    pos += RECORD;

    let data = &bytes[pos..data_end(bytes, pos)];
    let row_len: usize = variables.iter().map(|v| v.length).sum();
    if let Some(v) = variables.iter().find(|v| v.position + v.length > row_len) {
        return Err(ReadError::InvalidFormat(format!(
            "variable {} lies outside the observation",
            v.name
        )));
    }
    let n_rows = row_count(data, row_len);

    let mut native = NativeMetadata {
        table_name: Some(table_name).filter(|s| !s.is_empty()),
        file_label: Some(file_label).filter(|s| !s.is_empty()),
        ..NativeMetadata::default()
    };
    let mut formats = BTreeMap::new();
    let mut columns = Vec::with_capacity(variables.len());

    for var in &variables {
        let mut values: Vec<CellValue> = (0..n_rows)
            .map(|row| {
                let start = row * row_len + var.position;
                let raw = &data[start..start + var.length];
                if var.numeric {
                    ibm_to_f64(raw).map_or(CellValue::Null, CellValue::Float)
                } else {
                    CellValue::String(trimmed_text(raw))
                }
            })
            .collect();
        if var.numeric {
            sasdate::apply_format(&mut values, &var.format);
        }

        native.column_names.push(var.name.clone());
        if !var.label.is_empty() {
            native.labels.insert(var.name.clone(), var.label.clone());
        }
        let kind = if var.numeric { "double" } else { "string" };
        native.types.insert(var.name.clone(), kind.to_string());
        native.widths.insert(var.name.clone(), var.length);
        if !var.format.is_empty() {
            formats.insert(var.name.clone(), var.format.clone());
        }
        columns.push(Column::new(var.name.clone(), values));
    }
    native.formats = Some(formats);

    let table = Table::from_columns(columns)
        .map_err(|e| ReadError::InvalidFormat(e.to_string()))?;
    Ok(LoadedFile {
        table,
        native: Some(native),
    })
}

fn parse_namestr(raw: &[u8]) -> Variable {
    let short = |at: usize| u16::from_be_bytes([raw[at], raw[at + 1]]) as usize;
    let format_name = trimmed_text(&raw[56..64]);
    let width = short(64);
    let decimals = short(66);
    let format = if format_name.is_empty() && width == 0 {
        String::new()
    } else {
        let mut f = format_name;
        if width > 0 {
            f.push_str(&width.to_string());
        }
        f.push('.');
        if decimals > 0 {
            f.push_str(&decimals.to_string());
        }
        f
    };
    Variable {
        numeric: short(0) == 1,
        length: short(4),
        name: trimmed_text(&raw[8..16]),
        label: trimmed_text(&raw[16..56]),
        format,
        position: u32::from_be_bytes([raw[84], raw[85], raw[86], raw[87]]) as usize,
    }
}

/// Observations end at the next member header or at end of file.
fn data_end(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos + RECORD <= bytes.len() {
        if header_kind(&bytes[pos..pos + RECORD]) == Some("MEMBER") {
            return pos;
        }
        pos += RECORD;
    }
    bytes.len()
}

/// Number of observations, ignoring the blank padding of the last record.
fn row_count(data: &[u8], row_len: usize) -> usize {
    if row_len == 0 {
        return 0;
    }
    let mut n = data.len() / row_len;
    while n > 0 {
        let start = (n - 1) * row_len;
        let in_last_record = data.len() - start <= RECORD;
        let blank = data[start..start + row_len].iter().all(|&b| b == b' ');
        if !(in_last_record && blank) {
            break;
        }
        n -= 1;
    }
    n
}

/// Convert an IBM/370 float (1 to 8 bytes) to `f64`. `None` is a SAS missing value.
pub(crate) fn ibm_to_f64(raw: &[u8]) -> Option<f64> {
    let mut buf = [0u8; 8];
    let n = raw.len().min(8);
    buf[..n].copy_from_slice(&raw[..n]);

    let first = buf[0];
    if buf[1..].iter().all(|&b| b == 0)
        && (first == b'.' || first == b'_' || first.is_ascii_uppercase())
    {
        return None;
    }

    let bits = u64::from_be_bytes(buf);
    let mantissa = bits & 0x00FF_FFFF_FFFF_FFFF;
    if mantissa == 0 {
        return Some(0.0);
    }
    let exponent = ((bits >> 56) & 0x7F) as i32 - 64;
    let magnitude = mantissa as f64 * 2f64.powi(4 * exponent - 56);
    Some(if bits >> 63 == 1 { -magnitude } else { magnitude })
}

fn header_kind(rec: &[u8]) -> Option<&str> {
    if rec.len() < 48 || !rec.starts_with(HEADER_PREFIX) || &rec[28..48] != HEADER_SUFFIX {
        return None;
    }
    std::str::from_utf8(&rec[20..28]).ok().map(str::trim_end)
}

fn expect_header(rec: &[u8], kind: &str) -> Result<()> {
    match header_kind(rec) {
        Some(k) if k == kind => Ok(()),
        Some(k) if k.ends_with("V8") => Err(ReadError::UnsupportedVersion("8".into())),
        _ => Err(ReadError::InvalidFormat(format!("expected {kind} header record"))),
    }
}

fn record<'a>(bytes: &'a [u8], pos: usize, context: &'static str) -> Result<&'a [u8]> {
    slice(bytes, pos, RECORD, context)
}

fn slice<'a>(bytes: &'a [u8], pos: usize, len: usize, context: &'static str) -> Result<&'a [u8]> {
    bytes.get(pos..pos + len).ok_or(ReadError::Truncated {
        context,
        offset: pos,
        needed: len,
        available: bytes.len().saturating_sub(pos),
    })
}

fn ascii_number(raw: &[u8]) -> Option<usize> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

/// Character data carries no declared encoding: UTF-8, else Windows-1252.
fn trimmed_text(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    let raw = &raw[..end];
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(raw).0.into_owned(),
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------
