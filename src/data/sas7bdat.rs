//! SAS7BDAT reader.
//!
//! Layout recap:
//! ```text
//!  header (header_length bytes)
//!    magic · alignment flags · endianness · encoding · page size/count
//!  page 0 .. page_count-1 (page_length bytes each)
//!    page header · subheader pointers · subheaders / row data
//! ```
//! Metadata lives in subheaders on meta and mix pages; rows live on data and
//! mix pages, or in compressed data subheaders when the file is compressed.

use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;

use encoding_rs::Encoding;

use super::decompress;
use super::error::{ReadError, Result};
use super::model::{CellValue, Column, LoadedFile, NativeMetadata, Table};
use super::sasdate;

const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc2, 0xea, 0x81,
    0x60, 0xb3, 0x14, 0x11, 0xcf, 0xbd, 0x92, 0x08, 0x00, 0x09, 0xc7, 0x31, 0x8c, 0x18, 0x1f,
    0x10, 0x11,
];

const PAGE_TYPE_MASK: u16 = 0x0F00;
const PAGE_DATA: u16 = 0x0100;
const PAGE_MIX: u16 = 0x0200;
const PAGE_COMP: u16 = 0x9000;

const SUBHEADER_TRUNCATED: u8 = 1;
const SUBHEADER_COMPRESSED: u8 = 4;

// Subheader signatures, normalised to little-endian byte order.
const SIG_ROW_SIZE: [u8; 4] = [0xF7, 0xF7, 0xF7, 0xF7];
const SIG_COLUMN_SIZE: [u8; 4] = [0xF6, 0xF6, 0xF6, 0xF6];
const SIG_COUNTS: [u8; 4] = [0x00, 0xFC, 0xFF, 0xFF];
const SIG_COLUMN_TEXT: [u8; 4] = [0xFD, 0xFF, 0xFF, 0xFF];
const SIG_COLUMN_NAME: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
const SIG_COLUMN_ATTRS: [u8; 4] = [0xFC, 0xFF, 0xFF, 0xFF];
const SIG_FORMAT_LABEL: [u8; 4] = [0xFE, 0xFB, 0xFF, 0xFF];
const SIG_COLUMN_LIST: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Rle,
    Rdc,
}

/// Byte layout parameters derived from the file header.
#[derive(Debug, Clone, Copy)]
struct Layout {
    wide: bool,
    little_endian: bool,
    int_len: usize,
    page_bit_offset: usize,
    pointer_len: usize,
}

impl Layout {
    fn uint(&self, buf: &[u8], at: usize, width: usize) -> Result<u64> {
        let raw = span(at, width).and_then(|r| buf.get(r)).ok_or(ReadError::Truncated {
            context: "SAS7BDAT structure",
            offset: at,
            needed: width,
            available: buf.len().saturating_sub(at),
        })?;
        let mut v: u64 = 0;
        if self.little_endian {
            for &b in raw.iter().rev() {
                v = v << 8 | u64::from(b);
            }
        } else {
            for &b in raw {
                v = v << 8 | u64::from(b);
            }
        }
        Ok(v)
    }

    fn usize(&self, buf: &[u8], at: usize, width: usize) -> Result<usize> {
        usize::try_from(self.uint(buf, at, width)?)
            .map_err(|_| ReadError::InvalidFormat(format!("value at offset {at} out of range")))
    }

    fn signature(&self, sub: &[u8]) -> Option<[u8; 4]> {
        let raw: [u8; 4] = if self.little_endian || !self.wide {
            sub.get(0..4)?.try_into().ok()?
        } else {
            sub.get(4..8)?.try_into().ok()?
        };
        Some(if self.little_endian {
            raw
        } else {
            [raw[3], raw[2], raw[1], raw[0]]
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Attribute {
    offset: usize,
    length: usize,
    numeric: bool,
}

/// Everything gathered from the metadata subheaders.
#[derive(Debug, Default)]
struct Metadata {
    row_length: usize,
    row_count: usize,
    mix_page_row_count: usize,
    column_count: Option<usize>,
    text_blocks: Vec<Vec<u8>>,
    names: Vec<String>,
    attributes: Vec<Attribute>,
    /// (format, label) per column, in column order.
    formats: Vec<(String, String)>,
}

pub fn read(path: &Path) -> Result<LoadedFile> {
    let bytes = std::fs::read(path)?;
    parse(&bytes)
}

pub fn parse(bytes: &[u8]) -> Result<LoadedFile> {
    if bytes.len() < 288 || bytes[..32] != MAGIC {
        return Err(ReadError::BadMagic { format: "SAS7BDAT" });
    }

    let wide = bytes[32] == b'3';
    let align1 = if bytes[35] == b'3' { 4 } else { 0 };
    let int_len = if wide { 8 } else { 4 };
    let layout = Layout {
        wide,
        little_endian: bytes[37] == 0x01,
        int_len,
        page_bit_offset: if wide { 32 } else { 16 },
        pointer_len: if wide { 24 } else { 12 },
    };
    let encoding = encoding_for(bytes[70])?;

    let table_name = decode_trimmed(&bytes[92..156], encoding);
    let header_len = layout.usize(bytes, 196 + align1, 4)?;
    let page_len = layout.usize(bytes, 200 + align1, 4)?;
    let page_count = layout.usize(bytes, 204 + align1, int_len)?;
    if page_len == 0 {
        return Err(ReadError::InvalidFormat("page length is zero".into()));
    }

    let mut meta = Metadata::default();
    let mut compression = Compression::None;
    let mut rows: Vec<Cow<'_, [u8]>> = Vec::new();

    for index in 0..page_count {
        let start = index
            .checked_mul(page_len)
            .and_then(|o| o.checked_add(header_len))
            .ok_or_else(|| ReadError::InvalidFormat(format!("page {index} lies beyond any file")))?;
        let page = span(start, page_len).and_then(|r| bytes.get(r)).ok_or(ReadError::Truncated {
            context: "page",
            offset: start,
            needed: page_len,
            available: bytes.len().saturating_sub(start),
        })?;

        let pbo = layout.page_bit_offset;
        let page_type = layout.uint(page, pbo, 2)? as u16;
        if page_type == PAGE_COMP {
            continue;
        }
        let block_count = layout.usize(page, pbo + 2, 2)?;
        let pointer_count = layout.usize(page, pbo + 4, 2)?;
        let kind = page_type & PAGE_TYPE_MASK;

        if kind != PAGE_DATA {
            for p in 0..pointer_count {
                let at = pbo + 8 + p * layout.pointer_len;
                let offset = layout.usize(page, at, int_len)?;
                let length = layout.usize(page, at + int_len, int_len)?;
                let flag = *page.get(at + 2 * int_len).unwrap_or(&0);
                let sh_type = *page.get(at + 2 * int_len + 1).unwrap_or(&0);
                if length == 0 || flag == SUBHEADER_TRUNCATED {
                    continue;
                }
                let sub = span(offset, length).and_then(|r| page.get(r)).ok_or(ReadError::Truncated {
                    context: "subheader",
                    offset,
                    needed: length,
                    available: page.len().saturating_sub(offset),
                })?;

                match layout.signature(sub) {
                    Some(SIG_ROW_SIZE) => {
                        meta.row_length = layout.usize(sub, 5 * int_len, int_len)?;
                        meta.row_count = layout.usize(sub, 6 * int_len, int_len)?;
                        meta.mix_page_row_count = layout.usize(sub, 15 * int_len, int_len)?;
                    }
                    Some(SIG_COLUMN_SIZE) => {
                        meta.column_count = Some(layout.usize(sub, int_len, int_len)?);
                    }
                    Some(SIG_COLUMN_TEXT) => {
                        let size = layout.usize(sub, int_len, 2)?;
                        let end = (int_len + size).min(sub.len());
                        let block = sub[int_len..end].to_vec();
                        if meta.text_blocks.is_empty() {
                            compression = detect_compression(&block);
                        }
                        meta.text_blocks.push(block);
                    }
                    Some(SIG_COLUMN_NAME) => column_names(&layout, sub, &mut meta, encoding)?,
                    Some(SIG_COLUMN_ATTRS) => column_attributes(&layout, sub, &mut meta)?,
                    Some(SIG_FORMAT_LABEL) => format_and_label(&layout, sub, &mut meta, encoding)?,
                    Some(SIG_COUNTS) | Some(SIG_COLUMN_LIST) => {}
                    _ if compression != Compression::None
                        && sh_type == 1
                        && (flag == SUBHEADER_COMPRESSED || flag == 0) =>
                    {
                        rows.push(data_subheader(sub, meta.row_length, compression)?);
                    }
                    _ => {}
                }
            }
        }

        if kind == PAGE_MIX || kind == PAGE_DATA {
            let first = if kind == PAGE_MIX {
                (pbo + 8 + pointer_count * layout.pointer_len).next_multiple_of(8)
            } else {
                pbo + 8
            };
            let on_page = if kind == PAGE_MIX {
                meta.mix_page_row_count
            } else {
                block_count
            };
            let wanted = on_page.min(meta.row_count.saturating_sub(rows.len()));
            for r in 0..wanted {
                let at = r.checked_mul(meta.row_length).and_then(|o| o.checked_add(first));
                match at.and_then(|at| span(at, meta.row_length)).and_then(|range| page.get(range)) {
                    Some(row) if meta.row_length > 0 => rows.push(Cow::Borrowed(row)),
                    _ => break,
                }
            }
        }

        if meta.row_count > 0 && rows.len() >= meta.row_count {
            break;
        }
    }

    build(meta, rows, compression, &layout, encoding, table_name)
}

fn build(
    meta: Metadata,
    mut rows: Vec<Cow<'_, [u8]>>,
    compression: Compression,
    layout: &Layout,
    encoding: &'static Encoding,
    table_name: String,
) -> Result<LoadedFile> {
    if meta.attributes.len() < meta.names.len() {
        return Err(ReadError::InvalidFormat(format!(
            "{} column names but only {} column attributes",
            meta.names.len(),
            meta.attributes.len()
        )));
    }
    if let Some(expected) = meta.column_count {
        if expected != meta.names.len() {
            log::warn!(
                "SAS7BDAT declares {expected} columns, found {} ({compression:?} compression)",
                meta.names.len()
            );
        }
    }
    rows.truncate(meta.row_count);

    let mut native = NativeMetadata {
        table_name: Some(table_name).filter(|s| !s.is_empty()),
        ..NativeMetadata::default()
    };
    let mut formats = std::collections::BTreeMap::new();
    let mut columns = Vec::with_capacity(meta.names.len());

    for (i, name) in meta.names.iter().enumerate() {
        let attr = meta.attributes[i];
        let (format, label) = meta.formats.get(i).cloned().unwrap_or_default();

        let mut values: Vec<CellValue> = rows
            .iter()
            .map(|row| match span(attr.offset, attr.length).and_then(|r| row.get(r)) {
                None => CellValue::Null,
                Some(raw) if attr.numeric => {
                    numeric(raw, layout.little_endian).map_or(CellValue::Null, CellValue::Float)
                }
                Some(raw) => CellValue::String(decode_trimmed(raw, encoding)),
            })
            .collect();
        if attr.numeric {
            sasdate::apply_format(&mut values, &format);
        }

        native.column_names.push(name.clone());
        if !label.is_empty() {
            native.labels.insert(name.clone(), label);
        }
        let kind = if attr.numeric { "double" } else { "string" };
        native.types.insert(name.clone(), kind.to_string());
        native.widths.insert(name.clone(), attr.length);
        if !format.is_empty() {
            formats.insert(name.clone(), format);
        }
        columns.push(Column::new(name.clone(), values));
    }
    native.formats = Some(formats);

    let table = Table::from_columns(columns)
        .map_err(|e| ReadError::InvalidFormat(e.to_string()))?;
    Ok(LoadedFile {
        table,
        native: Some(native),
    })
}

fn data_subheader<'a>(
    sub: &'a [u8],
    row_length: usize,
    compression: Compression,
) -> Result<Cow<'a, [u8]>> {
    if sub.len() >= row_length {
        return Ok(Cow::Borrowed(&sub[..row_length]));
    }
    let row = match compression {
        Compression::Rle => decompress::rle(sub, row_length)?,
        Compression::Rdc => decompress::rdc(sub, row_length)?,
        Compression::None => {
            return Err(ReadError::InvalidFormat(format!(
                "data subheader of {} bytes is shorter than a {row_length}-byte row",
                sub.len()
            )))
        }
    };
    Ok(Cow::Owned(row))
}

fn column_names(
    layout: &Layout,
    sub: &[u8],
    meta: &mut Metadata,
    encoding: &'static Encoding,
) -> Result<()> {
    let il = layout.int_len;
    let count = sub.len().saturating_sub(2 * il + 12) / 8;
    for i in 0..count {
        let at = il + 8 * (i + 1);
        let block = layout.usize(sub, at, 2)?;
        let offset = layout.usize(sub, at + 2, 2)?;
        let len = layout.usize(sub, at + 4, 2)?;
        let name = text_ref(meta, block, offset, len, encoding);
        meta.names.push(name);
    }
    Ok(())
}

fn column_attributes(layout: &Layout, sub: &[u8], meta: &mut Metadata) -> Result<()> {
    let il = layout.int_len;
    let stride = il + 8;
    let count = sub.len().saturating_sub(2 * il + 12) / stride;
    for i in 0..count {
        let offset = layout.usize(sub, il + 8 + i * stride, il)?;
        let length = layout.usize(sub, 2 * il + 8 + i * stride, 4)?;
        let kind = layout.uint(sub, 2 * il + 14 + i * stride, 1)?;
        meta.attributes.push(Attribute {
            offset,
            length,
            numeric: kind == 1,
        });
    }
    Ok(())
}

fn format_and_label(
    layout: &Layout,
    sub: &[u8],
    meta: &mut Metadata,
    encoding: &'static Encoding,
) -> Result<()> {
    let base = 3 * layout.int_len;
    let field = |at: usize| layout.usize(sub, base + at, 2);
    let format = text_ref(meta, field(22)?, field(24)?, field(26)?, encoding);
    let label = text_ref(meta, field(28)?, field(30)?, field(32)?, encoding);
    meta.formats.push((format, label));
    Ok(())
}

/// Resolve a (text block, offset, length) reference. Out-of-range block
/// indices clamp to the last block.
fn text_ref(
    meta: &Metadata,
    block: usize,
    offset: usize,
    len: usize,
    encoding: &'static Encoding,
) -> String {
    let Some(last) = meta.text_blocks.len().checked_sub(1) else {
        return String::new();
    };
    let text = &meta.text_blocks[block.min(last)];
    span(offset, len)
        .and_then(|r| text.get(r))
        .map(|raw| decode_trimmed(raw, encoding))
        .unwrap_or_default()
}

/// `start..start + len`, or `None` when the end overflows.
fn span(start: usize, len: usize) -> Option<Range<usize>> {
    Some(start..start.checked_add(len)?)
}

fn detect_compression(first_block: &[u8]) -> Compression {
    let contains = |needle: &[u8]| first_block.windows(needle.len()).any(|w| w == needle);
    if contains(b"SASYZCR2") {
        Compression::Rdc
    } else if contains(b"SASYZCRL") {
        Compression::Rle
    } else {
        Compression::None
    }
}

/// Decode a possibly truncated IEEE double. `None` for SAS missing values (NaN).
fn numeric(raw: &[u8], little_endian: bool) -> Option<f64> {
    let len = raw.len().min(8);
    let mut buf = [0u8; 8];
    let value = if little_endian {
        buf[8 - len..].copy_from_slice(&raw[..len]);
        f64::from_le_bytes(buf)
    } else {
        buf[..len].copy_from_slice(&raw[..len]);
        f64::from_be_bytes(buf)
    };
    (!value.is_nan()).then_some(value)
}

fn encoding_for(code: u8) -> Result<&'static Encoding> {
    let label: &[u8] = match code {
        0 | 28 | 62 => b"windows-1252",
        20 => b"utf-8",
        29 => b"iso-8859-1",
        30 => b"iso-8859-2",
        31 => b"iso-8859-3",
        32 => b"iso-8859-4",
        33 => b"iso-8859-5",
        34 => b"iso-8859-6",
        35 => b"iso-8859-7",
        36 => b"iso-8859-8",
        37 => b"iso-8859-9",
        40 => b"iso-8859-15",
        60 => b"windows-1250",
        61 => b"windows-1251",
        63 => b"windows-1253",
        64 => b"windows-1254",
        65 => b"windows-1255",
        66 => b"windows-1256",
        67 => b"windows-1257",
        68 => b"windows-1258",
        123 => b"big5",
        125 => b"gb18030",
        126 => b"gbk",
        134 => b"euc-jp",
        138 => b"shift_jis",
        140 => b"euc-kr",
        _ => return Err(ReadError::UnsupportedEncoding(code)),
    };
    Encoding::for_label(label).ok_or(ReadError::UnsupportedEncoding(code))
}

fn decode_trimmed(raw: &[u8], encoding: &'static Encoding) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    encoding
        .decode_without_bom_handling(&raw[..end])
        .0
        .into_owned()
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------
