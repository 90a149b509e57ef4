//! Row decompression for SAS7BDAT files (`SASYZCRL` run-length and
//! `SASYZCR2` Ross data compression).

use super::error::{ReadError, Result};

fn byte_at(input: &[u8], pos: usize) -> Result<u8> {
    input
        .get(pos)
        .copied()
        .ok_or_else(|| ReadError::Decompression(format!("input ends at offset {pos}")))
}

fn copy_literal(out: &mut Vec<u8>, input: &[u8], pos: &mut usize, n: usize) -> Result<()> {
    let chunk = input
        .get(*pos..*pos + n)
        .ok_or_else(|| ReadError::Decompression(format!("literal of {n} bytes overruns input")))?;
    out.extend_from_slice(chunk);
    *pos += n;
    Ok(())
}

/// Decompress a run-length encoded row into exactly `row_length` bytes.
pub fn rle(input: &[u8], row_length: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(row_length);
    let mut pos = 0;

    while pos < input.len() {
        let control = input[pos] & 0xF0;
        let low = (input[pos] & 0x0F) as usize;
        pos += 1;

        match control {
            0x00 => {
                let n = byte_at(input, pos)? as usize + 64 + low * 256;
                pos += 1;
                copy_literal(&mut out, input, &mut pos, n)?;
            }
            0x40 => {
                let n = byte_at(input, pos)? as usize + 18 + low * 256;
                let fill = byte_at(input, pos + 1)?;
                pos += 2;
                out.resize(out.len() + n, fill);
            }
            0x60 => {
                let n = byte_at(input, pos)? as usize + 17 + low * 256;
                pos += 1;
                out.resize(out.len() + n, b' ');
            }
            0x70 => {
                let n = byte_at(input, pos)? as usize + 17 + low * 256;
                pos += 1;
                out.resize(out.len() + n, 0);
            }
            0x80 => copy_literal(&mut out, input, &mut pos, low + 1)?,
            0x90 => copy_literal(&mut out, input, &mut pos, low + 17)?,
            0xA0 => copy_literal(&mut out, input, &mut pos, low + 33)?,
            0xB0 => copy_literal(&mut out, input, &mut pos, low + 49)?,
            0xC0 => {
                let fill = byte_at(input, pos)?;
                pos += 1;
                out.resize(out.len() + low + 3, fill);
            }
            0xD0 => out.resize(out.len() + low + 2, b'@'),
            0xE0 => out.resize(out.len() + low + 2, b' '),
            0xF0 => out.resize(out.len() + low + 2, 0),
            other => {
                return Err(ReadError::Decompression(format!(
                    "unknown RLE control byte {other:#04x}"
                )))
            }
        }
    }

    finish(out, row_length)
}

/// Decompress an RDC encoded row into exactly `row_length` bytes.
pub fn rdc(input: &[u8], row_length: usize) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::with_capacity(row_length);
    let mut pos = 0;
    let mut ctrl_bits: u16 = 0;
    let mut ctrl_mask: u16 = 0;

    while pos < input.len() {
        ctrl_mask >>= 1;
        if ctrl_mask == 0 {
            ctrl_bits = u16::from(byte_at(input, pos)?) << 8 | u16::from(byte_at(input, pos + 1)?);
            pos += 2;
            ctrl_mask = 0x8000;
        }
        if ctrl_bits & ctrl_mask == 0 {
            out.push(byte_at(input, pos)?);
            pos += 1;
            continue;
        }

        let op = byte_at(input, pos)?;
        let cmd = (op >> 4) & 0x0F;
        let cnt = (op & 0x0F) as usize;
        pos += 1;

        match cmd {
            // short run
            0 => {
                let fill = byte_at(input, pos)?;
                pos += 1;
                out.resize(out.len() + cnt + 3, fill);
            }
            // long run
            1 => {
                let n = cnt + ((byte_at(input, pos)? as usize) << 4) + 19;
                let fill = byte_at(input, pos + 1)?;
                pos += 2;
                out.resize(out.len() + n, fill);
            }
            // long back-reference
            2 => {
                let ofs = cnt + 3 + ((byte_at(input, pos)? as usize) << 4);
                let n = byte_at(input, pos + 1)? as usize + 16;
                pos += 2;
                copy_back(&mut out, ofs, n)?;
            }
            // short back-reference, `cmd` bytes long
            _ => {
                let ofs = cnt + 3 + ((byte_at(input, pos)? as usize) << 4);
                pos += 1;
                copy_back(&mut out, ofs, cmd as usize)?;
            }
        }
    }

    finish(out, row_length)
}

fn copy_back(out: &mut Vec<u8>, ofs: usize, n: usize) -> Result<()> {
    let start = out.len().checked_sub(ofs).ok_or_else(|| {
        ReadError::Decompression(format!("back-reference {ofs} before start of row"))
    })?;
    for k in 0..n {
        let b = out[start + k];
        out.push(b);
    }
    Ok(())
}

fn finish(out: Vec<u8>, row_length: usize) -> Result<Vec<u8>> {
    if out.len() != row_length {
        return Err(ReadError::Decompression(format!(
            "row decompressed to {} bytes, expected {row_length}",
            out.len()
        )));
    }
    Ok(out)
}
