// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The legacy binary-struct ingest format: a sequence of named,
//! arbitrary-rank numeric arrays, as written by the octave-based predecessor
//! pipeline this crate's data model replaces.

use std::{
    collections::HashMap,
    io::{Read, Seek, SeekFrom},
};

use byteorder::{LittleEndian, ReadBytesExt};

use super::IngestError;

/// One decoded array from the struct file, always promoted to `f64` so
/// callers don't need to match on the original element type.
#[derive(Debug, Clone)]
pub struct OctaveValue {
    /// Dimensions in the order they're indexed, i.e. already un-reversed
    /// from the on-disk most-significant-first storage.
    pub dims: Vec<usize>,
    pub data: Vec<f64>,
}

/// Read one text line -- the key name, newline-terminated -- matching the
/// original `f.readline().strip()` behaviour: bytes up to and including the
/// `\n`, with trailing whitespace/newline stripped off the returned name.
fn read_key_name<R: Read>(r: &mut R) -> Result<String, IngestError> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte)?;
        buf.push(byte[0]);
        if byte[0] == b'\n' {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).trim_end().to_string())
}

fn element_bytes(nbyte: i32) -> Result<usize, IngestError> {
    match nbyte {
        8 | -8 | 4 | -4 | 1 => Ok(nbyte.unsigned_abs() as usize),
        other => Err(IngestError::UnsupportedNbyte(other)),
    }
}

fn read_elements<R: Read>(r: &mut R, nbyte: i32, count: usize) -> Result<Vec<f64>, IngestError> {
    let mut out = Vec::with_capacity(count);
    match nbyte {
        8 => {
            for _ in 0..count {
                out.push(r.read_f64::<LittleEndian>()?);
            }
        }
        4 => {
            for _ in 0..count {
                out.push(r.read_f32::<LittleEndian>()? as f64);
            }
        }
        -4 => {
            for _ in 0..count {
                out.push(r.read_i32::<LittleEndian>()? as f64);
            }
        }
        -8 => {
            for _ in 0..count {
                out.push(r.read_i64::<LittleEndian>()? as f64);
            }
        }
        1 => {
            for _ in 0..count {
                out.push(r.read_u8()? as f64);
            }
        }
        other => return Err(IngestError::UnsupportedNbyte(other)),
    }
    Ok(out)
}

/// Decode a legacy octave-struct ingest file into a name → array map.
///
/// Format: int32 `nkey`, then `nkey` records of: a newline-terminated key
/// name (one text line), int32 `ndim`, `ndim` int32 dims (most-significant-
/// first on disk, reversed here), int32 `nbyte` tag, then `prod(dims)`
/// elements.
pub fn read_octave_struct<R: Read + Seek>(
    mut r: R,
) -> Result<HashMap<String, OctaveValue>, IngestError> {
    let mut out = HashMap::new();
    let nkey = r.read_i32::<LittleEndian>()?;
    for _ in 0..nkey {
        let key = read_key_name(&mut r)?;
        let ndim = r.read_i32::<LittleEndian>()? as usize;
        let mut dims_msf = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            dims_msf.push(r.read_i32::<LittleEndian>()?.max(0) as usize);
        }
        let mut dims = dims_msf;
        dims.reverse();
        let nbyte = r.read_i32::<LittleEndian>()?;
        element_bytes(nbyte)?;
        let count: usize = dims.iter().product::<usize>().max(1);
        let count = if dims.is_empty() { 1 } else { count };
        let data = read_elements(&mut r, nbyte, count)?;
        out.insert(key, OctaveValue { dims, data });
    }
    // Consume nothing further; callers that need to chain reads can seek
    // relative to where this left off.
    let _ = r.seek(SeekFrom::Current(0))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_record(buf: &mut Vec<u8>, key: &str, dims: &[i32], nbyte: i32, data: &[f64]) {
        buf.extend_from_slice(key.as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(&(dims.len() as i32).to_le_bytes());
        for &d in dims {
            buf.extend_from_slice(&d.to_le_bytes());
        }
        buf.extend_from_slice(&nbyte.to_le_bytes());
        match nbyte {
            8 => {
                for &v in data {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
            -4 => {
                for &v in data {
                    buf.extend_from_slice(&(v as i32).to_le_bytes());
                }
            }
            _ => unreachable!("test helper only covers f64/i32"),
        }
    }

    #[test]
    fn decodes_a_mixed_struct_file() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2i32.to_le_bytes()); // nkey
        write_record(&mut buf, "dx", &[2, 3], 8, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        write_record(&mut buf, "pixid", &[3], -4, &[0.0, 1.0, 2.0]);

        let decoded = read_octave_struct(Cursor::new(buf)).unwrap();
        let dx = &decoded["dx"];
        assert_eq!(dx.dims, vec![3, 2]);
        assert_eq!(dx.data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let pixid = &decoded["pixid"];
        assert_eq!(pixid.dims, vec![3]);
        assert_eq!(pixid.data, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn unsupported_nbyte_is_an_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(b"xx\n");
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&3i32.to_le_bytes()); // invalid nbyte
        assert!(read_octave_struct(Cursor::new(buf)).is_err());
    }
}
