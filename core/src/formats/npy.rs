//! Minimal NPY (NumPy array file) header handling.
//!
//! Only the subset the frame pipeline produces is accepted: C-ordered
//! little-endian f32 payloads. The parser exposes the byte offset of the
//! payload so a frame can be memory-mapped in place instead of read.

use std::{
    fs,
    io::{self, BufReader, Read, Write},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

pub const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// NumPy pads headers so the payload starts on a 64-byte boundary.
const HEADER_ALIGN: usize = 64;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("not an NPY file (bad magic)")]
    BadMagic,
    #[error("unsupported NPY version {0}.{1}")]
    UnsupportedVersion(u8, u8),
    #[error("malformed NPY header: {0}")]
    MalformedHeader(String),
    #[error("unsupported dtype '{0}', expected little-endian f32 ('<f4')")]
    UnsupportedDtype(String),
    #[error("Fortran-ordered arrays are not supported")]
    FortranOrder,
    #[error("data length {data} does not match shape {shape:?}")]
    LengthMismatch { data: usize, shape: Vec<usize> },
}

/// Parsed NPY header for a `<f4`, C-ordered array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub shape: Vec<usize>,
    /// Byte offset of the first data element from the start of the file.
    pub data_offset: usize,
}

impl Header {
    pub fn from_reader(mut rdr: impl Read) -> Result<Self, Error> {
        let mut magic = [0u8; 6];
        rdr.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::BadMagic);
        }

        let major = rdr.read_u8()?;
        let minor = rdr.read_u8()?;
        let (header_len, prefix_len) = match major {
            1 => (rdr.read_u16::<LittleEndian>()? as usize, 10),
            2 | 3 => (rdr.read_u32::<LittleEndian>()? as usize, 12),
            _ => return Err(Error::UnsupportedVersion(major, minor)),
        };

        let mut dict = vec![0u8; header_len];
        rdr.read_exact(&mut dict)?;
        let dict = std::str::from_utf8(&dict)
            .map_err(|_| Error::MalformedHeader("header dict is not UTF-8".to_string()))?;

        let descr = str_field(dict, "descr")?;
        if descr != "<f4" {
            return Err(Error::UnsupportedDtype(descr));
        }
        if bool_field(dict, "fortran_order")? {
            return Err(Error::FortranOrder);
        }
        let shape = shape_field(dict)?;

        Ok(Self {
            shape,
            data_offset: prefix_len + header_len,
        })
    }

    pub fn read_from_file(path: &Path) -> Result<Self, Error> {
        let file = fs::File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn len_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn len_bytes(&self) -> usize {
        self.len_elements() * std::mem::size_of::<f32>()
    }
}

/// Writes `data` as a version 1.0, `<f4`, C-ordered NPY file.
pub fn write_f4<W: Write>(mut w: W, shape: &[usize], data: &[f32]) -> Result<(), Error> {
    let expected: usize = shape.iter().product();
    if data.len() != expected {
        return Err(Error::LengthMismatch {
            data: data.len(),
            shape: shape.to_vec(),
        });
    }

    let shape_str = match shape {
        [single] => format!("({single},)"),
        _ => {
            let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
            format!("({})", dims.join(", "))
        }
    };
    let dict = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {shape_str}, }}");

    let mut header = dict.into_bytes();
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    let pad = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat(b' ').take(pad));
    header.push(b'\n');

    w.write_all(MAGIC)?;
    w.write_all(&[1, 0])?;
    w.write_u16::<LittleEndian>(header.len() as u16)?;
    w.write_all(&header)?;
    for &v in data {
        w.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

fn field<'a>(dict: &'a str, key: &str) -> Result<&'a str, Error> {
    let pat = format!("'{key}':");
    let at = dict
        .find(&pat)
        .ok_or_else(|| Error::MalformedHeader(format!("missing '{key}' key")))?;
    Ok(dict[at + pat.len()..].trim_start())
}

fn str_field(dict: &str, key: &str) -> Result<String, Error> {
    let rest = field(dict, key)?;
    let rest = rest
        .strip_prefix('\'')
        .ok_or_else(|| Error::MalformedHeader(format!("'{key}' is not a string")))?;
    let end = rest
        .find('\'')
        .ok_or_else(|| Error::MalformedHeader(format!("unterminated '{key}' string")))?;
    Ok(rest[..end].to_string())
}

fn bool_field(dict: &str, key: &str) -> Result<bool, Error> {
    let rest = field(dict, key)?;
    if rest.starts_with("True") {
        Ok(true)
    } else if rest.starts_with("False") {
        Ok(false)
    } else {
        Err(Error::MalformedHeader(format!("'{key}' is not a bool")))
    }
}

fn shape_field(dict: &str) -> Result<Vec<usize>, Error> {
    let rest = field(dict, "shape")?;
    let rest = rest
        .strip_prefix('(')
        .ok_or_else(|| Error::MalformedHeader("'shape' is not a tuple".to_string()))?;
    let end = rest
        .find(')')
        .ok_or_else(|| Error::MalformedHeader("unterminated 'shape' tuple".to_string()))?;

    rest[..end]
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .map_err(|_| Error::MalformedHeader(format!("bad 'shape' element '{part}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_header(dict: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        out.extend_from_slice(dict.as_bytes());
        out
    }

    #[test]
    fn write_then_parse() {
        let mut buf = Vec::new();
        write_f4(&mut buf, &[3, 2, 3, 4], &vec![0.5; 3 * 2 * 3 * 4]).unwrap();

        let header = Header::from_reader(&buf[..]).unwrap();
        assert_eq!(header.shape, [3, 2, 3, 4]);
        assert_eq!(header.data_offset % 64, 0);
        assert_eq!(buf.len(), header.data_offset + header.len_bytes());
    }

    #[test]
    fn one_dimensional_shape() {
        let mut buf = Vec::new();
        write_f4(&mut buf, &[5], &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let header = Header::from_reader(&buf[..]).unwrap();
        assert_eq!(header.shape, [5]);
    }

    #[test]
    fn bad_magic() {
        let buf = b"\x93NUMPZ\x01\x00";
        assert!(matches!(
            Header::from_reader(&buf[..]),
            Err(Error::BadMagic)
        ));
    }

    #[test]
    fn rejects_f8() {
        let buf = raw_header("{'descr': '<f8', 'fortran_order': False, 'shape': (2,), }");
        assert!(matches!(
            Header::from_reader(&buf[..]),
            Err(Error::UnsupportedDtype(d)) if d == "<f8"
        ));
    }

    #[test]
    fn rejects_fortran_order() {
        let buf = raw_header("{'descr': '<f4', 'fortran_order': True, 'shape': (2,), }");
        assert!(matches!(
            Header::from_reader(&buf[..]),
            Err(Error::FortranOrder)
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&[9, 0, 0, 0]);
        assert!(matches!(
            Header::from_reader(&buf[..]),
            Err(Error::UnsupportedVersion(9, 0))
        ));
    }

    #[test]
    fn length_mismatch() {
        let mut buf = Vec::new();
        assert!(matches!(
            write_f4(&mut buf, &[2, 2], &[0.0; 3]),
            Err(Error::LengthMismatch { data: 3, .. })
        ));
    }
}
