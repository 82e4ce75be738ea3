//! NumPy `.npy` array codec
//!
//! The recordings ship as `.npy` files. This module reads format versions
//! 1.0 to 3.0 for the numeric and boolean dtypes the data set uses, and writes
//! version 1.0 files for `f64` and `bool` arrays.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::DataError;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Element type of a stored array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Float64,
    Float32,
    Int64,
    Int32,
    Int16,
    UInt8,
    Bool,
}

impl DType {
    fn size(&self) -> usize {
        match self {
            DType::Float64 | DType::Int64 => 8,
            DType::Float32 | DType::Int32 => 4,
            DType::Int16 => 2,
            DType::UInt8 | DType::Bool => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

/// A decoded array in C order, widened to `f64`
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    dtype: DType,
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl NpyArray {
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Values as truth flags (nonzero is true)
    pub fn to_bools(&self) -> Vec<bool> {
        self.values.iter().map(|v| *v != 0.0).collect()
    }

    /// Fail unless the array is one-dimensional; returns its length
    pub fn expect_1d(&self) -> Result<usize, DataError> {
        match self.shape.as_slice() {
            [n] => Ok(*n),
            other => Err(DataError::ShapeMismatch(format!(
                "expected a 1-d array, found shape {:?}",
                other
            ))),
        }
    }
}

/// Read an array from any reader
pub fn read_npy<R: Read>(mut reader: R) -> Result<NpyArray, DataError> {
    let mut preamble = [0u8; 8];
    reader.read_exact(&mut preamble)?;
    if &preamble[..6] != MAGIC {
        return Err(DataError::ArrayFormat("missing NUMPY magic string".to_string()));
    }

    let major = preamble[6];
    let header_len = match major {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        v => {
            return Err(DataError::ArrayFormat(format!(
                "unsupported format version {}.{}",
                v, preamble[7]
            )))
        }
    };

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8(header)
        .map_err(|_| DataError::ArrayFormat("header is not valid text".to_string()))?;

    let (dtype, order) = parse_descr(&header)?;
    if parse_fortran_order(&header)? {
        return Err(DataError::ArrayFormat(
            "Fortran-ordered arrays are not supported".to_string(),
        ));
    }
    let shape = parse_shape(&header)?;

    let byte_len = shape
        .iter()
        .try_fold(dtype.size(), |acc, dim| acc.checked_mul(*dim))
        .and_then(|len| u64::try_from(len).ok())
        .ok_or_else(|| {
            DataError::ArrayFormat(format!("shape {:?} is too large to address", shape))
        })?;

    // grow with the data actually present instead of trusting the header
    let mut raw = Vec::new();
    reader.take(byte_len).read_to_end(&mut raw)?;
    if (raw.len() as u64) < byte_len {
        return Err(DataError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("payload holds {} of {} bytes", raw.len(), byte_len),
        )));
    }

    let values = raw
        .chunks_exact(dtype.size())
        .map(|chunk| decode(chunk, dtype, order))
        .collect();

    Ok(NpyArray {
        dtype,
        shape,
        values,
    })
}

/// Read an array from a file on disk
pub fn read_npy_file(path: &Path) -> Result<NpyArray, DataError> {
    let file = File::open(path)?;
    read_npy(BufReader::new(file)).map_err(|e| match e {
        DataError::ArrayFormat(msg) => {
            DataError::ArrayFormat(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Write an `f64` array in C order
pub fn write_npy_f64<W: Write>(mut writer: W, shape: &[usize], values: &[f64]) -> Result<(), DataError> {
    check_len(shape, values.len())?;
    write_header(&mut writer, "<f8", shape)?;
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a boolean array in C order
pub fn write_npy_bool<W: Write>(mut writer: W, shape: &[usize], values: &[bool]) -> Result<(), DataError> {
    check_len(shape, values.len())?;
    write_header(&mut writer, "|b1", shape)?;
    let bytes: Vec<u8> = values.iter().map(|b| u8::from(*b)).collect();
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Write an `f64` array to a file, creating or truncating it
pub fn write_npy_f64_file(path: &Path, shape: &[usize], values: &[f64]) -> Result<(), DataError> {
    write_npy_f64(BufWriter::new(File::create(path)?), shape, values)
}

/// Write a boolean array to a file, creating or truncating it
pub fn write_npy_bool_file(path: &Path, shape: &[usize], values: &[bool]) -> Result<(), DataError> {
    write_npy_bool(BufWriter::new(File::create(path)?), shape, values)
}

fn check_len(shape: &[usize], len: usize) -> Result<(), DataError> {
    let expected: usize = shape.iter().product();
    if expected != len {
        return Err(DataError::ShapeMismatch(format!(
            "shape {:?} holds {} values, got {}",
            shape, expected, len
        )));
    }
    Ok(())
}

fn write_header<W: Write>(writer: &mut W, descr: &str, shape: &[usize]) -> Result<(), DataError> {
    let shape_text = match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr, shape_text
    );

    // magic + version + u16 length + header + newline, padded to 64 bytes
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| DataError::ArrayFormat("header too long for format 1.0".to_string()))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    Ok(())
}

/// Text following `'key':` in the header dictionary
fn dict_entry<'a>(header: &'a str, key: &str) -> Result<&'a str, DataError> {
    let needle = format!("'{}'", key);
    let pos = header
        .find(&needle)
        .ok_or_else(|| DataError::ArrayFormat(format!("header has no '{}' entry", key)))?;
    let rest = header[pos + needle.len()..].trim_start();
    rest.strip_prefix(':')
        .map(str::trim_start)
        .ok_or_else(|| DataError::ArrayFormat(format!("malformed '{}' entry", key)))
}

fn parse_descr(header: &str) -> Result<(DType, ByteOrder), DataError> {
    let entry = dict_entry(header, "descr")?;
    let quote = entry
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| DataError::ArrayFormat("descr is not a string".to_string()))?;
    let body = &entry[1..];
    let end = body
        .find(quote)
        .ok_or_else(|| DataError::ArrayFormat("unterminated descr".to_string()))?;
    let descr = &body[..end];

    let (order, code) = match descr.as_bytes().first() {
        Some(b'<') | Some(b'|') | Some(b'=') => (ByteOrder::Little, &descr[1..]),
        Some(b'>') => (ByteOrder::Big, &descr[1..]),
        _ => (ByteOrder::Little, descr),
    };

    let dtype = match code {
        "f8" => DType::Float64,
        "f4" => DType::Float32,
        "i8" => DType::Int64,
        "i4" => DType::Int32,
        "i2" => DType::Int16,
        "u1" => DType::UInt8,
        "b1" | "?" => DType::Bool,
        other => {
            return Err(DataError::ArrayFormat(format!("unsupported dtype '{}'", other)))
        }
    };
    Ok((dtype, order))
}

fn parse_fortran_order(header: &str) -> Result<bool, DataError> {
    let entry = dict_entry(header, "fortran_order")?;
    if entry.starts_with("True") {
        Ok(true)
    } else if entry.starts_with("False") {
        Ok(false)
    } else {
        Err(DataError::ArrayFormat("fortran_order is not a boolean".to_string()))
    }
}

fn parse_shape(header: &str) -> Result<Vec<usize>, DataError> {
    let entry = dict_entry(header, "shape")?;
    let body = entry
        .strip_prefix('(')
        .and_then(|s| s.find(')').map(|end| &s[..end]))
        .ok_or_else(|| DataError::ArrayFormat("shape is not a tuple".to_string()))?;

    body.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            // numpy may print long dimensions with an L suffix
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| DataError::ArrayFormat(format!("bad shape dimension '{}'", s)))
        })
        .collect()
}

fn decode(chunk: &[u8], dtype: DType, order: ByteOrder) -> f64 {
    macro_rules! read {
        ($t:ty) => {{
            let mut buf = [0u8; std::mem::size_of::<$t>()];
            buf.copy_from_slice(chunk);
            match order {
                ByteOrder::Little => <$t>::from_le_bytes(buf),
                ByteOrder::Big => <$t>::from_be_bytes(buf),
            }
        }};
    }

    match dtype {
        DType::Float64 => read!(f64),
        DType::Float32 => read!(f32) as f64,
        DType::Int64 => read!(i64) as f64,
        DType::Int32 => read!(i32) as f64,
        DType::Int16 => read!(i16) as f64,
        DType::UInt8 => chunk[0] as f64,
        DType::Bool => {
            if chunk[0] != 0 {
                1.0
            } else {
                0.0
            }
        }
    }
}
