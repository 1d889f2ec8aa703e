//! Little-endian framing helpers for the persisted blob formats.
//!
//! Every on-disk section of the cache is a sequence of signed 32-bit
//! little-endian fields and raw byte runs. Frame numbers and lengths are
//! non-negative by construction, but they travel as `i32` on the wire, so
//! the readers here reject negative values instead of wrapping them.

use std::io::{self, Read, Write};

/// Writes a signed 32-bit little-endian value.
///
/// # Errors
///
/// Propagates the sink's I/O error.
pub fn write_i32(w: &mut dyn Write, value: i32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

/// Reads a signed 32-bit little-endian value.
///
/// # Errors
///
/// Propagates the reader's I/O error, including `UnexpectedEof` on a
/// truncated stream.
pub fn read_i32(r: &mut dyn Read) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Writes a frame number or interval as a wire `i32`.
///
/// # Errors
///
/// Fails with `InvalidInput` if the value does not fit in an `i32`, or with
/// the sink's I/O error.
pub fn write_u32(w: &mut dyn Write, value: u32) -> io::Result<()> {
    let wire = i32::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "value exceeds wire range"))?;
    write_i32(w, wire)
}

/// Reads a frame number or interval, rejecting negative wire values.
///
/// # Errors
///
/// Fails with `InvalidData` on a negative field, or with the reader's I/O
/// error.
pub fn read_u32(r: &mut dyn Read) -> io::Result<u32> {
    u32::try_from(read_i32(r)?)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative wire value"))
}

/// Writes a byte count as a wire `i32`.
///
/// # Errors
///
/// Fails with `InvalidInput` if the length does not fit in an `i32`, or with
/// the sink's I/O error.
pub fn write_len(w: &mut dyn Write, len: usize) -> io::Result<()> {
    let wire = i32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds wire range"))?;
    write_i32(w, wire)
}

/// Reads a byte count, rejecting negative wire values.
///
/// # Errors
///
/// Fails with `InvalidData` on a negative field, or with the reader's I/O
/// error.
pub fn read_len(r: &mut dyn Read) -> io::Result<usize> {
    usize::try_from(read_i32(r)?)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative wire length"))
}
