//! Little-endian cursor reads and append-style writes over raw BSON
//! bytes.
//!
//! Every multi-byte integer on the wire is little-endian; the two
//! big-endian fields inside an ObjectId are handled by [`crate::oid`]
//! and never pass through here as integers.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Forward cursor over a byte slice. Reads are bounds-checked and report
/// the absolute offset at which they failed.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Reader<'a> {
        Reader { buf, pos: 0 }
    }

    /// Offset of the cursor from the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left in front of the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn short(&self, step: &'static str, needed: usize) -> Error {
        Error::internal_at(
            self.pos,
            format!(
                "{}: needed {} bytes but only {} remain",
                step,
                needed,
                self.remaining()
            ),
        )
    }

    pub fn read_u8(&mut self, step: &'static str) -> Result<u8> {
        let mut rest = &self.buf[self.pos..];
        let v = rest.read_u8().map_err(|_| self.short(step, 1))?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i32(&mut self, step: &'static str) -> Result<i32> {
        let mut rest = &self.buf[self.pos..];
        let v = rest
            .read_i32::<LittleEndian>()
            .map_err(|_| self.short(step, 4))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u32(&mut self, step: &'static str) -> Result<u32> {
        let mut rest = &self.buf[self.pos..];
        let v = rest
            .read_u32::<LittleEndian>()
            .map_err(|_| self.short(step, 4))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i64(&mut self, step: &'static str) -> Result<i64> {
        let mut rest = &self.buf[self.pos..];
        let v = rest
            .read_i64::<LittleEndian>()
            .map_err(|_| self.short(step, 8))?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_u64(&mut self, step: &'static str) -> Result<u64> {
        let mut rest = &self.buf[self.pos..];
        let v = rest
            .read_u64::<LittleEndian>()
            .map_err(|_| self.short(step, 8))?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_f64(&mut self, step: &'static str) -> Result<f64> {
        let mut rest = &self.buf[self.pos..];
        let v = rest
            .read_f64::<LittleEndian>()
            .map_err(|_| self.short(step, 8))?;
        self.pos += 8;
        Ok(v)
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize, step: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.short(step, len));
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// The bytes consumed since `start`, which must be an offset this
    /// cursor has already passed.
    pub fn slice_from(&self, start: usize) -> &'a [u8] {
        &self.buf[start..self.pos]
    }

    /// Read a C-string: UTF-8 bytes up to (and consuming) the NUL
    /// terminator. The terminator is not part of the returned slice.
    pub fn read_cstr(&mut self, step: &'static str) -> Result<&'a str> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.short(step, rest.len() + 1))?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|e| Error::internal_at(self.pos, format!("{}: invalid UTF-8: {}", step, e)))?;
        self.pos += nul + 1;
        Ok(s)
    }
}

pub fn write_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_bits().to_le_bytes());
}

/// Append a C-string. The caller has already checked for interior NULs.
pub fn write_cstr(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

/// Append a length-prefixed string: `i32 length (including NUL) | bytes
/// | 0x00`.
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_i32(buf, s.len() as i32 + 1);
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}
