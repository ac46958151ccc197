//! Byte cursors for the binary geometry formats.
//!
//! Layout code appends through [`ByteWriter`] and consumes through
//! [`ByteReader`]; neither caller tracks offsets by hand. Multi-byte values
//! honour an explicit [`ByteOrder`] so the same cursor serves big-endian
//! envelopes and payloads of either byte order.

use crate::error::{Result, SpatialError};

/// WKB byte-order marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ByteOrder {
    BigEndian = 0,
    LittleEndian = 1,
}

impl ByteOrder {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            0 => Ok(ByteOrder::BigEndian),
            1 => Ok(ByteOrder::LittleEndian),
            _ => Err(SpatialError::Decode(format!(
                "invalid WKB byte order: {}",
                val
            ))),
        }
    }
}

/// Growable output buffer with a write position at its end.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Offset the next write lands at.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u32(&mut self, val: u32, order: ByteOrder) {
        match order {
            ByteOrder::BigEndian => self.write_bytes(&val.to_be_bytes()),
            ByteOrder::LittleEndian => self.write_bytes(&val.to_le_bytes()),
        }
    }

    pub fn write_i32(&mut self, val: i32, order: ByteOrder) {
        self.write_u32(val as u32, order);
    }

    /// IEEE-754 binary64 in the given byte order.
    pub fn write_f64(&mut self, val: f64, order: ByteOrder) {
        self.write_u64(val.to_bits(), order);
    }

    fn write_u64(&mut self, val: u64, order: ByteOrder) {
        match order {
            ByteOrder::BigEndian => self.write_bytes(&val.to_be_bytes()),
            ByteOrder::LittleEndian => self.write_bytes(&val.to_le_bytes()),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Read cursor over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let end = self.pos + N;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| SpatialError::truncated(what, N, self.remaining()))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    /// Advance past `len` bytes without reading them.
    pub fn skip(&mut self, len: usize, what: &str) -> Result<()> {
        if len > self.remaining() {
            return Err(SpatialError::truncated(what, len, self.remaining()));
        }
        self.pos += len;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>("byte")?[0])
    }

    pub fn read_byte_order(&mut self) -> Result<ByteOrder> {
        ByteOrder::from_u8(self.read_u8()?)
    }

    pub fn read_u32(&mut self, order: ByteOrder) -> Result<u32> {
        let bytes = self.take::<4>("u32")?;
        Ok(match order {
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
        })
    }

    pub fn read_i32(&mut self, order: ByteOrder) -> Result<i32> {
        Ok(self.read_u32(order)? as i32)
    }

    pub fn read_f64(&mut self, order: ByteOrder) -> Result<f64> {
        let bytes = self.take::<8>("f64")?;
        Ok(match order {
            ByteOrder::BigEndian => f64::from_be_bytes(bytes),
            ByteOrder::LittleEndian => f64::from_le_bytes(bytes),
        })
    }
}
