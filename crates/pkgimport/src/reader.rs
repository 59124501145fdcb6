//! Byte cursor and primitive decoding
//!
//! Reads bytes, variable-length integers and length-prefixed strings from an
//! export-data span. The cursor never looks past the end of the span it was
//! given, and every successful read strictly advances the position.

use crate::error::{DecodeError, DecodeErrorKind};

/// Escape byte used by binary export data.
///
/// The body of a binary span never contains a raw `$`, so the end delimiter
/// cannot occur inside it: `$` is written as `|S` and `|` as `||`.
pub const ESCAPE: u8 = b'|';

/// Cursor over one export-data span
#[derive(Debug, Clone)]
pub struct ExportReader<'a> {
    data: &'a [u8],
    position: usize,
    escaped: bool,
}

impl<'a> ExportReader<'a> {
    /// Create a cursor over `data` that reads bytes verbatim
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            escaped: false,
        }
    }

    /// Create a cursor over `data` that undoes `|S`/`||` escaping, starting at `position`
    pub fn escaped(data: &'a [u8], position: usize) -> Self {
        Self {
            data,
            position,
            escaped: true,
        }
    }

    /// Current offset within the span
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of raw bytes left in the span
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.data.len()
    }

    /// Build an error located at the current position
    pub fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(self.position, kind)
    }

    fn raw(&mut self) -> Result<u8, DecodeError> {
        match self.data.get(self.position) {
            Some(&b) => {
                self.position += 1;
                Ok(b)
            }
            None => Err(self.error(DecodeErrorKind::UnexpectedEnd)),
        }
    }

    /// Read a single (unescaped) byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = self.raw()?;
        if !self.escaped || b != ESCAPE {
            return Ok(b);
        }
        match self.raw()? {
            b'S' => Ok(b'$'),
            ESCAPE => Ok(ESCAPE),
            other => Err(DecodeError::new(
                self.position - 2,
                DecodeErrorKind::BadEscape(other),
            )),
        }
    }

    /// Read an unsigned LEB128 integer
    pub fn read_uvarint(&mut self) -> Result<u64, DecodeError> {
        let start = self.position;
        let mut value: u64 = 0;
        let mut shift = 0u32;
        for i in 0..10 {
            let b = self.read_u8()?;
            if b < 0x80 {
                if i == 9 && b > 1 {
                    break;
                }
                return Ok(value | (u64::from(b) << shift));
            }
            value |= u64::from(b & 0x7f) << shift;
            shift += 7;
        }
        Err(DecodeError::new(start, DecodeErrorKind::VarintOverflow))
    }

    /// Read a zig-zag encoded signed integer
    pub fn read_varint(&mut self) -> Result<i64, DecodeError> {
        let u = self.read_uvarint()?;
        let x = (u >> 1) as i64;
        Ok(if u & 1 != 0 { !x } else { x })
    }

    /// Read exactly `count` unescaped bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        if !self.escaped {
            let end = self
                .position
                .checked_add(count)
                .filter(|&end| end <= self.data.len())
                .ok_or_else(|| self.error(DecodeErrorKind::UnexpectedEnd))?;
            let bytes = self.data[self.position..end].to_vec();
            self.position = end;
            return Ok(bytes);
        }
        // Escaping makes every byte at least one raw byte long.
        if count > self.remaining() {
            return Err(self.error(DecodeErrorKind::UnexpectedEnd));
        }
        let mut bytes = Vec::with_capacity(count);
        for _ in 0..count {
            bytes.push(self.read_u8()?);
        }
        Ok(bytes)
    }

    /// Read `count` bytes as a UTF-8 string
    pub fn read_str(&mut self, count: usize) -> Result<String, DecodeError> {
        let start = self.position;
        let bytes = self.read_bytes(count)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::new(start, DecodeErrorKind::InvalidUtf8))
    }

    /// Read a uvarint length followed by that many bytes of UTF-8
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_uvarint()?;
        let len = usize::try_from(len).map_err(|_| self.error(DecodeErrorKind::UnexpectedEnd))?;
        self.read_str(len)
    }

    /// Read bytes up to (not including) the next `\n`, consuming the newline
    pub fn read_line(&mut self) -> Result<&'a [u8], DecodeError> {
        let rest = &self.data[self.position.min(self.data.len())..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(n) => {
                self.position += n + 1;
                Ok(&rest[..n])
            }
            None => Err(self.error(DecodeErrorKind::UnexpectedEnd)),
        }
    }
}
