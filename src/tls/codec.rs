//! Fixed-width big-endian integers and a bounds-checked reader.

use super::TlsError;

/// Largest value representable in three bytes.
pub const U24_MAX: u32 = 0x00FF_FFFF;

/// Encode a 2-byte big-endian length.
pub fn pack2(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn unpack2(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// Encode a 3-byte big-endian length. Values above 16 777 215 are rejected.
pub fn pack3(value: u32) -> Result<[u8; 3], TlsError> {
    if value > U24_MAX {
        return Err(TlsError::ValueOutOfRange {
            value: value.into(),
            width: 3,
        });
    }
    let [_, hi, mid, lo] = value.to_be_bytes();
    Ok([hi, mid, lo])
}

pub fn unpack3(bytes: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

/// Length prefix for a payload of `len` bytes in a 3-byte field.
pub(crate) fn pack3_len(len: usize) -> Result<[u8; 3], TlsError> {
    let value = u32::try_from(len).map_err(|_| TlsError::ValueOutOfRange {
        value: len as u64,
        width: 3,
    })?;
    pack3(value)
}

/// Cursor over a borrowed TLS structure.
///
/// Every read names the field it is reading so truncation errors say
/// which length field was wrong.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub(crate) fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], TlsError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(TlsError::Truncated { what })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self, what: &'static str) -> Result<u8, TlsError> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn u16(&mut self, what: &'static str) -> Result<u16, TlsError> {
        let bytes = self.take(2, what)?;
        Ok(unpack2([bytes[0], bytes[1]]))
    }

    pub(crate) fn u24(&mut self, what: &'static str) -> Result<u32, TlsError> {
        let bytes = self.take(3, what)?;
        Ok(unpack3([bytes[0], bytes[1], bytes[2]]))
    }

    /// Read a vector with a 1-byte length prefix.
    pub(crate) fn vec8(&mut self, what: &'static str) -> Result<&'a [u8], TlsError> {
        let len = self.u8(what)?;
        self.take(len.into(), what)
    }

    /// Read a vector with a 2-byte length prefix.
    pub(crate) fn vec16(&mut self, what: &'static str) -> Result<&'a [u8], TlsError> {
        let len = self.u16(what)?;
        self.take(len.into(), what)
    }

    /// Read a vector with a 3-byte length prefix.
    pub(crate) fn vec24(&mut self, what: &'static str) -> Result<&'a [u8], TlsError> {
        let len = self.u24(what)?;
        self.take(len as usize, what)
    }
}
