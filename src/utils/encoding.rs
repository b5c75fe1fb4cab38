use crate::error::{Error, Result};

/// Encode a u32 as a variable-length integer
pub fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed)
pub fn decode_varint(buf: &[u8]) -> Option<(u32, usize)> {
    let mut result: u32 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 32 {
            return None; // Overflow
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None // Incomplete
}

/// Encode a u64 as a variable-length integer
pub fn encode_varint_u64(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a u64 variable-length integer
pub fn decode_varint_u64(buf: &[u8]) -> Option<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 {
            return None;
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None
}

/// Encode a signed value with zig-zag mapping so small negatives stay short
/// (`-1` is a single byte).
pub fn encode_varint_i64(value: i64, buf: &mut Vec<u8>) {
    let zigzag = ((value << 1) ^ (value >> 63)) as u64;
    encode_varint_u64(zigzag, buf);
}

pub fn decode_varint_i64(buf: &[u8]) -> Option<(i64, usize)> {
    let (raw, consumed) = decode_varint_u64(buf)?;
    let value = ((raw >> 1) as i64) ^ -((raw & 1) as i64);
    Some((value, consumed))
}

/// Length-prefixed UTF-8 string
pub fn encode_str(value: &str, buf: &mut Vec<u8>) {
    encode_varint(value.len() as u32, buf);
    buf.extend_from_slice(value.as_bytes());
}

/// Forward-only cursor over an encoded buffer.
pub struct SliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| Error::decode(format!("unexpected end of input at byte {}", self.pos)))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_varint(&mut self) -> Result<u32> {
        let (value, consumed) = decode_varint(&self.buf[self.pos..])
            .ok_or_else(|| Error::decode(format!("bad varint at byte {}", self.pos)))?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_varint_i64(&mut self) -> Result<i64> {
        let (value, consumed) = decode_varint_i64(&self.buf[self.pos..])
            .ok_or_else(|| Error::decode(format!("bad varint at byte {}", self.pos)))?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_varint()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::decode(format!("string of {} bytes overruns input", len)))?;
        let value = std::str::from_utf8(&self.buf[self.pos..end])
            .map_err(|e| Error::decode(format!("invalid utf-8: {}", e)))?;
        self.pos = end;
        Ok(value.to_string())
    }
}
