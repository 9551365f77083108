//! Forward-only cursor over a binary frame.
//!
//! All multi-byte integers are little-endian. Variable-length unsigned
//! integers are ULEB128 capped at 32 bits (5 bytes). Reads never partially
//! commit: on error the frame is abandoned, not resumed.

use crate::error::WireError;
use crate::types::{
    BlockTimestamp, Checksum160, Checksum256, Checksum512, Name, PublicKey, Signature, TimePoint,
    TimePointSec,
};

/// A decoding cursor over a byte slice.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current byte offset from the start of the frame.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left in the frame.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take `n` raw bytes, advancing the cursor.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEnd {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_u128(&mut self) -> Result<u128, WireError> {
        Ok(u128::from_le_bytes(self.take(16)?.try_into().unwrap()))
    }

    pub fn read_i8(&mut self) -> Result<i8, WireError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16, WireError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_i128(&mut self) -> Result<i128, WireError> {
        Ok(self.read_u128()? as i128)
    }

    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Strict boolean: exactly 0 or 1.
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        let offset = self.pos;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(WireError::InvalidBool { offset, value }),
        }
    }

    /// ULEB128 unsigned integer, at most 5 bytes (32 bits).
    pub fn read_varuint32(&mut self) -> Result<u32, WireError> {
        let start = self.pos;
        let mut result: u64 = 0;
        let mut shift = 0u32;
        loop {
            if shift >= 35 {
                return Err(WireError::VarintTooLong { offset: start });
            }
            let byte = self.read_u8()?;
            result |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        if result > u32::MAX as u64 {
            return Err(WireError::VarintTooLong { offset: start });
        }
        Ok(result as u32)
    }

    /// Zig-zag encoded signed 32-bit integer.
    pub fn read_varint32(&mut self) -> Result<i32, WireError> {
        let v = self.read_varuint32()?;
        Ok(((v >> 1) as i32) ^ -((v & 1) as i32))
    }

    /// Length-prefixed byte string (ULEB128 length).
    pub fn read_bytes(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.read_varuint32()? as usize;
        self.take(len)
    }

    /// Length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, WireError> {
        let offset = self.pos;
        let raw = self.read_bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| WireError::InvalidUtf8 { offset })
    }

    pub fn read_name(&mut self) -> Result<Name, WireError> {
        Ok(Name(self.read_u64()?))
    }

    pub fn read_checksum160(&mut self) -> Result<Checksum160, WireError> {
        Ok(Checksum160(self.take(20)?.try_into().unwrap()))
    }

    pub fn read_checksum256(&mut self) -> Result<Checksum256, WireError> {
        Ok(Checksum256(self.take(32)?.try_into().unwrap()))
    }

    pub fn read_checksum512(&mut self) -> Result<Checksum512, WireError> {
        Ok(Checksum512(self.take(64)?.try_into().unwrap()))
    }

    pub fn read_public_key(&mut self) -> Result<PublicKey, WireError> {
        let key_type = self.read_u8()?;
        let data = self.take(33)?.try_into().unwrap();
        Ok(PublicKey { key_type, data })
    }

    pub fn read_signature(&mut self) -> Result<Signature, WireError> {
        let sig_type = self.read_u8()?;
        let data = self.take(65)?.try_into().unwrap();
        Ok(Signature { sig_type, data })
    }

    pub fn read_time_point(&mut self) -> Result<TimePoint, WireError> {
        Ok(TimePoint(self.read_u64()?))
    }

    pub fn read_time_point_sec(&mut self) -> Result<TimePointSec, WireError> {
        Ok(TimePointSec(self.read_u32()?))
    }

    pub fn read_block_timestamp(&mut self) -> Result<BlockTimestamp, WireError> {
        Ok(BlockTimestamp(self.read_u32()?))
    }

    /// Optional: one present byte (strictly 0/1), then the value if present.
    pub fn read_optional<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, WireError>,
    ) -> Result<Option<T>, WireError> {
        let offset = self.pos;
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(read(self)?)),
            value => Err(WireError::InvalidOptionalFlag { offset, value }),
        }
    }

    /// Variant tag: a ULEB128 alternative index.
    pub fn read_variant_tag(&mut self) -> Result<u32, WireError> {
        self.read_varuint32()
    }
}
