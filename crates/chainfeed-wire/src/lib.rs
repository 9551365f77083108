//! chainfeed-wire — low-level binary codec for the state-history protocol.
//!
//! The wire format is the abieos-style binary serialization: little-endian
//! fixed-width integers, ULEB128 variable-length unsigned integers,
//! length-prefixed byte strings, a present-flag byte for optionals, and a
//! ULEB128 alternative index prefixing every variant.
//!
//! Higher layers build on two traits:
//! - [`Decode`] / [`Encode`] for statically-known protocol structs;
//! - the raw [`ByteReader`] / [`ByteWriter`] cursors for the schema-driven
//!   decoding done by `chainfeed-abi`.

mod error;
mod reader;
mod types;
mod writer;

pub use error::WireError;
pub use reader::ByteReader;
pub use types::{
    BlockTimestamp, Checksum160, Checksum256, Checksum512, Name, PublicKey, Signature, TimePoint,
    TimePointSec,
};
pub use writer::ByteWriter;

/// A type that can be decoded from the wire format.
pub trait Decode: Sized {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError>;

    /// Decode from a full frame.
    fn decode_all(bytes: &[u8]) -> Result<Self, WireError> {
        Self::decode(&mut ByteReader::new(bytes))
    }
}

/// A type that can be encoded to the wire format.
pub trait Encode {
    fn encode(&self, w: &mut ByteWriter);

    fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.encode(&mut w);
        w.into_bytes()
    }
}

macro_rules! impl_codec_scalar {
    ($ty:ty, $read:ident, $write:ident) => {
        impl Decode for $ty {
            fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
                r.$read()
            }
        }
        impl Encode for $ty {
            fn encode(&self, w: &mut ByteWriter) {
                w.$write(*self);
            }
        }
    };
}

impl_codec_scalar!(u8, read_u8, write_u8);
impl_codec_scalar!(u16, read_u16, write_u16);
impl_codec_scalar!(u32, read_u32, write_u32);
impl_codec_scalar!(u64, read_u64, write_u64);
impl_codec_scalar!(i8, read_i8, write_i8);
impl_codec_scalar!(i16, read_i16, write_i16);
impl_codec_scalar!(i32, read_i32, write_i32);
impl_codec_scalar!(i64, read_i64, write_i64);
impl_codec_scalar!(bool, read_bool, write_bool);
impl_codec_scalar!(Name, read_name, write_name);
impl_codec_scalar!(TimePoint, read_time_point, write_time_point);
impl_codec_scalar!(TimePointSec, read_time_point_sec, write_time_point_sec);
impl_codec_scalar!(BlockTimestamp, read_block_timestamp, write_block_timestamp);

impl Decode for String {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        r.read_string()
    }
}

impl Encode for String {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_string(self);
    }
}

impl Decode for Checksum256 {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        r.read_checksum256()
    }
}

impl Encode for Checksum256 {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_checksum256(self);
    }
}

impl Decode for PublicKey {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        r.read_public_key()
    }
}

impl Encode for PublicKey {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_public_key(self);
    }
}

impl Decode for Signature {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        r.read_signature()
    }
}

impl Encode for Signature {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_signature(self);
    }
}

/// Length-prefixed vector of decodable elements. `Vec<u8>` is byte-for-byte
/// the same encoding as a raw byte string.
impl<T: Decode> Decode for Vec<T> {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let len = r.read_varuint32()? as usize;
        let mut out = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            out.push(T::decode(r)?);
        }
        Ok(out)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_varuint32(self.len() as u32);
        for item in self {
            item.encode(w);
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        r.read_optional(T::decode)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, w: &mut ByteWriter) {
        match self {
            None => w.write_u8(0),
            Some(v) => {
                w.write_u8(1);
                v.encode(w);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_u8_matches_byte_string_encoding() {
        let v: Vec<u8> = vec![1, 2, 3];
        let encoded = v.to_bytes();

        let mut w = ByteWriter::new();
        w.write_bytes(&[1, 2, 3]);
        assert_eq!(encoded, w.into_bytes());

        let mut r = ByteReader::new(&encoded);
        assert_eq!(Vec::<u8>::decode(&mut r).unwrap(), v);
    }

    #[test]
    fn nested_roundtrip() {
        let v: Vec<Option<u32>> = vec![Some(1), None, Some(u32::MAX)];
        let bytes = v.to_bytes();
        assert_eq!(Vec::<Option<u32>>::decode_all(&bytes).unwrap(), v);
    }
}
