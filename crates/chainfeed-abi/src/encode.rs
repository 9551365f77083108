//! JSON → binary conversion driven by a [`TypeTable`].
//!
//! This is the outbound half of the engine: request envelopes are authored
//! as JSON and serialized against the protocol ABI before being written to
//! the websocket. Integers are accepted as JSON numbers or quoted strings;
//! 64-bit values should use strings to round-trip exactly.

use chainfeed_wire::ByteWriter;
use serde_json::Value as Json;

use crate::error::AbiError;
use crate::scalar::{asset_from_str, parse_iso8601_millis, symbol_code_from_str, symbol_from_str};
use crate::table::{BuiltIn, Resolved, TypeTable, MAX_DEPTH};

impl TypeTable {
    /// Encode `json` as one value of type `name`, appending to the writer.
    pub fn encode_json(
        &self,
        name: &str,
        json: &Json,
        w: &mut ByteWriter,
    ) -> Result<(), AbiError> {
        self.encode_depth(name, json, w, 0)
    }

    /// Convenience for whole messages.
    pub fn json_to_bin(&self, name: &str, json: &Json) -> Result<Vec<u8>, AbiError> {
        let mut w = ByteWriter::new();
        self.encode_json(name, json, &mut w)?;
        Ok(w.into_bytes())
    }

    fn encode_depth(
        &self,
        name: &str,
        json: &Json,
        w: &mut ByteWriter,
        depth: usize,
    ) -> Result<(), AbiError> {
        if depth > MAX_DEPTH {
            return Err(AbiError::NestingTooDeep(name.to_string()));
        }
        match self.resolve(name, depth)? {
            Resolved::BuiltIn(b) => encode_builtin(b, name, json, w),
            Resolved::Struct(def) => {
                let obj = json.as_object().ok_or_else(|| bad(name, "expected object"))?;
                if !def.base.is_empty() {
                    self.encode_depth(&def.base, json, w, depth + 1)?;
                }
                for field in &def.fields {
                    match obj.get(&field.name) {
                        Some(value) => self.encode_depth(&field.ty, value, w, depth + 1)?,
                        // a missing trailing extension field is simply not written
                        None if field.ty.ends_with('$') => {}
                        None => {
                            return Err(bad(
                                name,
                                &format!("missing field \"{}\"", field.name),
                            ))
                        }
                    }
                }
                Ok(())
            }
            Resolved::Variant(def) => {
                let pair = json.as_array().ok_or_else(|| {
                    bad(name, "expected [\"alternative\", value] for variant")
                })?;
                let (alt_name, inner) = match pair.as_slice() {
                    [Json::String(alt), inner] => (alt, inner),
                    _ => return Err(bad(name, "expected [\"alternative\", value] for variant")),
                };
                let index = def
                    .types
                    .iter()
                    .position(|t| t == alt_name)
                    .ok_or_else(|| {
                        bad(name, &format!("unknown variant alternative \"{alt_name}\""))
                    })?;
                w.write_variant_tag(index as u32);
                self.encode_depth(alt_name, inner, w, depth + 1)
            }
            Resolved::Vector(inner) => {
                let items = json.as_array().ok_or_else(|| bad(name, "expected array"))?;
                w.write_varuint32(items.len() as u32);
                for item in items {
                    self.encode_depth(inner, item, w, depth + 1)?;
                }
                Ok(())
            }
            Resolved::Optional(inner) => {
                if json.is_null() {
                    w.write_u8(0);
                    Ok(())
                } else {
                    w.write_u8(1);
                    self.encode_depth(inner, json, w, depth + 1)
                }
            }
            Resolved::Extension(inner) => {
                if json.is_null() {
                    Ok(())
                } else {
                    self.encode_depth(inner, json, w, depth + 1)
                }
            }
        }
    }
}

fn bad(ty: &str, reason: &str) -> AbiError {
    AbiError::JsonEncode {
        ty: ty.to_string(),
        reason: reason.to_string(),
    }
}

fn json_u64(ty: &str, json: &Json) -> Result<u64, AbiError> {
    match json {
        Json::Number(n) => n.as_u64().ok_or_else(|| bad(ty, "expected unsigned integer")),
        Json::String(s) => s.parse().map_err(|_| bad(ty, "expected unsigned integer")),
        _ => Err(bad(ty, "expected unsigned integer")),
    }
}

fn json_i64(ty: &str, json: &Json) -> Result<i64, AbiError> {
    match json {
        Json::Number(n) => n.as_i64().ok_or_else(|| bad(ty, "expected integer")),
        Json::String(s) => s.parse().map_err(|_| bad(ty, "expected integer")),
        _ => Err(bad(ty, "expected integer")),
    }
}

fn json_str<'a>(ty: &str, json: &'a Json) -> Result<&'a str, AbiError> {
    json.as_str().ok_or_else(|| bad(ty, "expected string"))
}

fn bounded_u64(ty: &str, json: &Json, max: u64) -> Result<u64, AbiError> {
    let v = json_u64(ty, json)?;
    if v > max {
        return Err(bad(ty, "value out of range"));
    }
    Ok(v)
}

fn bounded_i64(ty: &str, json: &Json, min: i64, max: i64) -> Result<i64, AbiError> {
    let v = json_i64(ty, json)?;
    if v < min || v > max {
        return Err(bad(ty, "value out of range"));
    }
    Ok(v)
}

fn encode_builtin(
    b: BuiltIn,
    ty: &str,
    json: &Json,
    w: &mut ByteWriter,
) -> Result<(), AbiError> {
    use BuiltIn::*;
    match b {
        Bool => {
            let v = json.as_bool().ok_or_else(|| bad(ty, "expected bool"))?;
            w.write_bool(v);
        }
        Int8 => w.write_i8(bounded_i64(ty, json, i8::MIN as i64, i8::MAX as i64)? as i8),
        Uint8 => w.write_u8(bounded_u64(ty, json, u8::MAX as u64)? as u8),
        Int16 => w.write_i16(bounded_i64(ty, json, i16::MIN as i64, i16::MAX as i64)? as i16),
        Uint16 => w.write_u16(bounded_u64(ty, json, u16::MAX as u64)? as u16),
        Int32 => w.write_i32(bounded_i64(ty, json, i32::MIN as i64, i32::MAX as i64)? as i32),
        Uint32 => w.write_u32(bounded_u64(ty, json, u32::MAX as u64)? as u32),
        Int64 => w.write_i64(json_i64(ty, json)?),
        Uint64 => w.write_u64(json_u64(ty, json)?),
        Int128 => {
            let v: i128 = json_str(ty, json)?
                .parse()
                .map_err(|_| bad(ty, "expected 128-bit integer string"))?;
            w.write_i128(v);
        }
        Uint128 => {
            let v: u128 = json_str(ty, json)?
                .parse()
                .map_err(|_| bad(ty, "expected 128-bit integer string"))?;
            w.write_u128(v);
        }
        Varint32 => w.write_varint32(bounded_i64(ty, json, i32::MIN as i64, i32::MAX as i64)? as i32),
        Varuint32 => w.write_varuint32(bounded_u64(ty, json, u32::MAX as u64)? as u32),
        Float32 => {
            let v = json.as_f64().ok_or_else(|| bad(ty, "expected number"))?;
            w.write_f32(v as f32);
        }
        Float64 => {
            let v = json.as_f64().ok_or_else(|| bad(ty, "expected number"))?;
            w.write_f64(v);
        }
        Float128 => {
            let raw = decode_hex(ty, json, 16)?;
            w.write_raw(&raw);
        }
        TimePoint => {
            let ms = parse_iso8601_millis(json_str(ty, json)?)
                .ok_or_else(|| bad(ty, "expected ISO-8601 timestamp"))?;
            w.write_u64(ms * 1000);
        }
        TimePointSec => {
            let ms = parse_iso8601_millis(json_str(ty, json)?)
                .ok_or_else(|| bad(ty, "expected ISO-8601 timestamp"))?;
            w.write_u32((ms / 1000) as u32);
        }
        BlockTimestamp => {
            let ms = parse_iso8601_millis(json_str(ty, json)?)
                .ok_or_else(|| bad(ty, "expected ISO-8601 timestamp"))?;
            let epoch = chainfeed_wire::BlockTimestamp(0).to_unix_millis();
            if ms < epoch {
                return Err(bad(ty, "timestamp precedes the block timestamp epoch"));
            }
            w.write_u32(((ms - epoch) / chainfeed_wire::BlockTimestamp::INTERVAL_MS) as u32);
        }
        Name => {
            let n: chainfeed_wire::Name = json_str(ty, json)?
                .parse()
                .map_err(|_| bad(ty, "expected name string"))?;
            w.write_name(n);
        }
        Bytes => {
            let raw = hex::decode(json_str(ty, json)?)
                .map_err(|_| bad(ty, "expected hex string"))?;
            w.write_bytes(&raw);
        }
        String => w.write_string(json_str(ty, json)?),
        Checksum160 => {
            let c: chainfeed_wire::Checksum160 = json_str(ty, json)?
                .parse()
                .map_err(|_| bad(ty, "expected 40-char hex digest"))?;
            w.write_checksum160(&c);
        }
        Checksum256 => {
            let c: chainfeed_wire::Checksum256 = json_str(ty, json)?
                .parse()
                .map_err(|_| bad(ty, "expected 64-char hex digest"))?;
            w.write_checksum256(&c);
        }
        Checksum512 => {
            let c: chainfeed_wire::Checksum512 = json_str(ty, json)?
                .parse()
                .map_err(|_| bad(ty, "expected 128-char hex digest"))?;
            w.write_checksum512(&c);
        }
        PublicKey => {
            let raw = key_material(ty, json, 33)?;
            w.write_u8(raw.0);
            w.write_raw(&raw.1);
        }
        Signature => {
            let raw = key_material(ty, json, 65)?;
            w.write_u8(raw.0);
            w.write_raw(&raw.1);
        }
        Symbol => w.write_u64(symbol_from_str(json_str(ty, json)?)?),
        SymbolCode => w.write_u64(symbol_code_from_str(json_str(ty, json)?)?),
        Asset => {
            let (amount, symbol) = asset_from_str(json_str(ty, json)?)?;
            w.write_i64(amount);
            w.write_u64(symbol);
        }
        ExtendedAsset => {
            let obj = json.as_object().ok_or_else(|| bad(ty, "expected object"))?;
            let quantity = obj
                .get("quantity")
                .ok_or_else(|| bad(ty, "missing field \"quantity\""))?;
            let contract = obj
                .get("contract")
                .ok_or_else(|| bad(ty, "missing field \"contract\""))?;
            let (amount, symbol) = asset_from_str(json_str(ty, quantity)?)?;
            w.write_i64(amount);
            w.write_u64(symbol);
            let n: chainfeed_wire::Name = json_str(ty, contract)?
                .parse()
                .map_err(|_| bad(ty, "expected name string"))?;
            w.write_name(n);
        }
    }
    Ok(())
}

fn decode_hex(ty: &str, json: &Json, len: usize) -> Result<Vec<u8>, AbiError> {
    let raw = hex::decode(json_str(ty, json)?).map_err(|_| bad(ty, "expected hex string"))?;
    if raw.len() != len {
        return Err(bad(ty, "wrong hex length"));
    }
    Ok(raw)
}

/// Parse the codec's `PUB_K1_<hex>` / `SIG_K1_<hex>` rendering back into
/// discriminant + raw bytes.
fn key_material(ty: &str, json: &Json, len: usize) -> Result<(u8, Vec<u8>), AbiError> {
    let s = json_str(ty, json)?;
    let hex_part = s.rsplit('_').next().unwrap_or(s);
    let key_type = s
        .split('_')
        .nth(1)
        .and_then(|k| k.strip_prefix('K'))
        .and_then(|n| n.parse::<u8>().ok())
        .map(|n| n.saturating_sub(1))
        .unwrap_or(0);
    let raw = hex::decode(hex_part).map_err(|_| bad(ty, "expected hex key material"))?;
    if raw.len() != len {
        return Err(bad(ty, "wrong key material length"));
    }
    Ok((key_type, raw))
}
