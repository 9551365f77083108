//! Resolved type tables and schema-driven decoding.
//!
//! A [`TypeTable`] is the validated, lookup-ready form of an [`AbiDef`]:
//! every struct field, variant alternative, alias target and table row type
//! is known to resolve. Decoding walks the table, consuming a
//! [`ByteReader`] and producing a tagged [`Value`].

use std::collections::HashMap;

use chainfeed_wire::{ByteReader, Name};

use crate::def::{AbiDef, StructDef, VariantDef};
use crate::error::AbiError;
use crate::scalar::{asset_to_string, symbol_code_to_string, symbol_to_string};
use crate::value::Value;

/// Bound on alias chains and value nesting. The protocol's deepest real
/// structures (inline action traces) stay far below this.
pub(crate) const MAX_DEPTH: usize = 64;

/// The built-in scalar types every ABI can reference without declaring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuiltIn {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Int128,
    Uint128,
    Varint32,
    Varuint32,
    Float32,
    Float64,
    Float128,
    TimePoint,
    TimePointSec,
    BlockTimestamp,
    Name,
    Bytes,
    String,
    Checksum160,
    Checksum256,
    Checksum512,
    PublicKey,
    Signature,
    Symbol,
    SymbolCode,
    Asset,
    ExtendedAsset,
}

pub(crate) fn builtin(name: &str) -> Option<BuiltIn> {
    use BuiltIn::*;
    Some(match name {
        "bool" => Bool,
        "int8" => Int8,
        "uint8" => Uint8,
        "int16" => Int16,
        "uint16" => Uint16,
        "int32" => Int32,
        "uint32" => Uint32,
        "int64" => Int64,
        "uint64" => Uint64,
        "int128" => Int128,
        "uint128" => Uint128,
        "varint32" => Varint32,
        "varuint32" => Varuint32,
        "float32" => Float32,
        "float64" => Float64,
        "float128" => Float128,
        "time_point" => TimePoint,
        "time_point_sec" => TimePointSec,
        "block_timestamp_type" => BlockTimestamp,
        "name" => Name,
        "bytes" => Bytes,
        "string" => String,
        "checksum160" => Checksum160,
        "checksum256" => Checksum256,
        "checksum512" => Checksum512,
        "public_key" => PublicKey,
        "signature" => Signature,
        "symbol" => Symbol,
        "symbol_code" => SymbolCode,
        "asset" => Asset,
        "extended_asset" => ExtendedAsset,
        _ => return None,
    })
}

/// A type name resolved one level: suffixes stripped, aliases not yet
/// followed.
pub(crate) enum Resolved<'a> {
    BuiltIn(BuiltIn),
    Struct(&'a StructDef),
    Variant(&'a VariantDef),
    /// `inner[]`
    Vector(&'a str),
    /// `inner?`
    Optional(&'a str),
    /// `inner$` — trailing binary extension, absent when the buffer ends
    Extension(&'a str),
}

/// Validated lookup table built from one ABI definition.
pub struct TypeTable {
    aliases: HashMap<String, String>,
    structs: HashMap<String, StructDef>,
    variants: HashMap<String, VariantDef>,
    tables: HashMap<Name, String>,
}

impl TypeTable {
    /// Build and validate a table from a parsed definition.
    ///
    /// Validation resolves every referenced type name so decode-time lookups
    /// can only fail on genuinely malformed data, not malformed schemas.
    pub fn from_def(def: &AbiDef) -> Result<Self, AbiError> {
        let mut table = TypeTable {
            aliases: HashMap::new(),
            structs: HashMap::new(),
            variants: HashMap::new(),
            tables: HashMap::new(),
        };
        for alias in &def.types {
            table
                .aliases
                .insert(alias.new_type_name.clone(), alias.ty.clone());
        }
        for s in &def.structs {
            table.structs.insert(s.name.clone(), s.clone());
        }
        for v in &def.variants {
            table.variants.insert(v.name.clone(), v.clone());
        }
        for t in &def.tables {
            table.tables.insert(t.name, t.ty.clone());
        }
        table.validate(def)?;
        Ok(table)
    }

    fn validate(&self, def: &AbiDef) -> Result<(), AbiError> {
        for alias in &def.types {
            self.check_resolves(&alias.ty)?;
        }
        for s in &def.structs {
            if !s.base.is_empty() {
                self.check_resolves(&s.base)?;
            }
            for field in &s.fields {
                self.check_resolves(&field.ty)?;
            }
        }
        for v in &def.variants {
            for alt in &v.types {
                self.check_resolves(alt)?;
            }
        }
        for t in &def.tables {
            self.check_resolves(&t.ty)?;
        }
        for a in &def.actions {
            self.check_resolves(&a.ty)?;
        }
        Ok(())
    }

    fn check_resolves(&self, name: &str) -> Result<(), AbiError> {
        self.resolve(name, 0).map(|_| ())
    }

    /// Strip one layer of suffix or follow aliases down to a concrete type.
    pub(crate) fn resolve<'a>(
        &'a self,
        name: &'a str,
        depth: usize,
    ) -> Result<Resolved<'a>, AbiError> {
        if depth > MAX_DEPTH {
            return Err(AbiError::NestingTooDeep(name.to_string()));
        }
        if let Some(inner) = name.strip_suffix('$') {
            return Ok(Resolved::Extension(inner));
        }
        if let Some(inner) = name.strip_suffix("[]") {
            return Ok(Resolved::Vector(inner));
        }
        if let Some(inner) = name.strip_suffix('?') {
            return Ok(Resolved::Optional(inner));
        }
        if let Some(b) = builtin(name) {
            return Ok(Resolved::BuiltIn(b));
        }
        if let Some(s) = self.structs.get(name) {
            return Ok(Resolved::Struct(s));
        }
        if let Some(v) = self.variants.get(name) {
            return Ok(Resolved::Variant(v));
        }
        if let Some(target) = self.aliases.get(name) {
            return self.resolve(target, depth + 1);
        }
        Err(AbiError::UnknownType(name.to_string()))
    }

    /// The row type registered for a table, if any.
    pub fn table_type(&self, table: Name) -> Option<&str> {
        self.tables.get(&table).map(String::as_str)
    }

    // ─── Decoding ─────────────────────────────────────────────────────────────

    /// Decode one value of type `name` from the reader.
    pub fn decode(&self, name: &str, r: &mut ByteReader<'_>) -> Result<Value, AbiError> {
        self.decode_depth(name, r, 0)
    }

    fn decode_depth(
        &self,
        name: &str,
        r: &mut ByteReader<'_>,
        depth: usize,
    ) -> Result<Value, AbiError> {
        if depth > MAX_DEPTH {
            return Err(AbiError::NestingTooDeep(name.to_string()));
        }
        match self.resolve(name, depth)? {
            Resolved::BuiltIn(b) => self.decode_builtin(b, r),
            Resolved::Struct(def) => {
                let fields = self.decode_struct(def, r, depth + 1)?;
                Ok(Value::Object(fields))
            }
            Resolved::Variant(def) => {
                let index = r.read_variant_tag()?;
                let alt = def.types.get(index as usize).ok_or_else(|| {
                    AbiError::VariantIndexOutOfRange {
                        variant: def.name.clone(),
                        index,
                    }
                })?;
                let inner = self.decode_depth(alt, r, depth + 1)?;
                Ok(Value::Variant(alt.clone(), Box::new(inner)))
            }
            Resolved::Vector(inner) => {
                let count = r.read_varuint32()?;
                let mut items = Vec::with_capacity(count.min(4096) as usize);
                for _ in 0..count {
                    items.push(self.decode_depth(inner, r, depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            Resolved::Optional(inner) => match r.read_optional(|_| Ok(()))? {
                None => Ok(Value::Null),
                Some(()) => self.decode_depth(inner, r, depth + 1),
            },
            Resolved::Extension(inner) => {
                if r.remaining() == 0 {
                    Ok(Value::Null)
                } else {
                    self.decode_depth(inner, r, depth + 1)
                }
            }
        }
    }

    fn decode_struct(
        &self,
        def: &StructDef,
        r: &mut ByteReader<'_>,
        depth: usize,
    ) -> Result<Vec<(String, Value)>, AbiError> {
        if depth > MAX_DEPTH {
            return Err(AbiError::NestingTooDeep(def.name.clone()));
        }
        let mut fields = Vec::with_capacity(def.fields.len());
        if !def.base.is_empty() {
            match self.resolve(&def.base, depth)? {
                Resolved::Struct(base) => {
                    fields = self.decode_struct(base, r, depth + 1)?;
                }
                _ => {
                    return Err(AbiError::InvalidAbi(format!(
                        "base \"{}\" of struct \"{}\" is not a struct",
                        def.base, def.name
                    )))
                }
            }
        }
        for field in &def.fields {
            let value = self.decode_depth(&field.ty, r, depth + 1)?;
            fields.push((field.name.clone(), value));
        }
        Ok(fields)
    }

    fn decode_builtin(&self, b: BuiltIn, r: &mut ByteReader<'_>) -> Result<Value, AbiError> {
        use BuiltIn::*;
        Ok(match b {
            Bool => Value::Bool(r.read_bool()?),
            Int8 => Value::Int(r.read_i8()? as i32),
            Uint8 => Value::Uint(r.read_u8()? as u32),
            Int16 => Value::Int(r.read_i16()? as i32),
            Uint16 => Value::Uint(r.read_u16()? as u32),
            Int32 => Value::Int(r.read_i32()?),
            Uint32 => Value::Uint(r.read_u32()?),
            Int64 => Value::Int64(r.read_i64()?),
            Uint64 => Value::Uint64(r.read_u64()?),
            Int128 => Value::BigInt(r.read_i128()?.to_string()),
            Uint128 => Value::BigInt(r.read_u128()?.to_string()),
            Varint32 => Value::Int(r.read_varint32()?),
            Varuint32 => Value::Uint(r.read_varuint32()?),
            Float32 => Value::Float(r.read_f32()? as f64),
            Float64 => Value::Float(r.read_f64()?),
            Float128 => Value::Bytes(r.take(16)?.to_vec()),
            TimePoint => Value::TimePoint(r.read_time_point()?),
            TimePointSec => Value::TimePointSec(r.read_time_point_sec()?),
            BlockTimestamp => Value::BlockTimestamp(r.read_block_timestamp()?),
            Name => Value::Name(r.read_name()?),
            Bytes => Value::Bytes(r.read_bytes()?.to_vec()),
            String => Value::String(r.read_string()?),
            Checksum160 => Value::Checksum(r.read_checksum160()?.to_string()),
            Checksum256 => Value::Checksum(r.read_checksum256()?.to_string()),
            Checksum512 => Value::Checksum(r.read_checksum512()?.to_string()),
            PublicKey => Value::PublicKey(r.read_public_key()?),
            Signature => Value::Signature(r.read_signature()?),
            Symbol => Value::Symbol(symbol_to_string(r.read_u64()?)),
            SymbolCode => Value::Symbol(symbol_code_to_string(r.read_u64()?)),
            Asset => {
                let amount = r.read_i64()?;
                let symbol = r.read_u64()?;
                Value::Asset(asset_to_string(amount, symbol))
            }
            ExtendedAsset => {
                let amount = r.read_i64()?;
                let symbol = r.read_u64()?;
                let contract = r.read_name()?;
                Value::Object(vec![
                    ("quantity".into(), Value::Asset(asset_to_string(amount, symbol))),
                    ("contract".into(), Value::Name(contract)),
                ])
            }
        })
    }

    // ─── Variant checks ───────────────────────────────────────────────────────

    /// Read and validate a variant tag: the type must be a variant and the
    /// selected alternative must be `expected`. The cursor is left on the
    /// alternative's payload.
    pub fn check_variant(
        &self,
        r: &mut ByteReader<'_>,
        type_name: &str,
        expected: &str,
    ) -> Result<(), AbiError> {
        let def = self.expect_variant(type_name)?;
        let index = r.read_variant_tag()?;
        let got = def
            .types
            .get(index as usize)
            .ok_or_else(|| AbiError::VariantIndexOutOfRange {
                variant: def.name.clone(),
                index,
            })?;
        if got != expected {
            return Err(AbiError::WrongVariantAlternative {
                expected: expected.to_string(),
                got: got.clone(),
            });
        }
        Ok(())
    }

    /// Validate the row shape of a table delta: its type must be a
    /// single-alternative variant of a struct, and the row's tag must select
    /// that zeroth alternative. Returns the alternative's type name with the
    /// cursor left on the struct payload.
    pub fn check_table_row_variant<'s>(
        &'s self,
        r: &mut ByteReader<'_>,
        type_name: &'s str,
    ) -> Result<&'s str, AbiError> {
        let def = self.expect_variant(type_name)?;
        if def.types.len() != 1
            || !matches!(self.resolve(&def.types[0], 0), Ok(Resolved::Struct(_)))
        {
            return Err(AbiError::BadTableRowShape(type_name.to_string()));
        }
        let index = r.read_variant_tag()?;
        if index != 0 {
            return Err(AbiError::VariantIndexOutOfRange {
                variant: def.name.clone(),
                index,
            });
        }
        Ok(&def.types[0])
    }

    fn expect_variant<'a>(&'a self, type_name: &'a str) -> Result<&'a VariantDef, AbiError> {
        match self.resolve(type_name, 0)? {
            Resolved::Variant(def) => Ok(def),
            _ => Err(AbiError::NotAVariant(type_name.to_string())),
        }
    }
}
