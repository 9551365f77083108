//! The ABI definition model: the document a chain (or the state-history
//! endpoint itself) publishes to describe its types.
//!
//! Two source encodings exist for the same document. The protocol ABI
//! arrives as JSON in the first websocket frame; per-contract ABIs arrive
//! as the binary serialization stored on chain. Both parse into [`AbiDef`].

use chainfeed_wire::{ByteReader, Name, WireError};
use serde::{Deserialize, Serialize};

use crate::error::AbiError;

/// Accepted ABI version line prefix. Minor revisions are additive; an
/// unknown major version means we cannot trust the document's shape.
const SUPPORTED_VERSION_PREFIX: &str = "eosio::abi/1.";

/// A named alias for another type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAlias {
    pub new_type_name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// One field of a struct, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// An ordered-field struct, optionally extending a base struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

/// An action name → argument type mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: Name,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub ricardian_contract: String,
}

/// A table name → row type mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub name: Name,
    #[serde(default)]
    pub index_type: String,
    #[serde(default)]
    pub key_names: Vec<String>,
    #[serde(default)]
    pub key_types: Vec<String>,
    #[serde(rename = "type")]
    pub ty: String,
}

/// A tagged union: ordered alternatives addressed by a ULEB128 index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantDef {
    pub name: String,
    pub types: Vec<String>,
}

/// A parsed ABI document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbiDef {
    pub version: String,
    #[serde(default)]
    pub types: Vec<TypeAlias>,
    #[serde(default)]
    pub structs: Vec<StructDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub variants: Vec<VariantDef>,
}

impl AbiDef {
    /// Parse the JSON encoding and gate on the version line.
    pub fn from_json(bytes: &[u8]) -> Result<Self, AbiError> {
        let def: AbiDef = serde_json::from_slice(bytes)?;
        def.check_version()?;
        Ok(def)
    }

    /// Parse the binary encoding used for on-chain contract ABIs.
    ///
    /// The `variants` section postdates the 1.0 layout and is serialized as
    /// a trailing extension: it is only read when bytes remain.
    pub fn from_bin(bytes: &[u8]) -> Result<Self, AbiError> {
        let mut r = ByteReader::new(bytes);
        let version = r.read_string()?;

        let mut def = AbiDef {
            version,
            ..Default::default()
        };
        def.check_version()?;

        for _ in 0..r.read_varuint32()? {
            def.types.push(TypeAlias {
                new_type_name: r.read_string()?,
                ty: r.read_string()?,
            });
        }
        for _ in 0..r.read_varuint32()? {
            let name = r.read_string()?;
            let base = r.read_string()?;
            let mut fields = Vec::new();
            for _ in 0..r.read_varuint32()? {
                fields.push(FieldDef {
                    name: r.read_string()?,
                    ty: r.read_string()?,
                });
            }
            def.structs.push(StructDef { name, base, fields });
        }
        for _ in 0..r.read_varuint32()? {
            def.actions.push(ActionDef {
                name: r.read_name()?,
                ty: r.read_string()?,
                ricardian_contract: r.read_string()?,
            });
        }
        for _ in 0..r.read_varuint32()? {
            def.tables.push(TableDef {
                name: r.read_name()?,
                index_type: r.read_string()?,
                key_names: read_string_vec(&mut r)?,
                key_types: read_string_vec(&mut r)?,
                ty: r.read_string()?,
            });
        }
        // ricardian clauses and error messages: present, not retained
        for _ in 0..r.read_varuint32()? {
            r.read_string()?;
            r.read_string()?;
        }
        for _ in 0..r.read_varuint32()? {
            r.read_u64()?;
            r.read_string()?;
        }
        // abi extensions
        if r.remaining() > 0 {
            for _ in 0..r.read_varuint32()? {
                r.read_u16()?;
                r.read_bytes()?;
            }
        }
        // trailing variants extension
        if r.remaining() > 0 {
            for _ in 0..r.read_varuint32()? {
                def.variants.push(VariantDef {
                    name: r.read_string()?,
                    types: read_string_vec(&mut r)?,
                });
            }
        }
        Ok(def)
    }

    fn check_version(&self) -> Result<(), AbiError> {
        if self.version.starts_with(SUPPORTED_VERSION_PREFIX) {
            Ok(())
        } else {
            Err(AbiError::UnsupportedVersion(self.version.clone()))
        }
    }
}

fn read_string_vec(r: &mut ByteReader<'_>) -> Result<Vec<String>, WireError> {
    let n = r.read_varuint32()?;
    let mut out = Vec::with_capacity(n.min(256) as usize);
    for _ in 0..n {
        out.push(r.read_string()?);
    }
    Ok(out)
}
