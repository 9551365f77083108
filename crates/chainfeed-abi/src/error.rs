//! Error types for the ABI engine.

use chainfeed_wire::{Name, WireError};
use thiserror::Error;

/// Errors from parsing ABI definitions or decoding data against them.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Unsupported ABI version \"{0}\"")]
    UnsupportedVersion(String),

    #[error("Invalid ABI: {0}")]
    InvalidAbi(String),

    #[error("Unknown type \"{0}\"")]
    UnknownType(String),

    #[error("Type \"{0}\" is not a variant")]
    NotAVariant(String),

    #[error("Variant \"{variant}\" has no alternative {index}")]
    VariantIndexOutOfRange { variant: String, index: u32 },

    #[error("Expected variant alternative \"{expected}\", got \"{got}\"")]
    WrongVariantAlternative { expected: String, got: String },

    #[error("Table row type \"{0}\" must be a single-alternative variant of a struct")]
    BadTableRowShape(String),

    #[error("Type nesting exceeds the supported depth while resolving \"{0}\"")]
    NestingTooDeep(String),

    #[error("No ABI loaded for account {0}")]
    AbiNotLoaded(Name),

    #[error("Account {account} has no table \"{table}\"")]
    TableNotFound { account: Name, table: Name },

    #[error("Cannot encode JSON as \"{ty}\": {reason}")]
    JsonEncode { ty: String, reason: String },

    #[error("ABI JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}
