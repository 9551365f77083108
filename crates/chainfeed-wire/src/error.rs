//! Error types for the wire codec.

use thiserror::Error;

/// Errors produced while reading or writing wire-format data.
///
/// Every read error carries the byte offset at which decoding failed, so
/// protocol violations can be located inside large frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("Unexpected end of buffer at offset {offset}: needed {needed} more bytes")]
    UnexpectedEnd { offset: usize, needed: usize },

    #[error("Varuint at offset {offset} exceeds 32 bits")]
    VarintTooLong { offset: usize },

    #[error("Invalid boolean value {value:#04x} at offset {offset}")]
    InvalidBool { offset: usize, value: u8 },

    #[error("Invalid optional flag {value:#04x} at offset {offset}")]
    InvalidOptionalFlag { offset: usize, value: u8 },

    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("Invalid name character '{ch}' in \"{name}\"")]
    InvalidNameChar { name: String, ch: char },

    #[error("Name \"{0}\" is longer than 13 characters")]
    NameTooLong(String),

    #[error("Invalid hex digest \"{0}\"")]
    InvalidDigest(String),

    #[error("Unknown discriminant {value} for {what} at offset {offset}")]
    UnknownDiscriminant {
        what: &'static str,
        value: u32,
        offset: usize,
    },
}
