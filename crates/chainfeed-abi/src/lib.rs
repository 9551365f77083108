//! chainfeed-abi — ABI interpretation and schema-driven decoding.
//!
//! The state-history protocol is self-describing: the upstream advertises an
//! ABI document naming every envelope, struct and variant it will send, and
//! contracts publish their own ABIs on chain for their table rows and action
//! payloads. This crate turns those documents into decoders:
//!
//! - [`AbiDef`] — the parsed document (JSON or on-chain binary form);
//! - [`TypeTable`] — the validated lookup used to decode binary buffers into
//!   tagged [`Value`]s and to serialize JSON request envelopes to binary;
//! - [`ContractAbiCache`] — the live per-contract context, rebuilt wholesale
//!   whenever an installed ABI is replaced or removed.

mod cache;
mod def;
mod encode;
mod error;
mod scalar;
mod table;
mod value;

pub use cache::ContractAbiCache;
pub use def::{AbiDef, ActionDef, FieldDef, StructDef, TableDef, TypeAlias, VariantDef};
pub use error::AbiError;
pub use table::TypeTable;
pub use value::Value;
