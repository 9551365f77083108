//! The live per-contract decoder context.
//!
//! Contracts install ABIs through on-chain actions; the receiver mirrors
//! them here so table rows can be decoded as they stream past. The cache is
//! deliberately insert-only: replacing or removing a loaded account drops
//! the whole context, and accounts are rehydrated lazily from the durable
//! store on next use. This keeps the live context trivially consistent with
//! whatever the store says after forks and undo rewinds.

use std::collections::HashMap;

use chainfeed_wire::{ByteReader, Name};

use crate::def::AbiDef;
use crate::error::AbiError;
use crate::table::TypeTable;
use crate::value::Value;

/// Per-account type tables built from installed contract ABIs.
#[derive(Default)]
pub struct ContractAbiCache {
    contracts: HashMap<Name, TypeTable>,
    /// Counts context rebuilds, for observability.
    resets: u64,
}

impl ContractAbiCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `account` currently has a decoder loaded.
    pub fn is_loaded(&self, account: Name) -> bool {
        self.contracts.contains_key(&account)
    }

    /// Number of accounts currently loaded.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Times the context has been dropped for rebuild.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Drop every loaded contract. Callers rehydrate lazily afterwards.
    pub fn reset(&mut self) {
        if !self.contracts.is_empty() {
            self.contracts.clear();
        }
        self.resets += 1;
    }

    /// Validate and install an ABI for `account`, returning the parsed
    /// definition.
    ///
    /// Installing over an already-loaded account first drops the whole
    /// context (the insert-only contract), then loads the new ABI into the
    /// fresh one.
    pub fn install(&mut self, account: Name, abi_bytes: &[u8]) -> Result<AbiDef, AbiError> {
        if self.is_loaded(account) {
            self.reset();
        }
        let def = AbiDef::from_bin(abi_bytes)?;
        let table = TypeTable::from_def(&def)?;
        self.contracts.insert(account, table);
        Ok(def)
    }

    /// Forget `account`. Because entries cannot be removed individually,
    /// a loaded account takes the whole context with it.
    pub fn remove(&mut self, account: Name) {
        if self.is_loaded(account) {
            self.reset();
        }
    }

    /// The type table for `account`, if loaded.
    pub fn get(&self, account: Name) -> Option<&TypeTable> {
        self.contracts.get(&account)
    }

    /// Decode a raw table row using the owning contract's ABI.
    pub fn decode_table_row(
        &self,
        account: Name,
        table: Name,
        raw: &[u8],
    ) -> Result<Value, AbiError> {
        let types = self
            .contracts
            .get(&account)
            .ok_or(AbiError::AbiNotLoaded(account))?;
        let row_type = types
            .table_type(table)
            .ok_or(AbiError::TableNotFound { account, table })?
            .to_string();
        types.decode(&row_type, &mut ByteReader::new(raw))
    }
}
