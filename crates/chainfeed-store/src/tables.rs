//! The three logical tables and the mutation ops recorded by undo sessions.

use std::collections::BTreeMap;

use chainfeed_wire::{ByteReader, ByteWriter, Checksum256, Name, WireError};

use crate::error::StoreError;

/// The receiver's singleton progress record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressRecord {
    pub head: u32,
    pub head_id: Checksum256,
    pub irreversible: u32,
    pub irreversible_id: Checksum256,
}

impl ProgressRecord {
    fn write(&self, w: &mut ByteWriter) {
        w.write_u32(self.head);
        w.write_checksum256(&self.head_id);
        w.write_u32(self.irreversible);
        w.write_checksum256(&self.irreversible_id);
    }

    fn read(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            head: r.read_u32()?,
            head_id: r.read_checksum256()?,
            irreversible: r.read_u32()?,
            irreversible_id: r.read_checksum256()?,
        })
    }
}

/// In-memory image of the store's logical tables.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub progress: Option<ProgressRecord>,
    pub blocks: BTreeMap<u32, Checksum256>,
    pub abis: BTreeMap<Name, Vec<u8>>,
}

impl Tables {
    pub fn serialize(&self, revision: u64) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_u64(revision);
        w.write_optional(self.progress.as_ref(), |w, p| p.write(w));
        w.write_u32(self.blocks.len() as u32);
        for (num, id) in &self.blocks {
            w.write_u32(*num);
            w.write_checksum256(id);
        }
        w.write_u32(self.abis.len() as u32);
        for (account, abi) in &self.abis {
            w.write_name(*account);
            w.write_bytes(abi);
        }
        w.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<(Self, u64), StoreError> {
        let corrupt = |e: WireError| StoreError::Corrupt(e.to_string());
        let mut r = ByteReader::new(bytes);
        let revision = r.read_u64().map_err(corrupt)?;
        let progress = r
            .read_optional(ProgressRecord::read)
            .map_err(corrupt)?;
        let mut tables = Tables {
            progress,
            ..Default::default()
        };
        let n = r.read_u32().map_err(corrupt)?;
        for _ in 0..n {
            let num = r.read_u32().map_err(corrupt)?;
            let id = r.read_checksum256().map_err(corrupt)?;
            tables.blocks.insert(num, id);
        }
        let n = r.read_u32().map_err(corrupt)?;
        for _ in 0..n {
            let account = r.read_name().map_err(corrupt)?;
            let abi = r.read_bytes().map_err(corrupt)?.to_vec();
            tables.abis.insert(account, abi);
        }
        Ok((tables, revision))
    }
}

/// One reversible table mutation, recorded with enough context to run in
/// either direction.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    PutProgress {
        prev: Option<ProgressRecord>,
        next: ProgressRecord,
    },
    PutBlock {
        num: u32,
        prev: Option<Checksum256>,
        next: Checksum256,
    },
    RemoveBlock {
        num: u32,
        id: Checksum256,
    },
    PutAbi {
        account: Name,
        prev: Option<Vec<u8>>,
        next: Vec<u8>,
    },
    RemoveAbi {
        account: Name,
        prev: Vec<u8>,
    },
}

impl Op {
    pub fn apply(&self, t: &mut Tables) {
        match self {
            Op::PutProgress { next, .. } => t.progress = Some(*next),
            Op::PutBlock { num, next, .. } => {
                t.blocks.insert(*num, *next);
            }
            Op::RemoveBlock { num, .. } => {
                t.blocks.remove(num);
            }
            Op::PutAbi { account, next, .. } => {
                t.abis.insert(*account, next.clone());
            }
            Op::RemoveAbi { account, .. } => {
                t.abis.remove(account);
            }
        }
    }

    pub fn revert(&self, t: &mut Tables) {
        match self {
            Op::PutProgress { prev, .. } => t.progress = *prev,
            Op::PutBlock { num, prev, .. } => match prev {
                Some(id) => {
                    t.blocks.insert(*num, *id);
                }
                None => {
                    t.blocks.remove(num);
                }
            },
            Op::RemoveBlock { num, id } => {
                t.blocks.insert(*num, *id);
            }
            Op::PutAbi { account, prev, .. } => match prev {
                Some(abi) => {
                    t.abis.insert(*account, abi.clone());
                }
                None => {
                    t.abis.remove(account);
                }
            },
            Op::RemoveAbi { account, prev } => {
                t.abis.insert(*account, prev.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_roundtrip() {
        let mut t = Tables::default();
        t.progress = Some(ProgressRecord {
            head: 100,
            irreversible: 90,
            ..Default::default()
        });
        t.blocks.insert(100, Checksum256([1; 32]));
        t.abis.insert("eosio".parse().unwrap(), vec![1, 2, 3]);

        let bytes = t.serialize(90);
        let (back, rev) = Tables::deserialize(&bytes).unwrap();
        assert_eq!(rev, 90);
        assert_eq!(back.progress, t.progress);
        assert_eq!(back.blocks, t.blocks);
        assert_eq!(back.abis, t.abis);
    }

    #[test]
    fn ops_are_inverses() {
        let mut t = Tables::default();
        let op = Op::PutBlock {
            num: 5,
            prev: None,
            next: Checksum256([9; 32]),
        };
        op.apply(&mut t);
        assert!(t.blocks.contains_key(&5));
        op.revert(&mut t);
        assert!(t.blocks.is_empty());

        t.abis.insert("a".parse().unwrap(), vec![1]);
        let op = Op::RemoveAbi {
            account: "a".parse().unwrap(),
            prev: vec![1],
        };
        op.apply(&mut t);
        assert!(t.abis.is_empty());
        op.revert(&mut t);
        assert_eq!(t.abis.get(&"a".parse().unwrap()), Some(&vec![1]));
    }

    #[test]
    fn truncated_snapshot_is_corrupt() {
        let t = Tables::default();
        let bytes = t.serialize(1);
        assert!(matches!(
            Tables::deserialize(&bytes[..4]),
            Err(StoreError::Corrupt(_))
        ));
    }
}
