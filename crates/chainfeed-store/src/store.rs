//! The memory-mapped revisioned store.
//!
//! File layout: a header page, a committed-snapshot region, and a small
//! journal region at the tail of the map recording the revision of every
//! pushed-but-uncommitted session.
//!
//! Durability model follows the upstream progress semantics: `commit(R)`
//! rewrites the snapshot to the state as of revision R; a pushed session
//! only leaves a journal entry. On reopen a non-empty journal means the
//! process died between push and commit. The recovery contract rolls every
//! pending session back, which lands exactly on the committed snapshot, so
//! recovery discards the journal and reports its depth.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;
use tracing::{debug, info};

use chainfeed_wire::{Checksum256, Name};

use crate::error::StoreError;
use crate::tables::{Op, ProgressRecord, Tables};

const MAGIC: &[u8; 8] = b"CHFSTATE";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4096;
/// Tail region holding one u64 revision per pending session.
const JOURNAL_CAP: usize = 1 << 20;

const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 8;
const OFF_SNAPSHOT_LEN: usize = 16;
const OFF_JOURNAL_COUNT: usize = 24;

struct Session {
    revision: u64,
    ops: Vec<Op>,
}

/// The receiver's durable, revisioned state.
pub struct StateStore {
    mmap: MmapMut,
    map_len: usize,
    committed: Tables,
    committed_revision: u64,
    /// Current revision counter: ≥ committed_revision and ≥ every pending
    /// session. Jumps forward when the caller aligns it to block numbers.
    revision: u64,
    live: Tables,
    pending: VecDeque<Session>,
    /// Nested in-progress session frames; mutations land in the top frame.
    active: Vec<Vec<Op>>,
    recovered_depth: u32,
}

impl StateStore {
    /// Open (or create) the store under `dir`, mapped at `size_mb`
    /// megabytes, and run startup recovery.
    pub fn open(dir: &Path, size_mb: u64) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("receiver.db");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let requested = size_mb.max(8) * 1024 * 1024;
        let existing = file.metadata()?.len();
        if existing < requested {
            file.set_len(requested)?;
        }
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let map_len = mmap.len();

        let mut store = StateStore {
            mmap,
            map_len,
            committed: Tables::default(),
            committed_revision: 0,
            revision: 0,
            live: Tables::default(),
            pending: VecDeque::new(),
            active: Vec::new(),
            recovered_depth: 0,
        };

        if store.mmap[OFF_MAGIC..OFF_MAGIC + 8] == [0u8; 8][..] {
            store.init_header();
            info!(path = %path.display(), size_mb, "initialized empty receiver state");
        } else {
            store.load()?;
        }
        Ok(store)
    }

    fn init_header(&mut self) {
        self.mmap[OFF_MAGIC..OFF_MAGIC + 8].copy_from_slice(MAGIC);
        self.mmap[OFF_VERSION..OFF_VERSION + 4].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        self.write_header_u64(OFF_SNAPSHOT_LEN, 0);
        self.write_header_u64(OFF_JOURNAL_COUNT, 0);
    }

    fn load(&mut self) -> Result<(), StoreError> {
        if self.mmap[OFF_MAGIC..OFF_MAGIC + 8] != MAGIC[..] {
            return Err(StoreError::Corrupt("bad magic".into()));
        }
        let version = u32::from_le_bytes(
            self.mmap[OFF_VERSION..OFF_VERSION + 4].try_into().unwrap(),
        );
        if version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported format version {version}"
            )));
        }

        let snapshot_len = self.read_header_u64(OFF_SNAPSHOT_LEN) as usize;
        if snapshot_len > self.snapshot_capacity() {
            return Err(StoreError::Corrupt("snapshot length exceeds capacity".into()));
        }
        if snapshot_len > 0 {
            let bytes = &self.mmap[HEADER_LEN..HEADER_LEN + snapshot_len];
            let (tables, revision) = Tables::deserialize(bytes)?;
            self.committed = tables;
            self.committed_revision = revision;
            self.revision = revision;
        }

        // A non-empty journal means the process died between push and
        // commit. Recovery rolls every pending session back, which lands on
        // the committed snapshot; the journal is only kept for its depth.
        let journal_count = self.read_header_u64(OFF_JOURNAL_COUNT);
        if journal_count > 0 {
            info!(
                uncommitted = journal_count,
                head = self.committed.progress.map(|p| p.head).unwrap_or(0),
                "store has uncommitted sessions, reverting to last commit"
            );
            self.recovered_depth = journal_count as u32;
            self.write_header_u64(OFF_JOURNAL_COUNT, 0);
        }

        self.live = self.committed.clone();
        Ok(())
    }

    /// Sessions rolled back by startup recovery on the last `open`.
    pub fn recovered_depth(&self) -> u32 {
        self.recovered_depth
    }

    // ─── Reads ────────────────────────────────────────────────────────────────

    pub fn progress(&self) -> Option<&ProgressRecord> {
        self.live.progress.as_ref()
    }

    pub fn block_id(&self, num: u32) -> Option<&Checksum256> {
        self.live.blocks.get(&num)
    }

    /// Received blocks with numbers in `[from, to]`, ascending.
    pub fn blocks_in(&self, from: u32, to: u32) -> Vec<(u32, Checksum256)> {
        self.live
            .blocks
            .range(from..=to)
            .map(|(n, id)| (*n, *id))
            .collect()
    }

    pub fn block_count(&self) -> usize {
        self.live.blocks.len()
    }

    pub fn abi(&self, account: Name) -> Option<&[u8]> {
        self.live.abis.get(&account).map(Vec::as_slice)
    }

    pub fn has_abi(&self, account: Name) -> bool {
        self.live.abis.contains_key(&account)
    }

    /// Current revision: the highest pushed revision, the committed
    /// revision when nothing is pending, or an explicitly aligned value.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Revision of the last permanent state.
    pub fn committed_revision(&self) -> u64 {
        self.committed_revision
    }

    /// Fraction of the snapshot region still unused.
    pub fn free_ratio(&self) -> f64 {
        let used = self.read_header_u64(OFF_SNAPSHOT_LEN) as f64;
        1.0 - used / self.snapshot_capacity() as f64
    }

    // ─── Sessions ─────────────────────────────────────────────────────────────

    /// Align the revision counter to a block number.
    ///
    /// With no pending sessions this also moves the committed baseline.
    /// With pending sessions only a forward jump is legal: rewriting the
    /// numbering under pushed sessions would corrupt the undo stack.
    pub fn set_revision(&mut self, revision: u64) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            self.committed_revision = revision;
        } else if revision <= self.revision {
            return Err(StoreError::RevisionWithPendingSessions(self.pending.len()));
        }
        debug!(revision, "set store revision");
        self.revision = revision;
        Ok(())
    }

    /// Open a new session frame. Frames nest; inner frames squash into
    /// their parent on push.
    pub fn begin_session(&mut self) {
        self.active.push(Vec::new());
    }

    /// Promote the current frame to the pending stack at revision `R+1`
    /// (or fold it into its parent frame when nested). Returns the store
    /// revision after the push.
    pub fn push_session(&mut self) -> Result<u64, StoreError> {
        let frame = self
            .active
            .pop()
            .expect("push_session called without begin_session");
        if let Some(parent) = self.active.last_mut() {
            parent.extend(frame);
            return Ok(self.revision());
        }
        if self.pending.len() * 8 >= JOURNAL_CAP {
            return Err(StoreError::JournalFull(self.pending.len()));
        }
        let revision = self.revision + 1;
        self.revision = revision;
        self.pending.push_back(Session {
            revision,
            ops: frame,
        });
        self.write_journal();
        Ok(revision)
    }

    /// Roll back and discard the current frame.
    pub fn abort_session(&mut self) {
        let frame = self
            .active
            .pop()
            .expect("abort_session called without begin_session");
        for op in frame.iter().rev() {
            op.revert(&mut self.live);
        }
    }

    /// Roll back the top pending session.
    pub fn undo(&mut self) -> Result<(), StoreError> {
        let session = self.pending.pop_back().ok_or(StoreError::UndoStackEmpty)?;
        for op in session.ops.iter().rev() {
            op.revert(&mut self.live);
        }
        self.revision = self
            .pending
            .back()
            .map(|s| s.revision)
            .unwrap_or(self.committed_revision);
        debug!(revision = session.revision, "rolled back session");
        self.write_journal();
        Ok(())
    }

    /// Number of pushed, uncommitted sessions.
    pub fn pending_sessions(&self) -> usize {
        self.pending.len()
    }

    /// Make every session with revision ≤ `revision` permanent.
    pub fn commit(&mut self, revision: u64) -> Result<(), StoreError> {
        let mut folded = 0usize;
        while let Some(first) = self.pending.front() {
            if first.revision > revision {
                break;
            }
            let session = self.pending.pop_front().unwrap();
            for op in &session.ops {
                op.apply(&mut self.committed);
            }
            self.committed_revision = session.revision;
            folded += 1;
        }
        if folded > 0 {
            self.write_snapshot()?;
            self.write_journal();
        }
        Ok(())
    }

    // ─── Mutations (require an active session) ────────────────────────────────

    fn record(&mut self, op: Op) {
        op.apply(&mut self.live);
        self.active
            .last_mut()
            .expect("store mutation outside of an undo session")
            .push(op);
    }

    pub fn put_progress(&mut self, record: ProgressRecord) {
        let prev = self.live.progress;
        self.record(Op::PutProgress { prev, next: record });
    }

    pub fn put_block(&mut self, num: u32, id: Checksum256) {
        let prev = self.live.blocks.get(&num).copied();
        self.record(Op::PutBlock {
            num,
            prev,
            next: id,
        });
    }

    /// Delete every received block with number strictly below `watermark`.
    pub fn remove_blocks_below(&mut self, watermark: u32) -> usize {
        let doomed: Vec<(u32, Checksum256)> = self
            .live
            .blocks
            .range(..watermark)
            .map(|(n, id)| (*n, *id))
            .collect();
        for (num, id) in &doomed {
            self.record(Op::RemoveBlock { num: *num, id: *id });
        }
        doomed.len()
    }

    pub fn put_abi(&mut self, account: Name, abi: Vec<u8>) {
        let prev = self.live.abis.get(&account).cloned();
        self.record(Op::PutAbi {
            account,
            prev,
            next: abi,
        });
    }

    /// Remove a stored ABI. Returns whether a row existed.
    pub fn remove_abi(&mut self, account: Name) -> bool {
        match self.live.abis.get(&account).cloned() {
            Some(prev) => {
                self.record(Op::RemoveAbi { account, prev });
                true
            }
            None => false,
        }
    }

    // ─── Persistence internals ────────────────────────────────────────────────

    fn snapshot_capacity(&self) -> usize {
        self.map_len - HEADER_LEN - JOURNAL_CAP
    }

    fn journal_offset(&self) -> usize {
        self.map_len - JOURNAL_CAP
    }

    fn write_snapshot(&mut self) -> Result<(), StoreError> {
        let bytes = self.committed.serialize(self.committed_revision);
        if bytes.len() > self.snapshot_capacity() {
            return Err(StoreError::OutOfSpace {
                needed: bytes.len(),
                capacity: self.snapshot_capacity(),
            });
        }
        self.mmap[HEADER_LEN..HEADER_LEN + bytes.len()].copy_from_slice(&bytes);
        self.write_header_u64(OFF_SNAPSHOT_LEN, bytes.len() as u64);
        Ok(())
    }

    fn write_journal(&mut self) {
        let off = self.journal_offset();
        for (i, session) in self.pending.iter().enumerate() {
            let at = off + i * 8;
            self.mmap[at..at + 8].copy_from_slice(&session.revision.to_le_bytes());
        }
        self.write_header_u64(OFF_JOURNAL_COUNT, self.pending.len() as u64);
    }

    fn read_header_u64(&self, off: usize) -> u64 {
        u64::from_le_bytes(self.mmap[off..off + 8].try_into().unwrap())
    }

    fn write_header_u64(&mut self, off: usize, v: u64) {
        self.mmap[off..off + 8].copy_from_slice(&v.to_le_bytes());
    }
}

impl Drop for StateStore {
    fn drop(&mut self) {
        // An in-flight frame is rolled back, never persisted.
        while !self.active.is_empty() {
            self.abort_session();
        }
        let _ = self.mmap.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(b: u8) -> Checksum256 {
        Checksum256([b; 32])
    }

    fn progress(head: u32, irreversible: u32) -> ProgressRecord {
        ProgressRecord {
            head,
            head_id: id(head as u8),
            irreversible,
            irreversible_id: id(irreversible as u8),
        }
    }

    #[test]
    fn open_initializes_empty() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path(), 8).unwrap();
        assert!(store.progress().is_none());
        assert_eq!(store.revision(), 0);
        assert_eq!(store.recovered_depth(), 0);
    }

    #[test]
    fn commit_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = StateStore::open(dir.path(), 8).unwrap();
            store.begin_session();
            store.put_progress(progress(100, 90));
            store.put_block(100, id(1));
            store.put_abi("eosio".parse().unwrap(), vec![1, 2, 3]);
            assert_eq!(store.push_session().unwrap(), 1);
            store.commit(1).unwrap();
        }
        let store = StateStore::open(dir.path(), 8).unwrap();
        assert_eq!(store.recovered_depth(), 0);
        assert_eq!(store.progress().unwrap().head, 100);
        assert_eq!(store.block_id(100), Some(&id(1)));
        assert_eq!(store.abi("eosio".parse().unwrap()), Some(&[1u8, 2, 3][..]));
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn uncommitted_sessions_are_reverted_on_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = StateStore::open(dir.path(), 8).unwrap();
            store.set_revision(99).unwrap();
            store.begin_session();
            store.put_progress(progress(100, 90));
            store.push_session().unwrap();
            store.commit(100).unwrap();

            // two pushed-but-uncommitted sessions
            for head in [101u32, 102] {
                store.begin_session();
                store.put_progress(progress(head, 90));
                store.put_block(head, id(head as u8));
                store.push_session().unwrap();
            }
        }
        let store = StateStore::open(dir.path(), 8).unwrap();
        assert_eq!(store.recovered_depth(), 2);
        // reads reflect the last commit only
        assert_eq!(store.progress().unwrap().head, 100);
        assert!(store.block_id(101).is_none());
        assert_eq!(store.revision(), 100);
    }

    #[test]
    fn undo_restores_prior_reads() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(dir.path(), 8).unwrap();

        for head in 1..=5u32 {
            store.begin_session();
            store.put_progress(progress(head, 0));
            store.put_block(head, id(head as u8));
            store.push_session().unwrap();
        }
        assert_eq!(store.revision(), 5);

        // roll back to revision 2
        while store.revision() > 2 {
            store.undo().unwrap();
        }
        assert_eq!(store.progress().unwrap().head, 2);
        assert_eq!(store.block_count(), 2);
        assert!(store.block_id(3).is_none());

        store.undo().unwrap();
        store.undo().unwrap();
        assert!(store.progress().is_none());
        assert!(matches!(store.undo(), Err(StoreError::UndoStackEmpty)));
    }

    #[test]
    fn commit_folds_only_up_to_watermark() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(dir.path(), 8).unwrap();
        for head in 1..=4u32 {
            store.begin_session();
            store.put_progress(progress(head, 0));
            store.push_session().unwrap();
        }
        store.commit(2).unwrap();
        assert_eq!(store.pending_sessions(), 2);
        assert_eq!(store.revision(), 4);

        // sessions above the watermark can still be undone
        store.undo().unwrap();
        store.undo().unwrap();
        assert_eq!(store.progress().unwrap().head, 2);
        assert!(matches!(store.undo(), Err(StoreError::UndoStackEmpty)));
    }

    #[test]
    fn truncation_below_watermark() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(dir.path(), 8).unwrap();
        store.begin_session();
        for n in 90..=100u32 {
            store.put_block(n, id(n as u8));
        }
        assert_eq!(store.remove_blocks_below(95), 5);
        assert_eq!(store.block_count(), 6);
        assert!(store.block_id(94).is_none());
        assert!(store.block_id(95).is_some());
        store.push_session().unwrap();
    }

    #[test]
    #[should_panic(expected = "outside of an undo session")]
    fn mutation_outside_session_panics() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(dir.path(), 8).unwrap();
        store.put_block(1, id(1));
    }

    #[test]
    fn set_revision_rules() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(dir.path(), 8).unwrap();
        store.set_revision(100).unwrap();
        assert_eq!(store.revision(), 100);
        assert_eq!(store.committed_revision(), 100);

        store.begin_session();
        store.put_progress(progress(1, 0));
        store.push_session().unwrap();
        assert_eq!(store.revision(), 101);

        // with a pending session only forward jumps are allowed
        assert!(matches!(
            store.set_revision(101),
            Err(StoreError::RevisionWithPendingSessions(1))
        ));
        store.set_revision(200).unwrap();
        assert_eq!(store.revision(), 200);
        assert_eq!(store.committed_revision(), 100);

        // the jump does not disturb the undo stack
        store.undo().unwrap();
        assert_eq!(store.revision(), 100);
    }

    #[test]
    fn nested_sessions_squash_into_parent() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(dir.path(), 8).unwrap();
        store.begin_session();
        store.put_block(1, id(1));
        store.begin_session();
        store.put_block(2, id(2));
        store.push_session().unwrap(); // squashes into outer frame
        store.push_session().unwrap();
        assert_eq!(store.revision(), 1);

        store.undo().unwrap();
        assert_eq!(store.block_count(), 0);
    }

    #[test]
    fn abort_session_rolls_back_frame() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(dir.path(), 8).unwrap();
        store.begin_session();
        store.put_block(1, id(1));
        store.abort_session();
        assert_eq!(store.block_count(), 0);
    }

    #[test]
    fn free_ratio_decreases_with_data() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(dir.path(), 8).unwrap();
        let before = store.free_ratio();
        store.begin_session();
        store.put_abi("big".parse().unwrap(), vec![0u8; 200_000]);
        store.push_session().unwrap();
        store.commit(store.revision()).unwrap();
        assert!(store.free_ratio() < before);
    }
}
