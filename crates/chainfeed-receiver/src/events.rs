//! Messages published on the event bus.
//!
//! Every message is immutable once published and shared by `Arc`; where a
//! payload belongs to a specific block it carries `block_num` and
//! `block_timestamp` so subscribers never need surrounding context.

use chainfeed_abi::AbiDef;
use chainfeed_wire::{BlockTimestamp, Name};
use serde::Serialize;

use crate::types::{KeyValueRow, SignedBlock, TableDelta, TransactionTrace};

/// Why a fork event was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkReason {
    /// The upstream retracted reversible blocks.
    Network,
    /// Startup recovery rolled back uncommitted sessions.
    Restart,
}

impl std::fmt::Display for ForkReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

/// The chain tip was rewound; blocks at or above `fork_block_num` are void.
#[derive(Debug, Clone, Serialize)]
pub struct ForkEvent {
    pub fork_block_num: u32,
    pub depth: u32,
    pub reason: ForkReason,
}

/// A decoded signed block.
#[derive(Debug, Clone, Serialize)]
pub struct BlockEvent {
    pub block_num: u32,
    pub last_irreversible: u32,
    pub block: SignedBlock,
}

/// One raw table delta of a block, before any per-table interpretation.
#[derive(Debug, Clone, Serialize)]
pub struct BlockTableDeltaEvent {
    pub block_num: u32,
    pub block_timestamp: BlockTimestamp,
    pub delta: TableDelta,
}

/// A transaction trace that survived the blacklist.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionTraceEvent {
    pub block_num: u32,
    pub block_timestamp: BlockTimestamp,
    pub trace: TransactionTrace,
}

/// A contract installed a new ABI.
#[derive(Debug, Clone, Serialize)]
pub struct AbiUpdateEvent {
    pub block_num: u32,
    pub block_timestamp: BlockTimestamp,
    pub account: Name,
    #[serde(skip)]
    pub abi_bytes: Vec<u8>,
    pub abi: AbiDef,
}

/// A contract cleared its ABI.
#[derive(Debug, Clone, Serialize)]
pub struct AbiRemovalEvent {
    pub block_num: u32,
    pub block_timestamp: BlockTimestamp,
    pub account: Name,
}

/// A per-contract ABI could not be used; decoding for that account stays
/// unavailable until a valid ABI is seen.
#[derive(Debug, Clone, Serialize)]
pub struct AbiErrorEvent {
    pub block_num: u32,
    pub block_timestamp: BlockTimestamp,
    pub account: Name,
    pub error: String,
}

/// A contract table row changed and its contract's ABI is available.
#[derive(Debug, Clone, Serialize)]
pub struct TableRowUpdateEvent {
    pub block_num: u32,
    pub block_timestamp: BlockTimestamp,
    pub added: bool,
    pub row: KeyValueRow,
}

/// The reader paused under backpressure.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReceiverPauseEvent {
    pub head: u32,
    pub acknowledged: u32,
}
