//! The fork-aware result pipeline.
//!
//! One call to [`Pipeline::on_result`] per inbound frame decides whether
//! the block extends the chain, triggers a fork rewind, or crosses into
//! irreversibility, then dispatches the block/delta/trace payloads to the
//! bus and advances the durable store.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tracing::{debug, info, warn};

use chainfeed_abi::{AbiDef, ContractAbiCache, TypeTable};
use chainfeed_store::{ProgressRecord, StateStore};
use chainfeed_wire::{BlockTimestamp, ByteReader, Checksum256, Decode, Name};

use crate::bus::EventBus;
use crate::control::{ensure_contract_abi, ControlState};
use crate::error::ReceiverError;
use crate::events::{
    AbiErrorEvent, AbiRemovalEvent, AbiUpdateEvent, BlockEvent, BlockTableDeltaEvent, ForkEvent,
    ForkReason, TableRowUpdateEvent, TransactionTraceEvent,
};
use crate::types::{AccountDelta, GetBlocksResult, KeyValueRow, SignedBlock, TableDelta, TransactionTrace};

fn zlib_inflate(data: &[u8]) -> Result<Vec<u8>, ReceiverError> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(ReceiverError::Inflate)?;
    Ok(out)
}

/// Transactions whose first action matches an entry are dropped before
/// publication.
pub type ActionBlacklist = HashMap<Name, HashSet<Name>>;

fn default_blacklist() -> ActionBlacklist {
    let mut blacklist = ActionBlacklist::new();
    for (account, action) in [("eosio", "onblock"), ("blocktwitter", "tweet")] {
        blacklist
            .entry(account.parse().expect("static name"))
            .or_default()
            .insert(action.parse().expect("static name"));
    }
    blacklist
}

/// The receiver's result-processing core, independent of the transport.
pub struct Pipeline {
    store: Arc<Mutex<StateStore>>,
    cache: Arc<Mutex<ContractAbiCache>>,
    protocol: Option<TypeTable>,
    bus: EventBus,
    control: Arc<ControlState>,
    blacklist: ActionBlacklist,
    report_every: u32,

    head: u32,
    head_id: Checksum256,
    irreversible: u32,
    irreversible_id: Checksum256,
    block_timestamp: BlockTimestamp,
}

impl Pipeline {
    pub fn new(
        store: Arc<Mutex<StateStore>>,
        cache: Arc<Mutex<ContractAbiCache>>,
        bus: EventBus,
        control: Arc<ControlState>,
        report_every: u32,
    ) -> Self {
        Self {
            store,
            cache,
            protocol: None,
            bus,
            control,
            blacklist: default_blacklist(),
            report_every,
            head: 0,
            head_id: Checksum256::default(),
            irreversible: 0,
            irreversible_id: Checksum256::default(),
            block_timestamp: BlockTimestamp(0),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn head(&self) -> u32 {
        self.head
    }

    pub fn irreversible(&self) -> u32 {
        self.irreversible
    }

    pub fn blacklist_mut(&mut self) -> &mut ActionBlacklist {
        &mut self.blacklist
    }

    fn store(&self) -> MutexGuard<'_, StateStore> {
        self.store.lock().unwrap()
    }

    fn protocol(&self) -> Result<&TypeTable, ReceiverError> {
        self.protocol.as_ref().ok_or(ReceiverError::ProtocolAbiMissing)
    }

    // ─── Startup ──────────────────────────────────────────────────────────────

    /// Adopt the durable progress record and surface startup recovery as a
    /// `restart` fork event.
    pub fn load_state(&mut self) {
        let (progress, recovered) = {
            let store = self.store();
            (store.progress().copied(), store.recovered_depth())
        };
        if let Some(p) = progress {
            self.head = p.head;
            self.head_id = p.head_id;
            self.irreversible = p.irreversible;
            self.irreversible_id = p.irreversible_id;
        }
        if recovered > 0 {
            info!(
                head = self.head,
                depth = recovered,
                "reverted uncommitted sessions, issuing an explicit fork event"
            );
            self.bus.publish_fork(ForkEvent {
                fork_block_num: self.head,
                depth: recovered,
                reason: ForkReason::Restart,
            });
        }
        if self.control.ack_mode().is_some() {
            self.control.set_acked(self.head);
        }
    }

    /// Install the protocol ABI advertised in the first inbound frame.
    pub fn load_protocol_abi(&mut self, bytes: &[u8]) -> Result<(), ReceiverError> {
        let def = AbiDef::from_json(bytes)?;
        let table = TypeTable::from_def(&def)?;
        info!(
            structs = def.structs.len(),
            variants = def.variants.len(),
            "loaded protocol ABI"
        );
        self.protocol = Some(table);
        Ok(())
    }

    /// Serialize the open-ended block request against the protocol ABI.
    pub fn build_request(&self) -> Result<Vec<u8>, ReceiverError> {
        let positions: Vec<serde_json::Value> = {
            let store = self.store();
            store
                .blocks_in(self.irreversible.saturating_add(1), self.head)
                .into_iter()
                .map(|(num, id)| {
                    json!({
                        "block_num": num.to_string(),
                        "block_id": id.to_string(),
                    })
                })
                .collect()
        };
        let start_block = self.head.saturating_add(1);
        info!(start_block, positions = positions.len(), "requesting blocks");

        let envelope = json!([
            "get_blocks_request_v0",
            {
                "start_block_num": start_block.to_string(),
                "end_block_num": u32::MAX.to_string(),
                "max_messages_in_flight": u32::MAX.to_string(),
                "have_positions": positions,
                "irreversible_only": false,
                "fetch_block": true,
                "fetch_traces": true,
                "fetch_deltas": true,
            }
        ]);
        Ok(self.protocol()?.json_to_bin("request", &envelope)?)
    }

    // ─── Result processing ────────────────────────────────────────────────────

    /// Process one inbound result frame. Returns `false` when reading
    /// should stop (abort requested).
    pub fn on_result(&mut self, frame: &[u8]) -> Result<bool, ReceiverError> {
        let result = {
            let mut r = ByteReader::new(frame);
            self.protocol()?
                .check_variant(&mut r, "result", "get_blocks_result_v0")?;
            GetBlocksResult::decode(&mut r)?
        };

        let Some(this_block) = result.this_block else {
            // nothing to report at this offset
            return Ok(true);
        };
        let block_num = this_block.block_num;
        let block_id = this_block.block_id;
        let lib = result.last_irreversible.block_num;

        {
            let mut store = self.store();
            if store.revision() < block_num as u64 {
                store.set_revision(block_num as u64)?;
            }
        }

        if block_num > lib && block_num <= self.head {
            // the upstream retracted reversible blocks
            let depth = self.head - block_num;
            info!(block = block_num, head = self.head, depth, "fork detected");
            self.cache.lock().unwrap().reset();
            {
                let mut store = self.store();
                while store.revision() >= block_num as u64 {
                    store.undo()?;
                }
                debug!(revision = store.revision(), "rolled back store");
            }
            self.bus.publish_fork(ForkEvent {
                fork_block_num: block_num,
                depth,
                reason: ForkReason::Network,
            });
        } else if self.head > 0 {
            let linked = result
                .prev_block
                .as_ref()
                .is_some_and(|prev| prev.block_id == self.head_id);
            if !linked {
                return Err(ReceiverError::LinkBreak {
                    block_num,
                    expected: self.head_id,
                });
            }
        }

        self.store().begin_session();

        if block_num > self.irreversible {
            let mut store = self.store();
            store.put_block(block_num, block_id);
            store.remove_blocks_below(lib);
        }

        self.head = block_num;
        self.head_id = block_id;
        self.irreversible = lib;
        self.irreversible_id = result.last_irreversible.block_id;

        if let Some(block) = &result.block {
            self.receive_block(block)?;
        }
        if let Some(deltas) = &result.deltas {
            self.receive_deltas(deltas)?;
        }
        if let Some(traces) = &result.traces {
            self.receive_traces(traces)?;
        }

        if self.control.is_aborting() {
            self.store().abort_session();
            return Ok(false);
        }

        {
            let mut store = self.store();
            store.put_progress(ProgressRecord {
                head: self.head,
                head_id: self.head_id,
                irreversible: self.irreversible,
                irreversible_id: self.irreversible_id,
            });
            store.push_session()?;
        }

        let mut commit_rev = self.irreversible as u64;
        if self.control.ack_mode().is_some() {
            commit_rev = commit_rev.min(self.control.acked() as u64);
        }
        self.store().commit(commit_rev)?;

        Ok(true)
    }

    // ─── Payload dispatch ─────────────────────────────────────────────────────

    fn receive_block(&mut self, bytes: &[u8]) -> Result<(), ReceiverError> {
        if self.head == self.irreversible {
            info!(block = self.head, "crossing irreversible block");
        }
        if self.report_every > 0 && self.head % self.report_every == 0 {
            let free = self.store().free_ratio();
            info!(
                head = self.head,
                irreversible = self.irreversible,
                db_free_percent = (free * 100.0) as u32,
                queue_depth = self.bus.queue_depth(),
                "progress report"
            );
            if self.control.ack_mode().is_some() {
                info!(acked = self.control.acked(), "exporter acknowledged block");
            }
        }

        let block = SignedBlock::decode_all(bytes)?;
        self.block_timestamp = block.timestamp;
        self.bus.publish_block(BlockEvent {
            block_num: self.head,
            last_irreversible: self.irreversible,
            block,
        });
        Ok(())
    }

    fn receive_deltas(&mut self, bytes: &[u8]) -> Result<(), ReceiverError> {
        let data = zlib_inflate(bytes)?;
        let mut r = ByteReader::new(&data);
        let count = r.read_varuint32()?;

        for _ in 0..count {
            let protocol = self.protocol()?;
            protocol.check_variant(&mut r, "table_delta", "table_delta_v0")?;
            let delta = TableDelta::decode(&mut r)?;

            // every row is a single-alternative variant of the table's
            // struct; validate the tag and remember the payload offset
            let mut payloads = Vec::with_capacity(delta.rows.len());
            for row in &delta.rows {
                let mut row_reader = ByteReader::new(&row.data);
                protocol.check_table_row_variant(&mut row_reader, &delta.name)?;
                payloads.push(row_reader.position());
            }

            match delta.name.as_str() {
                "account" => {
                    for (row, start) in delta.rows.iter().zip(&payloads) {
                        if !row.present {
                            continue;
                        }
                        let account =
                            AccountDelta::decode(&mut ByteReader::new(&row.data[*start..]))?;
                        if account.abi.is_empty() {
                            self.clear_contract_abi(account.name);
                        } else {
                            self.save_contract_abi(account.name, account.abi);
                        }
                    }
                }
                "contract_row"
                    if self.bus.has_table_row_update_subscribers()
                        || self.bus.has_abi_error_subscribers() =>
                {
                    for (row, start) in delta.rows.iter().zip(&payloads) {
                        let kvo =
                            KeyValueRow::decode(&mut ByteReader::new(&row.data[*start..]))?;
                        if ensure_contract_abi(&self.store, &self.cache, kvo.code) {
                            self.bus.publish_table_row_update(TableRowUpdateEvent {
                                block_num: self.head,
                                block_timestamp: self.block_timestamp,
                                added: row.present,
                                row: kvo,
                            });
                        } else {
                            self.bus.publish_abi_error(AbiErrorEvent {
                                block_num: self.head,
                                block_timestamp: self.block_timestamp,
                                account: kvo.code,
                                error: "cannot decode table delta because of missing ABI".into(),
                            });
                        }
                    }
                }
                _ => {}
            }

            self.bus.publish_block_table_delta(BlockTableDeltaEvent {
                block_num: self.head,
                block_timestamp: self.block_timestamp,
                delta,
            });
        }
        Ok(())
    }

    fn receive_traces(&mut self, bytes: &[u8]) -> Result<(), ReceiverError> {
        if !self.bus.has_transaction_trace_subscribers() {
            return Ok(());
        }
        let data = zlib_inflate(bytes)?;
        let mut r = ByteReader::new(&data);
        let count = r.read_varuint32()?;
        for _ in 0..count {
            let trace = TransactionTrace::decode(&mut r)?;
            if self.is_blacklisted(&trace) {
                continue;
            }
            self.bus.publish_transaction_trace(TransactionTraceEvent {
                block_num: self.head,
                block_timestamp: self.block_timestamp,
                trace,
            });
        }
        Ok(())
    }

    fn is_blacklisted(&self, trace: &TransactionTrace) -> bool {
        trace.traces.first().is_some_and(|first| {
            self.blacklist
                .get(&first.account)
                .is_some_and(|actions| actions.contains(&first.name))
        })
    }

    // ─── Contract ABIs ────────────────────────────────────────────────────────

    /// Whether `account` can decode table rows right now, loading lazily
    /// from the durable store.
    pub fn contract_abi_ready(&self, account: Name) -> bool {
        ensure_contract_abi(&self.store, &self.cache, account)
    }

    fn save_contract_abi(&mut self, account: Name, abi_bytes: Vec<u8>) {
        let installed = self.cache.lock().unwrap().install(account, &abi_bytes);
        match installed {
            Ok(def) => {
                self.store().put_abi(account, abi_bytes.clone());
                if self.bus.has_abi_update_subscribers() {
                    self.bus.publish_abi_update(AbiUpdateEvent {
                        block_num: self.head,
                        block_timestamp: self.block_timestamp,
                        account,
                        abi_bytes,
                        abi: def,
                    });
                }
            }
            Err(e) => {
                warn!(account = %account, error = %e, "cannot use contract ABI");
                self.bus.publish_abi_error(AbiErrorEvent {
                    block_num: self.head,
                    block_timestamp: self.block_timestamp,
                    account,
                    error: e.to_string(),
                });
            }
        }
    }

    fn clear_contract_abi(&mut self, account: Name) {
        self.cache.lock().unwrap().remove(account);
        let existed = self.store().remove_abi(account);
        if existed {
            debug!(account = %account, "cleared contract ABI");
            self.bus.publish_abi_removal(AbiRemovalEvent {
                block_num: self.head,
                block_timestamp: self.block_timestamp,
                account,
            });
        }
    }
}
