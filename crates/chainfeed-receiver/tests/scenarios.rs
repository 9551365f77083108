//! End-to-end pipeline scenarios driven with synthetic binary frames.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tempfile::TempDir;

use chainfeed_abi::ContractAbiCache;
use chainfeed_receiver::types::{
    AccountDelta, BlockPosition, GetBlocksResult, KeyValueRow, SignedBlock, TableDelta,
    TableDeltaRow, TransactionTrace,
};
use chainfeed_receiver::{
    ControlState, EventBus, ForkReason, Pipeline, ReceiverError,
};
use chainfeed_store::StateStore;
use chainfeed_wire::{
    BlockTimestamp, ByteWriter, Checksum256, Encode, Name, Signature, TimePoint,
};

/// A state-history protocol ABI trimmed to the shapes the receiver touches.
const TEST_ABI: &str = r#"{
  "version": "eosio::abi/1.1",
  "structs": [
    {"name": "block_position", "base": "", "fields": [
        {"name": "block_num", "type": "uint32"},
        {"name": "block_id", "type": "checksum256"}]},
    {"name": "get_status_request_v0", "base": "", "fields": []},
    {"name": "get_blocks_request_v0", "base": "", "fields": [
        {"name": "start_block_num", "type": "uint32"},
        {"name": "end_block_num", "type": "uint32"},
        {"name": "max_messages_in_flight", "type": "uint32"},
        {"name": "have_positions", "type": "block_position[]"},
        {"name": "irreversible_only", "type": "bool"},
        {"name": "fetch_block", "type": "bool"},
        {"name": "fetch_traces", "type": "bool"},
        {"name": "fetch_deltas", "type": "bool"}]},
    {"name": "get_blocks_ack_request_v0", "base": "", "fields": [
        {"name": "num_messages", "type": "uint32"}]},
    {"name": "get_status_result_v0", "base": "", "fields": [
        {"name": "head", "type": "block_position"},
        {"name": "last_irreversible", "type": "block_position"}]},
    {"name": "get_blocks_result_v0", "base": "", "fields": [
        {"name": "head", "type": "block_position"},
        {"name": "last_irreversible", "type": "block_position"},
        {"name": "this_block", "type": "block_position?"},
        {"name": "prev_block", "type": "block_position?"},
        {"name": "block", "type": "bytes?"},
        {"name": "traces", "type": "bytes?"},
        {"name": "deltas", "type": "bytes?"}]},
    {"name": "row", "base": "", "fields": [
        {"name": "present", "type": "bool"},
        {"name": "data", "type": "bytes"}]},
    {"name": "table_delta_v0", "base": "", "fields": [
        {"name": "name", "type": "string"},
        {"name": "rows", "type": "row[]"}]},
    {"name": "account_v0", "base": "", "fields": [
        {"name": "name", "type": "name"},
        {"name": "vm_type", "type": "uint8"},
        {"name": "vm_version", "type": "uint8"},
        {"name": "privileged", "type": "bool"},
        {"name": "last_code_update", "type": "time_point"},
        {"name": "code_version", "type": "checksum256"},
        {"name": "creation_date", "type": "block_timestamp_type"},
        {"name": "code", "type": "bytes"},
        {"name": "abi", "type": "bytes"}]},
    {"name": "contract_row_v0", "base": "", "fields": [
        {"name": "code", "type": "name"},
        {"name": "scope", "type": "name"},
        {"name": "table", "type": "name"},
        {"name": "primary_key", "type": "uint64"},
        {"name": "payer", "type": "name"},
        {"name": "value", "type": "bytes"}]}
  ],
  "variants": [
    {"name": "request", "types": ["get_status_request_v0", "get_blocks_request_v0", "get_blocks_ack_request_v0"]},
    {"name": "result", "types": ["get_status_result_v0", "get_blocks_result_v0"]},
    {"name": "table_delta", "types": ["table_delta_v0"]},
    {"name": "account", "types": ["account_v0"]},
    {"name": "contract_row", "types": ["contract_row_v0"]}
  ]
}"#;

const RESULT_TAG: u32 = 1; // get_blocks_result_v0 within "result"

struct Harness {
    pipeline: Pipeline,
    control: Arc<ControlState>,
    store: Arc<Mutex<StateStore>>,
}

fn harness(dir: &Path) -> Harness {
    let store = Arc::new(Mutex::new(StateStore::open(dir, 8).unwrap()));
    let cache = Arc::new(Mutex::new(ContractAbiCache::new()));
    let control = Arc::new(ControlState::new());
    let mut pipeline = Pipeline::new(
        Arc::clone(&store),
        cache,
        EventBus::new(256),
        Arc::clone(&control),
        0,
    );
    pipeline.load_protocol_abi(TEST_ABI.as_bytes()).unwrap();
    Harness {
        pipeline,
        control,
        store,
    }
}

fn id(b: u8) -> Checksum256 {
    Checksum256([b; 32])
}

fn pos(block_num: u32, b: u8) -> BlockPosition {
    BlockPosition {
        block_num,
        block_id: id(b),
    }
}

fn frame(result: &GetBlocksResult) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_variant_tag(RESULT_TAG);
    result.encode(&mut w);
    w.into_bytes()
}

fn simple_result(
    block_num: u32,
    id_byte: u8,
    prev: Option<(u32, u8)>,
    lib: u32,
    lib_byte: u8,
) -> GetBlocksResult {
    GetBlocksResult {
        head: pos(block_num, id_byte),
        last_irreversible: pos(lib, lib_byte),
        this_block: Some(pos(block_num, id_byte)),
        prev_block: prev.map(|(n, b)| pos(n, b)),
        block: None,
        traces: None,
        deltas: None,
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn deltas_payload(deltas: &[TableDelta]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(deltas.len() as u32);
    for delta in deltas {
        w.write_variant_tag(0); // table_delta_v0
        delta.encode(&mut w);
    }
    deflate(w.as_bytes())
}

fn traces_payload(traces: &[TransactionTrace]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(traces.len() as u32);
    for trace in traces {
        trace.encode(&mut w);
    }
    deflate(w.as_bytes())
}

fn account_row(account: &str, abi: Vec<u8>) -> TableDeltaRow {
    let delta = AccountDelta {
        name: account.parse().unwrap(),
        vm_type: 0,
        vm_version: 0,
        privileged: false,
        last_code_update: TimePoint(0),
        code_version: id(0),
        creation_date: BlockTimestamp(0),
        code: vec![],
        abi,
    };
    let mut w = ByteWriter::new();
    w.write_variant_tag(0); // account_v0
    delta.encode(&mut w);
    TableDeltaRow {
        present: true,
        data: w.into_bytes(),
    }
}

fn contract_row(code: &str, table: &str, value: Vec<u8>) -> TableDeltaRow {
    let row = KeyValueRow {
        code: code.parse().unwrap(),
        scope: code.parse().unwrap(),
        table: table.parse().unwrap(),
        primary_key: 1,
        payer: code.parse().unwrap(),
        value,
    };
    let mut w = ByteWriter::new();
    w.write_variant_tag(0); // contract_row_v0
    row.encode(&mut w);
    TableDeltaRow {
        present: true,
        data: w.into_bytes(),
    }
}

/// Binary ABI with a `holdings` table of `balance { owner: name, amount: uint64 }`.
fn contract_bin_abi() -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_string("eosio::abi/1.1");
    w.write_varuint32(0); // types
    w.write_varuint32(1); // structs
    w.write_string("balance");
    w.write_string("");
    w.write_varuint32(2);
    w.write_string("owner");
    w.write_string("name");
    w.write_string("amount");
    w.write_string("uint64");
    w.write_varuint32(0); // actions
    w.write_varuint32(1); // tables
    w.write_name("holdings".parse().unwrap());
    w.write_string("i64");
    w.write_varuint32(0);
    w.write_varuint32(0);
    w.write_string("balance");
    w.write_varuint32(0); // ricardian clauses
    w.write_varuint32(0); // error messages
    w.into_bytes()
}

fn minimal_block(slot: u32) -> SignedBlock {
    SignedBlock {
        timestamp: BlockTimestamp(slot),
        producer: "prod".parse().unwrap(),
        confirmed: 0,
        previous: id(0),
        transaction_mroot: id(0),
        action_mroot: id(0),
        schedule_version: 1,
        new_producers: None,
        header_extensions: vec![],
        producer_signature: Signature::default(),
        transactions: vec![],
        block_extensions: vec![],
    }
}

fn minimal_trace(first_account: &str, first_action: &str) -> TransactionTrace {
    use chainfeed_receiver::types::{
        AccountAuthSequence, ActionReceipt, ActionTrace, TransactionStatus,
    };
    TransactionTrace {
        id: id(0xaa),
        status: TransactionStatus::Executed,
        cpu_usage_us: 10,
        net_usage_words: 1,
        elapsed: 50,
        net_usage: 8,
        scheduled: false,
        traces: vec![ActionTrace {
            receipt: ActionReceipt {
                receiver: first_account.parse().unwrap(),
                act_digest: id(0xbb),
                global_sequence: 1,
                recv_sequence: 1,
                auth_sequence: vec![AccountAuthSequence {
                    account: first_account.parse().unwrap(),
                    sequence: 1,
                }],
                code_sequence: 1,
                abi_sequence: 1,
            },
            account: first_account.parse().unwrap(),
            name: first_action.parse().unwrap(),
            authorization: vec![],
            data: vec![],
            context_free: false,
            elapsed: 20,
            console: String::new(),
            account_ram_deltas: vec![],
            except: None,
            inline_traces: vec![],
        }],
        except: None,
        failed_dtrx_trace: vec![],
    }
}

// ─── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn cold_start_initializes_progress() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    let mut forks = h.pipeline.bus().subscribe_forks();
    h.pipeline.load_state();

    assert!(h
        .pipeline
        .on_result(&frame(&simple_result(100, 1, None, 90, 9)))
        .unwrap());

    assert_eq!(h.pipeline.head(), 100);
    assert_eq!(h.pipeline.irreversible(), 90);
    assert!(forks.try_recv().is_err(), "no fork event on cold start");

    let store = h.store.lock().unwrap();
    let progress = store.progress().unwrap();
    assert_eq!(progress.head, 100);
    assert_eq!(progress.head_id, id(1));
    assert_eq!(progress.irreversible, 90);
    assert_eq!(store.blocks_in(0, u32::MAX), vec![(100, id(1))]);
}

#[test]
fn linear_advance_accumulates_blocks() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    h.pipeline.load_state();

    h.pipeline
        .on_result(&frame(&simple_result(100, 1, None, 90, 9)))
        .unwrap();
    h.pipeline
        .on_result(&frame(&simple_result(101, 2, Some((100, 1)), 90, 9)))
        .unwrap();

    assert_eq!(h.pipeline.head(), 101);
    let store = h.store.lock().unwrap();
    assert_eq!(
        store.blocks_in(0, u32::MAX),
        vec![(100, id(1)), (101, id(2))]
    );
    assert!(store.committed_revision() >= 90);
}

#[test]
fn network_fork_rewinds_received_blocks() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    let mut forks = h.pipeline.bus().subscribe_forks();
    h.pipeline.load_state();

    h.pipeline
        .on_result(&frame(&simple_result(100, 1, None, 90, 9)))
        .unwrap();
    h.pipeline
        .on_result(&frame(&simple_result(101, 2, Some((100, 1)), 90, 9)))
        .unwrap();
    // same height, different id: the upstream replaced block 101
    h.pipeline
        .on_result(&frame(&simple_result(101, 3, Some((100, 1)), 90, 9)))
        .unwrap();

    let fork = forks.try_recv().unwrap();
    assert_eq!(fork.fork_block_num, 101);
    assert_eq!(fork.depth, 0);
    assert_eq!(fork.reason, ForkReason::Network);

    let store = h.store.lock().unwrap();
    assert_eq!(store.block_id(101), Some(&id(3)));
}

#[test]
fn crossing_irreversibility_truncates_blocks() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    let mut blocks = h.pipeline.bus().subscribe_blocks();
    h.pipeline.load_state();

    h.pipeline
        .on_result(&frame(&simple_result(100, 1, None, 90, 9)))
        .unwrap();

    let mut result = simple_result(200, 5, Some((100, 1)), 200, 5);
    result.block = Some(minimal_block(400_000).to_bytes());
    h.pipeline.on_result(&frame(&result)).unwrap();

    let event = blocks.try_recv().unwrap();
    assert_eq!(event.block_num, 200);
    assert_eq!(event.last_irreversible, 200);

    let store = h.store.lock().unwrap();
    assert_eq!(store.blocks_in(0, u32::MAX), vec![(200, id(5))]);
}

#[test]
fn restart_after_push_without_commit_reports_restart_fork() {
    let dir = TempDir::new().unwrap();
    {
        let mut h = harness(dir.path());
        h.pipeline.load_state();
        h.pipeline
            .on_result(&frame(&simple_result(100, 1, None, 90, 9)))
            .unwrap();
        h.pipeline
            .on_result(&frame(&simple_result(101, 2, Some((100, 1)), 90, 9)))
            .unwrap();
        assert_eq!(h.store.lock().unwrap().pending_sessions(), 2);
    }

    let mut h = harness(dir.path());
    let mut forks = h.pipeline.bus().subscribe_forks();
    h.pipeline.load_state();

    let fork = forks.try_recv().unwrap();
    assert_eq!(fork.reason, ForkReason::Restart);
    assert_eq!(fork.depth, 2);
    // the reported head is the last committed head; nothing was committed
    assert_eq!(fork.fork_block_num, 0);
    assert_eq!(h.pipeline.head(), 0);
}

#[test]
fn ack_mode_bounds_the_commit_watermark() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    h.control.enable_ack_mode(100).unwrap();
    h.pipeline.load_state();

    // head runs ahead; nothing is acknowledged, nothing may commit
    h.pipeline
        .on_result(&frame(&simple_result(100, 1, None, 95, 9)))
        .unwrap();
    for n in 101..=110u32 {
        h.pipeline
            .on_result(&frame(&simple_result(
                n,
                n as u8,
                Some((n - 1, (n - 1) as u8)),
                n - 5,
                (n - 5) as u8,
            )))
            .unwrap();
    }
    {
        let store = h.store.lock().unwrap();
        assert_eq!(store.pending_sessions(), 11);
        assert!(store.progress().is_some()); // live state advanced
    }

    // acknowledge everything seen so far; the next result may commit up to
    // the irreversible watermark
    h.control.ack_block(110).unwrap();
    h.pipeline
        .on_result(&frame(&simple_result(111, 111, Some((110, 110)), 106, 106)))
        .unwrap();

    let store = h.store.lock().unwrap();
    assert!(store.pending_sessions() < 12);
    assert!(store.committed_revision() <= 110);
}

#[test]
fn ack_regression_is_fatal() {
    let dir = TempDir::new().unwrap();
    let h = harness(dir.path());
    h.control.enable_ack_mode(10).unwrap();
    h.control.ack_block(50).unwrap();
    assert!(h.control.ack_block(49).is_err());
    assert!(h.control.ack_block(50).is_ok());
}

#[test]
fn account_delta_installs_and_removes_contract_abi() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    let mut updates = h.pipeline.bus().subscribe_abi_updates();
    let mut removals = h.pipeline.bus().subscribe_abi_removals();
    h.pipeline.load_state();

    let install = TableDelta {
        name: "account".into(),
        rows: vec![account_row("token", contract_bin_abi())],
    };
    let mut result = simple_result(100, 1, None, 90, 9);
    result.deltas = Some(deltas_payload(&[install]));
    h.pipeline.on_result(&frame(&result)).unwrap();

    let update = updates.try_recv().unwrap();
    assert_eq!(update.account, "token".parse::<Name>().unwrap());
    assert_eq!(update.block_num, 100);
    assert_eq!(update.abi.tables.len(), 1);
    assert!(h.pipeline.contract_abi_ready("token".parse().unwrap()));
    assert!(h
        .store
        .lock()
        .unwrap()
        .has_abi("token".parse().unwrap()));

    // an empty ABI clears the row and announces the removal
    let remove = TableDelta {
        name: "account".into(),
        rows: vec![account_row("token", vec![])],
    };
    let mut result = simple_result(101, 2, Some((100, 1)), 90, 9);
    result.deltas = Some(deltas_payload(&[remove]));
    h.pipeline.on_result(&frame(&result)).unwrap();

    let removal = removals.try_recv().unwrap();
    assert_eq!(removal.account, "token".parse::<Name>().unwrap());
    assert_eq!(removal.block_num, 101);
    assert!(!h.store.lock().unwrap().has_abi("token".parse().unwrap()));
    assert!(!h.pipeline.contract_abi_ready("token".parse().unwrap()));
}

#[test]
fn invalid_contract_abi_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    let mut errors = h.pipeline.bus().subscribe_abi_errors();
    h.pipeline.load_state();

    let delta = TableDelta {
        name: "account".into(),
        rows: vec![account_row("broken", vec![0xde, 0xad])],
    };
    let mut result = simple_result(100, 1, None, 90, 9);
    result.deltas = Some(deltas_payload(&[delta]));
    assert!(h.pipeline.on_result(&frame(&result)).unwrap());

    let err = errors.try_recv().unwrap();
    assert_eq!(err.account, "broken".parse::<Name>().unwrap());
    assert!(!h.store.lock().unwrap().has_abi("broken".parse().unwrap()));
}

#[test]
fn contract_rows_publish_updates_or_missing_abi_errors() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    let mut rows = h.pipeline.bus().subscribe_table_row_updates();
    let mut errors = h.pipeline.bus().subscribe_abi_errors();
    h.pipeline.load_state();

    // install an ABI for "token", then stream rows for it and for a
    // contract nobody announced
    let mut row_value = ByteWriter::new();
    row_value.write_name("alice".parse().unwrap());
    row_value.write_u64(500);

    let deltas = vec![
        TableDelta {
            name: "account".into(),
            rows: vec![account_row("token", contract_bin_abi())],
        },
        TableDelta {
            name: "contract_row".into(),
            rows: vec![
                contract_row("token", "holdings", row_value.into_bytes()),
                contract_row("mystery", "things", vec![1, 2, 3]),
            ],
        },
    ];
    let mut result = simple_result(100, 1, None, 90, 9);
    result.deltas = Some(deltas_payload(&deltas));
    h.pipeline.on_result(&frame(&result)).unwrap();

    let update = rows.try_recv().unwrap();
    assert!(update.added);
    assert_eq!(update.row.code, "token".parse::<Name>().unwrap());
    assert_eq!(update.row.table, "holdings".parse::<Name>().unwrap());

    let err = errors.try_recv().unwrap();
    assert_eq!(err.account, "mystery".parse::<Name>().unwrap());
    assert!(err.error.contains("missing ABI"));
}

#[test]
fn blacklisted_traces_are_dropped() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    let mut traces = h.pipeline.bus().subscribe_transaction_traces();
    // extend the default blacklist with a custom entry
    h.pipeline
        .blacklist_mut()
        .entry("spammer".parse().unwrap())
        .or_default()
        .insert("noise".parse().unwrap());
    h.pipeline.load_state();

    let mut result = simple_result(100, 1, None, 90, 9);
    result.traces = Some(traces_payload(&[
        minimal_trace("eosio", "onblock"),
        minimal_trace("spammer", "noise"),
        minimal_trace("someone", "transfer"),
    ]));
    h.pipeline.on_result(&frame(&result)).unwrap();

    let event = traces.try_recv().unwrap();
    assert_eq!(
        event.trace.traces[0].account,
        "someone".parse::<Name>().unwrap()
    );
    assert!(traces.try_recv().is_err(), "blacklisted traces must be filtered");
}

#[test]
fn wrong_result_variant_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    h.pipeline.load_state();

    let mut w = ByteWriter::new();
    w.write_variant_tag(0); // get_status_result_v0
    simple_result(100, 1, None, 90, 9).encode(&mut w);
    assert!(matches!(
        h.pipeline.on_result(&w.into_bytes()),
        Err(ReceiverError::Abi(_))
    ));
}

#[test]
fn link_break_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    h.pipeline.load_state();

    h.pipeline
        .on_result(&frame(&simple_result(100, 1, None, 90, 9)))
        .unwrap();
    // prev_block carries an id that is not our head
    let err = h
        .pipeline
        .on_result(&frame(&simple_result(102, 3, Some((101, 0x77)), 90, 9)))
        .unwrap_err();
    assert!(matches!(err, ReceiverError::LinkBreak { block_num: 102, .. }));
}

#[test]
fn fork_past_undo_horizon_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    h.pipeline.load_state();

    h.pipeline
        .on_result(&frame(&simple_result(100, 1, None, 90, 9)))
        .unwrap();
    // a replacement for block 100 itself: deeper than the undo stack
    let err = h
        .pipeline
        .on_result(&frame(&simple_result(100, 2, None, 90, 9)))
        .unwrap_err();
    assert!(matches!(err, ReceiverError::Store(_)));
}

#[test]
fn result_without_this_block_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    h.pipeline.load_state();

    let mut result = simple_result(100, 1, None, 90, 9);
    result.this_block = None;
    assert!(h.pipeline.on_result(&frame(&result)).unwrap());
    assert_eq!(h.pipeline.head(), 0);
    assert!(h.store.lock().unwrap().progress().is_none());
}

#[test]
fn abort_drops_the_in_flight_session() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    h.pipeline.load_state();

    h.pipeline
        .on_result(&frame(&simple_result(100, 1, None, 90, 9)))
        .unwrap();
    h.control.request_abort();
    let proceed = h
        .pipeline
        .on_result(&frame(&simple_result(101, 2, Some((100, 1)), 90, 9)))
        .unwrap();
    assert!(!proceed, "reading must stop after abort");

    // the aborted block left no session behind
    let store = h.store.lock().unwrap();
    assert_eq!(store.pending_sessions(), 1);
    assert!(store.block_id(101).is_none());
}

#[test]
fn request_envelope_reflects_store_positions() {
    use chainfeed_abi::{AbiDef, TypeTable, Value};
    use chainfeed_wire::ByteReader;

    let dir = TempDir::new().unwrap();
    let mut h = harness(dir.path());
    h.pipeline.load_state();
    h.pipeline
        .on_result(&frame(&simple_result(100, 1, None, 90, 9)))
        .unwrap();
    h.pipeline
        .on_result(&frame(&simple_result(101, 2, Some((100, 1)), 90, 9)))
        .unwrap();

    let request = h.pipeline.build_request().unwrap();
    let table =
        TypeTable::from_def(&AbiDef::from_json(TEST_ABI.as_bytes()).unwrap()).unwrap();
    let decoded = table
        .decode("request", &mut ByteReader::new(&request))
        .unwrap();
    let Value::Variant(name, body) = decoded else {
        panic!("expected request variant");
    };
    assert_eq!(name, "get_blocks_request_v0");
    assert_eq!(body.get("start_block_num"), Some(&Value::Uint(102)));
    assert_eq!(body.get("end_block_num"), Some(&Value::Uint(u32::MAX)));
    assert_eq!(body.get("irreversible_only"), Some(&Value::Bool(false)));
    let Some(Value::Array(positions)) = body.get("have_positions") else {
        panic!("expected positions");
    };
    // every received block in (irreversible, head]
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].get("block_num"), Some(&Value::Uint(100)));
    assert_eq!(positions[1].get("block_num"), Some(&Value::Uint(101)));
}
