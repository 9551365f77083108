//! Native decoders for the state-history protocol envelopes.
//!
//! These are the fixed, version-tagged structures of the stream itself;
//! contract-defined payloads inside them (action data, table row values)
//! stay opaque bytes until a subscriber decodes them against a contract
//! ABI. Trace structures are trees: action traces contain inline action
//! traces, transaction traces contain failed deferred traces.
//!
//! Several structs are spelled `*_v0` variants on the wire; their decoders
//! consume the leading zero tag and reject anything else.

use chainfeed_wire::{
    BlockTimestamp, ByteReader, ByteWriter, Checksum256, Decode, Encode, Name, PublicKey,
    Signature, TimePoint, WireError,
};
use serde::Serialize;

fn hex_bytes<S: serde::Serializer>(b: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(b))
}

/// Consume a variant tag that must select alternative zero.
fn expect_zero_tag(r: &mut ByteReader<'_>, what: &'static str) -> Result<(), WireError> {
    let offset = r.position();
    let value = r.read_varuint32()?;
    if value != 0 {
        return Err(WireError::UnknownDiscriminant { what, value, offset });
    }
    Ok(())
}

// ─── Block positions and results ──────────────────────────────────────────────

/// A `(block_num, block_id)` point on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockPosition {
    pub block_num: u32,
    pub block_id: Checksum256,
}

impl Decode for BlockPosition {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            block_num: r.read_u32()?,
            block_id: r.read_checksum256()?,
        })
    }
}

impl Encode for BlockPosition {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_u32(self.block_num);
        w.write_checksum256(&self.block_id);
    }
}

/// One inbound result frame (the payload of `get_blocks_result_v0`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetBlocksResult {
    pub head: BlockPosition,
    pub last_irreversible: BlockPosition,
    pub this_block: Option<BlockPosition>,
    pub prev_block: Option<BlockPosition>,
    #[serde(skip)]
    pub block: Option<Vec<u8>>,
    #[serde(skip)]
    pub traces: Option<Vec<u8>>,
    #[serde(skip)]
    pub deltas: Option<Vec<u8>>,
}

impl Default for BlockPosition {
    fn default() -> Self {
        Self {
            block_num: 0,
            block_id: Checksum256::default(),
        }
    }
}

impl Decode for GetBlocksResult {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            head: BlockPosition::decode(r)?,
            last_irreversible: BlockPosition::decode(r)?,
            this_block: Option::<BlockPosition>::decode(r)?,
            prev_block: Option::<BlockPosition>::decode(r)?,
            block: r.read_optional(|r| Ok(r.read_bytes()?.to_vec()))?,
            traces: r.read_optional(|r| Ok(r.read_bytes()?.to_vec()))?,
            deltas: r.read_optional(|r| Ok(r.read_bytes()?.to_vec()))?,
        })
    }
}

impl Encode for GetBlocksResult {
    fn encode(&self, w: &mut ByteWriter) {
        self.head.encode(w);
        self.last_irreversible.encode(w);
        self.this_block.encode(w);
        self.prev_block.encode(w);
        for payload in [&self.block, &self.traces, &self.deltas] {
            w.write_optional(payload.as_ref(), |w, b| w.write_bytes(b));
        }
    }
}

// ─── Table deltas ─────────────────────────────────────────────────────────────

/// One row of a table delta; `present == false` is a deletion.
#[derive(Debug, Clone, Serialize)]
pub struct TableDeltaRow {
    pub present: bool,
    #[serde(serialize_with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl Decode for TableDeltaRow {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            present: r.read_bool()?,
            data: r.read_bytes()?.to_vec(),
        })
    }
}

impl Encode for TableDeltaRow {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_bool(self.present);
        w.write_bytes(&self.data);
    }
}

/// The payload of `table_delta_v0`.
#[derive(Debug, Clone, Serialize)]
pub struct TableDelta {
    pub name: String,
    pub rows: Vec<TableDeltaRow>,
}

impl Decode for TableDelta {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            name: r.read_string()?,
            rows: Vec::decode(r)?,
        })
    }
}

impl Encode for TableDelta {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_string(&self.name);
        self.rows.encode(w);
    }
}

/// The `account` state table row: carries contract code and ABI updates.
#[derive(Debug, Clone, Serialize)]
pub struct AccountDelta {
    pub name: Name,
    pub vm_type: u8,
    pub vm_version: u8,
    pub privileged: bool,
    pub last_code_update: TimePoint,
    pub code_version: Checksum256,
    pub creation_date: BlockTimestamp,
    #[serde(serialize_with = "hex_bytes")]
    pub code: Vec<u8>,
    #[serde(serialize_with = "hex_bytes")]
    pub abi: Vec<u8>,
}

impl Decode for AccountDelta {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            name: r.read_name()?,
            vm_type: r.read_u8()?,
            vm_version: r.read_u8()?,
            privileged: r.read_bool()?,
            last_code_update: r.read_time_point()?,
            code_version: r.read_checksum256()?,
            creation_date: r.read_block_timestamp()?,
            code: r.read_bytes()?.to_vec(),
            abi: r.read_bytes()?.to_vec(),
        })
    }
}

impl Encode for AccountDelta {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_name(self.name);
        w.write_u8(self.vm_type);
        w.write_u8(self.vm_version);
        w.write_bool(self.privileged);
        w.write_time_point(self.last_code_update);
        w.write_checksum256(&self.code_version);
        w.write_block_timestamp(self.creation_date);
        w.write_bytes(&self.code);
        w.write_bytes(&self.abi);
    }
}

/// The `contract_row` state table row: a raw key/value table entry.
#[derive(Debug, Clone, Serialize)]
pub struct KeyValueRow {
    pub code: Name,
    pub scope: Name,
    pub table: Name,
    pub primary_key: u64,
    pub payer: Name,
    #[serde(serialize_with = "hex_bytes")]
    pub value: Vec<u8>,
}

impl Decode for KeyValueRow {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            code: r.read_name()?,
            scope: r.read_name()?,
            table: r.read_name()?,
            primary_key: r.read_u64()?,
            payer: r.read_name()?,
            value: r.read_bytes()?.to_vec(),
        })
    }
}

impl Encode for KeyValueRow {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_name(self.code);
        w.write_name(self.scope);
        w.write_name(self.table);
        w.write_u64(self.primary_key);
        w.write_name(self.payer);
        w.write_bytes(&self.value);
    }
}

// ─── Transaction traces ───────────────────────────────────────────────────────

/// Outcome of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Succeeded, no error handler executed.
    Executed,
    /// Objectively failed, error handler executed.
    SoftFail,
    /// Objectively failed and error handler objectively failed.
    HardFail,
    /// Scheduled for future execution.
    Delayed,
    /// Expired, storage refunded.
    Expired,
}

impl Decode for TransactionStatus {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let offset = r.position();
        Ok(match r.read_u8()? {
            0 => Self::Executed,
            1 => Self::SoftFail,
            2 => Self::HardFail,
            3 => Self::Delayed,
            4 => Self::Expired,
            value => {
                return Err(WireError::UnknownDiscriminant {
                    what: "transaction_status",
                    value: value as u32,
                    offset,
                })
            }
        })
    }
}

impl Encode for TransactionStatus {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_u8(match self {
            Self::Executed => 0,
            Self::SoftFail => 1,
            Self::HardFail => 2,
            Self::Delayed => 3,
            Self::Expired => 4,
        });
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccountAuthSequence {
    pub account: Name,
    pub sequence: u64,
}

impl Decode for AccountAuthSequence {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            account: r.read_name()?,
            sequence: r.read_u64()?,
        })
    }
}

impl Encode for AccountAuthSequence {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_name(self.account);
        w.write_u64(self.sequence);
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

impl Decode for PermissionLevel {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            actor: r.read_name()?,
            permission: r.read_name()?,
        })
    }
}

impl Encode for PermissionLevel {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_name(self.actor);
        w.write_name(self.permission);
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccountRamDelta {
    pub account: Name,
    pub delta: i64,
}

impl Decode for AccountRamDelta {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            account: r.read_name()?,
            delta: r.read_i64()?,
        })
    }
}

impl Encode for AccountRamDelta {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_name(self.account);
        w.write_i64(self.delta);
    }
}

/// `action_receipt_v0` — variant-tagged on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReceipt {
    pub receiver: Name,
    pub act_digest: Checksum256,
    pub global_sequence: u64,
    pub recv_sequence: u64,
    pub auth_sequence: Vec<AccountAuthSequence>,
    pub code_sequence: u32,
    pub abi_sequence: u32,
}

impl Decode for ActionReceipt {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        expect_zero_tag(r, "action_receipt")?;
        Ok(Self {
            receiver: r.read_name()?,
            act_digest: r.read_checksum256()?,
            global_sequence: r.read_u64()?,
            recv_sequence: r.read_u64()?,
            auth_sequence: Vec::decode(r)?,
            code_sequence: r.read_varuint32()?,
            abi_sequence: r.read_varuint32()?,
        })
    }
}

impl Encode for ActionReceipt {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_variant_tag(0);
        w.write_name(self.receiver);
        w.write_checksum256(&self.act_digest);
        w.write_u64(self.global_sequence);
        w.write_u64(self.recv_sequence);
        self.auth_sequence.encode(w);
        w.write_varuint32(self.code_sequence);
        w.write_varuint32(self.abi_sequence);
    }
}

/// `action_trace_v0` — variant-tagged; inline traces recurse.
#[derive(Debug, Clone, Serialize)]
pub struct ActionTrace {
    pub receipt: ActionReceipt,
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    #[serde(serialize_with = "hex_bytes")]
    pub data: Vec<u8>,
    pub context_free: bool,
    pub elapsed: i64,
    pub console: String,
    pub account_ram_deltas: Vec<AccountRamDelta>,
    pub except: Option<String>,
    pub inline_traces: Vec<ActionTrace>,
}

impl Decode for ActionTrace {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        expect_zero_tag(r, "action_trace")?;
        Ok(Self {
            receipt: ActionReceipt::decode(r)?,
            account: r.read_name()?,
            name: r.read_name()?,
            authorization: Vec::decode(r)?,
            data: r.read_bytes()?.to_vec(),
            context_free: r.read_bool()?,
            elapsed: r.read_i64()?,
            console: r.read_string()?,
            account_ram_deltas: Vec::decode(r)?,
            except: Option::decode(r)?,
            inline_traces: Vec::decode(r)?,
        })
    }
}

impl Encode for ActionTrace {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_variant_tag(0);
        self.receipt.encode(w);
        w.write_name(self.account);
        w.write_name(self.name);
        self.authorization.encode(w);
        w.write_bytes(&self.data);
        w.write_bool(self.context_free);
        w.write_i64(self.elapsed);
        w.write_string(&self.console);
        self.account_ram_deltas.encode(w);
        self.except.encode(w);
        self.inline_traces.encode(w);
    }
}

/// `transaction_trace_v0` — variant-tagged; failed deferred traces recurse.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionTrace {
    pub id: Checksum256,
    pub status: TransactionStatus,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
    pub elapsed: i64,
    pub net_usage: u64,
    pub scheduled: bool,
    pub traces: Vec<ActionTrace>,
    pub except: Option<String>,
    pub failed_dtrx_trace: Vec<TransactionTrace>,
}

impl Decode for TransactionTrace {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        expect_zero_tag(r, "transaction_trace")?;
        Ok(Self {
            id: r.read_checksum256()?,
            status: TransactionStatus::decode(r)?,
            cpu_usage_us: r.read_u32()?,
            net_usage_words: r.read_varuint32()?,
            elapsed: r.read_i64()?,
            net_usage: r.read_u64()?,
            scheduled: r.read_bool()?,
            traces: Vec::decode(r)?,
            except: Option::decode(r)?,
            failed_dtrx_trace: Vec::decode(r)?,
        })
    }
}

impl Encode for TransactionTrace {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_variant_tag(0);
        w.write_checksum256(&self.id);
        self.status.encode(w);
        w.write_u32(self.cpu_usage_us);
        w.write_varuint32(self.net_usage_words);
        w.write_i64(self.elapsed);
        w.write_u64(self.net_usage);
        w.write_bool(self.scheduled);
        self.traces.encode(w);
        self.except.encode(w);
        self.failed_dtrx_trace.encode(w);
    }
}

// ─── Signed blocks ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Extension {
    #[serde(rename = "type")]
    pub kind: u16,
    #[serde(serialize_with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl Decode for Extension {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            kind: r.read_u16()?,
            data: r.read_bytes()?.to_vec(),
        })
    }
}

impl Encode for Extension {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_u16(self.kind);
        w.write_bytes(&self.data);
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProducerKey {
    pub producer_name: Name,
    pub block_signing_key: PublicKey,
}

impl Decode for ProducerKey {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            producer_name: r.read_name()?,
            block_signing_key: r.read_public_key()?,
        })
    }
}

impl Encode for ProducerKey {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_name(self.producer_name);
        w.write_public_key(&self.block_signing_key);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProducerSchedule {
    pub version: u32,
    pub producers: Vec<ProducerKey>,
}

impl Decode for ProducerSchedule {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            version: r.read_u32()?,
            producers: Vec::decode(r)?,
        })
    }
}

impl Encode for ProducerSchedule {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_u32(self.version);
        self.producers.encode(w);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackedTransaction {
    pub signatures: Vec<Signature>,
    pub compression: u8,
    #[serde(serialize_with = "hex_bytes")]
    pub packed_context_free_data: Vec<u8>,
    #[serde(serialize_with = "hex_bytes")]
    pub packed_trx: Vec<u8>,
}

impl Decode for PackedTransaction {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            signatures: Vec::decode(r)?,
            compression: r.read_u8()?,
            packed_context_free_data: r.read_bytes()?.to_vec(),
            packed_trx: r.read_bytes()?.to_vec(),
        })
    }
}

impl Encode for PackedTransaction {
    fn encode(&self, w: &mut ByteWriter) {
        self.signatures.encode(w);
        w.write_u8(self.compression);
        w.write_bytes(&self.packed_context_free_data);
        w.write_bytes(&self.packed_trx);
    }
}

/// A receipt's transaction: either just its id or the packed body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionVariant {
    TransactionId(Checksum256),
    PackedTransaction(PackedTransaction),
}

impl Decode for TransactionVariant {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let offset = r.position();
        match r.read_varuint32()? {
            0 => Ok(Self::TransactionId(r.read_checksum256()?)),
            1 => Ok(Self::PackedTransaction(PackedTransaction::decode(r)?)),
            value => Err(WireError::UnknownDiscriminant {
                what: "transaction_variant",
                value,
                offset,
            }),
        }
    }
}

impl Encode for TransactionVariant {
    fn encode(&self, w: &mut ByteWriter) {
        match self {
            Self::TransactionId(id) => {
                w.write_variant_tag(0);
                w.write_checksum256(id);
            }
            Self::PackedTransaction(p) => {
                w.write_variant_tag(1);
                p.encode(w);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionReceipt {
    pub status: u8,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
    pub trx: TransactionVariant,
}

impl Decode for TransactionReceipt {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            status: r.read_u8()?,
            cpu_usage_us: r.read_u32()?,
            net_usage_words: r.read_varuint32()?,
            trx: TransactionVariant::decode(r)?,
        })
    }
}

impl Encode for TransactionReceipt {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_u8(self.status);
        w.write_u32(self.cpu_usage_us);
        w.write_varuint32(self.net_usage_words);
        self.trx.encode(w);
    }
}

/// A full signed block as carried in the `block` payload.
#[derive(Debug, Clone, Serialize)]
pub struct SignedBlock {
    pub timestamp: BlockTimestamp,
    pub producer: Name,
    pub confirmed: u16,
    pub previous: Checksum256,
    pub transaction_mroot: Checksum256,
    pub action_mroot: Checksum256,
    pub schedule_version: u32,
    pub new_producers: Option<ProducerSchedule>,
    pub header_extensions: Vec<Extension>,
    pub producer_signature: Signature,
    pub transactions: Vec<TransactionReceipt>,
    pub block_extensions: Vec<Extension>,
}

impl Decode for SignedBlock {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            timestamp: r.read_block_timestamp()?,
            producer: r.read_name()?,
            confirmed: r.read_u16()?,
            previous: r.read_checksum256()?,
            transaction_mroot: r.read_checksum256()?,
            action_mroot: r.read_checksum256()?,
            schedule_version: r.read_u32()?,
            new_producers: Option::decode(r)?,
            header_extensions: Vec::decode(r)?,
            producer_signature: r.read_signature()?,
            transactions: Vec::decode(r)?,
            block_extensions: Vec::decode(r)?,
        })
    }
}

impl Encode for SignedBlock {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_block_timestamp(self.timestamp);
        w.write_name(self.producer);
        w.write_u16(self.confirmed);
        w.write_checksum256(&self.previous);
        w.write_checksum256(&self.transaction_mroot);
        w.write_checksum256(&self.action_mroot);
        w.write_u32(self.schedule_version);
        self.new_producers.encode(w);
        self.header_extensions.encode(w);
        w.write_signature(&self.producer_signature);
        self.transactions.encode(w);
        self.block_extensions.encode(w);
    }
}
