//! Normalized records handed to the storage collaborator.

use serde_json::Value as JsonValue;

/// Sentinel sequence stored for transactions confirmed in an anchor block
pub const ANCHORED_MICROBLOCK_SEQUENCE: i64 = i32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i16)]
pub enum DbTxStatus {
    Pending = 0,
    Success = 1,
    AbortByResponse = -1,
    AbortByPostCondition = -2,
    DroppedReplaceByFee = -10,
    DroppedReplaceAcrossFork = -11,
    DroppedTooExpensive = -12,
    DroppedStaleGarbageCollect = -13,
    DroppedProblematic = -15,
}

impl DbTxStatus {
    pub fn as_i16(&self) -> i16 {
        *self as i16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DbTxAnchorMode {
    OnChainOnly = 1,
    OffChainOnly = 2,
    Any = 3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DbTxPayload {
    TokenTransfer {
        recipient: String,
        amount: u64,
        memo: String,
    },
    SmartContract {
        contract_id: String,
        source_code: String,
        clarity_version: Option<u8>,
    },
    ContractCall {
        contract_id: String,
        function_name: String,
        /// Hex encoded clarity values
        function_args: Vec<String>,
    },
    PoisonMicroblock {
        microblock_header_1: String,
        microblock_header_2: String,
    },
    Coinbase {
        payload: String,
        alt_recipient: Option<String>,
        vrf_proof: Option<String>,
    },
    TenureChange {
        tenure_consensus_hash: String,
        prev_tenure_consensus_hash: String,
        burn_view_consensus_hash: String,
        previous_tenure_end: String,
        previous_tenure_blocks: u32,
        cause: u8,
        pubkey_hash: String,
    },
    /// Bitcoin-originated operation (transfer, lock, delegate) surfaced as a
    /// zero-length stacks transaction
    BurnchainOp { op: Option<JsonValue> },
}

impl DbTxPayload {
    /// Payload kind, as used in block ingestion counts
    pub fn kind(&self) -> &'static str {
        match self {
            DbTxPayload::TokenTransfer { .. } => "token_transfer",
            DbTxPayload::SmartContract {
                clarity_version: None,
                ..
            } => "smart_contract",
            DbTxPayload::SmartContract { .. } => "versioned_smart_contract",
            DbTxPayload::ContractCall { .. } => "contract_call",
            DbTxPayload::PoisonMicroblock { .. } => "poison_microblock",
            DbTxPayload::Coinbase {
                vrf_proof: Some(_),
                ..
            } => "nakamoto_coinbase",
            DbTxPayload::Coinbase {
                alt_recipient: Some(_),
                ..
            } => "coinbase_to_alt_recipient",
            DbTxPayload::Coinbase { .. } => "coinbase",
            DbTxPayload::TenureChange { .. } => "tenure_change",
            DbTxPayload::BurnchainOp { .. } => "burnchain_op",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbTx {
    pub tx_id: String,
    pub tx_index: u32,
    pub raw_tx: String,
    pub index_block_hash: String,
    pub parent_index_block_hash: String,
    pub block_hash: String,
    pub parent_block_hash: String,
    pub block_height: i64,
    pub block_time: i64,
    pub burn_block_height: i64,
    pub burn_block_time: i64,
    pub parent_burn_block_time: i64,
    pub status: DbTxStatus,
    pub raw_result: String,
    pub canonical: bool,
    pub microblock_canonical: bool,
    pub microblock_sequence: i64,
    pub microblock_hash: String,
    pub parent_microblock_hash: String,
    pub sender_address: String,
    pub sponsor_address: Option<String>,
    pub sponsored: bool,
    pub nonce: u64,
    pub fee_rate: u64,
    pub anchor_mode: DbTxAnchorMode,
    pub payload: DbTxPayload,
    pub event_count: u32,
    pub execution_cost_read_count: u64,
    pub execution_cost_read_length: u64,
    pub execution_cost_runtime: u64,
    pub execution_cost_write_count: u64,
    pub execution_cost_write_length: u64,
    pub vm_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbMempoolTx {
    pub tx_id: String,
    pub raw_tx: String,
    pub receipt_time: i64,
    pub status: DbTxStatus,
    pub sender_address: String,
    pub sponsor_address: Option<String>,
    pub sponsored: bool,
    pub nonce: u64,
    pub fee_rate: u64,
    pub anchor_mode: DbTxAnchorMode,
    pub payload: DbTxPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbEventBase {
    pub event_index: u32,
    pub tx_id: String,
    pub tx_index: u32,
    pub block_height: i64,
    pub canonical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DbAssetEventType {
    Transfer = 1,
    Mint = 2,
    Burn = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbSmartContractEvent {
    #[serde(flatten)]
    pub base: DbEventBase,
    pub contract_identifier: String,
    pub topic: String,
    /// Hex encoded clarity value
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbStxEvent {
    #[serde(flatten)]
    pub base: DbEventBase,
    pub asset_event_type: DbAssetEventType,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: u128,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbStxLockEvent {
    #[serde(flatten)]
    pub base: DbEventBase,
    pub locked_amount: u128,
    pub unlock_height: u64,
    pub locked_address: String,
    pub contract_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbFtEvent {
    #[serde(flatten)]
    pub base: DbEventBase,
    pub asset_event_type: DbAssetEventType,
    pub asset_identifier: String,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbNftEvent {
    #[serde(flatten)]
    pub base: DbEventBase,
    pub asset_event_type: DbAssetEventType,
    pub asset_identifier: String,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    /// Hex encoded clarity value identifying the token
    pub value: String,
}

/// Action specific payload of a stacking protocol print event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "name", content = "data", rename_all = "kebab-case")]
pub enum PoxEventData {
    HandleUnlock {
        first_cycle_locked: u128,
        first_unlocked_cycle: u128,
    },
    StackStx {
        lock_amount: u128,
        lock_period: u128,
        start_burn_height: u128,
        unlock_burn_height: u128,
        signer_key: Option<String>,
    },
    StackIncrease {
        increase_by: u128,
        total_locked: u128,
        signer_key: Option<String>,
    },
    StackExtend {
        extend_count: u128,
        unlock_burn_height: u128,
        signer_key: Option<String>,
    },
    DelegateStx {
        amount_ustx: u128,
        delegate_to: String,
        unlock_burn_height: Option<u128>,
    },
    DelegateStackStx {
        lock_amount: u128,
        unlock_burn_height: u128,
        start_burn_height: u128,
        lock_period: u128,
        delegator: String,
    },
    DelegateStackIncrease {
        increase_by: u128,
        total_locked: u128,
        delegator: String,
    },
    DelegateStackExtend {
        unlock_burn_height: u128,
        extend_count: u128,
        delegator: String,
    },
    StackAggregationCommit {
        reward_cycle: u128,
        amount_ustx: u128,
        signer_key: Option<String>,
    },
    StackAggregationCommitIndexed {
        reward_cycle: u128,
        amount_ustx: u128,
        signer_key: Option<String>,
    },
    StackAggregationIncrease {
        reward_cycle: u128,
        amount_ustx: u128,
        reward_cycle_index: Option<u128>,
    },
    RevokeDelegateStx {
        delegate_to: String,
    },
}

impl PoxEventData {
    pub fn name(&self) -> &'static str {
        match self {
            PoxEventData::HandleUnlock { .. } => "handle-unlock",
            PoxEventData::StackStx { .. } => "stack-stx",
            PoxEventData::StackIncrease { .. } => "stack-increase",
            PoxEventData::StackExtend { .. } => "stack-extend",
            PoxEventData::DelegateStx { .. } => "delegate-stx",
            PoxEventData::DelegateStackStx { .. } => "delegate-stack-stx",
            PoxEventData::DelegateStackIncrease { .. } => "delegate-stack-increase",
            PoxEventData::DelegateStackExtend { .. } => "delegate-stack-extend",
            PoxEventData::StackAggregationCommit { .. } => "stack-aggregation-commit",
            PoxEventData::StackAggregationCommitIndexed { .. } => {
                "stack-aggregation-commit-indexed"
            }
            PoxEventData::StackAggregationIncrease { .. } => "stack-aggregation-increase",
            PoxEventData::RevokeDelegateStx { .. } => "revoke-delegate-stx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbPoxSyntheticEvent {
    #[serde(flatten)]
    pub base: DbEventBase,
    pub stacker: String,
    pub locked: u128,
    pub balance: u128,
    pub burnchain_unlock_height: u128,
    /// Bitcoin address derived from `pox_addr_raw`, when convertible
    pub pox_addr: Option<String>,
    pub pox_addr_raw: Option<String>,
    pub end_cycle_id: Option<u128>,
    pub start_cycle_id: Option<u128>,
    #[serde(flatten)]
    pub data: PoxEventData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbSmartContract {
    pub tx_id: String,
    pub canonical: bool,
    pub contract_id: String,
    pub block_height: i64,
    pub clarity_version: Option<u8>,
    pub source_code: String,
    pub abi: Option<String>,
}

/// Every normalized record attached to one transaction of a notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataStoreTxEventData {
    pub tx: DbTx,
    pub stx_events: Vec<DbStxEvent>,
    pub stx_lock_events: Vec<DbStxLockEvent>,
    pub ft_events: Vec<DbFtEvent>,
    pub nft_events: Vec<DbNftEvent>,
    pub contract_logs: Vec<DbSmartContractEvent>,
    pub smart_contracts: Vec<DbSmartContract>,
    pub pox2_events: Vec<DbPoxSyntheticEvent>,
    pub pox3_events: Vec<DbPoxSyntheticEvent>,
    pub pox4_events: Vec<DbPoxSyntheticEvent>,
    pub names: Vec<DbBnsName>,
    pub namespaces: Vec<DbBnsNamespace>,
}

impl DataStoreTxEventData {
    pub fn new(tx: DbTx) -> DataStoreTxEventData {
        DataStoreTxEventData {
            tx,
            stx_events: vec![],
            stx_lock_events: vec![],
            ft_events: vec![],
            nft_events: vec![],
            contract_logs: vec![],
            smart_contracts: vec![],
            pox2_events: vec![],
            pox3_events: vec![],
            pox4_events: vec![],
            names: vec![],
            namespaces: vec![],
        }
    }

    /// Indices of every kept event, in storage order of the categories
    pub fn event_indexes(&self) -> Vec<u32> {
        let mut indexes = vec![];
        indexes.extend(self.contract_logs.iter().map(|e| e.base.event_index));
        indexes.extend(self.ft_events.iter().map(|e| e.base.event_index));
        indexes.extend(self.nft_events.iter().map(|e| e.base.event_index));
        indexes.extend(self.stx_events.iter().map(|e| e.base.event_index));
        indexes.extend(self.stx_lock_events.iter().map(|e| e.base.event_index));
        indexes.extend(self.pox2_events.iter().map(|e| e.base.event_index));
        indexes.extend(self.pox3_events.iter().map(|e| e.base.event_index));
        indexes.extend(self.pox4_events.iter().map(|e| e.base.event_index));
        indexes
    }

    /// Same order as `event_indexes`
    pub fn event_bases_mut(&mut self) -> Vec<&mut DbEventBase> {
        let mut bases: Vec<&mut DbEventBase> = vec![];
        bases.extend(self.contract_logs.iter_mut().map(|e| &mut e.base));
        bases.extend(self.ft_events.iter_mut().map(|e| &mut e.base));
        bases.extend(self.nft_events.iter_mut().map(|e| &mut e.base));
        bases.extend(self.stx_events.iter_mut().map(|e| &mut e.base));
        bases.extend(self.stx_lock_events.iter_mut().map(|e| &mut e.base));
        bases.extend(self.pox2_events.iter_mut().map(|e| &mut e.base));
        bases.extend(self.pox3_events.iter_mut().map(|e| &mut e.base));
        bases.extend(self.pox4_events.iter_mut().map(|e| &mut e.base));
        bases
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbBlock {
    pub canonical: bool,
    pub block_hash: String,
    pub index_block_hash: String,
    pub parent_index_block_hash: String,
    pub parent_block_hash: String,
    pub parent_microblock_hash: String,
    pub parent_microblock_sequence: u32,
    pub block_height: u64,
    pub block_time: i64,
    pub burn_block_time: i64,
    pub burn_block_hash: String,
    pub burn_block_height: u64,
    pub miner_txid: String,
    pub execution_cost_read_count: u64,
    pub execution_cost_read_length: u64,
    pub execution_cost_runtime: u64,
    pub execution_cost_write_count: u64,
    pub execution_cost_write_length: u64,
    pub tx_count: u32,
    /// One `'0'`/`'1'` per signer, Nakamoto blocks only
    pub signer_bitvec: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbMicroblock {
    pub canonical: bool,
    pub microblock_canonical: bool,
    pub microblock_hash: String,
    pub microblock_sequence: u32,
    pub microblock_parent_hash: String,
    pub parent_index_block_hash: String,
    pub block_height: i64,
    pub parent_block_height: i64,
    pub parent_block_hash: String,
    pub index_block_hash: String,
    pub block_hash: String,
    pub parent_burn_block_height: u64,
    pub parent_burn_block_hash: String,
    pub parent_burn_block_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbMinerReward {
    pub canonical: bool,
    pub block_hash: String,
    pub index_block_hash: String,
    pub from_index_block_hash: String,
    pub mature_block_height: u64,
    pub recipient: String,
    pub miner_address: String,
    pub coinbase_amount: u128,
    pub tx_fees_anchored: u128,
    pub tx_fees_streamed_confirmed: u128,
    pub tx_fees_streamed_produced: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbPoxSetSigner {
    pub signing_key: String,
    pub weight: u32,
    pub stacked_amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbPoxSetSigners {
    pub cycle_number: u64,
    pub pox_ustx_threshold: u128,
    pub signers: Vec<DbPoxSetSigner>,
    pub rewarded_addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataStoreBlockUpdateData {
    pub block: DbBlock,
    pub microblocks: Vec<DbMicroblock>,
    pub miner_rewards: Vec<DbMinerReward>,
    pub txs: Vec<DataStoreTxEventData>,
    pub pox_v1_unlock_height: Option<u64>,
    pub pox_v2_unlock_height: Option<u64>,
    pub pox_v3_unlock_height: Option<u64>,
    pub pox_set_signers: Option<DbPoxSetSigners>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataStoreMicroblockUpdateData {
    pub microblocks: Vec<DbMicroblock>,
    pub txs: Vec<DataStoreTxEventData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbBurnchainReward {
    pub canonical: bool,
    pub burn_block_hash: String,
    pub burn_block_height: u64,
    pub burn_amount: u128,
    pub reward_recipient: String,
    pub reward_amount: u128,
    pub reward_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbRewardSlotHolder {
    pub canonical: bool,
    pub burn_block_hash: String,
    pub burn_block_height: u64,
    pub address: String,
    pub slot_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataStoreAttachmentData {
    pub op: String,
    pub name: String,
    pub namespace: String,
    /// Hex encoded zone file, without `0x`
    pub zonefile: String,
    pub zonefile_hash: String,
    pub tx_id: String,
    pub index_block_hash: String,
    pub block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbBnsZoneFile {
    pub zonefile: String,
    pub zonefile_hash: String,
    pub tx_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbBnsSubdomain {
    pub name: String,
    pub namespace_id: String,
    pub fully_qualified_subdomain: String,
    pub owner: String,
    pub zonefile_hash: String,
    pub zonefile: String,
    pub tx_id: String,
    pub tx_index: i32,
    pub canonical: bool,
    pub parent_zonefile_hash: String,
    pub parent_zonefile_index: u32,
    pub block_height: u64,
    pub zonefile_offset: u32,
    pub resolver: String,
    pub index_block_hash: String,
}

/// Name registered, imported, updated, transferred, renewed or revoked
/// through the BNS contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbBnsName {
    /// `<name>.<namespace>`
    pub name: String,
    pub namespace_id: String,
    /// Owner after the operation
    pub address: String,
    pub registered_at: i64,
    pub expire_block: u64,
    /// `0x` prefixed, empty for renewals that keep the zone file
    pub zonefile_hash: String,
    /// Filled later by the matching attachment
    pub zonefile: String,
    pub tx_id: String,
    pub tx_index: u32,
    /// Index of the print event, `None` when read from the contract call
    pub event_index: Option<u32>,
    /// BNS operation, e.g. `name-register`
    pub status: String,
    pub canonical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbBnsNamespace {
    pub namespace_id: String,
    pub address: String,
    pub launched_at: Option<u64>,
    pub reveal_block: u64,
    pub ready_block: i64,
    /// Price buckets joined with `;`
    pub buckets: String,
    pub base: u128,
    pub coeff: u128,
    pub nonalpha_discount: u128,
    pub no_vowel_discount: u128,
    pub lifetime: u128,
    pub status: String,
    pub tx_id: String,
    pub tx_index: u32,
    pub canonical: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataStoreAttachmentBatch {
    pub attachments: Vec<DataStoreAttachmentData>,
    pub zonefiles: Vec<DbBnsZoneFile>,
    pub subdomains: Vec<DbBnsSubdomain>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DbChainTip {
    pub block_height: u64,
    pub block_hash: String,
    pub index_block_hash: String,
    pub burn_block_height: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoxForceUnlockHeights {
    pub pox_v1_unlock_height: Option<u64>,
    pub pox_v2_unlock_height: Option<u64>,
    pub pox_v3_unlock_height: Option<u64>,
}

impl PoxForceUnlockHeights {
    /// `(pox version, height)` for each height the block reports differently
    pub fn changed_by(&self, update: &DataStoreBlockUpdateData) -> Vec<(u8, u64)> {
        vec![
            (1, self.pox_v1_unlock_height, update.pox_v1_unlock_height),
            (2, self.pox_v2_unlock_height, update.pox_v2_unlock_height),
            (3, self.pox_v3_unlock_height, update.pox_v3_unlock_height),
        ]
        .into_iter()
        .filter_map(|(version, stored, reported)| match reported {
            Some(height) if stored != Some(height) => Some((version, height)),
            _ => None,
        })
        .collect()
    }
}
