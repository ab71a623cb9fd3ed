//! Payloads POSTed by the stacks-node event dispatcher.
//!
//! Amounts travel as base-10 strings and are widened to `u128` by the
//! indexer; raw transactions, clarity values and signer bitvecs are hex.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewBlock {
    pub block_hash: String,
    pub block_height: u64,
    pub burn_block_time: i64,
    pub burn_block_hash: String,
    pub burn_block_height: u64,
    pub miner_txid: String,
    pub index_block_hash: String,
    pub parent_index_block_hash: String,
    pub parent_block_hash: String,
    pub parent_microblock: String,
    pub parent_microblock_sequence: u32,
    pub parent_burn_block_hash: String,
    pub parent_burn_block_height: u64,
    pub parent_burn_block_timestamp: i64,
    pub transactions: Vec<NewTransaction>,
    pub events: Vec<NewEvent>,
    #[serde(default)]
    pub matured_miner_rewards: Vec<MaturedMinerReward>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pox_v1_unlock_height: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pox_v2_unlock_height: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pox_v3_unlock_height: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_bitvec: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_number: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_set: Option<RewardSet>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewardSet {
    pub pox_ustx_threshold: String,
    #[serde(default)]
    pub rewarded_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<RewardSetSigner>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewardSetSigner {
    pub signing_key: String,
    pub weight: u32,
    pub stacked_amt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaturedMinerReward {
    pub from_index_consensus_hash: String,
    pub from_stacks_block_hash: String,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner_address: Option<String>,
    pub coinbase_amount: String,
    /// micro-STX amount
    pub tx_fees_anchored: String,
    /// micro-STX amount
    pub tx_fees_streamed_confirmed: String,
    /// micro-STX amount
    pub tx_fees_streamed_produced: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NewTransactionStatus {
    Success,
    AbortByResponse,
    AbortByPostCondition,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionCost {
    pub read_count: u64,
    pub read_length: u64,
    pub runtime: u64,
    pub write_count: u64,
    pub write_length: u64,
}

/// A transaction receipt, as found in both anchored blocks and microblock trails
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewTransaction {
    pub txid: String,
    pub tx_index: u32,
    pub status: NewTransactionStatus,
    pub raw_result: String,
    pub raw_tx: String,
    #[serde(default)]
    pub execution_cost: ExecutionCost,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_abi: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microblock_sequence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microblock_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microblock_parent_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burnchain_op: Option<JsonValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewEvent {
    pub txid: String,
    pub event_index: u32,
    pub committed: bool,
    #[serde(flatten)]
    pub payload: NewEventPayload,
}

/// Closed set of event kinds emitted by the node. Any other `type` fails
/// deserialization of the whole message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NewEventPayload {
    ContractEvent { contract_event: ContractEventData },
    StxTransferEvent { stx_transfer_event: StxTransferEventData },
    StxMintEvent { stx_mint_event: StxMintEventData },
    StxBurnEvent { stx_burn_event: StxBurnEventData },
    StxLockEvent { stx_lock_event: StxLockEventData },
    NftTransferEvent { nft_transfer_event: NftTransferEventData },
    NftMintEvent { nft_mint_event: NftMintEventData },
    NftBurnEvent { nft_burn_event: NftBurnEventData },
    FtTransferEvent { ft_transfer_event: FtTransferEventData },
    FtMintEvent { ft_mint_event: FtMintEventData },
    FtBurnEvent { ft_burn_event: FtBurnEventData },
}

impl NewEventPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            NewEventPayload::ContractEvent { .. } => "contract_event",
            NewEventPayload::StxTransferEvent { .. } => "stx_transfer_event",
            NewEventPayload::StxMintEvent { .. } => "stx_mint_event",
            NewEventPayload::StxBurnEvent { .. } => "stx_burn_event",
            NewEventPayload::StxLockEvent { .. } => "stx_lock_event",
            NewEventPayload::NftTransferEvent { .. } => "nft_transfer_event",
            NewEventPayload::NftMintEvent { .. } => "nft_mint_event",
            NewEventPayload::NftBurnEvent { .. } => "nft_burn_event",
            NewEventPayload::FtTransferEvent { .. } => "ft_transfer_event",
            NewEventPayload::FtMintEvent { .. } => "ft_mint_event",
            NewEventPayload::FtBurnEvent { .. } => "ft_burn_event",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractEventData {
    pub contract_identifier: String,
    pub topic: String,
    pub raw_value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StxTransferEventData {
    pub sender: String,
    pub recipient: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StxMintEventData {
    pub recipient: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StxBurnEventData {
    pub sender: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StxLockEventData {
    pub locked_amount: String,
    pub unlock_height: String,
    pub locked_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_identifier: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NftTransferEventData {
    pub asset_identifier: String,
    pub sender: String,
    pub recipient: String,
    pub raw_value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NftMintEventData {
    pub asset_identifier: String,
    pub recipient: String,
    pub raw_value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NftBurnEventData {
    pub asset_identifier: String,
    pub sender: String,
    pub raw_value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FtTransferEventData {
    pub asset_identifier: String,
    pub sender: String,
    pub recipient: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FtMintEventData {
    pub asset_identifier: String,
    pub recipient: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FtBurnEventData {
    pub asset_identifier: String,
    pub sender: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewMicroblockTrail {
    pub parent_index_block_hash: String,
    pub burn_block_hash: String,
    pub burn_block_height: u64,
    pub burn_block_timestamp: i64,
    pub transactions: Vec<NewTransaction>,
    pub events: Vec<NewEvent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewBurnBlock {
    pub burn_block_hash: String,
    pub burn_block_height: u64,
    pub reward_recipients: Vec<RewardRecipient>,
    pub reward_slot_holders: Vec<String>,
    #[serde(deserialize_with = "deserialize_amount")]
    pub burn_amount: u128,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewardRecipient {
    pub recipient: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amt: u128,
}

/// Burn amounts arrive as JSON numbers from current nodes and as decimal
/// strings from replayed archives. Both widen to `u128`.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = u128;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an unsigned amount as a number or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u128, E> {
            Ok(value as u128)
        }

        fn visit_u128<E: de::Error>(self, value: u128) -> Result<u128, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u128, E> {
            u128::try_from(value).map_err(|_| E::custom(format!("negative amount {}", value)))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u128, E> {
            value
                .parse::<u128>()
                .map_err(|_| E::custom(format!("invalid amount {:?}", value)))
        }
    }

    deserializer.deserialize_any(AmountVisitor)
}

/// Body of `/new_mempool_tx`
pub type NewMempoolTxs = Vec<String>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DroppedMempoolTxs {
    pub dropped_txids: Vec<String>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_txid: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewAttachment {
    pub attachment_index: u64,
    pub index_block_hash: String,
    /// Sent as a decimal string by the node
    pub block_height: String,
    pub content_hash: String,
    pub contract_id: String,
    /// Hex encoded clarity tuple `{op, name, namespace}`
    pub metadata: String,
    pub tx_id: String,
    /// Hex encoded attachment content
    pub content: String,
}

/// A notification, keyed by the path it was POSTed to
#[derive(Debug, Clone)]
pub enum CoreNotification {
    Block(NewBlock),
    BurnBlock(NewBurnBlock),
    MempoolTxs(NewMempoolTxs),
    DroppedMempoolTxs(DroppedMempoolTxs),
    Attachments(Vec<NewAttachment>),
    Microblocks(NewMicroblockTrail),
}

impl CoreNotification {
    pub const PATHS: [&'static str; 6] = [
        "/new_block",
        "/new_burn_block",
        "/new_mempool_tx",
        "/drop_mempool_tx",
        "/attachments/new",
        "/new_microblocks",
    ];

    /// `None` when nothing is routed to `path`
    pub fn parse(path: &str, payload: &str) -> Option<Result<CoreNotification, serde_json::Error>> {
        let notification = match path {
            "/new_block" => serde_json::from_str(payload).map(CoreNotification::Block),
            "/new_burn_block" => serde_json::from_str(payload).map(CoreNotification::BurnBlock),
            "/new_mempool_tx" => serde_json::from_str(payload).map(CoreNotification::MempoolTxs),
            "/drop_mempool_tx" => {
                serde_json::from_str(payload).map(CoreNotification::DroppedMempoolTxs)
            }
            "/attachments/new" => serde_json::from_str(payload).map(CoreNotification::Attachments),
            "/new_microblocks" => serde_json::from_str(payload).map(CoreNotification::Microblocks),
            _ => return None,
        };
        Some(notification)
    }
}
