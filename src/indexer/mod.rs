pub mod bns;
pub mod events;
pub mod microblocks;
pub mod pox;
pub mod rewards;
pub mod transactions;
pub mod values;
pub mod zonefile;

#[cfg(test)]
pub mod tests;

use std::collections::BTreeMap;

use hiro_system_kit::slog;
use stacks_codec::codec::SignerBitVec;

use crate::error::IngestionError;
use crate::types::{
    ChainId, DataStoreAttachmentBatch, DataStoreBlockUpdateData, DataStoreMicroblockUpdateData,
    DataStoreTxEventData, DbBlock, DbBurnchainReward, DbMempoolTx, DbRewardSlotHolder,
    DbTxStatus, DroppedMempoolTxs, NewAttachment, NewBlock, NewBurnBlock, NewEvent,
    NewMicroblockTrail, NewTransaction,
};
use crate::utils::{now_unix_seconds, Context};

use self::events::parse_data_store_tx_event_data;
use self::microblocks::{parse_microblocks_from_txs, ParentBurnBlock};
use self::transactions::{
    create_db_mempool_tx, decode_transaction, get_tx_db_status, parse_message_transaction,
    BlockContext, ParsedTxMessage,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    pub chain_id: ChainId,
    /// Replaying archived events: block times fall back to the parent burn
    /// block timestamp instead of the wall clock
    pub event_replay: bool,
}

/// Tallies reported with every ingested block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockEventCounts {
    pub tx_total: usize,
    pub txs: BTreeMap<&'static str, usize>,
    pub event_total: usize,
    pub events: BTreeMap<&'static str, usize>,
    pub miner_rewards: usize,
    pub microblocks: usize,
}

impl BlockEventCounts {
    pub fn from_message(msg: &NewBlock, update: &DataStoreBlockUpdateData) -> BlockEventCounts {
        let mut counts = BlockEventCounts {
            tx_total: update.txs.len(),
            event_total: msg.events.len(),
            miner_rewards: update.miner_rewards.len(),
            microblocks: update.microblocks.len(),
            ..Default::default()
        };
        for entry in update.txs.iter() {
            *counts.txs.entry(entry.tx.payload.kind()).or_insert(0) += 1;
        }
        for event in msg.events.iter() {
            *counts.events.entry(event.payload.type_name()).or_insert(0) += 1;
        }
        counts
    }
}

pub struct Indexer {
    pub config: IndexerConfig,
}

impl Indexer {
    pub fn new(config: IndexerConfig) -> Indexer {
        Indexer { config }
    }

    pub fn standardize_block(
        &self,
        msg: &NewBlock,
        ctx: &Context,
    ) -> Result<(DataStoreBlockUpdateData, BlockEventCounts), IngestionError> {
        let block_time = msg.block_time.unwrap_or_else(|| {
            if self.config.event_replay {
                msg.parent_burn_block_timestamp
            } else {
                now_unix_seconds()
            }
        });

        let block_context = BlockContext {
            index_block_hash: msg.index_block_hash.clone(),
            parent_index_block_hash: msg.parent_index_block_hash.clone(),
            block_hash: msg.block_hash.clone(),
            parent_block_hash: msg.parent_block_hash.clone(),
            block_height: msg.block_height as i64,
            block_time,
            burn_block_height: msg.burn_block_height as i64,
            burn_block_time: msg.burn_block_time,
            parent_burn_block_time: msg.parent_burn_block_timestamp,
        };
        let parsed_txs =
            parse_message_transactions(&msg.transactions, &block_context, &msg.events, ctx)?;

        let signer_bitvec = match msg.signer_bitvec {
            Some(ref raw) => Some(SignerBitVec::from_hex(raw)?.to_bit_string()),
            None => None,
        };

        let mut block = DbBlock {
            canonical: true,
            block_hash: msg.block_hash.clone(),
            index_block_hash: msg.index_block_hash.clone(),
            parent_index_block_hash: msg.parent_index_block_hash.clone(),
            parent_block_hash: msg.parent_block_hash.clone(),
            parent_microblock_hash: msg.parent_microblock.clone(),
            parent_microblock_sequence: msg.parent_microblock_sequence,
            block_height: msg.block_height,
            block_time,
            burn_block_time: msg.burn_block_time,
            burn_block_hash: msg.burn_block_hash.clone(),
            burn_block_height: msg.burn_block_height,
            miner_txid: msg.miner_txid.clone(),
            execution_cost_read_count: 0,
            execution_cost_read_length: 0,
            execution_cost_runtime: 0,
            execution_cost_write_count: 0,
            execution_cost_write_length: 0,
            tx_count: msg.transactions.len() as u32,
            signer_bitvec,
        };
        for tx in msg.transactions.iter() {
            block.execution_cost_read_count += tx.execution_cost.read_count;
            block.execution_cost_read_length += tx.execution_cost.read_length;
            block.execution_cost_runtime += tx.execution_cost.runtime;
            block.execution_cost_write_count += tx.execution_cost.write_count;
            block.execution_cost_write_length += tx.execution_cost.write_length;
        }

        ctx.try_log(|logger| {
            slog::info!(
                logger,
                "Received block {} ({}) from node",
                msg.block_hash,
                msg.block_height
            )
        });

        let mut miner_rewards = vec![];
        for reward in msg.matured_miner_rewards.iter() {
            miner_rewards.push(rewards::miner_reward(
                reward,
                &msg.index_block_hash,
                msg.block_height,
            )?);
        }
        ctx.try_log(|logger| {
            slog::info!(
                logger,
                "Received {} matured miner rewards",
                miner_rewards.len()
            )
        });

        let parent_burn_block = ParentBurnBlock {
            height: msg.parent_burn_block_height,
            hash: msg.parent_burn_block_hash.clone(),
            time: msg.parent_burn_block_timestamp,
        };
        let mut microblocks = parse_microblocks_from_txs(
            &msg.parent_index_block_hash,
            &msg.transactions,
            &parent_burn_block,
        );
        for microblock in microblocks.iter_mut() {
            microblock.block_height = msg.block_height as i64;
            microblock.parent_block_height = msg.block_height as i64 - 1;
            microblock.parent_block_hash = msg.parent_block_hash.clone();
            microblock.index_block_hash = msg.index_block_hash.clone();
            microblock.block_hash = msg.block_hash.clone();
        }

        let txs = parse_data_store_tx_event_data(
            &parsed_txs,
            &msg.events,
            msg.block_height as i64,
            self.config.chain_id,
            ctx,
        )?;

        let update = DataStoreBlockUpdateData {
            block,
            microblocks,
            miner_rewards,
            txs,
            pox_v1_unlock_height: msg.pox_v1_unlock_height,
            pox_v2_unlock_height: msg.pox_v2_unlock_height,
            pox_v3_unlock_height: msg.pox_v3_unlock_height,
            pox_set_signers: rewards::pox_set_signers(msg, ctx)?,
        };
        let counts = BlockEventCounts::from_message(msg, &update);
        Ok((update, counts))
    }

    pub fn standardize_microblocks(
        &self,
        msg: &NewMicroblockTrail,
        ctx: &Context,
    ) -> Result<DataStoreMicroblockUpdateData, IngestionError> {
        ctx.try_log(|logger| {
            slog::debug!(
                logger,
                "Received microblock with {} txs",
                msg.transactions.len()
            )
        });
        let parent_burn_block = ParentBurnBlock {
            height: msg.burn_block_height,
            hash: msg.burn_block_hash.clone(),
            time: msg.burn_block_timestamp,
        };
        let microblocks = parse_microblocks_from_txs(
            &msg.parent_index_block_hash,
            &msg.transactions,
            &parent_burn_block,
        );

        // Anchor block fields stay unknown until a block confirms the trail
        let block_context = BlockContext {
            index_block_hash: String::new(),
            parent_index_block_hash: msg.parent_index_block_hash.clone(),
            block_hash: String::new(),
            parent_block_hash: String::new(),
            block_height: -1,
            block_time: now_unix_seconds(),
            burn_block_height: -1,
            burn_block_time: -1,
            parent_burn_block_time: msg.burn_block_timestamp,
        };
        let parsed_txs =
            parse_message_transactions(&msg.transactions, &block_context, &msg.events, ctx)?;
        for parsed in parsed_txs.iter() {
            ctx.try_log(|logger| {
                slog::debug!(logger, "Received microblock mined tx: {}", parsed.tx.tx_id)
            });
        }

        let txs = parse_data_store_tx_event_data(
            &parsed_txs,
            &msg.events,
            -1,
            self.config.chain_id,
            ctx,
        )?;
        Ok(DataStoreMicroblockUpdateData { microblocks, txs })
    }

    /// Decodes a mempool batch. Every transaction of a batch shares `receipt_time`.
    pub fn standardize_mempool_txs(
        &self,
        raw_txs: &[String],
        receipt_time: i64,
        ctx: &Context,
    ) -> Result<Vec<DbMempoolTx>, IngestionError> {
        ctx.try_log(|logger| {
            slog::debug!(logger, "Received {} mempool transactions", raw_txs.len())
        });
        let mut mempool_txs = Vec::with_capacity(raw_txs.len());
        for raw_tx in raw_txs.iter() {
            let parsed = decode_transaction(raw_tx)?;
            ctx.try_log(|logger| slog::debug!(logger, "Received mempool tx: {}", parsed.tx_id));
            mempool_txs.push(create_db_mempool_tx(parsed, receipt_time));
        }
        Ok(mempool_txs)
    }

    pub fn standardize_dropped_mempool_txs(
        &self,
        msg: &DroppedMempoolTxs,
        ctx: &Context,
    ) -> Result<(DbTxStatus, Vec<String>), IngestionError> {
        ctx.try_log(|logger| {
            slog::debug!(
                logger,
                "Received {} dropped mempool txs",
                msg.dropped_txids.len()
            )
        });
        let status = get_tx_db_status(&msg.reason)?;
        Ok((status, msg.dropped_txids.clone()))
    }

    pub fn standardize_burn_block(
        &self,
        msg: &NewBurnBlock,
        ctx: &Context,
    ) -> (Vec<DbBurnchainReward>, Vec<DbRewardSlotHolder>) {
        ctx.try_log(|logger| {
            slog::debug!(
                logger,
                "Received burn block message hash {}, height: {}, reward recipients: {}",
                msg.burn_block_hash,
                msg.burn_block_height,
                msg.reward_recipients.len()
            )
        });
        (
            rewards::burnchain_rewards(msg),
            rewards::reward_slot_holders(msg),
        )
    }

    pub fn standardize_attachments(
        &self,
        attachments: &[NewAttachment],
        ctx: &Context,
    ) -> DataStoreAttachmentBatch {
        bns::parse_attachments(attachments, ctx)
    }
}

fn parse_message_transactions(
    txs: &[NewTransaction],
    block_context: &BlockContext,
    events: &[NewEvent],
    ctx: &Context,
) -> Result<Vec<ParsedTxMessage>, IngestionError> {
    let mut parsed_txs = vec![];
    for tx in txs.iter() {
        if let Some(parsed) = parse_message_transaction(tx, block_context, events, ctx)? {
            parsed_txs.push(parsed);
        }
    }
    Ok(parsed_txs)
}

/// Total number of kept events across the bundles of a notification
pub fn kept_event_count(txs: &[DataStoreTxEventData]) -> u32 {
    txs.iter().map(|entry| entry.tx.event_count).sum()
}
