use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use super::{DataStore, TsvArchive};
use crate::error::IngestionError;
use crate::types::{
    DataStoreAttachmentBatch, DataStoreBlockUpdateData, DataStoreMicroblockUpdateData,
    DbBlock, DbBnsSubdomain, DbBurnchainReward, DbChainTip, DbMempoolTx, DbMicroblock,
    DbRewardSlotHolder, DbTxStatus, PoxForceUnlockHeights,
};

/// Start and end of one storage write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyWindow {
    pub operation: &'static str,
    pub started_at: Instant,
    pub ended_at: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub chain_tip: DbChainTip,
    pub pox_force_unlock_heights: PoxForceUnlockHeights,
    pub blocks: BTreeMap<u64, DbBlock>,
    pub microblocks: HashMap<String, DbMicroblock>,
    pub block_updates: Vec<DataStoreBlockUpdateData>,
    pub microblock_updates: Vec<DataStoreMicroblockUpdateData>,
    pub burnchain_rewards: Vec<DbBurnchainReward>,
    pub reward_slot_holders: Vec<DbRewardSlotHolder>,
    pub mempool: HashMap<String, DbMempoolTx>,
    pub attachments: Vec<DataStoreAttachmentBatch>,
    pub subdomains: HashMap<String, DbBnsSubdomain>,
    pub raw_events: Vec<(String, String)>,
    pub apply_windows: Vec<ApplyWindow>,
}

/// Volatile datastore, for tests and for running the observer without a
/// database. Raw events are also appended to a TSV archive when one is set.
#[derive(Clone, Default)]
pub struct MemoryDataStore {
    state: Arc<RwLock<MemoryState>>,
    archive: Option<Arc<TsvArchive>>,
    apply_delay: Option<Duration>,
}

impl MemoryDataStore {
    pub fn new() -> MemoryDataStore {
        MemoryDataStore::default()
    }

    pub fn with_archive(mut self, archive: TsvArchive) -> MemoryDataStore {
        self.archive = Some(Arc::new(archive));
        self
    }

    /// Stretches every write, making interleaved writes observable
    pub fn with_apply_delay(mut self, delay: Duration) -> MemoryDataStore {
        self.apply_delay = Some(delay);
        self
    }

    /// Starts the chain tip at `block_height`, as a store resuming from a snapshot would
    pub fn with_chain_tip(self, block_height: u64) -> MemoryDataStore {
        if let Ok(mut state) = self.state.write() {
            state.chain_tip.block_height = block_height;
        }
        self
    }

    pub fn read<F, R>(&self, reader: F) -> Result<R, IngestionError>
    where
        F: FnOnce(&MemoryState) -> R,
    {
        let state = self
            .state
            .read()
            .map_err(|e| IngestionError::Storage(format!("state lock poisoned: {}", e)))?;
        Ok(reader(&*state))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, IngestionError> {
        self.state
            .write()
            .map_err(|e| IngestionError::Storage(format!("state lock poisoned: {}", e)))
    }

    async fn apply<F>(&self, operation: &'static str, update: F) -> Result<(), IngestionError>
    where
        F: FnOnce(&mut MemoryState) + Send,
    {
        let started_at = Instant::now();
        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.write_state()?;
        update(&mut *state);
        state.apply_windows.push(ApplyWindow {
            operation,
            started_at,
            ended_at: Instant::now(),
        });
        Ok(())
    }
}

#[rocket::async_trait]
impl DataStore for MemoryDataStore {
    async fn update_block(&self, data: DataStoreBlockUpdateData) -> Result<(), IngestionError> {
        self.apply("update_block", move |state| {
            let block = &data.block;
            if block.block_height >= state.chain_tip.block_height {
                state.chain_tip = DbChainTip {
                    block_height: block.block_height,
                    block_hash: block.block_hash.clone(),
                    index_block_hash: block.index_block_hash.clone(),
                    burn_block_height: block.burn_block_height,
                };
            }
            let unlocks = &mut state.pox_force_unlock_heights;
            if data.pox_v1_unlock_height.is_some() {
                unlocks.pox_v1_unlock_height = data.pox_v1_unlock_height;
            }
            if data.pox_v2_unlock_height.is_some() {
                unlocks.pox_v2_unlock_height = data.pox_v2_unlock_height;
            }
            if data.pox_v3_unlock_height.is_some() {
                unlocks.pox_v3_unlock_height = data.pox_v3_unlock_height;
            }
            for microblock in data.microblocks.iter() {
                state
                    .microblocks
                    .insert(microblock.microblock_hash.clone(), microblock.clone());
            }
            // mined transactions leave the mempool
            for entry in data.txs.iter() {
                state.mempool.remove(&entry.tx.tx_id);
            }
            state.blocks.insert(block.block_height, block.clone());
            state.block_updates.push(data);
        })
        .await
    }

    async fn update_microblocks(
        &self,
        data: DataStoreMicroblockUpdateData,
    ) -> Result<(), IngestionError> {
        self.apply("update_microblocks", move |state| {
            for microblock in data.microblocks.iter() {
                state
                    .microblocks
                    .entry(microblock.microblock_hash.clone())
                    .or_insert_with(|| microblock.clone());
            }
            state.microblock_updates.push(data);
        })
        .await
    }

    async fn update_burnchain_rewards(
        &self,
        _burn_block_hash: &str,
        burn_block_height: u64,
        rewards: Vec<DbBurnchainReward>,
    ) -> Result<(), IngestionError> {
        self.apply("update_burnchain_rewards", move |state| {
            // the latest burn block at a height wins
            state
                .burnchain_rewards
                .retain(|reward| reward.burn_block_height != burn_block_height);
            state.burnchain_rewards.extend(rewards);
        })
        .await
    }

    async fn update_reward_slot_holders(
        &self,
        _burn_block_hash: &str,
        burn_block_height: u64,
        slot_holders: Vec<DbRewardSlotHolder>,
    ) -> Result<(), IngestionError> {
        self.apply("update_reward_slot_holders", move |state| {
            state
                .reward_slot_holders
                .retain(|holder| holder.burn_block_height != burn_block_height);
            state.reward_slot_holders.extend(slot_holders);
        })
        .await
    }

    async fn update_mempool_txs(&self, txs: Vec<DbMempoolTx>) -> Result<(), IngestionError> {
        self.apply("update_mempool_txs", move |state| {
            for tx in txs.into_iter() {
                state.mempool.insert(tx.tx_id.clone(), tx);
            }
        })
        .await
    }

    async fn drop_mempool_txs(
        &self,
        status: DbTxStatus,
        tx_ids: Vec<String>,
    ) -> Result<(), IngestionError> {
        self.apply("drop_mempool_txs", move |state| {
            for tx_id in tx_ids.iter() {
                if let Some(tx) = state.mempool.get_mut(tx_id) {
                    tx.status = status;
                }
            }
        })
        .await
    }

    async fn update_attachments(
        &self,
        batch: DataStoreAttachmentBatch,
    ) -> Result<(), IngestionError> {
        self.apply("update_attachments", move |state| {
            for subdomain in batch.subdomains.iter() {
                state
                    .subdomains
                    .insert(subdomain.fully_qualified_subdomain.clone(), subdomain.clone());
            }
            state.attachments.push(batch);
        })
        .await
    }

    async fn store_raw_event_request(
        &self,
        path: &str,
        payload: &str,
    ) -> Result<(), IngestionError> {
        if let Some(ref archive) = self.archive {
            archive.append(path, payload)?;
        }
        let (path, payload) = (path.to_string(), payload.to_string());
        self.apply("store_raw_event_request", move |state| {
            state.raw_events.push((path, payload));
        })
        .await
    }

    async fn get_chain_tip(&self) -> Result<DbChainTip, IngestionError> {
        self.read(|state| state.chain_tip.clone())
    }

    async fn get_pox_force_unlock_heights(&self) -> Result<PoxForceUnlockHeights, IngestionError> {
        self.read(|state| state.pox_force_unlock_heights)
    }
}
