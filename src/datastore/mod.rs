pub mod archive;
pub mod memory;

use crate::error::IngestionError;
use crate::types::{
    DataStoreAttachmentBatch, DataStoreBlockUpdateData, DataStoreMicroblockUpdateData,
    DbBurnchainReward, DbChainTip, DbMempoolTx, DbRewardSlotHolder, DbTxStatus,
    PoxForceUnlockHeights,
};

pub use archive::{RawEventRecord, TsvArchive};
pub use memory::MemoryDataStore;

/// Storage collaborator fed by the ingestion pipeline. Writes are issued
/// one at a time by the ingestion queue, implementations do not need to
/// guard against interleaved updates.
#[rocket::async_trait]
pub trait DataStore: Send + Sync {
    async fn update_block(&self, data: DataStoreBlockUpdateData) -> Result<(), IngestionError>;

    async fn update_microblocks(
        &self,
        data: DataStoreMicroblockUpdateData,
    ) -> Result<(), IngestionError>;

    async fn update_burnchain_rewards(
        &self,
        burn_block_hash: &str,
        burn_block_height: u64,
        rewards: Vec<DbBurnchainReward>,
    ) -> Result<(), IngestionError>;

    async fn update_reward_slot_holders(
        &self,
        burn_block_hash: &str,
        burn_block_height: u64,
        slot_holders: Vec<DbRewardSlotHolder>,
    ) -> Result<(), IngestionError>;

    async fn update_mempool_txs(&self, txs: Vec<DbMempoolTx>) -> Result<(), IngestionError>;

    async fn drop_mempool_txs(
        &self,
        status: DbTxStatus,
        tx_ids: Vec<String>,
    ) -> Result<(), IngestionError>;

    async fn update_attachments(
        &self,
        batch: DataStoreAttachmentBatch,
    ) -> Result<(), IngestionError>;

    /// Keeps the request body verbatim, for replays
    async fn store_raw_event_request(&self, path: &str, payload: &str)
        -> Result<(), IngestionError>;

    async fn get_chain_tip(&self) -> Result<DbChainTip, IngestionError>;

    /// Last known forced unlock height of each pox generation
    async fn get_pox_force_unlock_heights(&self) -> Result<PoxForceUnlockHeights, IngestionError>;
}
