use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use hiro_system_kit::slog;
use tokio::sync::Mutex;

use crate::datastore::DataStore;
use crate::error::IngestionError;
use crate::indexer::{kept_event_count, Indexer};
use crate::monitoring::{IngestionEvent, PrometheusMonitoring};
use crate::try_error;
use crate::types::{
    CoreNotification, DbChainTip, DroppedMempoolTxs, NewAttachment, NewBlock, NewBurnBlock,
    NewMicroblockTrail,
};
use crate::utils::{now_unix_seconds, Context};

/// Single lane every storage mutation goes through. Tasks run one at a
/// time, in the order they were admitted; a failing task only fails its
/// own caller.
pub struct SerialQueue {
    lane: Mutex<()>,
    monitoring: PrometheusMonitoring,
}

impl SerialQueue {
    pub fn new(monitoring: PrometheusMonitoring) -> SerialQueue {
        SerialQueue {
            lane: Mutex::new(()),
            monitoring,
        }
    }

    pub async fn enqueue<T, F>(&self, event: IngestionEvent, task: F) -> Result<T, IngestionError>
    where
        F: Future<Output = Result<T, IngestionError>>,
    {
        self.monitoring.queue_depth.inc();
        // tokio's mutex hands the lock out in acquisition order
        let slot = self.lane.lock().await;
        let started_at = Instant::now();
        let result = task.await;
        self.monitoring
            .observe_ingestion(event, started_at.elapsed().as_secs_f64() * 1000.0);
        drop(slot);
        self.monitoring.queue_depth.dec();
        result
    }
}

/// Turns node notifications into datastore writes
pub struct MessageHandlers {
    pub indexer: Indexer,
    pub datastore: Arc<dyn DataStore>,
    pub queue: SerialQueue,
    pub monitoring: PrometheusMonitoring,
    pub ctx: Context,
}

impl MessageHandlers {
    pub fn new(
        indexer: Indexer,
        datastore: Arc<dyn DataStore>,
        monitoring: PrometheusMonitoring,
        ctx: Context,
    ) -> MessageHandlers {
        MessageHandlers {
            indexer,
            datastore,
            queue: SerialQueue::new(monitoring.clone()),
            monitoring,
            ctx,
        }
    }

    pub async fn chain_tip(&self) -> Result<DbChainTip, IngestionError> {
        self.datastore.get_chain_tip().await
    }

    pub async fn handle_notification(
        &self,
        notification: CoreNotification,
    ) -> Result<(), IngestionError> {
        match notification {
            CoreNotification::Block(msg) => self.handle_block(msg).await,
            CoreNotification::BurnBlock(msg) => self.handle_burn_block(msg).await,
            CoreNotification::MempoolTxs(raw_txs) => self.handle_mempool_txs(raw_txs).await,
            CoreNotification::DroppedMempoolTxs(msg) => {
                self.handle_dropped_mempool_txs(msg).await
            }
            CoreNotification::Attachments(attachments) => {
                self.handle_attachments(attachments).await
            }
            CoreNotification::Microblocks(msg) => self.handle_microblocks(msg).await,
        }
    }

    pub async fn handle_block(&self, msg: NewBlock) -> Result<(), IngestionError> {
        let task = async {
            let started_at = Instant::now();
            let (update, counts) = self.indexer.standardize_block(&msg, &self.ctx)?;
            let kept_events = kept_event_count(&update.txs);
            let unlock_changes = self
                .datastore
                .get_pox_force_unlock_heights()
                .await?
                .changed_by(&update);
            self.datastore.update_block(update).await?;
            for (version, height) in unlock_changes {
                self.ctx.try_log(|logger| {
                    slog::info!(
                        logger,
                        "PoX v{} force unlock height set to {} at block {}",
                        version,
                        height,
                        msg.block_height
                    )
                });
            }
            let counts = serde_json::to_string(&counts).unwrap_or_default();
            self.ctx.try_log(|logger| {
                slog::info!(
                    logger,
                    "Ingested block {} ({}) in {}ms",
                    msg.block_height,
                    msg.block_hash,
                    started_at.elapsed().as_millis();
                    "counts" => counts,
                    "kept_events" => kept_events
                )
            });
            self.monitoring.block_ingested(msg.block_height);
            Ok(())
        };
        self.queue
            .enqueue(IngestionEvent::Block, task)
            .await
            .map_err(|e| self.log_failure("Error processing core node block message", e))
    }

    pub async fn handle_microblocks(&self, msg: NewMicroblockTrail) -> Result<(), IngestionError> {
        let task = async {
            let update = self.indexer.standardize_microblocks(&msg, &self.ctx)?;
            self.datastore.update_microblocks(update).await
        };
        self.queue
            .enqueue(IngestionEvent::Microblock, task)
            .await
            .map_err(|e| self.log_failure("Error processing core node microblock message", e))
    }

    pub async fn handle_burn_block(&self, msg: NewBurnBlock) -> Result<(), IngestionError> {
        let task = async {
            let (rewards, slot_holders) = self.indexer.standardize_burn_block(&msg, &self.ctx);
            self.datastore
                .update_burnchain_rewards(&msg.burn_block_hash, msg.burn_block_height, rewards)
                .await?;
            self.datastore
                .update_reward_slot_holders(
                    &msg.burn_block_hash,
                    msg.burn_block_height,
                    slot_holders,
                )
                .await?;
            self.monitoring.burn_block_ingested(msg.burn_block_height);
            Ok(())
        };
        self.queue
            .enqueue(IngestionEvent::BurnBlock, task)
            .await
            .map_err(|e| self.log_failure("Error processing core node burn block message", e))
    }

    pub async fn handle_mempool_txs(&self, raw_txs: Vec<String>) -> Result<(), IngestionError> {
        let task = async {
            let txs = self
                .indexer
                .standardize_mempool_txs(&raw_txs, now_unix_seconds(), &self.ctx)?;
            self.datastore.update_mempool_txs(txs).await
        };
        self.queue
            .enqueue(IngestionEvent::MempoolTxs, task)
            .await
            .map_err(|e| self.log_failure("Error processing core node mempool message", e))
    }

    pub async fn handle_dropped_mempool_txs(
        &self,
        msg: DroppedMempoolTxs,
    ) -> Result<(), IngestionError> {
        let task = async {
            let (status, tx_ids) = self
                .indexer
                .standardize_dropped_mempool_txs(&msg, &self.ctx)?;
            self.datastore.drop_mempool_txs(status, tx_ids).await
        };
        self.queue
            .enqueue(IngestionEvent::DroppedMempoolTxs, task)
            .await
            .map_err(|e| {
                self.log_failure("Error processing core node dropped mempool txs message", e)
            })
    }

    pub async fn handle_attachments(
        &self,
        attachments: Vec<NewAttachment>,
    ) -> Result<(), IngestionError> {
        let task = async {
            let batch = self.indexer.standardize_attachments(&attachments, &self.ctx);
            self.datastore.update_attachments(batch).await
        };
        self.queue
            .enqueue(IngestionEvent::NewAttachment, task)
            .await
            .map_err(|e| self.log_failure("Error processing new attachment message", e))
    }

    pub async fn store_raw_event(&self, path: &str, payload: &str) -> Result<(), IngestionError> {
        let task = self.datastore.store_raw_event_request(path, payload);
        self.queue
            .enqueue(IngestionEvent::RawEvent, task)
            .await
            .map_err(|e| self.log_failure("Error storing raw core node request data", e))
    }

    fn log_failure(&self, message: &str, err: IngestionError) -> IngestionError {
        try_error!(self.ctx, "{}: {}", message, err);
        err
    }
}

#[cfg(test)]
mod tests;
