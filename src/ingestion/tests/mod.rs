use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use super::{MessageHandlers, SerialQueue};
use crate::datastore::MemoryDataStore;
use crate::error::IngestionError;
use crate::indexer::tests::helpers::messages::{
    new_block, new_block_json, receipt, stx_transfer_event,
};
use crate::indexer::tests::helpers::transactions::{
    generate_test_contract_deploy, generate_test_token_transfer,
};
use crate::indexer::{Indexer, IndexerConfig};
use crate::monitoring::{IngestionEvent, PrometheusMonitoring};
use crate::types::{ChainId, NewBlock, NewBurnBlock, PoxForceUnlockHeights};
use crate::utils::Context;

fn handlers(store: &MemoryDataStore) -> MessageHandlers {
    MessageHandlers::new(
        Indexer::new(IndexerConfig {
            chain_id: ChainId::Testnet,
            event_replay: false,
        }),
        Arc::new(store.clone()),
        PrometheusMonitoring::new().unwrap(),
        Context::empty(),
    )
}

fn burn_block(height: u64) -> NewBurnBlock {
    serde_json::from_value(json!({
        "burn_block_hash": format!("0x{:064x}", height),
        "burn_block_height": height,
        "burn_amount": 100,
        "reward_recipients": [{ "recipient": "1111111111111111111114oLvT2", "amt": 100 }],
        "reward_slot_holders": ["1111111111111111111114oLvT2"]
    }))
    .unwrap()
}

#[tokio::test]
async fn it_runs_tasks_one_at_a_time_in_admission_order() {
    let queue = SerialQueue::new(PrometheusMonitoring::new().unwrap());
    let trace = Arc::new(StdMutex::new(vec![]));
    let task = |id: u64, delay_ms: u64| {
        let trace = trace.clone();
        async move {
            trace.lock().unwrap().push(format!("start {}", id));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            trace.lock().unwrap().push(format!("end {}", id));
            Ok::<u64, IngestionError>(id)
        }
    };
    let (a, b, c) = tokio::join!(
        queue.enqueue(IngestionEvent::RawEvent, task(1, 30)),
        queue.enqueue(IngestionEvent::RawEvent, task(2, 10)),
        queue.enqueue(IngestionEvent::RawEvent, task(3, 0)),
    );
    assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (1, 2, 3));
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
    );
}

#[tokio::test]
async fn it_keeps_serving_after_a_failed_task() {
    let monitoring = PrometheusMonitoring::new().unwrap();
    let queue = SerialQueue::new(monitoring.clone());
    let (failed, next) = tokio::join!(
        queue.enqueue(IngestionEvent::Block, async {
            Err::<(), IngestionError>(IngestionError::Storage("disk full".into()))
        }),
        queue.enqueue(IngestionEvent::Block, async { Ok::<(), IngestionError>(()) }),
    );
    assert!(matches!(failed, Err(IngestionError::Storage(_))));
    assert!(next.is_ok());
    assert_eq!(monitoring.queue_depth.get(), 0);
    assert_eq!(
        monitoring
            .ingestion_timers
            .with_label_values(&["block"])
            .get_sample_count(),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_never_overlaps_storage_writes() {
    let store = MemoryDataStore::new().with_apply_delay(Duration::from_millis(15));
    let shared = Arc::new(handlers(&store));
    let tx = generate_test_token_transfer(0x11, 0, 100);
    let deploy = generate_test_contract_deploy(0x12, "counter", "(ok u1)");

    let mut tasks = vec![];
    for height in 1..=3u64 {
        let block_handlers = shared.clone();
        let tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            let block = new_block(
                height,
                vec![receipt(&tx, 0, "success")],
                vec![stx_transfer_event(&tx.txid, 0, 100)],
            );
            block_handlers.handle_block(block).await
        }));
        let burn_handlers = shared.clone();
        tasks.push(tokio::spawn(async move {
            burn_handlers.handle_burn_block(burn_block(800 + height)).await
        }));
        let mempool_handlers = shared.clone();
        let raw_tx = deploy.raw_tx.clone();
        tasks.push(tokio::spawn(async move {
            mempool_handlers.handle_mempool_txs(vec![raw_tx]).await
        }));
        let raw_handlers = shared.clone();
        tasks.push(tokio::spawn(async move {
            raw_handlers.store_raw_event("/new_block", "{}").await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut windows = store.read(|state| state.apply_windows.clone()).unwrap();
    // 3 blocks, 3 burn blocks writing twice, 3 mempool batches, 3 raw events
    assert_eq!(windows.len(), 15);
    windows.sort_by_key(|window| window.started_at);
    for pair in windows.windows(2) {
        assert!(
            pair[0].ended_at <= pair[1].started_at,
            "{} overlaps {}",
            pair[0].operation,
            pair[1].operation
        );
    }
}

#[tokio::test]
async fn it_ingests_blocks_and_retires_mined_mempool_txs() {
    let store = MemoryDataStore::new();
    let handlers = handlers(&store);
    let tx = generate_test_token_transfer(0x11, 0, 100);
    let other = generate_test_contract_deploy(0x14, "hello", "(ok u1)");

    handlers
        .handle_mempool_txs(vec![tx.raw_tx.clone(), other.raw_tx.clone()])
        .await
        .unwrap();
    let receipt_times = store
        .read(|state| {
            state
                .mempool
                .values()
                .map(|tx| tx.receipt_time)
                .collect::<Vec<_>>()
        })
        .unwrap();
    assert_eq!(receipt_times.len(), 2);
    assert_eq!(receipt_times[0], receipt_times[1]);

    let block = new_block(
        10,
        vec![receipt(&tx, 0, "success")],
        vec![stx_transfer_event(&tx.txid, 0, 100)],
    );
    handlers.handle_block(block).await.unwrap();

    let tip = handlers.chain_tip().await.unwrap();
    assert_eq!(tip.block_height, 10);
    assert_eq!(tip.burn_block_height, 810);
    let mempool = store
        .read(|state| state.mempool.keys().cloned().collect::<Vec<_>>())
        .unwrap();
    assert_eq!(mempool, vec![other.txid.clone()]);
    assert_eq!(handlers.monitoring.last_block_height.get(), 10);
}

#[tokio::test]
async fn it_keeps_force_unlock_heights_across_blocks() {
    let store = MemoryDataStore::new();
    let handlers = handlers(&store);
    let mut json = new_block_json(10, vec![], vec![]);
    json["pox_v2_unlock_height"] = json!(120);
    let unlocking: NewBlock = serde_json::from_value(json).unwrap();
    handlers.handle_block(unlocking).await.unwrap();
    handlers.handle_block(new_block(11, vec![], vec![])).await.unwrap();

    assert_eq!(
        store.read(|state| state.pox_force_unlock_heights).unwrap(),
        PoxForceUnlockHeights {
            pox_v1_unlock_height: None,
            pox_v2_unlock_height: Some(120),
            pox_v3_unlock_height: None,
        }
    );
}

#[tokio::test]
async fn it_fails_only_the_offending_notification() {
    let store = MemoryDataStore::new();
    let handlers = handlers(&store);
    let result = handlers.handle_mempool_txs(vec!["0x8080".into()]).await;
    assert!(matches!(result, Err(IngestionError::Decode(_))));

    handlers.handle_burn_block(burn_block(812)).await.unwrap();
    let (rewards, holders) = store
        .read(|state| (state.burnchain_rewards.len(), state.reward_slot_holders.len()))
        .unwrap();
    assert_eq!((rewards, holders), (1, 1));
    assert_eq!(handlers.monitoring.last_burn_block_height.get(), 812);
    assert_eq!(handlers.monitoring.queue_depth.get(), 0);
}
