use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use assert_json_diff::assert_json_eq;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::Value as JsonValue;

use super::build_rocket;
use super::http::ObserverState;
use crate::config::Config;
use crate::datastore::MemoryDataStore;
use crate::indexer::tests::helpers::messages::{new_block_json, receipt, stx_transfer_event};
use crate::indexer::tests::helpers::transactions::generate_test_token_transfer;
use crate::indexer::{Indexer, IndexerConfig};
use crate::ingestion::MessageHandlers;
use crate::monitoring::PrometheusMonitoring;
use crate::types::ChainId;
use crate::utils::Context;

async fn client_with(
    store: &MemoryDataStore,
    ibd_mode_until_block: Option<u64>,
    body_limit_mb: u64,
) -> (Client, Arc<MessageHandlers>) {
    let handlers = Arc::new(MessageHandlers::new(
        Indexer::new(IndexerConfig {
            chain_id: ChainId::Testnet,
            event_replay: false,
        }),
        Arc::new(store.clone()),
        PrometheusMonitoring::new().unwrap(),
        Context::empty(),
    ));
    let mut observer_config = Config::testnet_default().event_observer;
    observer_config.body_limit_mb = body_limit_mb;
    let rocket = build_rocket(
        &observer_config,
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        ObserverState {
            handlers: handlers.clone(),
            ibd_mode_until_block,
        },
    );
    (Client::tracked(rocket).await.unwrap(), handlers)
}

async fn client(store: &MemoryDataStore) -> (Client, Arc<MessageHandlers>) {
    client_with(store, None, 500).await
}

async fn post(client: &Client, path: &str, body: String) -> (Status, String) {
    let response = client
        .post(path)
        .header(ContentType::JSON)
        .body(body)
        .dispatch()
        .await;
    let status = response.status();
    (status, response.into_string().await.unwrap_or_default())
}

fn raw_events(store: &MemoryDataStore) -> Vec<(String, String)> {
    store.read(|state| state.raw_events.clone()).unwrap()
}

#[tokio::test]
async fn it_reports_readiness() {
    let (client, _) = client(&MemoryDataStore::new()).await;
    let response = client.get("/").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_json_eq!(
        response.into_json::<JsonValue>().await.unwrap(),
        json!({
            "status": "ready",
            "msg": "API event server listening for core-node POST messages"
        })
    );
}

#[tokio::test]
async fn it_echoes_unrouted_paths() {
    let store = MemoryDataStore::new();
    let (client, handlers) = client(&store).await;
    let (status, body) = post(&client, "/unknown", "{}".into()).await;
    assert_eq!(status, Status::NotFound);
    assert_json_eq!(
        serde_json::from_str::<JsonValue>(&body).unwrap(),
        json!({ "error": "no route handler for /unknown" })
    );
    assert!(raw_events(&store).is_empty());
    assert_eq!(
        handlers
            .monitoring
            .requests_total
            .with_label_values(&["unmatched", "404"])
            .get(),
        1
    );
}

#[tokio::test]
async fn it_applies_then_archives_notifications() {
    let store = MemoryDataStore::new();
    let (client, handlers) = client(&store).await;
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let tx_b = generate_test_token_transfer(0x12, 0, 200);
    let payload = serde_json::to_string(&vec![tx_a.raw_tx.clone(), tx_b.raw_tx.clone()]).unwrap();

    let (status, body) = post(&client, "/new_mempool_tx", payload.clone()).await;
    assert_eq!(status, Status::Ok);
    assert_json_eq!(
        serde_json::from_str::<JsonValue>(&body).unwrap(),
        json!({ "result": "ok" })
    );
    assert_eq!(store.read(|state| state.mempool.len()).unwrap(), 2);
    assert_eq!(
        raw_events(&store),
        vec![("/new_mempool_tx".to_string(), payload)]
    );

    let block = new_block_json(
        1,
        vec![receipt(&tx_a, 0, "success")],
        vec![stx_transfer_event(&tx_a.txid, 0, 100)],
    );
    let (status, _) = post(&client, "/new_block", block.to_string()).await;
    assert_eq!(status, Status::Ok);
    let windows = store
        .read(|state| {
            state
                .apply_windows
                .iter()
                .map(|window| window.operation)
                .collect::<Vec<_>>()
        })
        .unwrap();
    assert_eq!(
        windows,
        vec![
            "update_mempool_txs",
            "store_raw_event_request",
            "update_block",
            "store_raw_event_request"
        ]
    );
    assert_eq!(store.read(|state| state.mempool.len()).unwrap(), 1);
    assert_eq!(
        handlers
            .monitoring
            .requests_total
            .with_label_values(&["/new_block", "200"])
            .get(),
        1
    );
}

#[tokio::test]
async fn it_reports_failures_without_archiving() {
    let store = MemoryDataStore::new();
    let (client, _) = client(&store).await;
    let (status, body) = post(&client, "/new_block", "{\"block_hash\": ".into()).await;
    assert_eq!(status, Status::InternalServerError);
    let body = serde_json::from_str::<JsonValue>(&body).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("malformed payload"));

    let (status, body) = post(&client, "/new_mempool_tx", "[\"0x8080\"]".into()).await;
    assert_eq!(status, Status::InternalServerError);
    let body = serde_json::from_str::<JsonValue>(&body).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("decoding failed"));

    assert!(raw_events(&store).is_empty());
}

#[tokio::test]
async fn it_only_archives_prunable_events_during_ibd() {
    let store = MemoryDataStore::new().with_chain_tip(100);
    let (client, _) = client_with(&store, Some(100), 500).await;
    let tx = generate_test_token_transfer(0x11, 0, 100);
    let payload = serde_json::to_string(&vec![tx.raw_tx.clone()]).unwrap();

    let (status, body) = post(&client, "/new_mempool_tx", payload.clone()).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body, "IBD");
    assert_eq!(store.read(|state| state.mempool.len()).unwrap(), 0);
    assert_eq!(raw_events(&store).len(), 1);

    let burn_block = json!({
        "burn_block_hash": "0xbeef",
        "burn_block_height": 900,
        "burn_amount": 0,
        "reward_recipients": [],
        "reward_slot_holders": []
    });
    let (status, body) = post(&client, "/new_burn_block", burn_block.to_string()).await;
    assert_eq!(status, Status::Ok);
    assert_json_eq!(
        serde_json::from_str::<JsonValue>(&body).unwrap(),
        json!({ "result": "ok" })
    );

    let store = MemoryDataStore::new().with_chain_tip(101);
    let (client, _) = client_with(&store, Some(100), 500).await;
    let (status, _) = post(&client, "/new_mempool_tx", payload).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(store.read(|state| state.mempool.len()).unwrap(), 1);
}

#[tokio::test]
async fn it_enforces_the_body_limit() {
    let store = MemoryDataStore::new();
    let (client, _) = client_with(&store, None, 1).await;
    let oversized = format!("[\"{}\"]", "0".repeat(2 * 1024 * 1024));
    let (status, body) = post(&client, "/new_mempool_tx", oversized).await;
    assert_eq!(status, Status::PayloadTooLarge);
    assert_json_eq!(
        serde_json::from_str::<JsonValue>(&body).unwrap(),
        json!({ "error": "request body for /new_mempool_tx exceeds the configured limit" })
    );
    assert!(raw_events(&store).is_empty());
    assert_eq!(store.read(|state| state.mempool.len()).unwrap(), 0);
}
