use serde_json::Value as JsonValue;
use clarity::vm::types::Value;

use super::transactions::TestTransaction;
use crate::indexer::values::builders::to_hex;
use crate::types::{NewBlock, NewMicroblockTrail};

pub const RECIPIENT: &str = "ST1J4G6RR643BCG8G8SR6M2D9Z9KXT2NJDRK3FBTK";

pub fn block_hash(height: u64) -> String {
    format!("0x{:064x}", height)
}

pub fn index_block_hash(height: u64) -> String {
    format!("0x{:064x}", 0x1000 + height)
}

pub fn receipt(tx: &TestTransaction, tx_index: u32, status: &str) -> JsonValue {
    json!({
        "txid": tx.txid,
        "tx_index": tx_index,
        "status": status,
        "raw_result": "0x0703",
        "raw_tx": tx.raw_tx,
        "execution_cost": {
            "read_count": 1,
            "read_length": 10,
            "runtime": 100,
            "write_count": 2,
            "write_length": 20
        },
        "contract_abi": null
    })
}

pub fn microblock_receipt(
    tx: &TestTransaction,
    tx_index: u32,
    microblock_hash: &str,
    sequence: u32,
    parent_hash: &str,
) -> JsonValue {
    let mut receipt = receipt(tx, tx_index, "success");
    receipt["microblock_hash"] = json!(microblock_hash);
    receipt["microblock_sequence"] = json!(sequence);
    receipt["microblock_parent_hash"] = json!(parent_hash);
    receipt
}

pub fn stx_transfer_event(txid: &str, event_index: u32, amount: u64) -> JsonValue {
    json!({
        "txid": txid,
        "event_index": event_index,
        "committed": true,
        "type": "stx_transfer_event",
        "stx_transfer_event": {
            "sender": "ST000000000000000000002AMW42H",
            "recipient": RECIPIENT,
            "amount": amount.to_string(),
            "memo": ""
        }
    })
}

pub fn ft_mint_event(txid: &str, event_index: u32, amount: &str) -> JsonValue {
    json!({
        "txid": txid,
        "event_index": event_index,
        "committed": true,
        "type": "ft_mint_event",
        "ft_mint_event": {
            "asset_identifier": "ST000000000000000000002AMW42H.token::gold",
            "recipient": RECIPIENT,
            "amount": amount
        }
    })
}

pub fn nft_transfer_event(
    txid: &str,
    event_index: u32,
    asset_identifier: &str,
    recipient: &str,
) -> JsonValue {
    json!({
        "txid": txid,
        "event_index": event_index,
        "committed": true,
        "type": "nft_transfer_event",
        "nft_transfer_event": {
            "asset_identifier": asset_identifier,
            "sender": "ST000000000000000000002AMW42H",
            "recipient": recipient,
            "raw_value": "0x0100000000000000000000000000000001"
        }
    })
}

pub fn contract_event(txid: &str, event_index: u32, contract: &str, value: &Value) -> JsonValue {
    json!({
        "txid": txid,
        "event_index": event_index,
        "committed": true,
        "type": "contract_event",
        "contract_event": {
            "contract_identifier": contract,
            "topic": "print",
            "raw_value": to_hex(value)
        }
    })
}

pub fn new_block_json(height: u64, txs: Vec<JsonValue>, events: Vec<JsonValue>) -> JsonValue {
    json!({
        "block_hash": block_hash(height),
        "block_height": height,
        "burn_block_time": 1_700_000_000 + height,
        "burn_block_hash": format!("0x{:064x}", 0x2000 + height),
        "burn_block_height": 800 + height,
        "miner_txid": format!("0x{:064x}", 0x3000 + height),
        "index_block_hash": index_block_hash(height),
        "parent_index_block_hash": index_block_hash(height - 1),
        "parent_block_hash": block_hash(height - 1),
        "parent_microblock": format!("0x{:064x}", 0),
        "parent_microblock_sequence": 0,
        "parent_burn_block_hash": format!("0x{:064x}", 0x2000 + height - 1),
        "parent_burn_block_height": 800 + height - 1,
        "parent_burn_block_timestamp": 1_699_999_400 + height,
        "transactions": txs,
        "events": events,
        "matured_miner_rewards": []
    })
}

pub fn new_block(height: u64, txs: Vec<JsonValue>, events: Vec<JsonValue>) -> NewBlock {
    serde_json::from_value(new_block_json(height, txs, events)).unwrap()
}

pub fn new_microblock_trail(txs: Vec<JsonValue>, events: Vec<JsonValue>) -> NewMicroblockTrail {
    serde_json::from_value(json!({
        "parent_index_block_hash": index_block_hash(9),
        "burn_block_hash": format!("0x{:064x}", 0x2009),
        "burn_block_height": 809,
        "burn_block_timestamp": 1_700_000_009,
        "transactions": txs,
        "events": events
    }))
    .unwrap()
}
