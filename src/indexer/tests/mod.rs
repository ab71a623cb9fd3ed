pub mod helpers;

use clarity::vm::types::Value;
use test_case::test_case;

use self::helpers::bns::{name_print, namespace_print};
use self::helpers::messages::{
    contract_event, ft_mint_event, microblock_receipt, new_block, new_block_json,
    new_microblock_trail, nft_transfer_event, receipt, stx_transfer_event, RECIPIENT,
};
use self::helpers::transactions::{
    generate_test_boot_contract_call, generate_test_contract_deploy,
    generate_test_token_transfer, TestTransaction,
};
use super::events::normalize_event_indexes;
use super::values::builders::{ascii, buffer, error, okay, some, standard_principal, tuple};
use super::{Indexer, IndexerConfig};
use crate::error::IngestionError;
use crate::types::{
    ChainId, DbAssetEventType, DbTxPayload, DbTxStatus, DroppedMempoolTxs, NewBlock,
    NewBurnBlock, PoxEventData, PoxForceUnlockHeights,
};
use crate::utils::Context;

fn indexer(chain_id: ChainId) -> Indexer {
    Indexer::new(IndexerConfig {
        chain_id,
        event_replay: false,
    })
}

fn print_value(message: &str) -> Value {
    ascii(message)
}

fn stack_stx_print() -> Value {
    okay(tuple(vec![
        ("name", ascii("stack-stx")),
        ("stacker", standard_principal(22, 1)),
        ("locked", Value::UInt(1_000_000)),
        ("balance", Value::UInt(2_000_000)),
        ("burnchain-unlock-height", Value::UInt(120)),
        (
            "data",
            tuple(vec![
                ("lock-amount", Value::UInt(1_000_000)),
                ("lock-period", Value::UInt(1)),
                ("start-burn-height", Value::UInt(100)),
                ("unlock-burn-height", Value::UInt(120)),
                ("signer-key", Value::none()),
            ]),
        ),
    ]))
}

#[test]
fn it_renumbers_event_indexes_per_transaction() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let tx_b = generate_test_token_transfer(0x12, 0, 200);
    let contract = "ST000000000000000000002AMW42H.logger";
    let block = new_block(
        10,
        vec![receipt(&tx_a, 0, "success"), receipt(&tx_b, 1, "success")],
        vec![
            stx_transfer_event(&tx_a.txid, 0, 100),
            contract_event(&tx_b.txid, 1, contract, &print_value("b")),
            ft_mint_event(&tx_a.txid, 2, "340282366920938463463374607431768211455"),
            contract_event(&tx_a.txid, 3, contract, &print_value("a")),
            stx_transfer_event(&tx_b.txid, 4, 200),
        ],
    );

    let (update, counts) = indexer(ChainId::Testnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    assert_eq!(update.txs.len(), 2);

    let a = &update.txs[0];
    assert_eq!(a.tx.tx_id, tx_a.txid);
    assert_eq!(a.tx.event_count, 3);
    assert_eq!(a.stx_events[0].base.event_index, 0);
    assert_eq!(a.ft_events[0].base.event_index, 1);
    assert_eq!(a.ft_events[0].amount, u128::MAX);
    assert_eq!(a.ft_events[0].asset_event_type, DbAssetEventType::Mint);
    assert_eq!(a.contract_logs[0].base.event_index, 2);
    let mut indexes = a.event_indexes();
    indexes.sort_unstable();
    assert_eq!(indexes, vec![0, 1, 2]);

    let b = &update.txs[1];
    assert_eq!(b.tx.event_count, 2);
    assert_eq!(b.contract_logs[0].base.event_index, 0);
    assert_eq!(b.stx_events[0].base.event_index, 1);
    assert_eq!(b.stx_events[0].base.tx_index, 1);
    assert_eq!(b.stx_events[0].memo, None);

    assert_eq!(counts.tx_total, 2);
    assert_eq!(counts.event_total, 5);
    assert_eq!(counts.txs.get("token_transfer"), Some(&2));
    assert_eq!(counts.events.get("stx_transfer_event"), Some(&2));
    assert_eq!(super::kept_event_count(&update.txs), 5);
}

#[test]
fn it_excludes_events_of_unsuccessful_and_uncommitted_txs() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let tx_b = generate_test_token_transfer(0x12, 0, 200);
    let mut uncommitted = stx_transfer_event(&tx_a.txid, 0, 100);
    uncommitted["committed"] = json!(false);
    let block = new_block(
        10,
        vec![
            receipt(&tx_a, 0, "success"),
            receipt(&tx_b, 1, "abort_by_response"),
        ],
        vec![
            uncommitted,
            stx_transfer_event(&tx_b.txid, 1, 200),
            contract_event(
                &tx_b.txid,
                2,
                "ST000000000000000000002AMW42H.logger",
                &print_value("failed"),
            ),
            stx_transfer_event(&tx_a.txid, 3, 100),
        ],
    );

    let (update, _) = indexer(ChainId::Testnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    let a = &update.txs[0];
    assert_eq!(a.tx.event_count, 1);
    assert_eq!(a.stx_events[0].base.event_index, 0);
    let b = &update.txs[1];
    assert_eq!(b.tx.status, DbTxStatus::AbortByResponse);
    assert_eq!(b.tx.event_count, 0);
    assert!(b.stx_events.is_empty());
    assert!(b.contract_logs.is_empty());
}

#[test]
fn it_rejects_events_of_unknown_transactions() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let unknown = format!("0x{}", "ab".repeat(32));
    let block = new_block(
        10,
        vec![receipt(&tx_a, 0, "success")],
        vec![stx_transfer_event(&unknown, 0, 100)],
    );
    match indexer(ChainId::Testnet).standardize_block(&block, &Context::empty()) {
        Err(IngestionError::MissingTransaction { tx_id }) => assert_eq!(tx_id, unknown),
        other => panic!("unexpected result {:?}", other.map(|(_, counts)| counts)),
    }
}

#[test]
fn it_rejects_unknown_event_types() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let mut json = new_block_json(10, vec![receipt(&tx_a, 0, "success")], vec![]);
    json["events"] = json!([{
        "txid": tx_a.txid,
        "event_index": 0,
        "committed": true,
        "type": "token_rename_event",
        "token_rename_event": {}
    }]);
    assert!(serde_json::from_value::<NewBlock>(json).is_err());
}

#[test]
fn it_records_smart_contract_deployments() {
    let deploy = generate_test_contract_deploy(0x13, "counter", "(define-data-var n uint u0)");
    let mut deploy_receipt = receipt(&deploy, 0, "success");
    deploy_receipt["contract_abi"] = json!({ "functions": [], "variables": [] });
    let block = new_block(10, vec![deploy_receipt], vec![]);

    let (update, counts) = indexer(ChainId::Testnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    let entry = &update.txs[0];
    let contract_id = format!("{}.counter", deploy.sender);
    assert_eq!(
        entry.tx.payload,
        DbTxPayload::SmartContract {
            contract_id: contract_id.clone(),
            source_code: "(define-data-var n uint u0)".into(),
            clarity_version: Some(2),
        }
    );
    assert_eq!(entry.smart_contracts.len(), 1);
    let contract = &entry.smart_contracts[0];
    assert_eq!(contract.contract_id, contract_id);
    assert_eq!(contract.block_height, 10);
    assert_eq!(
        contract.abi.as_deref(),
        Some("{\"functions\":[],\"variables\":[]}")
    );
    assert_eq!(counts.txs.get("versioned_smart_contract"), Some(&1));
}

#[test]
fn it_derives_synthetic_events_from_pox_prints() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let block = new_block(
        10,
        vec![receipt(&tx_a, 0, "success")],
        vec![
            contract_event(
                &tx_a.txid,
                0,
                "SP000000000000000000002Q6VF78.pox-4",
                &stack_stx_print(),
            ),
            contract_event(
                &tx_a.txid,
                1,
                "SP000000000000000000002Q6VF78.pox-3",
                &error(Value::Int(3)),
            ),
        ],
    );

    let (update, _) = indexer(ChainId::Mainnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    let entry = &update.txs[0];
    assert_eq!(entry.contract_logs.len(), 2);
    assert_eq!(entry.pox4_events.len(), 1);
    assert!(entry.pox3_events.is_empty());
    assert_eq!(entry.tx.event_count, 3);

    // the synthetic event sorts right after the log it was decoded from
    assert_eq!(entry.contract_logs[0].base.event_index, 0);
    assert_eq!(entry.contract_logs[1].base.event_index, 2);
    let synthetic = &entry.pox4_events[0];
    assert_eq!(synthetic.base.event_index, 1);
    assert_eq!(synthetic.locked, 1_000_000);
    assert!(matches!(
        synthetic.data,
        PoxEventData::StackStx {
            lock_period: 1,
            signer_key: None,
            ..
        }
    ));
}

#[test]
fn it_leaves_the_source_bundle_untouched_when_renumbering() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let contract = "ST000000000000000000002AMW42H.logger";
    let block = new_block(
        10,
        vec![receipt(&tx_a, 0, "success")],
        vec![
            contract_event(&tx_a.txid, 7, contract, &print_value("a")),
            stx_transfer_event(&tx_a.txid, 3, 100),
        ],
    );
    let (update, _) = indexer(ChainId::Testnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    let mut bundle = update.txs[0].clone();
    bundle.contract_logs[0].base.event_index = 40;
    bundle.stx_events[0].base.event_index = 12;
    bundle.tx.event_count = 0;
    let source = bundle.clone();

    let normalized = normalize_event_indexes(&bundle);
    assert_eq!(bundle, source);
    assert_eq!(normalized.stx_events[0].base.event_index, 0);
    assert_eq!(normalized.contract_logs[0].base.event_index, 1);
    assert_eq!(normalized.tx.event_count, 2);
    assert_eq!(normalize_event_indexes(&normalized), normalized);
}

#[test]
fn it_records_bns_names_and_namespaces() {
    let bns = "ST000000000000000000002AMW42H.bns";
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let renewal = generate_test_boot_contract_call(
        0x14,
        "bns",
        "name-renewal",
        vec![
            buffer(b"id".to_vec()),
            buffer(b"alice".to_vec()),
            Value::UInt(10),
            Value::none(),
            Value::none(),
        ],
    );
    let renewal_with_zonefile = generate_test_boot_contract_call(
        0x15,
        "bns",
        "name-renewal",
        vec![
            buffer(b"id".to_vec()),
            buffer(b"bob".to_vec()),
            Value::UInt(10),
            Value::none(),
            some(buffer(vec![0xb1; 20])),
        ],
    );
    let block = new_block(
        10,
        vec![
            receipt(&tx_a, 0, "success"),
            receipt(&renewal, 1, "success"),
            receipt(&renewal_with_zonefile, 2, "success"),
        ],
        vec![
            contract_event(&tx_a.txid, 4, bns, &name_print("name-transfer", "carol", "id")),
            nft_transfer_event(&tx_a.txid, 5, &format!("{}::names", bns), RECIPIENT),
            contract_event(&tx_a.txid, 6, bns, &namespace_print("id", "ready")),
            contract_event(
                &tx_a.txid,
                7,
                "ST000000000000000000002AMW42H.not-bns",
                &name_print("name-register", "mallory", "id"),
            ),
        ],
    );

    let (update, _) = indexer(ChainId::Testnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    let a = &update.txs[0];
    assert_eq!(a.tx.event_count, 4);
    assert_eq!(a.names.len(), 1);
    assert_eq!(a.names[0].name, "carol.id");
    assert_eq!(a.names[0].status, "name-transfer");
    assert_eq!(a.names[0].address, RECIPIENT);
    assert_eq!(a.names[0].event_index, Some(0));
    assert_eq!(a.contract_logs[0].base.event_index, 0);
    assert_eq!(a.namespaces.len(), 1);
    assert_eq!(a.namespaces[0].namespace_id, "id");
    assert_eq!(a.namespaces[0].ready_block, 10);

    let renewed = &update.txs[1];
    assert_eq!(renewed.names.len(), 1);
    assert_eq!(renewed.names[0].name, "alice.id");
    assert_eq!(renewed.names[0].status, "name-renewal");
    assert_eq!(renewed.names[0].address, renewal.sender);
    assert_eq!(renewed.names[0].event_index, None);
    assert!(renewed.names[0].zonefile_hash.is_empty());
    assert!(update.txs[2].names.is_empty());

    let (mainnet, _) = indexer(ChainId::Mainnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    assert!(mainnet.txs.iter().all(|bundle| bundle.names.is_empty()));
    assert!(mainnet.txs[0].namespaces.is_empty());
}

#[test]
fn it_reports_only_changed_force_unlock_heights() {
    let mut json = new_block_json(10, vec![], vec![]);
    json["pox_v1_unlock_height"] = json!(100);
    json["pox_v2_unlock_height"] = json!(120);
    let block: NewBlock = serde_json::from_value(json).unwrap();
    let (update, _) = indexer(ChainId::Testnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    assert_eq!(update.pox_v2_unlock_height, Some(120));

    let stored = PoxForceUnlockHeights {
        pox_v1_unlock_height: Some(100),
        pox_v2_unlock_height: None,
        pox_v3_unlock_height: Some(140),
    };
    assert_eq!(stored.changed_by(&update), vec![(2, 120)]);
    assert_eq!(
        PoxForceUnlockHeights::default().changed_by(&update),
        vec![(1, 100), (2, 120)]
    );
}

fn burnchain_op(byte: u8) -> TestTransaction {
    TestTransaction {
        txid: format!("0x{}", hex::encode([byte; 32])),
        raw_tx: "0x00".into(),
        sender: String::new(),
    }
}

#[test]
fn it_attributes_burnchain_ops_reported_through_stacking_prints() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let op = burnchain_op(0xab);
    let orphan = burnchain_op(0xcd);
    let block = new_block(
        10,
        vec![
            receipt(&tx_a, 0, "success"),
            receipt(&op, 1, "success"),
            receipt(&orphan, 2, "success"),
        ],
        vec![
            stx_transfer_event(&tx_a.txid, 0, 100),
            contract_event(
                &op.txid,
                1,
                "SP000000000000000000002Q6VF78.pox-4",
                &stack_stx_print(),
            ),
        ],
    );

    let (update, counts) = indexer(ChainId::Mainnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    // a receipt no event refers to is dropped
    assert_eq!(update.txs.len(), 2);
    let entry = &update.txs[1];
    assert_eq!(entry.tx.tx_id, op.txid);
    assert_eq!(entry.tx.tx_index, 1);
    assert!(matches!(entry.tx.payload, DbTxPayload::BurnchainOp { .. }));
    assert_eq!(entry.contract_logs.len(), 1);
    assert_eq!(entry.pox4_events.len(), 1);
    assert_eq!(entry.tx.event_count, 1);
    assert_eq!(entry.tx.sender_address, entry.pox4_events[0].stacker);
    assert!(entry.tx.sender_address.starts_with("SP"));
    assert_eq!(counts.tx_total, 2);
}

#[test]
fn it_attributes_burnchain_ops_to_the_emitting_contract() {
    let op = burnchain_op(0xab);
    let contract = "ST000000000000000000002AMW42H.logger";
    let block = new_block(
        10,
        vec![receipt(&op, 0, "success")],
        vec![contract_event(&op.txid, 0, contract, &print_value("op"))],
    );
    let (update, _) = indexer(ChainId::Testnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    assert_eq!(update.txs[0].tx.sender_address, contract);
    assert_eq!(update.txs[0].contract_logs.len(), 1);
}

#[test]
fn it_keeps_stx_lock_contract_names() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let lock = |index: u32, contract: Option<&str>| {
        let mut event = json!({
            "txid": tx_a.txid,
            "event_index": index,
            "committed": true,
            "type": "stx_lock_event",
            "stx_lock_event": {
                "locked_amount": "5000",
                "unlock_height": "2100",
                "locked_address": "SP000000000000000000002Q6VF78"
            }
        });
        if let Some(contract) = contract {
            event["stx_lock_event"]["contract_identifier"] = json!(contract);
        }
        event
    };
    let block = new_block(
        10,
        vec![receipt(&tx_a, 0, "success")],
        vec![
            lock(0, None),
            lock(1, Some("SP000000000000000000002Q6VF78.pox-4")),
        ],
    );
    let (update, _) = indexer(ChainId::Mainnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    let locks = &update.txs[0].stx_lock_events;
    assert_eq!(locks[0].contract_name, "pox");
    assert_eq!(locks[1].contract_name, "pox-4");
    assert_eq!(locks[1].locked_amount, 5000);
    assert_eq!(locks[1].unlock_height, 2100);
}

#[test]
fn it_normalizes_reward_set_signers() {
    let mut json = new_block_json(10, vec![], vec![]);
    json["cycle_number"] = json!(84);
    json["reward_set"] = json!({
        "pox_ustx_threshold": "125000000000",
        "rewarded_addresses": ["bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"],
        "signers": [
            {
                "signing_key": "02".repeat(33),
                "weight": 7,
                "stacked_amt": "340282366920938463463374607431768211455"
            },
            {
                "signing_key": "0x03".to_string() + &"ab".repeat(32),
                "weight": 1,
                "stacked_amt": "125000000000"
            }
        ]
    });
    let block: NewBlock = serde_json::from_value(json).unwrap();
    let (update, _) = indexer(ChainId::Mainnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    let signers = update.pox_set_signers.unwrap();
    assert_eq!(signers.cycle_number, 84);
    assert_eq!(signers.pox_ustx_threshold, 125_000_000_000);
    assert_eq!(signers.rewarded_addresses.len(), 1);
    assert_eq!(signers.signers.len(), 2);
    assert_eq!(signers.signers[0].weight, 7);
    assert_eq!(signers.signers[0].stacked_amount, u128::MAX);
    assert_eq!(signers.signers[0].signing_key, format!("0x{}", "02".repeat(33)));
    assert_eq!(signers.signers[1].stacked_amount, 125_000_000_000);
    assert!(signers.signers[1].signing_key.starts_with("0x03"));
}

#[test]
fn it_requires_a_cycle_number_with_a_reward_set() {
    let mut json = new_block_json(10, vec![], vec![]);
    json["reward_set"] = json!({ "pox_ustx_threshold": "1", "signers": [] });
    let block: NewBlock = serde_json::from_value(json).unwrap();
    assert!(matches!(
        indexer(ChainId::Mainnet).standardize_block(&block, &Context::empty()),
        Err(IngestionError::MissingCycleNumber)
    ));
}

#[test]
fn it_records_matured_miner_rewards() {
    let mut json = new_block_json(10, vec![], vec![]);
    json["matured_miner_rewards"] = json!([{
        "from_index_consensus_hash": "0xaa",
        "from_stacks_block_hash": "0xbb",
        "recipient": "SP000000000000000000002Q6VF78",
        "coinbase_amount": "1000000000",
        "tx_fees_anchored": "1",
        "tx_fees_streamed_confirmed": "2",
        "tx_fees_streamed_produced": "3"
    }]);
    let block: NewBlock = serde_json::from_value(json).unwrap();
    let (update, counts) = indexer(ChainId::Mainnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    assert_eq!(counts.miner_rewards, 1);
    let reward = &update.miner_rewards[0];
    assert_eq!(reward.mature_block_height, 10);
    assert_eq!(reward.index_block_hash, block.index_block_hash);
    assert_eq!(reward.miner_address, "SP000000000000000000002Q6VF78");
    assert_eq!(reward.coinbase_amount, 1_000_000_000);
    assert_eq!(reward.tx_fees_streamed_produced, 3);
}

#[test]
fn it_confirms_microblocks_with_the_accepting_block() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let tx_b = generate_test_token_transfer(0x11, 1, 100);
    let tx_c = generate_test_token_transfer(0x11, 2, 100);
    let tx_d = generate_test_token_transfer(0x12, 0, 100);
    let mb_0 = format!("0x{:064x}", 0xa0);
    let mb_1 = format!("0x{:064x}", 0xa1);
    let root = format!("0x{:064x}", 0);
    let mut json = new_block_json(
        10,
        vec![
            microblock_receipt(&tx_a, 0, &mb_1, 1, &mb_0),
            microblock_receipt(&tx_b, 1, &mb_0, 0, &root),
            microblock_receipt(&tx_c, 2, &mb_1, 1, &mb_0),
            receipt(&tx_d, 3, "success"),
        ],
        vec![],
    );
    json["signer_bitvec"] = json!("0x000a000000020502");
    let block: NewBlock = serde_json::from_value(json).unwrap();

    let (update, counts) = indexer(ChainId::Testnet)
        .standardize_block(&block, &Context::empty())
        .unwrap();
    assert_eq!(counts.microblocks, 2);
    assert_eq!(update.microblocks[0].microblock_hash, mb_0);
    assert_eq!(update.microblocks[1].microblock_hash, mb_1);
    for microblock in update.microblocks.iter() {
        assert_eq!(microblock.block_height, 10);
        assert_eq!(microblock.parent_block_height, 9);
        assert_eq!(microblock.index_block_hash, block.index_block_hash);
        assert_eq!(microblock.parent_burn_block_height, 809);
    }
    assert_eq!(update.txs[1].tx.microblock_sequence, 0);
    assert_eq!(
        update.txs[3].tx.microblock_sequence,
        crate::types::ANCHORED_MICROBLOCK_SEQUENCE
    );

    assert_eq!(update.block.tx_count, 4);
    assert_eq!(update.block.execution_cost_runtime, 400);
    assert_eq!(update.block.execution_cost_write_length, 80);
    assert_eq!(update.block.signer_bitvec.as_deref(), Some("1010000001"));
}

#[test]
fn it_rejects_malformed_signer_bitvecs() {
    let mut json = new_block_json(10, vec![], vec![]);
    json["signer_bitvec"] = json!("0x000a00000003050200");
    let block: NewBlock = serde_json::from_value(json).unwrap();
    assert!(matches!(
        indexer(ChainId::Testnet).standardize_block(&block, &Context::empty()),
        Err(IngestionError::Decode(_))
    ));
}

#[test]
fn it_falls_back_on_parent_burn_time_when_replaying() {
    let block = new_block(10, vec![], vec![]);
    let replay = Indexer::new(IndexerConfig {
        chain_id: ChainId::Testnet,
        event_replay: true,
    });
    let (update, _) = replay.standardize_block(&block, &Context::empty()).unwrap();
    assert_eq!(update.block.block_time, block.parent_burn_block_timestamp);

    let mut json = new_block_json(10, vec![], vec![]);
    json["block_time"] = json!(1_234);
    let block: NewBlock = serde_json::from_value(json).unwrap();
    let (update, _) = replay.standardize_block(&block, &Context::empty()).unwrap();
    assert_eq!(update.block.block_time, 1_234);
}

#[test]
fn it_leaves_anchor_fields_unknown_in_microblock_trails() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let mb_0 = format!("0x{:064x}", 0xa0);
    let root = format!("0x{:064x}", 0);
    let trail = new_microblock_trail(
        vec![microblock_receipt(&tx_a, 0, &mb_0, 0, &root)],
        vec![stx_transfer_event(&tx_a.txid, 5, 100)],
    );

    let update = indexer(ChainId::Testnet)
        .standardize_microblocks(&trail, &Context::empty())
        .unwrap();
    assert_eq!(update.microblocks.len(), 1);
    let microblock = &update.microblocks[0];
    assert_eq!(microblock.block_height, -1);
    assert!(microblock.index_block_hash.is_empty());
    assert_eq!(microblock.parent_burn_block_time, 1_700_000_009);

    let entry = &update.txs[0];
    assert_eq!(entry.tx.block_height, -1);
    assert_eq!(entry.tx.burn_block_time, -1);
    assert_eq!(entry.tx.parent_burn_block_time, 1_700_000_009);
    assert_eq!(entry.tx.microblock_hash, mb_0);
    assert_eq!(entry.stx_events[0].base.block_height, -1);
    assert_eq!(entry.stx_events[0].base.event_index, 0);
}

#[test]
fn it_timestamps_mempool_batches_once() {
    let tx_a = generate_test_token_transfer(0x11, 0, 100);
    let tx_b = generate_test_contract_deploy(0x14, "hello", "(ok u1)");
    let txs = indexer(ChainId::Testnet)
        .standardize_mempool_txs(
            &[tx_a.raw_tx.clone(), tx_b.raw_tx.trim_start_matches("0x").to_string()],
            1_700_000_123,
            &Context::empty(),
        )
        .unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].tx_id, tx_a.txid);
    assert_eq!(txs[0].sender_address, tx_a.sender);
    assert_eq!(txs[1].tx_id, tx_b.txid);
    assert_eq!(txs[1].sender_address, tx_b.sender);
    assert!(txs[1].raw_tx.starts_with("0x"));
    assert!(txs.iter().all(|tx| tx.receipt_time == 1_700_000_123));
    assert!(txs.iter().all(|tx| tx.status == DbTxStatus::Pending));
    assert_eq!(txs[0].fee_rate, 180);
}

#[test]
fn it_rejects_undecodable_mempool_txs() {
    let result = indexer(ChainId::Testnet).standardize_mempool_txs(
        &["0x8080".to_string()],
        0,
        &Context::empty(),
    );
    assert!(matches!(result, Err(IngestionError::Decode(_))));
}

#[test_case("ReplaceByFee", DbTxStatus::DroppedReplaceByFee ; "replace by fee")]
#[test_case("ReplaceAcrossFork", DbTxStatus::DroppedReplaceAcrossFork ; "replace across fork")]
#[test_case("TooExpensive", DbTxStatus::DroppedTooExpensive ; "too expensive")]
#[test_case("StaleGarbageCollect", DbTxStatus::DroppedStaleGarbageCollect ; "stale")]
#[test_case("StaleGarbageCollection", DbTxStatus::DroppedStaleGarbageCollect ; "stale alias")]
#[test_case("Problematic", DbTxStatus::DroppedProblematic ; "problematic")]
fn it_maps_drop_reasons_deterministically(reason: &str, expected: DbTxStatus) {
    let msg = DroppedMempoolTxs {
        dropped_txids: vec!["0x01".into(), "0x02".into()],
        reason: reason.into(),
        new_txid: None,
    };
    let indexer = indexer(ChainId::Testnet);
    for _ in 0..3 {
        let (status, txids) = indexer
            .standardize_dropped_mempool_txs(&msg, &Context::empty())
            .unwrap();
        assert_eq!(status, expected);
        assert_eq!(txids, msg.dropped_txids);
    }
}

#[test]
fn it_rejects_unknown_drop_reasons() {
    let msg = DroppedMempoolTxs {
        dropped_txids: vec![],
        reason: "Evicted".into(),
        new_txid: None,
    };
    assert!(indexer(ChainId::Testnet)
        .standardize_dropped_mempool_txs(&msg, &Context::empty())
        .is_err());
}

#[test]
fn it_indexes_burnchain_rewards_and_slot_holders() {
    let msg: NewBurnBlock = serde_json::from_value(json!({
        "burn_block_hash": "0xbeef",
        "burn_block_height": 812,
        "burn_amount": 20000,
        "reward_recipients": [
            { "recipient": "1111111111111111111114oLvT2", "amt": 5000 },
            { "recipient": "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", "amt": 5000 }
        ],
        "reward_slot_holders": ["1111111111111111111114oLvT2"]
    }))
    .unwrap();
    let (rewards, holders) = indexer(ChainId::Mainnet).standardize_burn_block(&msg, &Context::empty());
    assert_eq!(rewards.len(), 2);
    assert_eq!(rewards[1].reward_index, 1);
    assert_eq!(rewards[1].burn_amount, 20000);
    assert_eq!(rewards[0].burn_block_height, 812);
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].slot_index, 0);
}
