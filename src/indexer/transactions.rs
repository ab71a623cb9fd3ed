use hiro_system_kit::slog;
use serde_json::Value as JsonValue;
use stacks_codec::codec::{
    clarity_version_to_u8, StacksTransaction, TransactionAnchorMode, TransactionPayload, Txid,
};
use stacks_codec::StacksMessageCodec;

use crate::error::{parse_amount, IngestionError};
use crate::indexer::pox::{is_pox_print_event, pox_print_stacker};
use crate::indexer::values::serialize_clarity_value;
use crate::types::{
    DbMempoolTx, DbTx, DbTxAnchorMode, DbTxPayload, DbTxStatus, NewEvent, NewEventPayload,
    NewTransaction, NewTransactionStatus, ANCHORED_MICROBLOCK_SEQUENCE,
};
use crate::utils::{to_prefixed_hex, Context};

/// Raw transaction sent by the node for operations originating on the burnchain
pub const BURNCHAIN_OP_RAW_TX: &str = "0x00";

/// A transaction decoded from its consensus bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTransaction {
    pub tx_id: String,
    pub raw_tx: String,
    pub sender_address: String,
    pub sponsor_address: Option<String>,
    pub nonce: u64,
    pub fee_rate: u64,
    pub anchor_mode: DbTxAnchorMode,
    pub payload: DbTxPayload,
}

/// Block fields shared by every transaction of a notification. Microblock
/// trails carry placeholders for what is only known once an anchor block
/// confirms them.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockContext {
    pub index_block_hash: String,
    pub parent_index_block_hash: String,
    pub block_hash: String,
    pub parent_block_hash: String,
    pub block_height: i64,
    pub block_time: i64,
    pub burn_block_height: i64,
    pub burn_block_time: i64,
    pub parent_burn_block_time: i64,
}

/// A block receipt paired with the decoded transaction it describes
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTxMessage {
    pub tx: DbTx,
    pub contract_abi: Option<JsonValue>,
}

pub fn decode_transaction(raw_tx: &str) -> Result<ParsedTransaction, IngestionError> {
    let (tx, txid) = StacksTransaction::from_hex(raw_tx)?;
    parsed_transaction_from_codec(&tx, &txid, raw_tx)
}

fn parsed_transaction_from_codec(
    tx: &StacksTransaction,
    txid: &Txid,
    raw_tx: &str,
) -> Result<ParsedTransaction, IngestionError> {
    let sender = tx.origin_address()?;
    let payload = match &tx.payload {
        TransactionPayload::TokenTransfer(recipient, amount, memo) => DbTxPayload::TokenTransfer {
            recipient: recipient.to_string(),
            amount: *amount,
            memo: format!("0x{}", memo.to_hex()),
        },
        TransactionPayload::ContractCall(call) => DbTxPayload::ContractCall {
            contract_id: format!("{}.{}", call.address, call.contract_name),
            function_name: call.function_name.to_string(),
            function_args: call
                .function_args
                .iter()
                .map(serialize_clarity_value)
                .collect::<Result<Vec<_>, _>>()?,
        },
        TransactionPayload::SmartContract(contract, version) => DbTxPayload::SmartContract {
            contract_id: format!("{}.{}", sender, contract.name),
            source_code: contract.code_body.to_string(),
            clarity_version: version.as_ref().and_then(clarity_version_to_u8),
        },
        TransactionPayload::PoisonMicroblock(header_1, header_2) => {
            DbTxPayload::PoisonMicroblock {
                microblock_header_1: format!("0x{}", hex::encode(header_1.serialize_to_vec())),
                microblock_header_2: format!("0x{}", hex::encode(header_2.serialize_to_vec())),
            }
        }
        TransactionPayload::Coinbase(payload, alt_recipient, vrf_proof) => DbTxPayload::Coinbase {
            payload: format!("0x{}", payload.to_hex()),
            alt_recipient: alt_recipient.as_ref().map(|r| r.to_string()),
            vrf_proof: vrf_proof.as_ref().map(|p| format!("0x{}", p.to_hex())),
        },
        TransactionPayload::TenureChange(tenure) => DbTxPayload::TenureChange {
            tenure_consensus_hash: format!("0x{}", tenure.tenure_consensus_hash.to_hex()),
            prev_tenure_consensus_hash: format!(
                "0x{}",
                tenure.prev_tenure_consensus_hash.to_hex()
            ),
            burn_view_consensus_hash: format!("0x{}", tenure.burn_view_consensus_hash.to_hex()),
            previous_tenure_end: format!("0x{}", tenure.previous_tenure_end.to_hex()),
            previous_tenure_blocks: tenure.previous_tenure_blocks,
            cause: tenure.cause as u8,
            pubkey_hash: format!("0x{}", tenure.pubkey_hash.to_hex()),
        },
    };
    let anchor_mode = match tx.anchor_mode {
        TransactionAnchorMode::OnChainOnly => DbTxAnchorMode::OnChainOnly,
        TransactionAnchorMode::OffChainOnly => DbTxAnchorMode::OffChainOnly,
        TransactionAnchorMode::Any => DbTxAnchorMode::Any,
    };
    Ok(ParsedTransaction {
        tx_id: txid.to_prefixed_hex(),
        raw_tx: to_prefixed_hex(raw_tx),
        sender_address: sender.to_string(),
        sponsor_address: tx.sponsor_address()?.map(|a| a.to_string()),
        nonce: tx.auth.origin().nonce(),
        fee_rate: tx.auth.tx_fee(),
        anchor_mode,
        payload,
    })
}

pub fn tx_status_from_message(status: NewTransactionStatus) -> DbTxStatus {
    match status {
        NewTransactionStatus::Success => DbTxStatus::Success,
        NewTransactionStatus::AbortByResponse => DbTxStatus::AbortByResponse,
        NewTransactionStatus::AbortByPostCondition => DbTxStatus::AbortByPostCondition,
    }
}

/// Status recorded for mempool transactions the node evicted for `reason`
pub fn get_tx_db_status(reason: &str) -> Result<DbTxStatus, IngestionError> {
    match reason {
        "ReplaceByFee" => Ok(DbTxStatus::DroppedReplaceByFee),
        "ReplaceAcrossFork" => Ok(DbTxStatus::DroppedReplaceAcrossFork),
        "TooExpensive" => Ok(DbTxStatus::DroppedTooExpensive),
        "StaleGarbageCollect" | "StaleGarbageCollection" => {
            Ok(DbTxStatus::DroppedStaleGarbageCollect)
        }
        "Problematic" => Ok(DbTxStatus::DroppedProblematic),
        other => Err(IngestionError::MalformedPayload(format!(
            "unexpected mempool tx drop reason: {}",
            other
        ))),
    }
}

pub fn create_db_mempool_tx(parsed: ParsedTransaction, receipt_time: i64) -> DbMempoolTx {
    DbMempoolTx {
        tx_id: parsed.tx_id,
        raw_tx: parsed.raw_tx,
        receipt_time,
        status: DbTxStatus::Pending,
        sponsored: parsed.sponsor_address.is_some(),
        sender_address: parsed.sender_address,
        sponsor_address: parsed.sponsor_address,
        nonce: parsed.nonce,
        fee_rate: parsed.fee_rate,
        anchor_mode: parsed.anchor_mode,
        payload: parsed.payload,
    }
}

/// Burnchain operations carry no stacks transaction: sender and payload are
/// recovered from the first event the node attributed to the txid. Only a
/// receipt no event refers to is skipped.
fn parse_burnchain_op(
    tx: &NewTransaction,
    events: &[NewEvent],
    ctx: &Context,
) -> Result<Option<ParsedTransaction>, IngestionError> {
    let event = match events.iter().find(|e| e.txid == tx.txid) {
        Some(event) => event,
        None => {
            ctx.try_log(|logger| {
                slog::warn!(
                    logger,
                    "Could not find event for burnchain op tx {}, skipping",
                    tx.txid
                )
            });
            return Ok(None);
        }
    };
    let payload = match &event.payload {
        NewEventPayload::StxTransferEvent { stx_transfer_event } => {
            let amount = parse_amount("amount", &stx_transfer_event.amount)?;
            let amount = u64::try_from(amount).map_err(|_| {
                IngestionError::MalformedPayload(format!(
                    "burnchain transfer amount out of range: {}",
                    amount
                ))
            })?;
            DbTxPayload::TokenTransfer {
                recipient: stx_transfer_event.recipient.clone(),
                amount,
                memo: format!(
                    "0x{}",
                    stx_transfer_event
                        .memo
                        .as_deref()
                        .map(|m| m.trim_start_matches("0x"))
                        .unwrap_or("")
                ),
            }
        }
        _ => DbTxPayload::BurnchainOp {
            op: tx.burnchain_op.clone(),
        },
    };
    let sender = burnchain_op_sender(&event.payload);
    ctx.try_log(|logger| {
        slog::debug!(
            logger,
            "Burnchain op tx {} attributed to {} from its {}",
            tx.txid,
            sender,
            event.payload.type_name()
        )
    });
    Ok(Some(ParsedTransaction {
        tx_id: tx.txid.clone(),
        raw_tx: tx.raw_tx.clone(),
        sender_address: sender,
        sponsor_address: None,
        nonce: 0,
        fee_rate: 0,
        anchor_mode: DbTxAnchorMode::Any,
        payload,
    }))
}

/// Account an event acts on behalf of. Stacking prints name their stacker,
/// other contract logs fall back on the emitting contract.
fn burnchain_op_sender(payload: &NewEventPayload) -> String {
    match payload {
        NewEventPayload::StxTransferEvent { stx_transfer_event } => {
            stx_transfer_event.sender.clone()
        }
        NewEventPayload::StxLockEvent { stx_lock_event } => stx_lock_event.locked_address.clone(),
        NewEventPayload::StxMintEvent { stx_mint_event } => stx_mint_event.recipient.clone(),
        NewEventPayload::StxBurnEvent { stx_burn_event } => stx_burn_event.sender.clone(),
        NewEventPayload::ContractEvent { contract_event } => {
            let stacker = if is_pox_print_event(payload) {
                pox_print_stacker(&contract_event.raw_value)
            } else {
                None
            };
            stacker.unwrap_or_else(|| contract_event.contract_identifier.clone())
        }
        NewEventPayload::FtTransferEvent { ft_transfer_event } => ft_transfer_event.sender.clone(),
        NewEventPayload::FtMintEvent { ft_mint_event } => ft_mint_event.recipient.clone(),
        NewEventPayload::FtBurnEvent { ft_burn_event } => ft_burn_event.sender.clone(),
        NewEventPayload::NftTransferEvent { nft_transfer_event } => {
            nft_transfer_event.sender.clone()
        }
        NewEventPayload::NftMintEvent { nft_mint_event } => nft_mint_event.recipient.clone(),
        NewEventPayload::NftBurnEvent { nft_burn_event } => nft_burn_event.sender.clone(),
    }
}

/// Decodes a block or microblock receipt into a `DbTx`. `None` when the
/// receipt is a burnchain operation no event refers to.
pub fn parse_message_transaction(
    tx: &NewTransaction,
    block: &BlockContext,
    events: &[NewEvent],
    ctx: &Context,
) -> Result<Option<ParsedTxMessage>, IngestionError> {
    let parsed = if tx.raw_tx == BURNCHAIN_OP_RAW_TX {
        match parse_burnchain_op(tx, events, ctx)? {
            Some(parsed) => parsed,
            None => return Ok(None),
        }
    } else {
        let mut parsed = decode_transaction(&tx.raw_tx)?;
        parsed.tx_id = tx.txid.clone();
        parsed
    };

    ctx.try_log(|logger| {
        slog::debug!(
            logger,
            "Parsed tx {} from sender {}, payload {}",
            parsed.tx_id,
            parsed.sender_address,
            parsed.payload.kind()
        )
    });

    let db_tx = DbTx {
        tx_id: parsed.tx_id,
        tx_index: tx.tx_index,
        raw_tx: parsed.raw_tx,
        index_block_hash: block.index_block_hash.clone(),
        parent_index_block_hash: block.parent_index_block_hash.clone(),
        block_hash: block.block_hash.clone(),
        parent_block_hash: block.parent_block_hash.clone(),
        block_height: block.block_height,
        block_time: block.block_time,
        burn_block_height: block.burn_block_height,
        burn_block_time: block.burn_block_time,
        parent_burn_block_time: block.parent_burn_block_time,
        status: tx_status_from_message(tx.status),
        raw_result: tx.raw_result.clone(),
        canonical: true,
        microblock_canonical: true,
        microblock_sequence: tx
            .microblock_sequence
            .map(i64::from)
            .unwrap_or(ANCHORED_MICROBLOCK_SEQUENCE),
        microblock_hash: tx.microblock_hash.clone().unwrap_or_default(),
        parent_microblock_hash: tx.microblock_parent_hash.clone().unwrap_or_default(),
        sponsored: parsed.sponsor_address.is_some(),
        sender_address: parsed.sender_address,
        sponsor_address: parsed.sponsor_address,
        nonce: parsed.nonce,
        fee_rate: parsed.fee_rate,
        anchor_mode: parsed.anchor_mode,
        payload: parsed.payload,
        event_count: 0,
        execution_cost_read_count: tx.execution_cost.read_count,
        execution_cost_read_length: tx.execution_cost.read_length,
        execution_cost_runtime: tx.execution_cost.runtime,
        execution_cost_write_count: tx.execution_cost.write_count,
        execution_cost_write_length: tx.execution_cost.write_length,
        vm_error: tx.vm_error.clone(),
    };
    Ok(Some(ParsedTxMessage {
        tx: db_tx,
        contract_abi: tx.contract_abi.clone(),
    }))
}
