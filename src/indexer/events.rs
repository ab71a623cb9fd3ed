use std::collections::HashMap;

use hiro_system_kit::slog;

use crate::error::{parse_amount, IngestionError};
use crate::indexer::bns::{
    bns_contract_id, name_from_print_event, name_renewal_from_contract_call,
    name_transfer_recipient, namespace_from_print_event, NAME_TRANSFER_OP,
};
use crate::indexer::pox::{
    decode_pox_synthetic_print_event, is_pox_print_event, DecodedPoxEvent, POX_2_CONTRACT_NAME,
    POX_3_CONTRACT_NAME, POX_4_CONTRACT_NAME,
};
use crate::indexer::transactions::ParsedTxMessage;
use crate::indexer::values::decode_clarity_value;
use crate::types::{
    ChainId, DataStoreTxEventData, DbAssetEventType, DbEventBase, DbFtEvent, DbNftEvent,
    DbPoxSyntheticEvent, DbSmartContract, DbSmartContractEvent, DbStxEvent, DbStxLockEvent,
    DbTxPayload, DbTxStatus, NewEvent, NewEventPayload,
};
use crate::utils::Context;

/// Groups the flat event list of a notification by transaction.
///
/// Every transaction gets a bundle, even without events. Events of
/// uncommitted or unsuccessful transactions are dropped. Within a bundle,
/// event indexes are rewritten to a contiguous `0..event_count` series
/// that keeps the node's ordering.
pub fn parse_data_store_tx_event_data(
    parsed_txs: &[ParsedTxMessage],
    events: &[NewEvent],
    block_height: i64,
    chain_id: ChainId,
    ctx: &Context,
) -> Result<Vec<DataStoreTxEventData>, IngestionError> {
    let mut bundles: Vec<DataStoreTxEventData> = parsed_txs
        .iter()
        .map(|parsed| seed_bundle(parsed, block_height, chain_id))
        .collect();
    let positions: HashMap<String, usize> = bundles
        .iter()
        .enumerate()
        .map(|(position, bundle)| (bundle.tx.tx_id.clone(), position))
        .collect();

    for event in events.iter() {
        if !event.committed {
            ctx.try_log(|logger| {
                slog::debug!(logger, "Ignoring uncommitted tx event from tx {}", event.txid)
            });
            continue;
        }
        let bundle = match positions.get(&event.txid) {
            Some(position) => &mut bundles[*position],
            None => {
                return Err(IngestionError::MissingTransaction {
                    tx_id: event.txid.clone(),
                })
            }
        };
        if bundle.tx.status != DbTxStatus::Success {
            log_ignored_event(event, bundle.tx.status, ctx);
            continue;
        }
        let base = DbEventBase {
            event_index: event.event_index,
            tx_id: event.txid.clone(),
            tx_index: bundle.tx.tx_index,
            block_height,
            canonical: true,
        };
        classify_event(bundle, base, &event.payload, chain_id, ctx)?;
    }

    for bundle in bundles.iter_mut() {
        assign_name_transfer_owners(bundle, chain_id);
    }
    Ok(bundles.iter().map(normalize_event_indexes).collect())
}

fn seed_bundle(
    parsed: &ParsedTxMessage,
    block_height: i64,
    chain_id: ChainId,
) -> DataStoreTxEventData {
    let mut bundle = DataStoreTxEventData::new(parsed.tx.clone());
    if let DbTxPayload::SmartContract {
        contract_id,
        source_code,
        clarity_version,
    } = &parsed.tx.payload
    {
        bundle.smart_contracts.push(DbSmartContract {
            tx_id: parsed.tx.tx_id.clone(),
            canonical: true,
            contract_id: contract_id.clone(),
            block_height,
            clarity_version: *clarity_version,
            source_code: source_code.clone(),
            abi: parsed.contract_abi.as_ref().map(|abi| abi.to_string()),
        });
    }
    if let Some(name) = name_renewal_from_contract_call(&parsed.tx, chain_id) {
        bundle.names.push(name);
    }
    bundle
}

fn assign_name_transfer_owners(bundle: &mut DataStoreTxEventData, chain_id: ChainId) {
    let recipient = match name_transfer_recipient(&bundle.nft_events, chain_id) {
        Some(recipient) => recipient.to_string(),
        None => return,
    };
    for name in bundle
        .names
        .iter_mut()
        .filter(|name| name.status == NAME_TRANSFER_OP)
    {
        name.address = recipient.clone();
    }
}

fn log_ignored_event(event: &NewEvent, status: DbTxStatus, ctx: &Context) {
    match &event.payload {
        NewEventPayload::ContractEvent { contract_event } => {
            let repr = match decode_clarity_value(&contract_event.raw_value) {
                Ok(value) => value.to_string(),
                Err(_) => {
                    ctx.try_log(|logger| {
                        slog::warn!(
                            logger,
                            "Failed to decode contract log event: {}",
                            contract_event.raw_value
                        )
                    });
                    "?".to_string()
                }
            };
            ctx.try_log(|logger| {
                slog::debug!(
                    logger,
                    "Ignoring tx event from unsuccessful tx {}, status: {:?}, repr: {}",
                    event.txid,
                    status,
                    repr
                )
            });
        }
        _ => ctx.try_log(|logger| {
            slog::debug!(
                logger,
                "Ignoring tx event from unsuccessful tx {}, status: {:?}",
                event.txid,
                status
            )
        }),
    }
}

fn classify_event(
    bundle: &mut DataStoreTxEventData,
    base: DbEventBase,
    payload: &NewEventPayload,
    chain_id: ChainId,
    ctx: &Context,
) -> Result<(), IngestionError> {
    match payload {
        NewEventPayload::ContractEvent { contract_event } => {
            if is_pox_print_event(payload) {
                let contract_name = contract_event
                    .contract_identifier
                    .split('.')
                    .nth(1)
                    .unwrap_or("");
                // pox-1 lifecycle is reported through stx_lock events only
                let target = match contract_name {
                    POX_2_CONTRACT_NAME => Some(&mut bundle.pox2_events),
                    POX_3_CONTRACT_NAME => Some(&mut bundle.pox3_events),
                    POX_4_CONTRACT_NAME => Some(&mut bundle.pox4_events),
                    _ => None,
                };
                if let Some(target) = target {
                    if let Some(decoded) = decode_pox_synthetic_print_event(
                        &contract_event.raw_value,
                        chain_id.is_mainnet(),
                        ctx,
                    ) {
                        ctx.try_log(|logger| {
                            slog::debug!(
                                logger,
                                "Synthetic pox event {} for {}",
                                decoded.data.name(),
                                contract_name
                            )
                        });
                        target.push(synthetic_event(base.clone(), decoded));
                    }
                }
            } else if contract_event.contract_identifier == bns_contract_id(chain_id) {
                if let Some(name) = name_from_print_event(&contract_event.raw_value, &base) {
                    bundle.names.push(name);
                }
                if let Some(namespace) =
                    namespace_from_print_event(&contract_event.raw_value, &base)
                {
                    bundle.namespaces.push(namespace);
                }
            }
            bundle.contract_logs.push(DbSmartContractEvent {
                base,
                contract_identifier: contract_event.contract_identifier.clone(),
                topic: contract_event.topic.clone(),
                value: contract_event.raw_value.clone(),
            });
        }
        NewEventPayload::StxLockEvent { stx_lock_event } => {
            let unlock_height = stx_lock_event.unlock_height.parse::<u64>().map_err(|e| {
                IngestionError::MalformedPayload(format!(
                    "invalid unlock height '{}': {}",
                    stx_lock_event.unlock_height, e
                ))
            })?;
            bundle.stx_lock_events.push(DbStxLockEvent {
                base,
                locked_amount: parse_amount("locked_amount", &stx_lock_event.locked_amount)?,
                unlock_height,
                locked_address: stx_lock_event.locked_address.clone(),
                contract_name: stx_lock_event
                    .contract_identifier
                    .as_deref()
                    .and_then(|id| id.split('.').nth(1))
                    .unwrap_or("pox")
                    .to_string(),
            });
        }
        NewEventPayload::StxTransferEvent { stx_transfer_event } => {
            bundle.stx_events.push(DbStxEvent {
                base,
                asset_event_type: DbAssetEventType::Transfer,
                sender: Some(stx_transfer_event.sender.clone()),
                recipient: Some(stx_transfer_event.recipient.clone()),
                amount: parse_amount("amount", &stx_transfer_event.amount)?,
                memo: stx_transfer_event
                    .memo
                    .as_ref()
                    .filter(|memo| !memo.is_empty())
                    .map(|memo| format!("0x{}", memo)),
            });
        }
        NewEventPayload::StxMintEvent { stx_mint_event } => {
            bundle.stx_events.push(DbStxEvent {
                base,
                asset_event_type: DbAssetEventType::Mint,
                sender: None,
                recipient: Some(stx_mint_event.recipient.clone()),
                amount: parse_amount("amount", &stx_mint_event.amount)?,
                memo: None,
            });
        }
        NewEventPayload::StxBurnEvent { stx_burn_event } => {
            bundle.stx_events.push(DbStxEvent {
                base,
                asset_event_type: DbAssetEventType::Burn,
                sender: Some(stx_burn_event.sender.clone()),
                recipient: None,
                amount: parse_amount("amount", &stx_burn_event.amount)?,
                memo: None,
            });
        }
        NewEventPayload::FtTransferEvent { ft_transfer_event } => {
            bundle.ft_events.push(DbFtEvent {
                base,
                asset_event_type: DbAssetEventType::Transfer,
                asset_identifier: ft_transfer_event.asset_identifier.clone(),
                sender: Some(ft_transfer_event.sender.clone()),
                recipient: Some(ft_transfer_event.recipient.clone()),
                amount: parse_amount("amount", &ft_transfer_event.amount)?,
            });
        }
        NewEventPayload::FtMintEvent { ft_mint_event } => {
            bundle.ft_events.push(DbFtEvent {
                base,
                asset_event_type: DbAssetEventType::Mint,
                asset_identifier: ft_mint_event.asset_identifier.clone(),
                sender: None,
                recipient: Some(ft_mint_event.recipient.clone()),
                amount: parse_amount("amount", &ft_mint_event.amount)?,
            });
        }
        NewEventPayload::FtBurnEvent { ft_burn_event } => {
            bundle.ft_events.push(DbFtEvent {
                base,
                asset_event_type: DbAssetEventType::Burn,
                asset_identifier: ft_burn_event.asset_identifier.clone(),
                sender: Some(ft_burn_event.sender.clone()),
                recipient: None,
                amount: parse_amount("amount", &ft_burn_event.amount)?,
            });
        }
        NewEventPayload::NftTransferEvent { nft_transfer_event } => {
            bundle.nft_events.push(DbNftEvent {
                base,
                asset_event_type: DbAssetEventType::Transfer,
                asset_identifier: nft_transfer_event.asset_identifier.clone(),
                sender: Some(nft_transfer_event.sender.clone()),
                recipient: Some(nft_transfer_event.recipient.clone()),
                value: nft_transfer_event.raw_value.clone(),
            });
        }
        NewEventPayload::NftMintEvent { nft_mint_event } => {
            bundle.nft_events.push(DbNftEvent {
                base,
                asset_event_type: DbAssetEventType::Mint,
                asset_identifier: nft_mint_event.asset_identifier.clone(),
                sender: None,
                recipient: Some(nft_mint_event.recipient.clone()),
                value: nft_mint_event.raw_value.clone(),
            });
        }
        NewEventPayload::NftBurnEvent { nft_burn_event } => {
            bundle.nft_events.push(DbNftEvent {
                base,
                asset_event_type: DbAssetEventType::Burn,
                asset_identifier: nft_burn_event.asset_identifier.clone(),
                sender: Some(nft_burn_event.sender.clone()),
                recipient: None,
                value: nft_burn_event.raw_value.clone(),
            });
        }
    }
    Ok(())
}

fn synthetic_event(base: DbEventBase, decoded: DecodedPoxEvent) -> DbPoxSyntheticEvent {
    DbPoxSyntheticEvent {
        base,
        stacker: decoded.stacker,
        locked: decoded.locked,
        balance: decoded.balance,
        burnchain_unlock_height: decoded.burnchain_unlock_height,
        pox_addr: decoded.pox_addr,
        pox_addr_raw: decoded.pox_addr_raw,
        end_cycle_id: decoded.end_cycle_id,
        start_cycle_id: decoded.start_cycle_id,
        data: decoded.data,
    }
}

/// Copy of `bundle` with notification level indexes rewritten into a
/// `0..event_count` series. Ties (a synthetic event shares its source log
/// index) keep category order. Names follow the log they were read from.
pub fn normalize_event_indexes(bundle: &DataStoreTxEventData) -> DataStoreTxEventData {
    let node_indexes = bundle.event_indexes();
    let mut order: Vec<usize> = (0..node_indexes.len()).collect();
    order.sort_by_key(|position| node_indexes[*position]);
    let mut renumbered = vec![0u32; node_indexes.len()];
    for (index, position) in order.into_iter().enumerate() {
        renumbered[position] = index as u32;
    }
    let mut first_by_node_index: HashMap<u32, u32> = HashMap::new();
    for (node_index, index) in node_indexes.iter().zip(renumbered.iter()) {
        let first = first_by_node_index.entry(*node_index).or_insert(*index);
        *first = (*first).min(*index);
    }

    let mut normalized = bundle.clone();
    for (base, index) in normalized.event_bases_mut().into_iter().zip(renumbered) {
        base.event_index = index;
    }
    for name in normalized.names.iter_mut() {
        name.event_index = name
            .event_index
            .and_then(|node_index| first_by_node_index.get(&node_index).copied());
    }
    normalized.tx.event_count = node_indexes.len() as u32;
    normalized
}
