use hiro_system_kit::slog;

use crate::error::{parse_amount, IngestionError};
use crate::types::{
    DbBurnchainReward, DbMinerReward, DbPoxSetSigner, DbPoxSetSigners, DbRewardSlotHolder,
    MaturedMinerReward, NewBlock, NewBurnBlock,
};
use crate::utils::{to_prefixed_hex, Context};

pub fn burnchain_rewards(msg: &NewBurnBlock) -> Vec<DbBurnchainReward> {
    msg.reward_recipients
        .iter()
        .enumerate()
        .map(|(index, recipient)| DbBurnchainReward {
            canonical: true,
            burn_block_hash: msg.burn_block_hash.clone(),
            burn_block_height: msg.burn_block_height,
            burn_amount: msg.burn_amount,
            reward_recipient: recipient.recipient.clone(),
            reward_amount: recipient.amt,
            reward_index: index as u32,
        })
        .collect()
}

pub fn reward_slot_holders(msg: &NewBurnBlock) -> Vec<DbRewardSlotHolder> {
    msg.reward_slot_holders
        .iter()
        .enumerate()
        .map(|(index, address)| DbRewardSlotHolder {
            canonical: true,
            burn_block_hash: msg.burn_block_hash.clone(),
            burn_block_height: msg.burn_block_height,
            address: address.clone(),
            slot_index: index as u32,
        })
        .collect()
}

pub fn miner_reward(
    reward: &MaturedMinerReward,
    index_block_hash: &str,
    mature_block_height: u64,
) -> Result<DbMinerReward, IngestionError> {
    Ok(DbMinerReward {
        canonical: true,
        block_hash: reward.from_stacks_block_hash.clone(),
        index_block_hash: index_block_hash.to_string(),
        from_index_block_hash: reward.from_index_consensus_hash.clone(),
        mature_block_height,
        recipient: reward.recipient.clone(),
        miner_address: reward
            .miner_address
            .clone()
            .unwrap_or_else(|| reward.recipient.clone()),
        coinbase_amount: parse_amount("coinbase_amount", &reward.coinbase_amount)?,
        tx_fees_anchored: parse_amount("tx_fees_anchored", &reward.tx_fees_anchored)?,
        tx_fees_streamed_confirmed: parse_amount(
            "tx_fees_streamed_confirmed",
            &reward.tx_fees_streamed_confirmed,
        )?,
        tx_fees_streamed_produced: parse_amount(
            "tx_fees_streamed_produced",
            &reward.tx_fees_streamed_produced,
        )?,
    })
}

/// Signer set announced with the first block of a prepare phase. A reward
/// set without a cycle number is a protocol violation.
pub fn pox_set_signers(
    msg: &NewBlock,
    ctx: &Context,
) -> Result<Option<DbPoxSetSigners>, IngestionError> {
    let reward_set = match msg.reward_set {
        Some(ref reward_set) => reward_set,
        None => return Ok(None),
    };
    let cycle_number = msg.cycle_number.ok_or(IngestionError::MissingCycleNumber)?;

    let mut signers = vec![];
    if let Some(ref entries) = reward_set.signers {
        for signer in entries.iter() {
            signers.push(DbPoxSetSigner {
                signing_key: to_prefixed_hex(&signer.signing_key),
                weight: signer.weight,
                stacked_amount: parse_amount("stacked_amt", &signer.stacked_amt)?,
            });
        }
        ctx.try_log(|logger| {
            slog::info!(
                logger,
                "Received new pox set message, block={}, cycle={}, signers={}",
                msg.block_height,
                cycle_number,
                entries.len()
            )
        });
    }
    if !reward_set.rewarded_addresses.is_empty() {
        ctx.try_log(|logger| {
            slog::info!(
                logger,
                "Received new pox set message, {} rewarded BTC addresses",
                reward_set.rewarded_addresses.len()
            )
        });
    }

    Ok(Some(DbPoxSetSigners {
        cycle_number,
        pox_ustx_threshold: parse_amount("pox_ustx_threshold", &reward_set.pox_ustx_threshold)?,
        signers,
        rewarded_addresses: reward_set.rewarded_addresses.clone(),
    }))
}
