use std::collections::HashSet;

use crate::types::{DbMicroblock, NewTransaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentBurnBlock {
    pub height: u64,
    pub hash: String,
    pub time: i64,
}

/// Microblocks referenced by a list of receipts, one entry per distinct
/// microblock hash, ordered by sequence. Anchor block fields are left as
/// placeholders (`-1` heights, empty hashes).
pub fn parse_microblocks_from_txs(
    parent_index_block_hash: &str,
    txs: &[NewTransaction],
    parent_burn_block: &ParentBurnBlock,
) -> Vec<DbMicroblock> {
    let mut seen = HashSet::new();
    let mut microblocks = vec![];
    for tx in txs.iter() {
        let (hash, sequence, parent_hash) = match (
            &tx.microblock_hash,
            tx.microblock_sequence,
            &tx.microblock_parent_hash,
        ) {
            (Some(hash), Some(sequence), Some(parent_hash)) => (hash, sequence, parent_hash),
            _ => continue,
        };
        if !seen.insert(hash.clone()) {
            continue;
        }
        microblocks.push(DbMicroblock {
            canonical: true,
            microblock_canonical: true,
            microblock_hash: hash.clone(),
            microblock_sequence: sequence,
            microblock_parent_hash: parent_hash.clone(),
            parent_index_block_hash: parent_index_block_hash.to_string(),
            block_height: -1,
            parent_block_height: -1,
            parent_block_hash: String::new(),
            index_block_hash: String::new(),
            block_hash: String::new(),
            parent_burn_block_height: parent_burn_block.height,
            parent_burn_block_hash: parent_burn_block.hash.clone(),
            parent_burn_block_time: parent_burn_block.time,
        });
    }
    microblocks.sort_by_key(|mb| mb.microblock_sequence);
    microblocks
}
