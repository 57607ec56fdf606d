use std::collections::BTreeSet;

use crate::ledger::TxId;
use crate::utxo_set::UtxoSet;

/// Inversion of the post-pass-1 UTXO set: for each height, the set of
/// transaction hashes that still have at least one live output originating
/// there. Built once between the two passes so pass 2 only revisits blocks
/// that still matter; immutable afterwards.
pub type BlockTxIndex = Vec<BTreeSet<TxId>>;

/// Pure function of the final pass-1 state; O(surviving transactions).
pub fn build_block_index(set: &UtxoSet, total_height: u64) -> BlockTxIndex {
    let mut index: BlockTxIndex = vec![BTreeSet::new(); total_height as usize + 1];
    for (txid, record) in set.iter() {
        index[record.block_height as usize].insert(*txid);
    }
    index
}

/// Number of surviving transactions across all heights.
pub fn indexed_tx_count(index: &BlockTxIndex) -> usize {
    index.iter().map(|hashes| hashes.len()).sum()
}
