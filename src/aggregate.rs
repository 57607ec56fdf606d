use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::block_index::BlockTxIndex;
use crate::ledger::{LedgerAccess, TxId};
use crate::utxo_set::UtxoSet;

/// Cumulative amount per destination address, in minimal currency units.
/// Entries are created on first attribution and only ever grow; the map is
/// ordered so the address export is deterministic.
pub type AddressBalances = BTreeMap<String, u64>;

/// Pass 2: revisit only the heights that still hold live outputs, re-fetch
/// those blocks, and attribute each live output to its destination
/// address. Re-reading blocks here is the deliberate trade-off that lets
/// pass 1 discard transaction bodies.
///
/// Per live output:
/// - more than one destination: left untouched, it stays in the residual
///   UTXO export as ambiguous;
/// - no destination, or a type outside single-key / single-key-hash /
///   single-script-hash: liveness cleared without attribution (closed,
///   permanently excluded from address totals);
/// - exactly one destination of a supported type: amount added to that
///   address and liveness cleared.
pub fn run<L: LedgerAccess>(
    ledger: &L,
    index: &BlockTxIndex,
    set: &mut UtxoSet,
    balances: &mut AddressBalances,
) {
    let mut revisited = 0u64;
    for (height, hashes) in index.iter().enumerate().skip(1) {
        if hashes.is_empty() {
            continue;
        }
        aggregate_block(ledger, height as u64, hashes, set, balances);
        revisited += 1;
        if revisited % 50_000 == 0 {
            info!(height, revisited, "aggregation progress");
        }
    }
}

fn aggregate_block<L: LedgerAccess>(
    ledger: &L,
    height: u64,
    hashes: &BTreeSet<TxId>,
    set: &mut UtxoSet,
    balances: &mut AddressBalances,
) {
    let block = match ledger.fetch_block(height) {
        Ok(block) => block,
        Err(e) => {
            warn!(height, error = %e, "failed to re-fetch block, leaving its outputs unattributed");
            return;
        }
    };

    for txid in hashes {
        let mut emptied = false;
        if let Some(record) = set.get_mut(txid) {
            let tx = match block.txs.get(record.tx_index as usize) {
                Some(tx) if tx.txid == *txid => tx,
                _ => {
                    warn!(%txid, height, tx_index = record.tx_index,
                        "stored transaction index does not resolve in re-fetched block");
                    continue;
                }
            };

            for (vout, output) in tx.outputs.iter().enumerate() {
                if !record.liveness.is_live(vout) {
                    continue;
                }
                let class = ledger.classify_output_script(&output.script_pubkey);
                if class.destinations.len() > 1 {
                    // Ambiguous: neither attributed nor closed.
                    continue;
                }
                if class.destinations.is_empty() || !class.attributable() {
                    record.liveness.clear(vout);
                    continue;
                }
                *balances.entry(class.destinations[0].clone()).or_insert(0) += output.value;
                record.liveness.clear(vout);
            }
            emptied = record.liveness.is_empty();
        }
        if emptied {
            set.remove(txid);
        }
    }
}
