use std::fs::File;
use std::io::{self, Write};

use tracing::warn;

use crate::aggregate::AddressBalances;
use crate::ledger::{LedgerAccess, TxId};
use crate::utxo_set::{TxRecord, UtxoSet};

/// Flat-table exporters. Both tables are tab-separated, newline-terminated
/// and headerless; rows are emitted in map order, single pass. An open or
/// write failure aborts that export step only — the caller decides what to
/// do with the error, and the other export still runs.

/// Write one row per surviving live (hash, output index) pair:
/// block height, tx index, output index, amount, script hex, rounds.
/// Output amounts and scripts are not retained in the records, so each
/// record's block is re-read from the ledger; an unreadable block drops
/// that record's rows with a warning, same policy as the passes.
/// Returns the number of rows written.
pub fn export_utxos<L: LedgerAccess>(
    ledger: &L,
    set: &UtxoSet,
    path: &str,
) -> Result<usize, io::Error> {
    let mut file = File::create(path)?;
    let mut rows = 0;
    for (txid, record) in set.iter() {
        rows += write_tx_rows(&mut file, ledger, txid, record)?;
    }
    Ok(rows)
}

fn write_tx_rows<L: LedgerAccess>(
    file: &mut File,
    ledger: &L,
    txid: &TxId,
    record: &TxRecord,
) -> Result<usize, io::Error> {
    let block = match ledger.fetch_block(record.block_height) {
        Ok(block) => block,
        Err(e) => {
            warn!(height = record.block_height, error = %e, "failed to read block during export");
            return Ok(0);
        }
    };
    let tx = match block.txs.get(record.tx_index as usize) {
        Some(tx) if tx.txid == *txid => tx,
        _ => {
            warn!(%txid, height = record.block_height, tx_index = record.tx_index,
                "stored transaction index does not resolve in exported block");
            return Ok(0);
        }
    };

    let mut rows = 0;
    for (vout, output) in tx.outputs.iter().enumerate() {
        if record.liveness.is_live(vout) {
            writeln!(
                file,
                "{}\t{}\t{}\t{}\t{}\t{}",
                record.block_height,
                record.tx_index,
                vout,
                output.value,
                hex::encode(&output.script_pubkey),
                output.rounds
            )?;
            rows += 1;
        }
    }
    Ok(rows)
}

/// Write one row per address with a strictly positive balance:
/// address, amount. Returns the number of rows written.
pub fn export_addresses(balances: &AddressBalances, path: &str) -> Result<usize, io::Error> {
    let mut file = File::create(path)?;
    let mut rows = 0;
    for (address, amount) in balances.iter() {
        if *amount > 0 {
            writeln!(file, "{}\t{}", address, amount)?;
            rows += 1;
        }
    }
    Ok(rows)
}
