use tracing::{error, info};

use crate::aggregate::{self, AddressBalances};
use crate::block_index::{build_block_index, indexed_tx_count};
use crate::export;
use crate::ledger::LedgerAccess;
use crate::replay;
use crate::utxo_set::UtxoSet;

/// One census run: replay, index, aggregate, export. The whole state lives
/// here for the duration of the run and is owned by exactly one phase at a
/// time; nothing is shared or retained afterwards.
pub struct Census {
    pub total_height: u64,
    pub utxos: UtxoSet,
    pub balances: AddressBalances,
}

/// Counters reported after a completed run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CensusSummary {
    pub residual_transactions: usize,
    pub residual_utxos: usize,
    pub addresses: usize,
    pub utxo_rows: usize,
    pub address_rows: usize,
}

impl Census {
    /// `total_height` is fixed before the first pass and never moves.
    pub fn new(total_height: u64) -> Self {
        Census {
            total_height,
            utxos: UtxoSet::new(),
            balances: AddressBalances::new(),
        }
    }

    /// Run both passes. After this the UTXO set holds only residual
    /// outputs (ambiguous or otherwise unresolved) and the balance map is
    /// final.
    pub fn run_passes<L: LedgerAccess>(&mut self, ledger: &L) {
        replay::run(ledger, self.total_height, &mut self.utxos);
        info!(
            transactions = self.utxos.len(),
            utxos = self.utxos.count_utxos(),
            "replay complete"
        );

        let index = build_block_index(&self.utxos, self.total_height);
        info!(indexed_transactions = indexed_tx_count(&index), "block index built");

        aggregate::run(ledger, &index, &mut self.utxos, &mut self.balances);
        info!(
            addresses = self.balances.len(),
            residual_utxos = self.utxos.count_utxos(),
            "aggregation complete"
        );
    }

    /// Write both tables. A failed export aborts that table only; the
    /// other one is still attempted.
    pub fn export<L: LedgerAccess>(
        &self,
        ledger: &L,
        utxo_path: &str,
        address_path: &str,
    ) -> (usize, usize) {
        let utxo_rows = match export::export_utxos(ledger, &self.utxos, utxo_path) {
            Ok(rows) => {
                info!(rows, path = utxo_path, "utxo export written");
                rows
            }
            Err(e) => {
                error!(path = utxo_path, error = %e, "utxo export failed");
                0
            }
        };
        let address_rows = match export::export_addresses(&self.balances, address_path) {
            Ok(rows) => {
                info!(rows, path = address_path, "address export written");
                rows
            }
            Err(e) => {
                error!(path = address_path, error = %e, "address export failed");
                0
            }
        };
        (utxo_rows, address_rows)
    }
}

/// Full run over heights 1..=total_height, exports included.
pub fn run<L: LedgerAccess>(
    ledger: &L,
    total_height: u64,
    utxo_path: &str,
    address_path: &str,
) -> CensusSummary {
    let mut census = Census::new(total_height);
    census.run_passes(ledger);
    let (utxo_rows, address_rows) = census.export(ledger, utxo_path, address_path);

    CensusSummary {
        residual_transactions: census.utxos.len(),
        residual_utxos: census.utxos.count_utxos(),
        addresses: census.balances.len(),
        utxo_rows,
        address_rows,
    }
}
