//! Batch reconstruction of the UTXO set from a fully-synced ledger, with
//! per-address balance aggregation and flat-file exports.
//!
//! Two sequential passes: `replay` walks every block and tracks output
//! liveness per transaction; `aggregate` revisits only the blocks that
//! still hold live outputs and attributes them to addresses. `census`
//! ties the phases together; `export` writes the residual UTXO table and
//! the address balance table.

pub mod aggregate;
pub mod block_index;
pub mod census;
pub mod config;
pub mod export;
pub mod ledger;
pub mod replay;
pub mod rpc_ledger;
pub mod script_utils;
pub mod telemetry;
pub mod utxo_set;


pub use census::{Census, CensusSummary};
pub use ledger::{Block, FetchError, LedgerAccess, OutPoint, Transaction, TxId, TxIn, TxOut};
pub use rpc_ledger::RpcLedger;
pub use utxo_set::{OutputLiveness, TxRecord, UtxoSet};
