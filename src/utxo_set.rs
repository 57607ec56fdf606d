use std::collections::{btree_map, BTreeMap};

use tracing::warn;

use crate::ledger::{OutPoint, TxId};

/// Output-liveness map: one record per transaction that still has at least
/// one unspent output. The invariant enforced at every mutation site is
/// that a record exists in the map if and only if at least one of its
/// liveness bits is true; a record that goes all-false is erased on the
/// spot, never swept later.

/// Per-output unspent flags with a maintained live counter, so the
/// all-false check is O(1) instead of a rescan.
#[derive(Debug, Clone)]
pub struct OutputLiveness {
    bits: Vec<bool>,
    live: usize,
}

impl OutputLiveness {
    /// All outputs start unspent.
    pub fn new(n_outputs: usize) -> Self {
        OutputLiveness {
            bits: vec![true; n_outputs],
            live: n_outputs,
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_live(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    /// Clear one bit. Clearing an already-false bit is a no-op, so a
    /// double spend cannot double-decrement the counter.
    pub fn clear(&mut self, index: usize) {
        if let Some(bit) = self.bits.get_mut(index) {
            if *bit {
                *bit = false;
                self.live -= 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn live_count(&self) -> usize {
        self.live
    }
}

/// Where a transaction sits in the chain plus which of its outputs are
/// still unspent. Full transaction bodies are not retained; pass 2 and the
/// exporter re-read the block and re-locate the transaction by `tx_index`.
#[derive(Debug, Clone)]
pub struct TxRecord {
    pub block_height: u64,
    pub tx_index: u32,
    pub liveness: OutputLiveness,
}

/// The UTXO set under construction. Ordered by txid so iteration, summary
/// counts and exports are deterministic.
#[derive(Debug, Default)]
pub struct UtxoSet {
    map: BTreeMap<TxId, TxRecord>,
}

impl UtxoSet {
    pub fn new() -> Self {
        UtxoSet {
            map: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, txid: &TxId) -> Option<&TxRecord> {
        self.map.get(txid)
    }

    pub fn get_mut(&mut self, txid: &TxId) -> Option<&mut TxRecord> {
        self.map.get_mut(txid)
    }

    pub fn remove(&mut self, txid: &TxId) -> Option<TxRecord> {
        self.map.remove(txid)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, TxId, TxRecord> {
        self.map.iter()
    }

    /// Insert a fresh record with every output live. A duplicate hash is
    /// reported and ignored (first record wins); well-formed ledgers never
    /// hit this. A zero-output transaction inserts nothing, since an empty
    /// record may not exist in the map.
    pub fn insert(&mut self, txid: TxId, block_height: u64, tx_index: u32, n_outputs: usize) {
        if n_outputs == 0 {
            return;
        }
        if self.map.contains_key(&txid) {
            warn!(%txid, block_height, "duplicate transaction hash on insert, keeping first record");
            return;
        }
        self.map.insert(
            txid,
            TxRecord {
                block_height,
                tx_index,
                liveness: OutputLiveness::new(n_outputs),
            },
        );
    }

    /// Mark one output spent. A missing source transaction is reported and
    /// ignored: it means the scan started above the output's creation
    /// height, or the replay data is incomplete. Never fatal.
    pub fn spend(&mut self, outpoint: &OutPoint) {
        let emptied = match self.map.get_mut(&outpoint.txid) {
            None => {
                warn!(txid = %outpoint.txid, vout = outpoint.vout, "missing source transaction on spend");
                return;
            }
            Some(record) => {
                if outpoint.vout as usize >= record.liveness.len() {
                    warn!(
                        txid = %outpoint.txid,
                        vout = outpoint.vout,
                        outputs = record.liveness.len(),
                        "spend references output index out of range"
                    );
                    return;
                }
                record.liveness.clear(outpoint.vout as usize);
                record.liveness.is_empty()
            }
        };
        if emptied {
            self.map.remove(&outpoint.txid);
        }
    }

    /// Total number of live output bits across the whole map.
    pub fn count_utxos(&self) -> usize {
        self.map.values().map(|r| r.liveness.live_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid(byte: u8) -> TxId {
        TxId([byte; 32])
    }

    fn outpoint(byte: u8, vout: u32) -> OutPoint {
        OutPoint {
            txid: txid(byte),
            vout,
        }
    }

    #[test]
    fn new_record_is_all_live() {
        let mut set = UtxoSet::new();
        set.insert(txid(1), 5, 0, 3);
        let record = set.get(&txid(1)).unwrap();
        assert_eq!(record.liveness.live_count(), 3);
        assert!((0..3).all(|i| record.liveness.is_live(i)));
        assert!(!record.liveness.is_live(3));
    }

    #[test]
    fn duplicate_insert_keeps_first_record() {
        let mut set = UtxoSet::new();
        set.insert(txid(1), 5, 0, 3);
        set.insert(txid(1), 9, 2, 1);
        let record = set.get(&txid(1)).unwrap();
        assert_eq!(record.block_height, 5);
        assert_eq!(record.liveness.len(), 3);
    }

    #[test]
    fn zero_output_insert_creates_no_record() {
        let mut set = UtxoSet::new();
        set.insert(txid(1), 5, 0, 0);
        assert!(set.is_empty());
    }

    #[test]
    fn spend_clears_exactly_one_bit() {
        let mut set = UtxoSet::new();
        set.insert(txid(1), 5, 0, 2);
        set.spend(&outpoint(1, 0));
        let record = set.get(&txid(1)).unwrap();
        assert!(!record.liveness.is_live(0));
        assert!(record.liveness.is_live(1));
        assert_eq!(record.liveness.live_count(), 1);
    }

    #[test]
    fn record_erased_the_moment_it_empties() {
        let mut set = UtxoSet::new();
        set.insert(txid(1), 5, 0, 2);
        set.spend(&outpoint(1, 0));
        assert!(set.get(&txid(1)).is_some());
        set.spend(&outpoint(1, 1));
        assert!(set.get(&txid(1)).is_none());
    }

    #[test]
    fn double_spend_is_a_noop() {
        let mut set = UtxoSet::new();
        set.insert(txid(1), 5, 0, 2);
        set.spend(&outpoint(1, 0));
        set.spend(&outpoint(1, 0));
        let record = set.get(&txid(1)).unwrap();
        assert_eq!(record.liveness.live_count(), 1);

        // Spending the remaining output erases the record; a third spend
        // against the erased record is the missing-tx no-op.
        set.spend(&outpoint(1, 1));
        set.spend(&outpoint(1, 1));
        assert!(set.get(&txid(1)).is_none());
    }

    #[test]
    fn spend_of_unknown_tx_is_ignored() {
        let mut set = UtxoSet::new();
        set.spend(&outpoint(9, 0));
        assert!(set.is_empty());
    }

    #[test]
    fn out_of_range_spend_is_ignored() {
        let mut set = UtxoSet::new();
        set.insert(txid(1), 5, 0, 1);
        set.spend(&outpoint(1, 7));
        assert_eq!(set.get(&txid(1)).unwrap().liveness.live_count(), 1);
    }

    #[test]
    fn count_utxos_tracks_live_bits() {
        let mut set = UtxoSet::new();
        set.insert(txid(1), 1, 0, 3);
        set.insert(txid(2), 2, 1, 2);
        assert_eq!(set.count_utxos(), 5);
        set.spend(&outpoint(1, 1));
        set.spend(&outpoint(2, 0));
        set.spend(&outpoint(2, 1));
        assert_eq!(set.count_utxos(), 2);
        assert_eq!(set.len(), 1);
    }
}
