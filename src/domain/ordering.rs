//! Stable transaction ordering for deterministic replay.

use crate::domain::{InstrumentId, Transaction};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Ordering key for replaying a ledger.
///
/// Ordering: date -> input sequence number. Two trades on the same date
/// replay in the order they appeared in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TransactionOrderingKey {
    /// Trade date (primary sort).
    pub date: NaiveDate,
    /// Position in the original input (tie-break).
    pub seq: usize,
}

impl TransactionOrderingKey {
    pub fn new(txn: &Transaction, seq: usize) -> Self {
        TransactionOrderingKey {
            date: txn.date,
            seq,
        }
    }
}

/// A transaction tagged with its position in the caller's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequenced {
    pub seq: usize,
    pub txn: Transaction,
}

impl Sequenced {
    pub fn ordering_key(&self) -> TransactionOrderingKey {
        TransactionOrderingKey::new(&self.txn, self.seq)
    }
}

/// Sort sequenced transactions chronologically, ties by input position.
pub fn sort_sequenced(txns: &mut [Sequenced]) {
    txns.sort_by_key(Sequenced::ordering_key);
}

/// Split transactions into per-instrument groups, each sorted for replay.
///
/// Groups are keyed in instrument order so iteration is deterministic.
pub fn group_by_instrument(
    txns: impl IntoIterator<Item = Sequenced>,
) -> BTreeMap<InstrumentId, Vec<Sequenced>> {
    let mut groups: BTreeMap<InstrumentId, Vec<Sequenced>> = BTreeMap::new();
    for entry in txns {
        groups
            .entry(entry.txn.instrument.clone())
            .or_default()
            .push(entry);
    }
    for group in groups.values_mut() {
        sort_sequenced(group);
    }
    groups
}
