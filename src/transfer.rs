use std::collections::HashMap;

use x11rb::protocol::xproto::{Atom, Window};

/// Owner-side state for one in-flight INCR transfer.
///
/// The record's mere existence means the transfer is awaiting an ack from
/// the requestor; there's no separate state enum, since a transfer either
/// exists or does not.
pub(crate) struct TransferRecord {
    /// The atom on the requestor's window where chunks must land.
    pub(crate) property: Atom,
    /// Monotonically non-decreasing; `0 <= bytes_sent <= payload.len()`.
    pub(crate) bytes_sent: usize,
}

/// Per-requestor INCR transfer state, keyed by requestor window id. A hash
/// map in place of an intrusive linked list — same invariants (unique key,
/// small cardinality), no locking needed since it's only ever touched from
/// the owner loop's thread.
#[derive(Default)]
pub(crate) struct TransferTable {
    transfers: HashMap<Window, TransferRecord>,
}

impl TransferTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn find(&self, requestor: Window) -> Option<&TransferRecord> {
        self.transfers.get(&requestor)
    }

    pub(crate) fn find_mut(&mut self, requestor: Window) -> Option<&mut TransferRecord> {
        self.transfers.get_mut(&requestor)
    }

    /// Registers a new transfer. Returns `false` without modifying the
    /// table if one is already in flight for this requestor.
    pub(crate) fn insert(&mut self, requestor: Window, property: Atom) -> bool {
        if self.transfers.contains_key(&requestor) {
            return false;
        }
        self.transfers.insert(requestor, TransferRecord { property, bytes_sent: 0 });
        true
    }

    /// Removes a transfer that is known to exist (the terminating chunk was
    /// just written and acked, or the requestor's window died mid-transfer).
    pub(crate) fn remove(&mut self, requestor: Window) {
        self.transfers.remove(&requestor).expect("transfer record must be present to remove");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_refuses_a_second_transfer_for_the_same_requestor() {
        let mut table = TransferTable::new();
        assert!(table.insert(42, 100));
        assert!(!table.insert(42, 200));
        assert_eq!(table.find(42).unwrap().property, 100);
    }

    #[test]
    fn find_and_remove_round_trip() {
        let mut table = TransferTable::new();
        table.insert(7, 55);
        assert_eq!(table.find(7).unwrap().bytes_sent, 0);
        table.find_mut(7).unwrap().bytes_sent = 10;
        assert_eq!(table.find(7).unwrap().bytes_sent, 10);
        table.remove(7);
        assert!(table.find(7).is_none());
    }

    #[test]
    #[should_panic]
    fn remove_asserts_presence() {
        let mut table = TransferTable::new();
        table.remove(1);
    }
}
