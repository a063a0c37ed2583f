//! Neighbor table: per-observed-node bookkeeping (spec.md §3, §4.E).

use heapless::Vec;

use crate::NEIGHBOR_CAPACITY;
use crate::packet::Gps;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborRecord {
    pub id: u32,
    pub location: Option<Gps>,
    pub last_rssi: i8,
    /// `true` iff this neighbor was first observed during the dedicated
    /// direct-discovery phase — never set by an RSSI threshold.
    pub is_direct: bool,
    pub last_seen_ms: u64,
    pub message_count: u32,
}

#[derive(Default)]
pub struct NeighborTable {
    records: Vec<NeighborRecord, NEIGHBOR_CAPACITY>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds or inserts a record for `id`, updating RSSI, timestamp, and
    /// message count. `is_direct` is set the first time a record is created
    /// while the direct-discovery phase is active, and never cleared.
    /// Silently dropped if the table is full and `id` is not already known.
    pub fn update(
        &mut self,
        id: u32,
        location: Option<Gps>,
        rssi: i8,
        now_ms: u64,
        in_direct_phase: bool,
    ) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.last_rssi = rssi;
            record.last_seen_ms = now_ms;
            record.message_count += 1;
            if location.is_some() {
                record.location = location;
            }
            if in_direct_phase {
                record.is_direct = true;
            }
            return;
        }

        let _ = self.records.push(NeighborRecord {
            id,
            location,
            last_rssi: rssi,
            is_direct: in_direct_phase,
            last_seen_ms: now_ms,
            message_count: 1,
        });
    }

    /// Removes records whose `last_seen_ms` is older than `timeout_ms`,
    /// preserving the relative order of the rest.
    pub fn clean_old(&mut self, now_ms: u64, timeout_ms: u64) {
        self.records
            .retain(|r| now_ms.saturating_sub(r.last_seen_ms) <= timeout_ms);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborRecord> {
        self.records.iter()
    }

    pub fn direct_count(&self) -> u32 {
        self.records.iter().filter(|r| r.is_direct).count() as u32
    }

    pub fn get(&self, id: u32) -> Option<&NeighborRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn remove(&mut self, id: u32) {
        if let Some(idx) = self.records.iter().position(|r| r.id == id) {
            self.records.swap_remove(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_update_same_id() {
        let mut t = NeighborTable::new();
        t.update(1, None, -50, 10, true);
        t.update(1, None, -40, 20, false);
        let r = t.get(1).unwrap();
        assert_eq!(r.last_rssi, -40);
        assert_eq!(r.last_seen_ms, 20);
        assert_eq!(r.message_count, 2);
        assert!(r.is_direct); // sticky once set
    }

    #[test]
    fn is_direct_only_set_during_direct_phase() {
        let mut t = NeighborTable::new();
        t.update(1, None, -50, 10, false);
        assert!(!t.get(1).unwrap().is_direct);
    }

    #[test]
    fn overflow_silently_drops_new_ids() {
        let mut t = NeighborTable::new();
        for i in 0..NEIGHBOR_CAPACITY as u32 {
            t.update(i, None, -50, 0, false);
        }
        t.update(999_999, None, -50, 0, false);
        assert_eq!(t.len(), NEIGHBOR_CAPACITY);
        assert!(t.get(999_999).is_none());
    }

    #[test]
    fn clean_old_prunes_stale_records() {
        let mut t = NeighborTable::new();
        t.update(1, None, -50, 0, false);
        t.update(2, None, -50, 100, false);
        t.clean_old(200, 150);
        assert!(t.get(1).is_none());
        assert!(t.get(2).is_some());
    }
}
