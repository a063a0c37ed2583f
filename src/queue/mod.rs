//! Bounded priority queue of pending outbound forwards, with a dedup cache
//! and loop detection (spec.md §4.C).
//!
//! Dequeue order favors the highest TTL (the freshest-looking packet): the
//! stored `priority` field is `255 - ttl` per spec.md, so "dequeue by
//! ascending `priority`" and "dequeue by descending TTL" are the same
//! ordering. Ties (equal TTL) are broken FIFO by enqueue order.

use heapless::Vec;

use crate::packet::Packet;
use crate::{DEDUP_CACHE_CAPACITY, QUEUE_CAPACITY};

/// Outcome of [`MessageQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Accepted,
    Duplicate,
    Loop,
    Full,
}

struct QueueEntry {
    packet: Packet,
    priority: u8,
    enqueue_seq: u64,
}

struct DedupFingerprint {
    sender_id: u32,
    first_path_element: u32,
    ttl: u8,
    seen_at_ms: u64,
}

fn fingerprint_of(packet: &Packet) -> (u32, u32, u8) {
    let first = packet.path.first().copied().unwrap_or(packet.sender_id);
    (packet.sender_id, first, packet.ttl)
}

/// Monotonically-increasing operation counters, never reset except by
/// dropping/recreating the queue (`clear` preserves them, matching spec.md's
/// "statistics counters monotonically increase").
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dequeued: u64,
    pub duplicates: u64,
    pub loops: u64,
    pub overflows: u64,
}

pub struct MessageQueue {
    entries: Vec<QueueEntry, QUEUE_CAPACITY>,
    dedup: Vec<DedupFingerprint, DEDUP_CACHE_CAPACITY>,
    next_seq: u64,
    stats: QueueStats,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            dedup: Vec::new(),
            next_seq: 0,
            stats: QueueStats::default(),
        }
    }

    fn is_duplicate(&self, packet: &Packet) -> bool {
        let (sender_id, first, ttl) = fingerprint_of(packet);
        self.dedup
            .iter()
            .any(|f| f.sender_id == sender_id && f.first_path_element == first && f.ttl == ttl)
    }

    fn remember(&mut self, packet: &Packet, now_ms: u64) {
        let (sender_id, first_path_element, ttl) = fingerprint_of(packet);
        let entry = DedupFingerprint {
            sender_id,
            first_path_element,
            ttl,
            seen_at_ms: now_ms,
        };
        if self.dedup.push(entry).is_err() {
            // Full: evict the oldest fingerprint to make room.
            if let Some((idx, _)) = self
                .dedup
                .iter()
                .enumerate()
                .min_by_key(|(_, f)| f.seen_at_ms)
            {
                self.dedup.swap_remove(idx);
            }
            let _ = self.dedup.push(DedupFingerprint {
                sender_id,
                first_path_element,
                ttl,
                seen_at_ms: now_ms,
            });
        }
    }

    /// Attempts to enqueue `packet` for forwarding. Rejects a packet whose
    /// path already contains `receiver_id` (a loop) before checking for
    /// duplicates, then rejects duplicates via the dedup cache, then checks
    /// capacity.
    pub fn enqueue(&mut self, packet: Packet, receiver_id: u32, now_ms: u64) -> EnqueueResult {
        if packet.is_in_path(receiver_id) {
            self.stats.loops += 1;
            return EnqueueResult::Loop;
        }
        if self.is_duplicate(&packet) {
            self.stats.duplicates += 1;
            return EnqueueResult::Duplicate;
        }
        if self.entries.is_full() {
            self.stats.overflows += 1;
            return EnqueueResult::Full;
        }

        let priority = 255u8.saturating_sub(packet.ttl);
        let seq = self.next_seq;
        self.next_seq += 1;

        let insert_at = self
            .entries
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(self.entries.len());

        self.remember(&packet, now_ms);
        // `insert` cannot fail: capacity was checked above.
        let _ = self.entries.insert(
            insert_at,
            QueueEntry {
                packet,
                priority,
                enqueue_seq: seq,
            },
        );
        self.stats.enqueued += 1;
        EnqueueResult::Accepted
    }

    /// Removes and returns the highest-priority (lowest `priority` field,
    /// i.e. highest-TTL) entry.
    pub fn dequeue(&mut self) -> Option<Packet> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.entries.remove(0);
        self.stats.dequeued += 1;
        Some(entry.packet)
    }

    pub fn peek(&self) -> Option<&Packet> {
        self.entries.first().map(|e| &e.packet)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prunes dedup fingerprints older than `max_age_ms` relative to `now_ms`.
    pub fn cleanup(&mut self, now_ms: u64, max_age_ms: u64) {
        self.dedup
            .retain(|f| now_ms.saturating_sub(f.seen_at_ms) <= max_age_ms);
    }

    /// Empties the queue and dedup cache. Capacity (a compile-time constant
    /// with `heapless`) is unaffected; statistics counters are preserved.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dedup.clear();
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MessageType;

    fn disc(sender: u32, ttl: u8, path: &[u32]) -> Packet {
        let mut p = Packet::new(MessageType::Discovery, sender, ttl);
        for &id in path {
            p.append_to_path(id);
        }
        p
    }

    #[test]
    fn dequeues_in_descending_ttl_order() {
        let mut q = MessageQueue::new();
        for (i, ttl) in [5u8, 10, 3, 8, 1].into_iter().enumerate() {
            let result = q.enqueue(disc(100 + i as u32, ttl, &[]), 999, 0);
            assert_eq!(result, EnqueueResult::Accepted);
        }
        let mut order = heapless::Vec::<u8, 8>::new();
        while let Some(p) = q.dequeue() {
            order.push(p.ttl).unwrap();
        }
        assert_eq!(order.as_slice(), &[10, 8, 5, 3, 1]);
    }

    #[test]
    fn ties_are_fifo() {
        let mut q = MessageQueue::new();
        q.enqueue(disc(1, 5, &[]), 999, 0);
        q.enqueue(disc(2, 5, &[]), 999, 0);
        q.enqueue(disc(3, 5, &[]), 999, 0);
        assert_eq!(q.dequeue().unwrap().sender_id, 1);
        assert_eq!(q.dequeue().unwrap().sender_id, 2);
        assert_eq!(q.dequeue().unwrap().sender_id, 3);
    }

    #[test]
    fn rejects_loop() {
        let mut q = MessageQueue::new();
        let result = q.enqueue(disc(1, 5, &[2, 7]), 7, 0);
        assert_eq!(result, EnqueueResult::Loop);
        assert_eq!(q.stats().loops, 1);
    }

    #[test]
    fn rejects_duplicate() {
        let mut q = MessageQueue::new();
        assert_eq!(q.enqueue(disc(1, 5, &[2]), 999, 0), EnqueueResult::Accepted);
        assert_eq!(
            q.enqueue(disc(1, 5, &[2]), 999, 0),
            EnqueueResult::Duplicate
        );
        assert_eq!(q.stats().duplicates, 1);
    }

    #[test]
    fn rejects_when_full() {
        let mut q = MessageQueue::new();
        for i in 0..QUEUE_CAPACITY {
            assert_eq!(
                q.enqueue(disc(i as u32, 5, &[]), 999, 0),
                EnqueueResult::Accepted
            );
        }
        assert_eq!(
            q.enqueue(disc(9999, 5, &[]), 999, 0),
            EnqueueResult::Full
        );
        assert_eq!(q.stats().overflows, 1);
    }

    #[test]
    fn cleanup_prunes_stale_dedup_entries() {
        let mut q = MessageQueue::new();
        q.enqueue(disc(1, 5, &[2]), 999, 0);
        q.dequeue();
        q.cleanup(10_000, 5_000);
        // Dedup entry older than max_age is pruned, so the same packet is
        // accepted again.
        assert_eq!(
            q.enqueue(disc(1, 5, &[2]), 999, 10_000),
            EnqueueResult::Accepted
        );
    }

    #[test]
    fn clear_empties_but_keeps_stats() {
        let mut q = MessageQueue::new();
        q.enqueue(disc(1, 5, &[]), 999, 0);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.stats().enqueued, 1);
    }
}
