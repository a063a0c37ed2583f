//! RSSI sample ring: a bounded history of (rssi, timestamp) pairs gated by a
//! noisy-broadcast measurement window (spec.md §3, §4.E).

use heapless::Deque;

use crate::RSSI_RING_CAPACITY;
use crate::forwarding::crowding_from_mean;

pub struct RssiRing {
    samples: Deque<(i8, u64), RSSI_RING_CAPACITY>,
    window_open: bool,
}

impl Default for RssiRing {
    fn default() -> Self {
        Self {
            samples: Deque::new(),
            window_open: false,
        }
    }
}

impl RssiRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_measurement(&mut self) {
        self.window_open = true;
    }

    pub fn end_measurement(&mut self) {
        self.window_open = false;
    }

    pub fn is_measuring(&self) -> bool {
        self.window_open
    }

    /// Appends a sample only while the measurement window is open. Evicts
    /// the oldest sample by count when the ring is full before inserting.
    pub fn add_sample(&mut self, rssi: i8, now_ms: u64) {
        if !self.window_open {
            return;
        }
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        let _ = self.samples.push_back((rssi, now_ms));
    }

    /// Evicts samples older than `max_age_ms`. Samples are inserted in
    /// non-decreasing timestamp order, so the oldest are always at the front.
    pub fn prune_old(&mut self, now_ms: u64, max_age_ms: u64) {
        while let Some(&(_, ts)) = self.samples.front() {
            if now_ms.saturating_sub(ts) > max_age_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean_rssi(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: i64 = self.samples.iter().map(|&(r, _)| r as i64).sum();
        Some(sum as f64 / self.samples.len() as f64)
    }

    pub fn crowding(&self) -> f64 {
        crowding_from_mean(self.mean_rssi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_dropped_while_window_closed() {
        let mut ring = RssiRing::new();
        ring.add_sample(-50, 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn samples_accepted_while_window_open() {
        let mut ring = RssiRing::new();
        ring.begin_measurement();
        ring.add_sample(-50, 0);
        ring.end_measurement();
        ring.add_sample(-40, 1);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn evicts_oldest_on_count_overflow() {
        let mut ring = RssiRing::new();
        ring.begin_measurement();
        for i in 0..(RSSI_RING_CAPACITY as u64 + 5) {
            ring.add_sample(-50, i);
        }
        assert_eq!(ring.len(), RSSI_RING_CAPACITY);
    }

    #[test]
    fn prune_old_evicts_by_age() {
        let mut ring = RssiRing::new();
        ring.begin_measurement();
        ring.add_sample(-50, 0);
        ring.add_sample(-40, 1000);
        ring.prune_old(1000, 500);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn crowding_zero_with_no_samples() {
        let ring = RssiRing::new();
        assert_eq!(ring.crowding(), 0.0);
    }
}
