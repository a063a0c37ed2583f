//! Connectivity metrics and candidacy scoring (spec.md §3, §4.E).

use heapless::Vec;

use super::neighbor::NeighborTable;
use super::rssi::RssiRing;
use crate::NEIGHBOR_CAPACITY;
use crate::config::ScoreWeights;
use crate::packet::{Gps, calculate_score};

/// Scale (meters) used to squash the standard deviation of neighbor
/// distances into `[0, 1)` for [`geographic_distribution`]. spec.md requires
/// the metric to land in `[0, 1]` without specifying the exact
/// normalization; 50 m is a mid-range cell size for the short-range BLE
/// links this protocol targets (see `DESIGN.md`).
const GEO_DISTRIBUTION_SCALE_M: f64 = 50.0;

/// Two-pass centroid + variance of Euclidean distance from that centroid,
/// normalized to `[0, 1)`. Returns `0.0` if fewer than 2 locations are given.
pub fn geographic_distribution(locations: &[Gps]) -> f64 {
    if locations.len() < 2 {
        return 0.0;
    }
    let n = locations.len() as f64;
    let (sx, sy, sz) = locations
        .iter()
        .fold((0.0, 0.0, 0.0), |(sx, sy, sz), g| (sx + g.x, sy + g.y, sz + g.z));
    let centroid = Gps::new(sx / n, sy / n, sz / n);

    let variance = locations
        .iter()
        .map(|g| {
            let d = g.distance_to(&centroid);
            d * d
        })
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    std_dev / (std_dev + GEO_DISTRIBUTION_SCALE_M)
}

/// Snapshot of derived connectivity metrics, recomputed once per cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub direct_count: u32,
    pub crowding: f64,
    pub connection_noise_ratio: f64,
    pub geo_distribution: f64,
    pub forwarding_success_rate: f64,
    pub candidacy_score: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            direct_count: 0,
            crowding: 0.0,
            connection_noise_ratio: 0.0,
            geo_distribution: 0.0,
            forwarding_success_rate: 1.0,
            candidacy_score: 0.0,
        }
    }
}

/// Ties the neighbor table, RSSI ring, and forwarding counters together and
/// recomputes [`Metrics`] from them once per cycle.
pub struct NeighborAnalytics {
    pub neighbors: NeighborTable,
    pub rssi: RssiRing,
    pub metrics: Metrics,
    forward_attempts: u32,
    forward_successes: u32,
}

impl Default for NeighborAnalytics {
    fn default() -> Self {
        Self {
            neighbors: NeighborTable::new(),
            rssi: RssiRing::new(),
            metrics: Metrics::default(),
            forward_attempts: 0,
            forward_successes: 0,
        }
    }
}

impl NeighborAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one forwarding decision, feeding the
    /// forwarding success rate.
    pub fn record_forward_attempt(&mut self, forwarded: bool) {
        self.forward_attempts += 1;
        if forwarded {
            self.forward_successes += 1;
        }
    }

    pub fn messages_forwarded(&self) -> u32 {
        self.forward_successes
    }

    /// Recomputes [`Metrics`] from the current neighbor table, RSSI ring, and
    /// forwarding counters.
    pub fn update_metrics(&mut self, weights: &ScoreWeights) -> Metrics {
        let direct_count = self.neighbors.direct_count();
        let crowding = self.rssi.crowding();
        let connection_noise_ratio = direct_count as f64 / (1.0 + crowding);

        let mut locations: Vec<Gps, NEIGHBOR_CAPACITY> = Vec::new();
        for record in self.neighbors.iter() {
            if let Some(loc) = record.location {
                let _ = locations.push(loc);
            }
        }
        let geo_distribution = geographic_distribution(&locations);

        let forwarding_success_rate = if self.forward_attempts == 0 {
            1.0
        } else {
            self.forward_successes as f64 / self.forward_attempts as f64
        };

        let candidacy_score = calculate_score(
            direct_count,
            crowding,
            geo_distribution,
            forwarding_success_rate,
            weights,
        );

        self.metrics = Metrics {
            direct_count,
            crowding,
            connection_noise_ratio,
            geo_distribution,
            forwarding_success_rate,
            candidacy_score,
        };
        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_distribution_zero_below_two_points() {
        assert_eq!(geographic_distribution(&[]), 0.0);
        assert_eq!(geographic_distribution(&[Gps::new(0.0, 0.0, 0.0)]), 0.0);
    }

    #[test]
    fn geo_distribution_in_unit_range_for_spread_points() {
        let points = [
            Gps::new(0.0, 0.0, 0.0),
            Gps::new(100.0, 0.0, 0.0),
            Gps::new(0.0, 100.0, 0.0),
        ];
        let d = geographic_distribution(&points);
        assert!((0.0..1.0).contains(&d));
        assert!(d > 0.0);
    }

    #[test]
    fn geo_distribution_zero_when_colocated() {
        let points = [Gps::new(5.0, 5.0, 5.0), Gps::new(5.0, 5.0, 5.0)];
        assert_eq!(geographic_distribution(&points), 0.0);
    }

    #[test]
    fn forwarding_success_rate_defaults_to_one_with_no_attempts() {
        let mut a = NeighborAnalytics::new();
        let m = a.update_metrics(&ScoreWeights::default());
        assert_eq!(m.forwarding_success_rate, 1.0);
    }

    #[test]
    fn forwarding_success_rate_tracks_attempts() {
        let mut a = NeighborAnalytics::new();
        a.record_forward_attempt(true);
        a.record_forward_attempt(false);
        let m = a.update_metrics(&ScoreWeights::default());
        assert_eq!(m.forwarding_success_rate, 0.5);
        assert_eq!(a.messages_forwarded(), 1);
    }
}
