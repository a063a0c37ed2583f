//! Neighbor table, RSSI-derived crowding, connectivity metrics, candidacy
//! gating, and conflict resolution (spec.md §4.E).

mod candidacy;
mod conflict;
mod metrics;
mod neighbor;
mod rssi;

pub use candidacy::{dynamic_min_direct, should_become_candidate};
pub use conflict::{ConflictOutcome, resolve as resolve_conflict};
pub use metrics::{Metrics, NeighborAnalytics, geographic_distribution};
pub use neighbor::{NeighborRecord, NeighborTable};
pub use rssi::RssiRing;
