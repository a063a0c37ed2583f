//! Candidacy gate: when a node is allowed to declare itself a clusterhead
//! candidate (spec.md §4.E).

use super::metrics::Metrics;
use crate::config::CandidacyRelaxation;

const MID_TIER_MIN_DIRECT: u32 = 3;
const BASE_MIN_DIRECT: u32 = 10;
const MIN_CONNECTION_NOISE: f64 = 5.0;
const MIN_GEO_DISTRIBUTION: f64 = 0.3;

/// The minimum direct-neighbor count required to become a candidate,
/// relaxing over time without hearing any other candidate.
///
/// `relaxation.initial` and `relaxation.relaxed` are cumulative cycle counts
/// (configurable cadence, per spec.md's explicit instruction not to hardcode
/// it); the base (10) and mid (3) tier minimums are fixed by spec.md's
/// prose, and `relaxation.final_` supplies the terminal minimum (spec.md
/// says "then to 1", which is this crate's default for `final_`).
pub fn dynamic_min_direct(relaxation: &CandidacyRelaxation, cycles_since_heard: u32) -> u32 {
    let relaxed_at = relaxation.initial;
    let final_at = relaxation.initial.saturating_add(relaxation.relaxed);

    if cycles_since_heard >= final_at {
        relaxation.final_
    } else if cycles_since_heard >= relaxed_at {
        MID_TIER_MIN_DIRECT
    } else {
        BASE_MIN_DIRECT
    }
}

/// `true` iff every candidacy gate passes: direct count at or above the
/// dynamically-relaxed minimum, connection:noise ratio at least 5.0,
/// geographic distribution at least 0.3, and at least one message forwarded.
pub fn should_become_candidate(
    metrics: &Metrics,
    relaxation: &CandidacyRelaxation,
    cycles_since_heard: u32,
    messages_forwarded: u32,
) -> bool {
    let min_direct = dynamic_min_direct(relaxation, cycles_since_heard);

    metrics.direct_count >= min_direct
        && metrics.connection_noise_ratio >= MIN_CONNECTION_NOISE
        && metrics.geo_distribution >= MIN_GEO_DISTRIBUTION
        && messages_forwarded > 0
}
