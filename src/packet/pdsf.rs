//! Predicted-Devices-So-Far (PDSF) math and candidacy scoring.
//!
//! PDSF is the cumulative estimator of how many devices an election
//! announcement has reached (glossary: `PDSF = sum_i Pi_i(x_i)`); Last-Pi is
//! the per-hop record of direct-neighbor counts that feeds it without
//! recomputing earlier hops. A hop's direct count only contributes to PDSF
//! the first time that exact count is seen in the history — this is the
//! "duplicates excluded" rule spec.md calls for, and keeps a node that
//! reports the same local density twice (e.g. an echoed rebroadcast) from
//! inflating the estimate.

use heapless::Vec;

use crate::MAX_PATH_LEN;
use crate::config::ScoreWeights;

/// Applies one hop's contribution to PDSF and returns the updated value plus
/// the appended Last-Pi history (bounded to [`MAX_PATH_LEN`], matching the
/// path-length invariant on election packets).
pub fn calculate_pdsf_update(
    prev_pdsf: u32,
    last_pi_history: &[u32],
    direct_count_here: u32,
) -> (u32, Vec<u32, MAX_PATH_LEN>) {
    let mut history: Vec<u32, MAX_PATH_LEN> = Vec::new();
    for &v in last_pi_history {
        // `push` cannot fail here: the input history is itself bounded to
        // MAX_PATH_LEN by the invariant it was built under.
        let _ = history.push(v);
    }

    let contribution = if last_pi_history.contains(&direct_count_here) {
        0
    } else {
        direct_count_here
    };
    let new_pdsf = prev_pdsf.saturating_add(contribution);

    // An already-full history (at MAX_PATH_LEN) simply stops recording new
    // hops; PDSF still accumulates.
    let _ = history.push(direct_count_here);

    (new_pdsf, history)
}

/// Computes the composite candidacy score in `[0, 1]` from the four
/// connectivity metrics (spec.md §4.A/§4.E). `crowding` is used to derive the
/// connection:noise ratio internally (`direct / (1 + crowding)`), then each
/// metric is normalized and combined with `weights`.
pub fn calculate_score(
    direct: u32,
    crowding: f64,
    geo: f64,
    forwarding_rate: f64,
    weights: &ScoreWeights,
) -> f64 {
    let connection_noise = direct as f64 / (1.0 + crowding);
    let direct_norm = (direct as f64 / 30.0).clamp(0.0, 1.0);
    let cn_norm = (connection_noise / 10.0).clamp(0.0, 1.0);
    let geo_norm = geo.clamp(0.0, 1.0);
    let fwd_norm = forwarding_rate.clamp(0.0, 1.0);

    let score = weights.w_direct * direct_norm
        + weights.w_cn * cn_norm
        + weights.w_geo * geo_norm
        + weights.w_fwd * fwd_norm;

    score.clamp(0.0, 1.0)
}
