//! TTL gate, picky-forwarding probability, and GPS proximity filter
//! (spec.md §4.D).

use crate::packet::{Gps, Packet};

/// Maps a mean RSSI (dBm) to a crowding factor in `[0, 1]`: clamp to
/// `[-90, -40]`, then linearly map onto `[0, 1]`. `None` (no samples) yields
/// `0.0` (no evidence of crowding).
pub fn crowding_from_mean(mean_rssi: Option<f64>) -> f64 {
    match mean_rssi {
        None => 0.0,
        Some(mean) => {
            let clamped = mean.clamp(-90.0, -40.0);
            (clamped + 90.0) / 50.0
        }
    }
}

/// Derives a crowding factor in `[0, 1]` directly from a set of RSSI samples
/// (dBm). See [`crowding_from_mean`] for the mapping.
pub fn crowding_from_rssi(samples: &[i8]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: i64 = samples.iter().map(|&r| r as i64).sum();
    let mean = sum as f64 / samples.len() as f64;
    crowding_from_mean(Some(mean))
}

/// Decides whether `packet` should be forwarded from this node, applying
/// three checks in order:
///
/// 1. TTL must be `> 0`.
/// 2. `rng_value < (1 - crowding)` — the picky-forwarding probability; denser
///    local radio traffic makes forwarding less likely.
/// 3. If the packet carries a GPS fix and `own_location` is known, the two
///    must be strictly farther apart than `proximity_threshold_m` (a packet
///    that already reached a near-identical location adds little value).
///    Skipped entirely when the packet has no GPS fix.
pub fn should_forward(
    packet: &Packet,
    own_location: Option<Gps>,
    crowding: f64,
    proximity_threshold_m: f64,
    rng_value: f64,
) -> bool {
    if packet.ttl == 0 {
        return false;
    }

    if rng_value >= (1.0 - crowding) {
        return false;
    }

    if let (Some(packet_gps), Some(own)) = (packet.gps, own_location) {
        let distance = packet_gps.distance_to(&own);
        if distance <= proximity_threshold_m {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MessageType;

    fn packet_with_ttl(ttl: u8) -> Packet {
        Packet::new(MessageType::Discovery, 1, ttl)
    }

    #[test]
    fn rejects_zero_ttl() {
        let p = packet_with_ttl(0);
        assert!(!should_forward(&p, None, 0.0, 10.0, 0.0));
    }

    #[test]
    fn rejects_on_picky_forwarding_draw() {
        let p = packet_with_ttl(5);
        // crowding 0.5 -> threshold 0.5; draw 0.9 fails.
        assert!(!should_forward(&p, None, 0.5, 10.0, 0.9));
        // draw 0.1 passes.
        assert!(should_forward(&p, None, 0.5, 10.0, 0.1));
    }

    #[test]
    fn rejects_when_too_close_with_gps() {
        let mut p = packet_with_ttl(5);
        p.set_gps(5.0, 0.0, 0.0);
        let own = Gps::new(0.0, 0.0, 0.0);
        assert!(!should_forward(&p, Some(own), 0.0, 10.0, 0.0));
    }

    #[test]
    fn accepts_when_far_enough_with_gps() {
        let mut p = packet_with_ttl(5);
        p.set_gps(30.0, 0.0, 0.0);
        let own = Gps::new(0.0, 0.0, 0.0);
        assert!(should_forward(&p, Some(own), 0.0, 10.0, 0.0));
    }

    #[test]
    fn skips_proximity_check_without_gps() {
        let p = packet_with_ttl(5);
        let own = Gps::new(0.0, 0.0, 0.0);
        assert!(should_forward(&p, Some(own), 0.0, 10.0, 0.0));
    }

    #[test]
    fn crowding_from_empty_samples_is_zero() {
        assert_eq!(crowding_from_rssi(&[]), 0.0);
    }

    #[test]
    fn crowding_clamps_and_maps_to_unit_range() {
        assert_eq!(crowding_from_rssi(&[-40, -40]), 1.0);
        assert_eq!(crowding_from_rssi(&[-90, -90]), 0.0);
        assert_eq!(crowding_from_rssi(&[-30, -30]), 1.0); // clamps above -40
        assert_eq!(crowding_from_rssi(&[-100, -100]), 0.0); // clamps below -90
    }
}
