//! Stochastic slot scheduler: two timing profiles, a per-instance
//! deterministic RNG, and a crowding-adaptive TX budget.
//!
//! Different nodes are seeded with different values so their transmission
//! slots desynchronize; the TX budget adapts inversely to crowding so dense
//! deployments back off and reduce interference.

use crate::rng::Lcg32;

/// A sentinel passed to [`BroadcastTiming::init`] meaning "use the profile's
/// default for this field".
pub const AUTO: u32 = u32::MAX;

/// The two timing regimes a node runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Active only during the initial noisy-broadcast window: dense slotting,
    /// low listen ratio, no TX budget cap.
    Noisy,
    /// Steady-state regime once the noisy window closes.
    Neighbor,
}

impl Profile {
    fn default_num_slots(self) -> u32 {
        match self {
            Profile::Noisy => 10,
            Profile::Neighbor => 200,
        }
    }

    fn default_listen_ratio(self) -> f64 {
        match self {
            Profile::Noisy => 0.10,
            Profile::Neighbor => 0.90,
        }
    }
}

const MIN_TX_BUDGET: u32 = 3;
const MAX_TX_BUDGET: u32 = 15;
const DEFAULT_RETRY_CAP: u32 = 3;

fn neighbor_tx_budget(crowding: f64) -> u32 {
    let raw = 3.0 + (1.0 - crowding) * 12.0;
    raw.clamp(MIN_TX_BUDGET as f64, MAX_TX_BUDGET as f64).round() as u32
}

/// Per-instance broadcast-timing state.
pub struct BroadcastTiming {
    profile: Profile,
    num_slots: u32,
    slot_ms: u32,
    listen_ratio: f64,
    rng: Lcg32,

    current_slot: u32,
    cycle_count: u64,

    tx_budget: u32,
    tx_used_this_cycle: u32,

    retry_count: u32,
    retry_cap: u32,
    successes: u64,
    attempts: u64,
}

impl BroadcastTiming {
    /// `num_slots`/`slot_ms`/`listen_ratio` of [`AUTO`] fall back to the
    /// profile's defaults.
    pub fn init(profile: Profile, num_slots: u32, slot_ms: u32, listen_ratio: f64) -> Self {
        let num_slots = if num_slots == AUTO {
            profile.default_num_slots()
        } else {
            num_slots
        };
        let listen_ratio = if listen_ratio < 0.0 {
            profile.default_listen_ratio()
        } else {
            listen_ratio
        };
        let slot_ms = if slot_ms == AUTO { 100 } else { slot_ms };

        let tx_budget = match profile {
            Profile::Noisy => u32::MAX,
            Profile::Neighbor => neighbor_tx_budget(0.0),
        };

        Self {
            profile,
            num_slots,
            slot_ms,
            listen_ratio,
            rng: Lcg32::new(0),
            current_slot: 0,
            cycle_count: 0,
            tx_budget,
            tx_used_this_cycle: 0,
            retry_count: 0,
            retry_cap: DEFAULT_RETRY_CAP,
            successes: 0,
            attempts: 0,
        }
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.rng.set_seed(seed);
    }

    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = profile;
        self.num_slots = profile.default_num_slots();
        self.listen_ratio = profile.default_listen_ratio();
        self.current_slot = 0;
        self.tx_used_this_cycle = 0;
        self.tx_budget = match profile {
            Profile::Noisy => u32::MAX,
            Profile::Neighbor => neighbor_tx_budget(0.0),
        };
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Recomputes the neighbor-profile TX budget from the current crowding
    /// factor and resets this cycle's TX count. No-op (beyond storing the
    /// factor) while in the noisy profile, which has no budget.
    pub fn set_crowding(&mut self, crowding: f64) {
        self.tx_used_this_cycle = 0;
        if self.profile == Profile::Neighbor {
            self.tx_budget = neighbor_tx_budget(crowding);
        }
    }

    /// Advances to the next slot, returning `true` iff it is a TX slot: a
    /// pseudo-random draw falls under `1 - listen_ratio` *and* the cycle's TX
    /// budget is not yet exhausted. An exhausted budget degrades the
    /// remaining slots in the cycle to listen slots automatically; the
    /// budget resets at the next slot-0 boundary.
    pub fn advance_slot(&mut self) -> bool {
        self.current_slot += 1;
        if self.current_slot >= self.num_slots {
            self.current_slot = 0;
            self.cycle_count += 1;
            self.tx_used_this_cycle = 0;
        }

        if self.tx_used_this_cycle >= self.tx_budget {
            return false;
        }

        let draw = self.rng.next_f64();
        let is_tx = draw >= self.listen_ratio;
        if is_tx {
            self.tx_used_this_cycle += 1;
        }
        is_tx
    }

    pub fn current_slot(&self) -> u32 {
        self.current_slot
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn tx_budget(&self) -> u32 {
        self.tx_budget
    }

    pub fn measured_listen_ratio(&self) -> f64 {
        self.listen_ratio
    }

    /// Clears the retry counter after a successful transmission.
    pub fn record_success(&mut self) {
        self.retry_count = 0;
        self.successes += 1;
        self.attempts += 1;
    }

    /// Increments the retry counter after a failed transmission. Returns
    /// `true` if still under the retry cap (caller should retry), `false` if
    /// the cap was reached (counter is reset and the caller should give up).
    pub fn record_failure(&mut self) -> bool {
        self.attempts += 1;
        self.retry_count += 1;
        if self.retry_count < self.retry_cap {
            true
        } else {
            self.retry_count = 0;
            false
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            1.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }

    pub fn slot_ms(&self) -> u32 {
        self.slot_ms
    }

    /// Draws the next uniform `[0, 1)` value from this timing's RNG, used by
    /// the forwarding filter's picky-forwarding probability so the whole
    /// engine shares a single deterministic generator.
    pub fn next_unit_draw(&mut self) -> f64 {
        self.rng.next_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_budget_clamps_to_range() {
        assert_eq!(neighbor_tx_budget(0.0), 15);
        assert_eq!(neighbor_tx_budget(1.0), 3);
        assert_eq!(neighbor_tx_budget(2.0), 3);
    }

    #[test]
    fn noisy_profile_has_unbounded_budget() {
        let mut t = BroadcastTiming::init(Profile::Noisy, AUTO, AUTO, -1.0);
        assert_eq!(t.tx_budget(), u32::MAX);
        for _ in 0..100 {
            t.advance_slot();
        }
    }

    #[test]
    fn auto_defaults_apply_per_profile() {
        let noisy = BroadcastTiming::init(Profile::Noisy, AUTO, AUTO, -1.0);
        assert_eq!(noisy.num_slots, 10);
        assert_eq!(noisy.listen_ratio, 0.10);

        let neighbor = BroadcastTiming::init(Profile::Neighbor, AUTO, AUTO, -1.0);
        assert_eq!(neighbor.num_slots, 200);
        assert_eq!(neighbor.listen_ratio, 0.90);
    }

    #[test]
    fn same_seed_same_tx_sequence() {
        let mut a = BroadcastTiming::init(Profile::Neighbor, AUTO, AUTO, -1.0);
        let mut b = BroadcastTiming::init(Profile::Neighbor, AUTO, AUTO, -1.0);
        a.set_seed(999);
        b.set_seed(999);
        for _ in 0..50 {
            assert_eq!(a.advance_slot(), b.advance_slot());
        }
    }

    #[test]
    fn budget_exhaustion_forces_listen_slots() {
        let mut t = BroadcastTiming::init(Profile::Neighbor, 20, AUTO, 0.0);
        t.set_crowding(1.0); // budget = 3
        let tx_count = (0..19).filter(|_| t.advance_slot()).count();
        assert!(tx_count <= 3);
    }

    #[test]
    fn record_failure_respects_retry_cap() {
        let mut t = BroadcastTiming::init(Profile::Neighbor, AUTO, AUTO, -1.0);
        assert!(t.record_failure());
        assert!(t.record_failure());
        assert!(!t.record_failure());
    }

    #[test]
    fn record_success_resets_retry_counter() {
        let mut t = BroadcastTiming::init(Profile::Neighbor, AUTO, AUTO, -1.0);
        t.record_failure();
        t.record_failure();
        t.record_success();
        assert!(t.record_failure());
    }
}
