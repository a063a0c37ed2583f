//! Engine configuration.
//!
//! A plain, `Default`-able data struct — no capabilities live here. Packet
//! sink, logger, and metrics sink are supplied separately to
//! [`crate::engine::Engine::new`] so they can be swapped independently of the
//! numeric/timing configuration.

/// Cycle counts at which candidacy gates relax (spec.md §4.E, §9): the
/// minimum direct-neighbor count required to become a candidate starts at
/// `initial` and is relaxed to `relaxed` then `final_` after that many
/// cycles pass without hearing any candidate. Kept as configuration rather
/// than hardcoded constants, per spec.md's explicit instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
pub struct CandidacyRelaxation {
    pub initial: u32,
    pub relaxed: u32,
    pub final_: u32,
}

impl Default for CandidacyRelaxation {
    fn default() -> Self {
        Self {
            initial: 6,
            relaxed: 3,
            final_: 1,
        }
    }
}

/// Weights applied to the normalized connectivity metrics when computing the
/// composite candidacy score (spec.md §4.E). Defaults to an equal 0.25 each.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
pub struct ScoreWeights {
    pub w_direct: f64,
    pub w_cn: f64,
    pub w_geo: f64,
    pub w_fwd: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            w_direct: 0.25,
            w_cn: 0.25,
            w_geo: 0.25,
            w_fwd: 0.25,
        }
    }
}

/// Engine-wide configuration, recognized options mirror spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
pub struct EngineConfig {
    pub node_id: u32,
    pub slot_duration_ms: u32,
    pub initial_ttl: u8,
    pub proximity_threshold_m: f64,
    pub cluster_capacity: u32,
    pub noisy_window_duration_ms: u32,
    pub dynamic_candidacy_cycles: CandidacyRelaxation,
    pub score_weights: ScoreWeights,
    /// Neighbor-record staleness timeout (spec.md §3: "configured timeout"),
    /// not enumerated in spec.md §6's option list but required by the
    /// invariant it states; added here rather than hardcoded.
    pub neighbor_timeout_ms: u32,
    /// RSSI sample max age (spec.md §3: "configured max age"), same status
    /// as `neighbor_timeout_ms`.
    pub rssi_max_age_ms: u32,
    /// Dedup-cache fingerprint retention window, fed to
    /// `MessageQueue::cleanup` at the end of every cycle (spec.md §4.C:
    /// "`cleanup(max_age)` prunes dedup entries older than `max_age`").
    pub dedup_max_age_ms: u32,
}

impl EngineConfig {
    /// Configuration with every default applied except `node_id`, which the
    /// host must always supply (it has no sensible default).
    pub fn new(node_id: u32) -> Self {
        Self {
            node_id,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            slot_duration_ms: 100,
            initial_ttl: 10,
            proximity_threshold_m: 10.0,
            cluster_capacity: crate::CLUSTER_CAPACITY,
            noisy_window_duration_ms: 5_000,
            dynamic_candidacy_cycles: CandidacyRelaxation::default(),
            score_weights: ScoreWeights::default(),
            neighbor_timeout_ms: 30_000,
            rssi_max_age_ms: 10_000,
            dedup_max_age_ms: 60_000,
        }
    }
}

#[cfg(feature = "std")]
impl EngineConfig {
    /// Load configuration from a TOML file, the way the simulator's
    /// `ControlConfig::load` reads a scene's sibling config file.
    pub fn load_toml(path: &std::path::Path) -> Result<Self, alloc_free_string::ConfigLoadError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| alloc_free_string::ConfigLoadError::Read)?;
        toml::from_str(&content).map_err(|_| alloc_free_string::ConfigLoadError::Parse)
    }
}

#[cfg(feature = "std")]
mod alloc_free_string {
    /// Narrow error type for [`super::EngineConfig::load_toml`]; kept separate
    /// from [`crate::error::CoreError`] since this is a host-convenience path
    /// that never runs on the embedded target.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ConfigLoadError {
        Read,
        Parse,
    }

    impl core::fmt::Display for ConfigLoadError {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            match self {
                ConfigLoadError::Read => f.write_str("failed to read config file"),
                ConfigLoadError::Parse => f.write_str("failed to parse config file as TOML"),
            }
        }
    }

    impl std::error::Error for ConfigLoadError {}
}
