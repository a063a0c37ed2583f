//! Portable protocol core for a BLE mesh discovery and clusterhead-election engine.
//!
//! A single [`engine::Engine`] instance runs a deterministic, single-threaded
//! state machine: it schedules a four-slot discovery cycle, transmits and
//! receives discovery/election packets, measures radio crowding from RSSI
//! samples, decides when to become a clusterhead candidate or renounce, caps
//! cluster size via a predicted-devices-so-far estimate, and resolves
//! conflicts between competing candidates.
//!
//! The core owns no radio, timer, RNG or logging implementation: all of those
//! effects are supplied by the host through the traits in [`platform`] and the
//! deterministic generator in [`rng`]. `tick`/`receive` are the only entry
//! points that advance state; nothing in this crate spawns a thread, blocks,
//! or allocates after [`engine::Engine::new`] returns.
#![cfg_attr(not(feature = "std"), no_std)]

pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod forwarding;
pub mod packet;
pub mod platform;
pub mod queue;
pub mod rng;
pub mod timing;

pub use config::{CandidacyRelaxation, EngineConfig, ScoreWeights};
pub use engine::{Engine, NodeSnapshot, NodeState, ReceiveOutcome, StatsSnapshot};
pub use error::{CoreError, CoreResult};
pub use packet::{ElectionExtension, Gps, MessageType, Packet};
pub use platform::{LogLevel, Logger, MetricsSink, NullLogger, PacketSink};

/// Maximum number of hops a packet's path may record before it is considered full.
pub const MAX_PATH_LEN: usize = 50;
/// Neighbor table / cluster-capacity constant (devices per cluster).
pub const CLUSTER_CAPACITY: u32 = 150;
/// Same value as [`CLUSTER_CAPACITY`], as a `usize` for container generics.
pub const NEIGHBOR_CAPACITY: usize = 150;
/// Capacity of the RSSI sample ring per node.
pub const RSSI_RING_CAPACITY: usize = 100;
/// Capacity of the outbound message queue.
pub const QUEUE_CAPACITY: usize = 100;
/// Capacity of the dedup fingerprint cache.
pub const DEDUP_CACHE_CAPACITY: usize = 200;
