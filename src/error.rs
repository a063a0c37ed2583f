//! Error kinds reported by public operations.
//!
//! Internal rejections (forwarding drops, dedup hits, TTL expiries, queue
//! overflows) are *not* errors: they are recorded in [`crate::engine::StatsSnapshot`]
//! counters and surfaced through `get_stats`. The kinds here are returned only
//! when a public operation itself cannot complete as requested.

use core::fmt;

/// Result alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error kinds a public operation can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// A caller-supplied buffer was too small to hold a serialized packet.
    BufferTooSmall,
    /// Decoded data did not form a valid packet (bad length, out-of-range field).
    Invalid,
    /// A fixed-capacity table (queue, neighbor table, dedup cache) is at capacity.
    Full,
    /// The queue rejected a packet already seen via the dedup cache.
    Duplicate,
    /// The queue rejected a packet whose path already contains the local node.
    Loop,
    /// The requested node-state transition is not in the state table.
    InvalidTransition,
    /// An operation was called on an engine that has not been `init`-ed.
    NotInitialized,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CoreError::BufferTooSmall => "buffer too small for serialized packet",
            CoreError::Invalid => "invalid packet encoding",
            CoreError::Full => "fixed-capacity table is full",
            CoreError::Duplicate => "packet already seen (dedup cache hit)",
            CoreError::Loop => "packet path already contains receiver",
            CoreError::InvalidTransition => "state transition not permitted",
            CoreError::NotInitialized => "engine not initialized",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoreError {}
