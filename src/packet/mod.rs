//! Discovery + election wire format: the packet value type and its
//! TTL/path/GPS operations. Serialization lives in [`wire`]; PDSF/score math
//! in [`pdsf`]; hashing in [`hash`].

mod hash;
mod pdsf;
mod wire;

pub use hash::generate_hash;
pub use pdsf::{calculate_pdsf_update, calculate_score};
pub use wire::WIRE_MIN_DISCOVERY_LEN;

use heapless::Vec;

use crate::MAX_PATH_LEN;
use crate::error::{CoreError, CoreResult};

/// Discriminant for the three packet kinds the protocol exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Discovery,
    Election,
    Renouncement,
}

impl MessageType {
    /// Election and renouncement packets carry an [`ElectionExtension`];
    /// plain discovery packets do not.
    pub fn carries_election_extension(self) -> bool {
        matches!(self, MessageType::Election | MessageType::Renouncement)
    }

    fn to_wire(self) -> u8 {
        match self {
            MessageType::Discovery => 0,
            MessageType::Election => 1,
            MessageType::Renouncement => 2,
        }
    }

    fn from_wire(byte: u8) -> CoreResult<Self> {
        match byte {
            0 => Ok(MessageType::Discovery),
            1 => Ok(MessageType::Election),
            2 => Ok(MessageType::Renouncement),
            _ => Err(CoreError::Invalid),
        }
    }
}

/// Three-coordinate GPS fix. Presence of the location itself is modeled with
/// `Option<Gps>` on [`Packet`] rather than a separate availability flag, the
/// flag only exists on the wire to save the 24-byte block when absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gps {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Gps {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another fix.
    pub fn distance_to(&self, other: &Gps) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Election/renouncement-only fields (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct ElectionExtension {
    pub class_id: u16,
    pub pdsf: u32,
    /// Per-hop direct-neighbor counts; length must equal `Packet::path`'s length.
    pub last_pi_history: Vec<u32, MAX_PATH_LEN>,
    pub score: f64,
    pub hash: u32,
}

impl Default for ElectionExtension {
    fn default() -> Self {
        Self {
            class_id: 0,
            pdsf: 0,
            last_pi_history: Vec::new(),
            score: 0.0,
            hash: 0,
        }
    }
}

/// A discovery, election, or renouncement packet.
///
/// Invariants (enforced by the methods below, never by direct field
/// mutation from outside this module's API surface): `path.len() <=
/// MAX_PATH_LEN` with no duplicate entries; for election/renouncement
/// packets `election.last_pi_history.len() == path.len()`; TTL only ever
/// decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub message_type: MessageType,
    pub sender_id: u32,
    pub ttl: u8,
    pub path: Vec<u32, MAX_PATH_LEN>,
    pub gps: Option<Gps>,
    pub election: Option<ElectionExtension>,
}

impl Packet {
    /// Builds a new packet of the given type. Election/renouncement packets
    /// are given a default (empty) extension; callers fill it in via
    /// [`Packet::election`] before transmission.
    pub fn new(message_type: MessageType, sender_id: u32, ttl: u8) -> Self {
        let election = message_type
            .carries_election_extension()
            .then(ElectionExtension::default);
        Self {
            message_type,
            sender_id,
            ttl,
            path: Vec::new(),
            gps: None,
            election,
        }
    }

    pub fn set_gps(&mut self, x: f64, y: f64, z: f64) {
        self.gps = Some(Gps::new(x, y, z));
    }

    pub fn clear_gps(&mut self) {
        self.gps = None;
    }

    /// Returns `true` iff TTL was `> 0` before the call, decrementing it by
    /// one. Never underflows: calling this at TTL `0` is a no-op that
    /// returns `false`.
    pub fn decrement_ttl(&mut self) -> bool {
        if self.ttl == 0 {
            return false;
        }
        self.ttl -= 1;
        true
    }

    pub fn is_in_path(&self, id: u32) -> bool {
        self.path.contains(&id)
    }

    /// Appends `id` to the path. Returns `false` (and leaves the packet
    /// unchanged) if the path is already full or `id` is already present —
    /// appending it again would introduce a loop.
    pub fn append_to_path(&mut self, id: u32) -> bool {
        if self.is_in_path(id) {
            return false;
        }
        self.path.push(id).is_ok()
    }

    /// Applies one hop's PDSF update to this packet's election extension, if
    /// it has one. No-op for plain discovery packets.
    pub fn update_pdsf(&mut self, direct_count_here: u32) {
        if let Some(ext) = &mut self.election {
            let (new_pdsf, new_history) =
                calculate_pdsf_update(ext.pdsf, &ext.last_pi_history, direct_count_here);
            ext.pdsf = new_pdsf;
            ext.last_pi_history = new_history;
        }
    }

    /// The originator's direct-neighbor count: the first element of the
    /// Last-Pi history, used in conflict resolution (spec.md §4.E).
    pub fn originator_direct_count(&self) -> Option<u32> {
        self.election
            .as_ref()
            .and_then(|ext| ext.last_pi_history.first().copied())
    }

    pub fn serialize(&self, buf: &mut [u8]) -> CoreResult<usize> {
        wire::serialize(self, buf)
    }

    pub fn deserialize(buf: &[u8]) -> CoreResult<Self> {
        wire::deserialize(buf)
    }
}
