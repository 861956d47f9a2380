//! Wire records and integrity checking.
//!
//! Two record types cross the wire, one JSON record per datagram:
//! [`Packet`] (probe → daemon) and [`Ack`] (daemon → probe).
//!
//! The checksum is a hex-encoded BLAKE3 digest over the canonical encoding
//!
//! ```text
//!   id (u32, big-endian) || timestamp (u64, big-endian) || payload bytes
//! ```
//!
//! with the checksum field itself excluded from the digest input. Probe and
//! daemon must agree on this encoding exactly, or every packet fails
//! validation.

use serde::{Deserialize, Serialize};

/// Nanoseconds since the Unix epoch, right now.
pub fn unix_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// One unit of test traffic: identity, capture instant, random payload,
/// and an integrity digest over the three.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Dense, monotonically increasing id, unique per run, starting at 1.
    pub id: u32,

    /// Capture instant in nanoseconds since the Unix epoch, stamped before
    /// the checksum is computed.
    pub timestamp: u64,

    /// Random payload. Hex-encoded on the wire so large payloads stay
    /// within a single datagram.
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,

    /// Hex-encoded BLAKE3 digest of the canonical encoding.
    pub checksum: String,
}

impl Packet {
    /// Build a packet and seal it: the checksum is computed once, here.
    pub fn new(id: u32, timestamp: u64, payload: Vec<u8>) -> Self {
        let mut packet = Self {
            id,
            timestamp,
            payload,
            checksum: String::new(),
        };
        packet.checksum = packet.compute_checksum();
        packet
    }

    /// Digest over `id || timestamp || payload`, checksum field excluded.
    pub fn compute_checksum(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.id.to_be_bytes());
        hasher.update(&self.timestamp.to_be_bytes());
        hasher.update(&self.payload);
        hex::encode(hasher.finalize().as_bytes())
    }

    /// True iff the stored checksum matches a fresh digest of the fields.
    pub fn is_valid(&self) -> bool {
        self.compute_checksum() == self.checksum
    }

    /// Serialize to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("packet serialization failed")
    }

    /// Deserialize from a received datagram.
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// The daemon's verdict on one packet, returned to the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// The packet id being acknowledged.
    pub id: u32,

    /// True iff the recomputed checksum matched the one on the packet.
    pub ok: bool,

    /// Instant the daemon observed the packet, nanoseconds since epoch.
    pub received_at: u64,
}

impl Ack {
    /// Serialize to bytes for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("ack serialization failed")
    }

    /// Deserialize from a received datagram.
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
