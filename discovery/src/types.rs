use std::collections::HashMap;

use net_core::{Multiaddr, PeerId, Timestamp};
use serde::{Deserialize, Serialize};

/// A single known address for a peer, with dial history (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub address: Multiaddr,
    pub added_at: Timestamp,
    pub last_seen: Timestamp,
    pub last_success: Option<Timestamp>,
    pub last_failure: Option<Timestamp>,
    pub failure_count: u32,
    pub expires_at: Option<Timestamp>,
}

impl AddressRecord {
    pub fn new(address: Multiaddr, now: Timestamp, expires_at: Option<Timestamp>) -> Self {
        Self {
            address,
            added_at: now,
            last_seen: now,
            last_success: None,
            last_failure: None,
            failure_count: 0,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.map(|e| now >= e).unwrap_or(false)
    }

    /// Extend this record's expiry, but only if the new one is later, and
    /// `None` (permanent) always wins (spec §8 invariant 7).
    pub fn extend_ttl(&mut self, now: Timestamp, expires_at: Option<Timestamp>) {
        self.last_seen = now;
        match (self.expires_at, expires_at) {
            (_, None) => self.expires_at = None,
            (None, Some(_)) => {}
            (Some(current), Some(new)) if new > current => self.expires_at = Some(new),
            _ => {}
        }
    }

    pub fn record_success(&mut self, now: Timestamp) {
        self.last_seen = now;
        self.last_success = Some(now);
        self.failure_count = 0;
    }

    pub fn record_failure(&mut self, now: Timestamp) {
        self.last_failure = Some(now);
        self.failure_count += 1;
    }
}

/// A tracked peer and all of its known addresses (spec §3).
#[derive(Debug, Clone, Default)]
pub struct PeerRecord {
    pub peer_id: Option<PeerId>,
    pub addresses: HashMap<Multiaddr, AddressRecord>,
    pub added_at: Option<Timestamp>,
    pub last_seen: Option<Timestamp>,
}

impl PeerRecord {
    pub fn touch(&mut self, now: Timestamp) {
        self.added_at.get_or_insert(now);
        self.last_seen = Some(now);
    }
}

/// A signed, monotonically-versioned peer record exchanged between nodes
/// (spec §3, §4.5's `CertifiedAddressBook`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertifiedPeerRecord {
    pub peer_id: PeerId,
    pub addresses: Vec<Multiaddr>,
    pub seq: u64,
}

impl net_core::Payload for CertifiedPeerRecord {
    fn payload_type() -> &'static str {
        "libp2p/peer-record"
    }

    fn check_signing_key(&self, key: &net_core::PublicKey) -> bool {
        key.to_peer_id() == self.peer_id
    }
}
