use hashlink::LruCache;
use net_core::{Multiaddr, PeerId, Timestamp};
use tokio::sync::broadcast;
use tracing::debug;

use crate::events::PeerStoreEvent;
use crate::types::{AddressRecord, PeerRecord};

/// Bounds and defaults for [`MemoryPeerStore`] (spec §4.5, §8 invariant 9).
#[derive(Debug, Clone)]
pub struct PeerStoreConfig {
    pub max_peers: usize,
    pub max_addresses_per_peer: usize,
    pub default_ttl: Option<std::time::Duration>,
}

impl Default for PeerStoreConfig {
    fn default() -> Self {
        Self {
            max_peers: 10_000,
            max_addresses_per_peer: 32,
            default_ttl: None,
        }
    }
}

/// In-memory address book keyed by peer, with LRU eviction over peers and
/// a per-peer address cap. The least-recently-touched peer is evicted when
/// a new peer would exceed `max_peers` (spec §8 invariant 9).
pub struct MemoryPeerStore {
    config: PeerStoreConfig,
    peers: LruCache<PeerId, PeerRecord>,
    event_tx: broadcast::Sender<PeerStoreEvent>,
}

impl MemoryPeerStore {
    pub fn new(config: PeerStoreConfig, event_buffer: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));
        Self {
            peers: LruCache::new(config.max_peers.max(1)),
            config,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PeerStoreEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: PeerStoreEvent) {
        // No subscribers is a normal state, not an error.
        let _ = self.event_tx.send(event);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn contains_peer(&mut self, peer: &PeerId) -> bool {
        self.peers.contains_key(peer)
    }

    /// Iterate all tracked peers without disturbing LRU order (used for
    /// snapshotting, not general traversal).
    pub fn iter_peers(&self) -> impl Iterator<Item = (&PeerId, &PeerRecord)> {
        self.peers.iter()
    }

    pub fn addresses(&mut self, peer: &PeerId) -> Vec<AddressRecord> {
        self.peers
            .get(peer)
            .map(|r| r.addresses.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Insert or refresh an address for `peer`. Evicts the least-recently
    /// touched peer first if this would introduce a peer beyond `max_peers`
    /// (spec §8 invariant 9, scenario #6).
    pub fn add_address(
        &mut self,
        peer: PeerId,
        address: Multiaddr,
        now: Timestamp,
        ttl: Option<std::time::Duration>,
    ) {
        if !self.peers.contains_key(&peer) && self.peers.len() >= self.config.max_peers {
            if let Some((evicted, _)) = self.peers.remove_lru() {
                debug!(peer = %evicted, "evicting least-recently-used peer");
                self.emit(PeerStoreEvent::PeerRemoved { peer: evicted });
            }
        }

        if !self.peers.contains_key(&peer) {
            self.peers.insert(peer, PeerRecord::default());
        }
        let record = self.peers.get_mut(&peer).expect("just inserted");
        record.peer_id.get_or_insert(peer);
        record.touch(now);

        let expires_at = ttl
            .map(|d| now + d)
            .or_else(|| self.config.default_ttl.map(|d| now + d));

        if let Some(existing) = record.addresses.get_mut(&address) {
            existing.extend_ttl(now, expires_at);
            self.emit(PeerStoreEvent::AddressUpdated {
                peer,
                address: address.clone(),
            });
            return;
        }

        if record.addresses.len() >= self.config.max_addresses_per_peer {
            if let Some(oldest) = record
                .addresses
                .values()
                .min_by_key(|a| a.last_seen)
                .map(|a| a.address.clone())
            {
                record.addresses.remove(&oldest);
                self.emit(PeerStoreEvent::AddressRemoved {
                    peer,
                    address: oldest,
                });
            }
        }

        record
            .addresses
            .insert(address.clone(), AddressRecord::new(address.clone(), now, expires_at));
        self.emit(PeerStoreEvent::AddressAdded { peer, address });
    }

    pub fn remove_address(&mut self, peer: &PeerId, address: &Multiaddr) {
        if let Some(record) = self.peers.get_mut(peer) {
            if record.addresses.remove(address).is_some() {
                self.emit(PeerStoreEvent::AddressRemoved {
                    peer: *peer,
                    address: address.clone(),
                });
            }
        }
    }

    pub fn remove_peer(&mut self, peer: &PeerId) {
        if self.peers.remove(peer).is_some() {
            self.emit(PeerStoreEvent::PeerRemoved { peer: *peer });
        }
    }

    pub fn record_dial_success(&mut self, peer: &PeerId, address: &Multiaddr, now: Timestamp) {
        if let Some(record) = self.peers.get_mut(peer) {
            if let Some(addr) = record.addresses.get_mut(address) {
                addr.record_success(now);
                self.emit(PeerStoreEvent::AddressUpdated {
                    peer: *peer,
                    address: address.clone(),
                });
            }
        }
    }

    pub fn record_dial_failure(&mut self, peer: &PeerId, address: &Multiaddr, now: Timestamp) {
        if let Some(record) = self.peers.get_mut(peer) {
            if let Some(addr) = record.addresses.get_mut(address) {
                addr.record_failure(now);
                self.emit(PeerStoreEvent::AddressUpdated {
                    peer: *peer,
                    address: address.clone(),
                });
            }
        }
    }

    /// Drop expired addresses across all tracked peers. Peers left with no
    /// addresses are kept (identity/protocol/metadata may still reference
    /// them) — only `remove_peer` drops a peer outright.
    pub fn collect_expired(&mut self, now: Timestamp) {
        let mut to_remove: Vec<(PeerId, Multiaddr)> = Vec::new();
        for (peer, record) in self.peers.iter() {
            for addr in record.addresses.values() {
                if addr.is_expired(now) {
                    to_remove.push((*peer, addr.address.clone()));
                }
            }
        }
        for (peer, address) in to_remove {
            self.remove_address(&peer, &address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use net_core::Timestamp;
    use std::time::Duration;

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    fn peer(seed: u8) -> PeerId {
        net_core::Keypair::ed25519_from_bytes([seed; 32])
            .unwrap()
            .public()
            .to_peer_id()
    }

    #[test]
    fn evicts_least_recently_used_peer_over_capacity() {
        let mut store = MemoryPeerStore::new(
            PeerStoreConfig {
                max_peers: 2,
                max_addresses_per_peer: 8,
                default_ttl: None,
            },
            16,
        );
        let mut events = store.subscribe();
        let p1 = peer(1);
        let p2 = peer(2);
        let p3 = peer(3);
        let now = Timestamp::from_secs(0);

        store.add_address(p1, addr("/ip4/127.0.0.1/tcp/1"), now, None);
        store.add_address(p2, addr("/ip4/127.0.0.1/tcp/2"), now, None);
        store.add_address(p3, addr("/ip4/127.0.0.1/tcp/3"), now, None);

        assert_eq!(store.peer_count(), 2);
        assert!(!store.contains_peer(&p1));
        assert!(store.contains_peer(&p2));
        assert!(store.contains_peer(&p3));

        let mut saw_removal = false;
        while let Ok(event) = events.try_recv() {
            if event == (PeerStoreEvent::PeerRemoved { peer: p1 }) {
                saw_removal = true;
            }
        }
        assert!(saw_removal);
    }

    #[test]
    fn caps_addresses_per_peer_by_evicting_oldest() {
        let mut store = MemoryPeerStore::new(
            PeerStoreConfig {
                max_peers: 8,
                max_addresses_per_peer: 2,
                default_ttl: None,
            },
            16,
        );
        let p = peer(1);
        let t0 = Timestamp::from_secs(0);
        store.add_address(p, addr("/ip4/1.1.1.1/tcp/1"), t0, None);
        store.add_address(p, addr("/ip4/1.1.1.1/tcp/2"), t0 + Duration::from_secs(1), None);
        store.add_address(p, addr("/ip4/1.1.1.1/tcp/3"), t0 + Duration::from_secs(2), None);

        let addrs = store.addresses(&p);
        assert_eq!(addrs.len(), 2);
        assert!(!addrs.iter().any(|a| a.address == addr("/ip4/1.1.1.1/tcp/1")));
    }

    #[test]
    fn ttl_extension_never_shortens_and_none_wins() {
        let mut store = MemoryPeerStore::new(PeerStoreConfig::default(), 16);
        let p = peer(1);
        let a = addr("/ip4/1.1.1.1/tcp/1");
        let t0 = Timestamp::from_secs(0);
        store.add_address(p, a.clone(), t0, Some(Duration::from_secs(10)));
        store.add_address(p, a.clone(), t0, Some(Duration::from_secs(5)));
        let rec = store.addresses(&p).into_iter().next().unwrap();
        assert_eq!(rec.expires_at, Some(t0 + Duration::from_secs(10)));

        store.add_address(p, a.clone(), t0, None);
        let rec = store.addresses(&p).into_iter().next().unwrap();
        assert_eq!(rec.expires_at, None);
    }

    #[test]
    fn collect_expired_removes_only_expired_addresses() {
        let mut store = MemoryPeerStore::new(PeerStoreConfig::default(), 16);
        let p = peer(1);
        let t0 = Timestamp::from_secs(0);
        let expiring = addr("/ip4/1.1.1.1/tcp/1");
        let permanent = addr("/ip4/1.1.1.1/tcp/2");
        store.add_address(p, expiring.clone(), t0, Some(Duration::from_secs(5)));
        store.add_address(p, permanent.clone(), t0, None);

        store.collect_expired(t0 + Duration::from_secs(10));
        let remaining = store.addresses(&p);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].address, permanent);
    }
}
