use net_core::{Multiaddr, PeerId, Timestamp};

use crate::peer_store::MemoryPeerStore;
use crate::types::AddressRecord;

/// Weights for the composite address score (spec §4.5).
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub transport_priority: Vec<String>,
    pub max_failures: u32,
    pub address_ttl: std::time::Duration,
    pub transport_weight: f64,
    pub success_weight: f64,
    pub recency_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            transport_priority: vec!["quic".into(), "tcp".into(), "ws".into()],
            max_failures: 5,
            address_ttl: std::time::Duration::from_secs(3600),
            transport_weight: 0.3,
            success_weight: 0.4,
            recency_weight: 0.3,
        }
    }
}

/// The first protocol name appearing in a multiaddr, used to match against
/// [`ScoringConfig::transport_priority`]. Quic addresses commonly carry both
/// `quic` and `quic-v1`; either name matches if configured.
fn transport_name(address: &Multiaddr) -> Option<String> {
    address
        .iter()
        .find_map(|p| match p {
            libp2p::multiaddr::Protocol::Tcp(_) => Some("tcp".to_string()),
            libp2p::multiaddr::Protocol::Udp(_) => Some("udp".to_string()),
            libp2p::multiaddr::Protocol::QuicV1 => Some("quic".to_string()),
            libp2p::multiaddr::Protocol::Ws(_) => Some("ws".to_string()),
            libp2p::multiaddr::Protocol::Wss(_) => Some("wss".to_string()),
            _ => None,
        })
}

fn transport_score(address: &Multiaddr, config: &ScoringConfig) -> f64 {
    let Some(name) = transport_name(address) else {
        return 0.0;
    };
    let len = config.transport_priority.len();
    if len == 0 {
        return 0.0;
    }
    match config.transport_priority.iter().position(|t| *t == name) {
        Some(idx) => (len - idx) as f64 / len as f64,
        None => 0.0,
    }
}

fn success_score(record: &AddressRecord, config: &ScoringConfig) -> f64 {
    if record.failure_count >= config.max_failures {
        return 0.0;
    }
    if record.failure_count == 0 && record.last_success.is_some() {
        return 1.0;
    }
    if record.failure_count == 0 && record.last_success.is_none() {
        return 0.5;
    }
    1.0 - (record.failure_count as f64 / config.max_failures as f64)
}

fn recency_score(record: &AddressRecord, now: Timestamp, config: &ScoringConfig) -> f64 {
    let age = match now.checked_sub(record.last_seen) {
        Some(d) => d,
        None => return 1.0,
    };
    if age >= config.address_ttl {
        0.0
    } else {
        1.0 - (age.as_secs_f64() / config.address_ttl.as_secs_f64())
    }
}

pub fn score(address: &AddressRecord, now: Timestamp, config: &ScoringConfig) -> f64 {
    config.transport_weight * transport_score(&address.address, config)
        + config.success_weight * success_score(address, config)
        + config.recency_weight * recency_score(address, now, config)
}

/// Address selection on top of [`MemoryPeerStore`], ranking a peer's known
/// addresses by the weighted score defined in spec §4.5.
pub struct AddressBook {
    config: ScoringConfig,
}

impl AddressBook {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// All known addresses for `peer`, best-scored first.
    pub fn ranked_addresses(
        &self,
        store: &mut MemoryPeerStore,
        peer: &PeerId,
        now: Timestamp,
    ) -> Vec<(Multiaddr, f64)> {
        let mut scored: Vec<(Multiaddr, f64)> = store
            .addresses(peer)
            .into_iter()
            .filter(|a| !a.is_expired(now))
            .map(|a| {
                let s = score(&a, now, &self.config);
                (a.address, s)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    pub fn best_address(
        &self,
        store: &mut MemoryPeerStore,
        peer: &PeerId,
        now: Timestamp,
    ) -> Option<Multiaddr> {
        self.ranked_addresses(store, peer, now)
            .into_iter()
            .next()
            .map(|(addr, _)| addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer_store::PeerStoreConfig;
    use std::time::Duration;

    fn peer(seed: u8) -> PeerId {
        net_core::Keypair::ed25519_from_bytes([seed; 32])
            .unwrap()
            .public()
            .to_peer_id()
    }

    #[test]
    fn higher_transport_priority_ranks_first() {
        let mut store = MemoryPeerStore::new(PeerStoreConfig::default(), 4);
        let p = peer(1);
        let now = Timestamp::from_secs(1_000);
        store.add_address(p, "/ip4/1.1.1.1/tcp/1".parse().unwrap(), now, None);
        store.add_address(p, "/ip4/1.1.1.1/udp/1/quic-v1".parse().unwrap(), now, None);

        let book = AddressBook::new(ScoringConfig::default());
        let ranked = book.ranked_addresses(&mut store, &p, now);
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].0.to_string().contains("quic"));
    }

    #[test]
    fn repeated_failures_drop_score_to_zero_at_threshold() {
        let mut store = MemoryPeerStore::new(PeerStoreConfig::default(), 4);
        let p = peer(2);
        let a: Multiaddr = "/ip4/1.1.1.1/tcp/1".parse().unwrap();
        let t0 = Timestamp::from_secs(0);
        store.add_address(p, a.clone(), t0, None);
        for i in 0..5 {
            store.record_dial_failure(&p, &a, t0 + Duration::from_secs(i));
        }
        let book = AddressBook::new(ScoringConfig::default());
        let ranked = book.ranked_addresses(&mut store, &p, t0 + Duration::from_secs(5));
        assert_eq!(ranked[0].1, 0.0);
    }
}
