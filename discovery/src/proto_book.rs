use std::collections::{HashMap, HashSet};

use net_core::PeerId;

/// Supported-protocol sets per peer, plus a reverse index for
/// "which peers speak protocol X" lookups (spec §3, §4.5).
#[derive(Default)]
pub struct ProtoBook {
    by_peer: HashMap<PeerId, HashSet<String>>,
    by_protocol: HashMap<String, HashSet<PeerId>>,
}

impl ProtoBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_protocols(&mut self, peer: PeerId, protocols: impl IntoIterator<Item = String>) {
        self.remove_peer(&peer);
        let set: HashSet<String> = protocols.into_iter().collect();
        for proto in &set {
            self.by_protocol
                .entry(proto.clone())
                .or_default()
                .insert(peer);
        }
        self.by_peer.insert(peer, set);
    }

    pub fn add_protocol(&mut self, peer: PeerId, protocol: impl Into<String>) {
        let protocol = protocol.into();
        self.by_peer.entry(peer).or_default().insert(protocol.clone());
        self.by_protocol.entry(protocol).or_default().insert(peer);
    }

    pub fn remove_protocol(&mut self, peer: &PeerId, protocol: &str) {
        if let Some(set) = self.by_peer.get_mut(peer) {
            set.remove(protocol);
        }
        if let Some(peers) = self.by_protocol.get_mut(protocol) {
            peers.remove(peer);
        }
    }

    pub fn remove_peer(&mut self, peer: &PeerId) {
        if let Some(protocols) = self.by_peer.remove(peer) {
            for proto in protocols {
                if let Some(peers) = self.by_protocol.get_mut(&proto) {
                    peers.remove(peer);
                }
            }
        }
    }

    pub fn protocols(&self, peer: &PeerId) -> HashSet<String> {
        self.by_peer.get(peer).cloned().unwrap_or_default()
    }

    pub fn supports(&self, peer: &PeerId, protocol: &str) -> bool {
        self.by_peer
            .get(peer)
            .map(|set| set.contains(protocol))
            .unwrap_or(false)
    }

    pub fn peers_supporting(&self, protocol: &str) -> HashSet<PeerId> {
        self.by_protocol.get(protocol).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(seed: u8) -> PeerId {
        net_core::Keypair::ed25519_from_bytes([seed; 32])
            .unwrap()
            .public()
            .to_peer_id()
    }

    #[test]
    fn reverse_index_tracks_protocol_updates() {
        let mut book = ProtoBook::new();
        let p1 = peer(1);
        let p2 = peer(2);
        book.set_protocols(p1, ["/gossipsub/1.1.0".to_string(), "/autonat/2".to_string()]);
        book.set_protocols(p2, ["/gossipsub/1.1.0".to_string()]);

        let supporters = book.peers_supporting("/gossipsub/1.1.0");
        assert_eq!(supporters.len(), 2);

        book.remove_protocol(&p1, "/gossipsub/1.1.0");
        assert_eq!(book.peers_supporting("/gossipsub/1.1.0").len(), 1);
        assert!(book.supports(&p1, "/autonat/2"));
    }

    #[test]
    fn removing_a_peer_clears_it_from_the_reverse_index() {
        let mut book = ProtoBook::new();
        let p = peer(1);
        book.add_protocol(p, "/autonat/2");
        book.remove_peer(&p);
        assert!(book.peers_supporting("/autonat/2").is_empty());
    }
}
