//! Mesh and fanout state for all subscribed/published-to topics.
//!
//! Each subscribed topic maintains a mesh: a set of peers messages are
//! eagerly forwarded to and received from. Topics we publish to without
//! subscribing use a lazily-populated fanout set instead, which expires
//! after `fanout_ttl` of inactivity.

use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};

use crate::config::GossipsubParameters;
use crate::types::{PeerId, Timestamp, TopicId};

/// Fanout state for a publish-only topic.
#[derive(Debug, Clone)]
pub struct FanoutEntry {
    pub peers: HashSet<PeerId>,
    pub last_published: Timestamp,
}

impl FanoutEntry {
    pub fn new(now: Timestamp) -> Self {
        Self {
            peers: HashSet::new(),
            last_published: now,
        }
    }

    pub fn is_stale(&self, now: Timestamp, ttl: std::time::Duration) -> bool {
        match now.checked_sub(self.last_published) {
            Some(elapsed) => elapsed > ttl,
            None => false,
        }
    }
}

/// Mesh state for a single topic.
#[derive(Debug, Clone, Default)]
pub struct TopicMesh {
    pub peers: HashSet<PeerId>,
}

impl TopicMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(&mut self, peer_id: PeerId) -> bool {
        self.peers.insert(peer_id)
    }

    pub fn remove_peer(&mut self, peer_id: &PeerId) -> bool {
        self.peers.remove(peer_id)
    }
}

/// Complete mesh state for all subscribed/published-to topics.
///
/// Invariant (spec §8.1): for any topic `T`, `mesh(T) ∩ fanout(T) = ∅`,
/// and if the local node is subscribed to `T`, `fanout(T) = ∅` — enforced
/// here by `subscribe` draining the fanout into the mesh, and
/// `update_fanout`/`get_fanout_peers` short-circuiting to the mesh for
/// subscribed topics.
#[derive(Debug, Clone)]
pub struct MeshState {
    params: GossipsubParameters,
    meshes: HashMap<TopicId, TopicMesh>,
    fanouts: HashMap<TopicId, FanoutEntry>,
    subscriptions: HashSet<TopicId>,
}

impl MeshState {
    pub fn new(params: GossipsubParameters) -> Self {
        Self {
            params,
            meshes: HashMap::new(),
            fanouts: HashMap::new(),
            subscriptions: HashSet::new(),
        }
    }

    pub fn d(&self) -> usize {
        self.params.d
    }

    pub fn d_low(&self) -> usize {
        self.params.d_low
    }

    pub fn d_high(&self) -> usize {
        self.params.d_high
    }

    pub fn d_lazy(&self) -> usize {
        self.params.d_lazy
    }

    /// Subscribe to a topic. Fanout peers for the topic, if any, are
    /// promoted into the new mesh.
    pub fn subscribe(&mut self, topic: TopicId) {
        if self.subscriptions.contains(&topic) {
            return;
        }

        self.subscriptions.insert(topic.clone());

        let mut mesh = TopicMesh::new();
        if let Some(fanout) = self.fanouts.remove(&topic) {
            mesh.peers = fanout.peers;
        }
        self.meshes.insert(topic, mesh);
    }

    /// Unsubscribe from a topic, returning the mesh peers that must be
    /// notified with PRUNE.
    pub fn unsubscribe(&mut self, topic: &TopicId) -> HashSet<PeerId> {
        self.subscriptions.remove(topic);
        self.meshes
            .remove(topic)
            .map(|mesh| mesh.peers)
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, topic: &TopicId) -> bool {
        self.subscriptions.contains(topic)
    }

    pub fn subscribed_topics(&self) -> impl Iterator<Item = &TopicId> {
        self.subscriptions.iter()
    }

    pub fn get_mesh_peers(&self, topic: &TopicId) -> HashSet<PeerId> {
        self.meshes
            .get(topic)
            .map(|mesh| mesh.peers.clone())
            .unwrap_or_default()
    }

    pub fn mesh_size(&self, topic: &TopicId) -> usize {
        self.meshes.get(topic).map(|m| m.peers.len()).unwrap_or(0)
    }

    pub fn add_to_mesh(&mut self, topic: &TopicId, peer_id: PeerId) -> bool {
        if let Some(mesh) = self.meshes.get_mut(topic) {
            mesh.add_peer(peer_id)
        } else {
            false
        }
    }

    pub fn remove_from_mesh(&mut self, topic: &TopicId, peer_id: &PeerId) -> bool {
        if let Some(mesh) = self.meshes.get_mut(topic) {
            mesh.remove_peer(peer_id)
        } else {
            false
        }
    }

    /// Remove a peer from every mesh and fanout it belongs to (used on
    /// disconnect and on receiving an unsubscribe announcement).
    pub fn remove_peer_everywhere(&mut self, peer_id: &PeerId) {
        for mesh in self.meshes.values_mut() {
            mesh.peers.remove(peer_id);
        }
        for fanout in self.fanouts.values_mut() {
            fanout.peers.remove(peer_id);
        }
    }

    pub fn get_fanout_peers(&self, topic: &TopicId) -> HashSet<PeerId> {
        self.fanouts
            .get(topic)
            .map(|fanout| fanout.peers.clone())
            .unwrap_or_default()
    }

    /// Peers to publish to for `topic`: mesh peers if subscribed,
    /// otherwise the fanout, lazily grown to `d` from `available_peers`.
    pub fn update_fanout(
        &mut self,
        topic: &TopicId,
        available_peers: &HashSet<PeerId>,
        now: Timestamp,
    ) -> HashSet<PeerId> {
        if self.subscriptions.contains(topic) {
            return self.get_mesh_peers(topic);
        }

        let d = self.d();
        let fanout = self
            .fanouts
            .entry(topic.clone())
            .or_insert_with(|| FanoutEntry::new(now));

        fanout.last_published = now;

        if fanout.peers.len() < d {
            let candidates: Vec<_> = available_peers.difference(&fanout.peers).cloned().collect();
            let needed = d - fanout.peers.len();
            let mut rng = rand::thread_rng();
            let new_peers: Vec<_> = candidates
                .choose_multiple(&mut rng, needed.min(candidates.len()))
                .cloned()
                .collect();
            fanout.peers.extend(new_peers);
        }

        fanout.peers.clone()
    }

    /// Remove fanout entries unused for longer than `fanout_ttl`.
    pub fn cleanup_fanouts(&mut self, now: Timestamp) -> usize {
        let ttl = self.params.fanout_ttl();
        let stale: Vec<_> = self
            .fanouts
            .iter()
            .filter(|(_, fanout)| fanout.is_stale(now, ttl))
            .map(|(topic, _)| topic.clone())
            .collect();

        let count = stale.len();
        for topic in stale {
            self.fanouts.remove(&topic);
        }
        count
    }

    /// Randomly select up to `d_lazy` non-mesh peers for IHAVE gossip.
    pub fn select_peers_for_gossip(
        &self,
        topic: &TopicId,
        all_topic_peers: &HashSet<PeerId>,
    ) -> Vec<PeerId> {
        let mesh_peers = self.get_mesh_peers(topic);
        let candidates: Vec<_> = all_topic_peers.difference(&mesh_peers).cloned().collect();

        if candidates.len() <= self.d_lazy() {
            return candidates;
        }

        let mut rng = rand::thread_rng();
        candidates
            .choose_multiple(&mut rng, self.d_lazy())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        net_core::Keypair::generate_ed25519().public().to_peer_id()
    }

    #[test]
    fn subscribe_promotes_fanout_to_mesh() {
        let mut state = MeshState::new(GossipsubParameters::default());
        let topic: TopicId = "t".into();
        let p1 = peer();
        let mut available = HashSet::new();
        available.insert(p1);

        state.update_fanout(&topic, &available, Timestamp::from_secs(0));
        assert!(state.get_fanout_peers(&topic).contains(&p1));

        state.subscribe(topic.clone());
        assert!(state.get_mesh_peers(&topic).contains(&p1));
        assert!(state.get_fanout_peers(&topic).is_empty());
    }

    #[test]
    fn subscribed_topics_never_hold_a_fanout() {
        let mut state = MeshState::new(GossipsubParameters::default());
        let topic: TopicId = "t".into();
        state.subscribe(topic.clone());

        let mut available = HashSet::new();
        available.insert(peer());
        let result = state.update_fanout(&topic, &available, Timestamp::from_secs(0));

        assert!(state.get_fanout_peers(&topic).is_empty());
        assert_eq!(result, state.get_mesh_peers(&topic));
    }

    #[test]
    fn fanout_grows_lazily_up_to_d() {
        let params = GossipsubParameters {
            d: 2,
            ..GossipsubParameters::default()
        };
        let mut state = MeshState::new(params);
        let topic: TopicId = "t".into();
        let available: HashSet<_> = (0..5).map(|_| peer()).collect();

        let result = state.update_fanout(&topic, &available, Timestamp::from_secs(0));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn stale_fanouts_are_cleaned_up() {
        let params = GossipsubParameters {
            fanout_ttl_secs: 10,
            ..GossipsubParameters::default()
        };
        let mut state = MeshState::new(params);
        let topic: TopicId = "t".into();
        let mut available = HashSet::new();
        available.insert(peer());

        state.update_fanout(&topic, &available, Timestamp::from_secs(0));
        assert_eq!(state.cleanup_fanouts(Timestamp::from_secs(5)), 0);
        assert_eq!(state.cleanup_fanouts(Timestamp::from_secs(20)), 1);
        assert!(state.get_fanout_peers(&topic).is_empty());
    }
}
