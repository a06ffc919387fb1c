//! Per-peer connection/subscription/backoff state.

use std::collections::{HashMap, HashSet};

use crate::types::Timestamp;
use crate::types::TopicId;

/// Direction of the underlying connection, used to bias which peers are
/// preferred when grafting (outbound first) and preserved when pruning
/// (`mesh_outbound_min`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// State tracked per connected peer.
///
/// Invariant: a topic never appears in both `mesh` and `fanout` for the
/// same peer — enforced structurally since mesh/fanout membership lives
/// in [`crate::mesh::MeshState`], not duplicated here; this type only
/// tracks the peer-local view (subscriptions, backoffs, protocol
/// version).
#[derive(Debug, Clone)]
pub struct PeerState {
    pub version: String,
    pub direction: Direction,
    pub subscriptions: HashSet<TopicId>,
    pub backoffs: HashMap<TopicId, Timestamp>,
    pub is_direct: bool,
    pub is_floodsub: bool,
}

impl PeerState {
    pub fn new(version: impl Into<String>, direction: Direction) -> Self {
        Self {
            version: version.into(),
            direction,
            subscriptions: HashSet::new(),
            backoffs: HashMap::new(),
            is_direct: false,
            is_floodsub: false,
        }
    }

    pub fn is_subscribed(&self, topic: &TopicId) -> bool {
        self.subscriptions.contains(topic)
    }

    pub fn backoff_until(&self, topic: &TopicId) -> Option<Timestamp> {
        self.backoffs.get(topic).copied()
    }

    pub fn is_backed_off(&self, topic: &TopicId, now: Timestamp) -> bool {
        self.backoff_until(topic).is_some_and(|deadline| now < deadline)
    }

    pub fn set_backoff(&mut self, topic: TopicId, until: Timestamp) {
        self.backoffs
            .entry(topic)
            .and_modify(|existing| {
                if until > *existing {
                    *existing = until;
                }
            })
            .or_insert(until);
    }

    /// Remove backoff entries whose deadline has elapsed.
    pub fn cleanup_backoffs(&mut self, now: Timestamp) {
        self.backoffs.retain(|_, deadline| *deadline > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_extension_keeps_the_later_deadline() {
        let mut state = PeerState::new("1.1.0", Direction::Outbound);
        let topic: TopicId = "t".into();

        state.set_backoff(topic.clone(), Timestamp::from_secs(10));
        state.set_backoff(topic.clone(), Timestamp::from_secs(5));
        assert_eq!(state.backoff_until(&topic), Some(Timestamp::from_secs(10)));

        state.set_backoff(topic.clone(), Timestamp::from_secs(20));
        assert_eq!(state.backoff_until(&topic), Some(Timestamp::from_secs(20)));
    }

    #[test]
    fn cleanup_drops_elapsed_backoffs() {
        let mut state = PeerState::new("1.1.0", Direction::Inbound);
        let topic: TopicId = "t".into();
        state.set_backoff(topic.clone(), Timestamp::from_secs(10));

        state.cleanup_backoffs(Timestamp::from_secs(5));
        assert!(state.is_backed_off(&topic, Timestamp::from_secs(5)));

        state.cleanup_backoffs(Timestamp::from_secs(11));
        assert!(!state.is_backed_off(&topic, Timestamp::from_secs(11)));
    }
}
