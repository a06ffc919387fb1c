//! Peer scoring: P1-P7 components, graylist/publish/gossip thresholds,
//! protection, decay, and the IP-colocation table.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::types::{PeerId, Timestamp, TopicId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringParameters {
    #[serde(default = "default_topic_weight")]
    pub topic_weight: f64,
    #[serde(default = "default_time_in_mesh_weight")]
    pub time_in_mesh_weight: f64,
    #[serde(default = "default_time_in_mesh_cap")]
    pub time_in_mesh_cap: f64,
    #[serde(default = "default_time_in_mesh_quantum_secs")]
    pub time_in_mesh_quantum_secs: u64,
    #[serde(default = "default_first_message_deliveries_weight")]
    pub first_message_deliveries_weight: f64,
    #[serde(default = "default_first_message_deliveries_cap")]
    pub first_message_deliveries_cap: f64,
    #[serde(default = "default_mesh_message_delivery_weight")]
    pub mesh_message_delivery_weight: f64,
    #[serde(default = "default_mesh_message_delivery_threshold")]
    pub mesh_message_delivery_threshold: f64,
    #[serde(default = "default_mesh_message_delivery_activation_secs")]
    pub mesh_message_delivery_activation_secs: u64,
    #[serde(default = "default_mesh_failure_penalty_weight")]
    pub mesh_failure_penalty_weight: f64,
    #[serde(default = "default_invalid_message_deliveries_weight")]
    pub invalid_message_deliveries_weight: f64,
    #[serde(default = "default_ip_colocation_weight")]
    pub ip_colocation_weight: f64,
    #[serde(default = "default_ip_colocation_threshold")]
    pub ip_colocation_threshold: usize,
    #[serde(default = "default_behaviour_penalty_weight")]
    pub behaviour_penalty_weight: f64,
    #[serde(default = "default_graylist_threshold")]
    pub graylist_threshold: f64,
    #[serde(default = "default_publish_threshold")]
    pub publish_threshold: f64,
    #[serde(default = "default_gossip_threshold")]
    pub gossip_threshold: f64,
    #[serde(default = "default_score_cap")]
    pub score_cap: f64,
    #[serde(default = "default_decay_interval_secs")]
    pub decay_interval_secs: u64,
    #[serde(default = "default_decay_to_zero")]
    pub decay_to_zero: f64,
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
}

fn default_topic_weight() -> f64 {
    1.0
}
fn default_time_in_mesh_weight() -> f64 {
    0.01
}
fn default_time_in_mesh_cap() -> f64 {
    3600.0
}
fn default_time_in_mesh_quantum_secs() -> u64 {
    1
}
fn default_first_message_deliveries_weight() -> f64 {
    1.0
}
fn default_first_message_deliveries_cap() -> f64 {
    100.0
}
fn default_mesh_message_delivery_weight() -> f64 {
    -1.0
}
fn default_mesh_message_delivery_threshold() -> f64 {
    1.0
}
fn default_mesh_message_delivery_activation_secs() -> u64 {
    30
}
fn default_mesh_failure_penalty_weight() -> f64 {
    -1.0
}
fn default_invalid_message_deliveries_weight() -> f64 {
    -10.0
}
fn default_ip_colocation_weight() -> f64 {
    -5.0
}
fn default_ip_colocation_threshold() -> usize {
    4
}
fn default_behaviour_penalty_weight() -> f64 {
    -10.0
}
fn default_graylist_threshold() -> f64 {
    -80.0
}
fn default_publish_threshold() -> f64 {
    -10.0
}
fn default_gossip_threshold() -> f64 {
    -4.0
}
fn default_score_cap() -> f64 {
    100.0
}
fn default_decay_interval_secs() -> u64 {
    60
}
fn default_decay_to_zero() -> f64 {
    0.01
}
fn default_decay_rate() -> f64 {
    0.5
}

impl Default for ScoringParameters {
    fn default() -> Self {
        Self {
            topic_weight: default_topic_weight(),
            time_in_mesh_weight: default_time_in_mesh_weight(),
            time_in_mesh_cap: default_time_in_mesh_cap(),
            time_in_mesh_quantum_secs: default_time_in_mesh_quantum_secs(),
            first_message_deliveries_weight: default_first_message_deliveries_weight(),
            first_message_deliveries_cap: default_first_message_deliveries_cap(),
            mesh_message_delivery_weight: default_mesh_message_delivery_weight(),
            mesh_message_delivery_threshold: default_mesh_message_delivery_threshold(),
            mesh_message_delivery_activation_secs: default_mesh_message_delivery_activation_secs(),
            mesh_failure_penalty_weight: default_mesh_failure_penalty_weight(),
            invalid_message_deliveries_weight: default_invalid_message_deliveries_weight(),
            ip_colocation_weight: default_ip_colocation_weight(),
            ip_colocation_threshold: default_ip_colocation_threshold(),
            behaviour_penalty_weight: default_behaviour_penalty_weight(),
            graylist_threshold: default_graylist_threshold(),
            publish_threshold: default_publish_threshold(),
            gossip_threshold: default_gossip_threshold(),
            score_cap: default_score_cap(),
            decay_interval_secs: default_decay_interval_secs(),
            decay_to_zero: default_decay_to_zero(),
            decay_rate: default_decay_rate(),
        }
    }
}

/// Per-topic counters backing P1-P4 and P3b.
#[derive(Debug, Clone, Default)]
struct TopicCounters {
    mesh_time_secs: f64,
    first_message_deliveries: f64,
    mesh_message_deliveries: f64,
    mesh_message_delivery_active: bool,
    mesh_joined_at: Option<Timestamp>,
    mesh_failures: f64,
    invalid_messages: f64,
}

/// P7 protocol-misbehaviour counters.
#[derive(Debug, Clone, Default)]
struct BehaviourCounters {
    graft_during_backoff: f64,
    excessive_iwant: f64,
    broken_ihave_promise: f64,
    topic_mismatch: f64,
}

impl BehaviourCounters {
    fn total(&self) -> f64 {
        self.graft_during_backoff
            + self.excessive_iwant
            + self.broken_ihave_promise
            + self.topic_mismatch
    }
}

#[derive(Debug, Clone, Default)]
struct PeerRecord {
    topics: HashMap<TopicId, TopicCounters>,
    behaviour: BehaviourCounters,
    application_score: f64,
    protected: bool,
    ip: Option<IpAddr>,
}

/// Numeric reputation tracker implementing spec §4.1.3.
#[derive(Debug, Clone)]
pub struct PeerScorer {
    params: ScoringParameters,
    peers: HashMap<PeerId, PeerRecord>,
    ip_colocation: HashMap<IpAddr, HashSet<PeerId>>,
}

impl PeerScorer {
    pub fn new(params: ScoringParameters) -> Self {
        Self {
            params,
            peers: HashMap::new(),
            ip_colocation: HashMap::new(),
        }
    }

    fn record_mut(&mut self, peer: PeerId) -> &mut PeerRecord {
        self.peers.entry(peer).or_default()
    }

    /// Mark `peer` as protected: clamped at score 0, immune to penalties
    /// and graylisting. Used for direct peers and the explicit protect
    /// list (spec §4.1.4).
    pub fn protect(&mut self, peer: PeerId) {
        self.record_mut(peer).protected = true;
    }

    pub fn unprotect(&mut self, peer: &PeerId) {
        if let Some(record) = self.peers.get_mut(peer) {
            record.protected = false;
        }
    }

    pub fn is_protected(&self, peer: &PeerId) -> bool {
        self.peers.get(peer).is_some_and(|r| r.protected)
    }

    pub fn register_ip(&mut self, peer: PeerId, ip: IpAddr) {
        self.ip_colocation.entry(ip).or_default().insert(peer);
        self.record_mut(peer).ip = Some(ip);
    }

    pub fn unregister_ip(&mut self, peer: &PeerId) {
        if let Some(record) = self.peers.get_mut(peer) {
            if let Some(ip) = record.ip.take() {
                if let Some(set) = self.ip_colocation.get_mut(&ip) {
                    set.remove(peer);
                    if set.is_empty() {
                        self.ip_colocation.remove(&ip);
                    }
                }
            }
        }
    }

    pub fn remove_peer(&mut self, peer: &PeerId) {
        self.unregister_ip(peer);
        self.peers.remove(peer);
    }

    pub fn mesh_graft(&mut self, peer: PeerId, topic: TopicId, now: Timestamp) {
        if self.is_protected(&peer) {
            return;
        }
        let counters = self.record_mut(peer).topics.entry(topic).or_default();
        counters.mesh_joined_at = Some(now);
        counters.mesh_message_delivery_active = false;
    }

    pub fn mesh_prune(&mut self, peer: &PeerId, topic: &TopicId, now: Timestamp, failed: bool) {
        if self.is_protected(peer) {
            return;
        }
        if let Some(record) = self.peers.get_mut(peer) {
            if let Some(counters) = record.topics.get_mut(topic) {
                if let Some(joined) = counters.mesh_joined_at.take() {
                    if let Some(elapsed) = now.checked_sub(joined) {
                        counters.mesh_time_secs += elapsed.as_secs_f64();
                    }
                }
                if failed {
                    counters.mesh_failures += 1.0;
                }
            }
        }
    }

    pub fn first_message_delivery(&mut self, peer: &PeerId, topic: &TopicId) {
        if self.is_protected(peer) {
            return;
        }
        let counters = self.record_mut(*peer).topics.entry(topic.clone()).or_default();
        counters.first_message_deliveries += 1.0;
        counters.mesh_message_deliveries += 1.0;
    }

    pub fn duplicate_message_delivery(&mut self, peer: &PeerId, topic: &TopicId) {
        if self.is_protected(peer) {
            return;
        }
        let counters = self.record_mut(*peer).topics.entry(topic.clone()).or_default();
        counters.mesh_message_deliveries += 1.0;
    }

    pub fn invalid_message(&mut self, peer: &PeerId, topic: &TopicId) {
        if self.is_protected(peer) {
            return;
        }
        let counters = self.record_mut(*peer).topics.entry(topic.clone()).or_default();
        counters.invalid_messages += 1.0;
    }

    pub fn graft_during_backoff(&mut self, peer: &PeerId) {
        if self.is_protected(peer) {
            return;
        }
        self.record_mut(*peer).behaviour.graft_during_backoff += 1.0;
    }

    pub fn excessive_iwant(&mut self, peer: &PeerId) {
        if self.is_protected(peer) {
            return;
        }
        self.record_mut(*peer).behaviour.excessive_iwant += 1.0;
    }

    pub fn broken_ihave_promise(&mut self, peer: &PeerId) {
        if self.is_protected(peer) {
            return;
        }
        self.record_mut(*peer).behaviour.broken_ihave_promise += 1.0;
    }

    pub fn topic_mismatch(&mut self, peer: &PeerId) {
        if self.is_protected(peer) {
            return;
        }
        self.record_mut(*peer).behaviour.topic_mismatch += 1.0;
    }

    pub fn set_application_score(&mut self, peer: PeerId, score: f64) {
        self.record_mut(peer).application_score = score;
    }

    /// Total weighted score for `peer`. Protected peers are clamped at 0.
    pub fn score(&self, peer: &PeerId, now: Timestamp) -> f64 {
        let Some(record) = self.peers.get(peer) else {
            return 0.0;
        };
        if record.protected {
            return 0.0;
        }

        let mut total = 0.0;
        for counters in record.topics.values() {
            // P1: time in mesh, capped.
            let mut mesh_time = counters.mesh_time_secs;
            if let Some(joined) = counters.mesh_joined_at {
                if let Some(elapsed) = now.checked_sub(joined) {
                    mesh_time += elapsed.as_secs_f64();
                }
            }
            let quantum = self.params.time_in_mesh_quantum_secs.max(1) as f64;
            let p1 = (mesh_time / quantum).min(self.params.time_in_mesh_cap);
            total += self.params.topic_weight * self.params.time_in_mesh_weight * p1;

            // P2: first message deliveries, capped.
            let p2 = counters
                .first_message_deliveries
                .min(self.params.first_message_deliveries_cap);
            total += self.params.topic_weight * self.params.first_message_deliveries_weight * p2;

            // P3: mesh message delivery rate, only after the activation
            // window and only penalized when below threshold.
            let past_activation_window = match counters.mesh_joined_at {
                None => true,
                Some(joined) => match now.checked_sub(joined) {
                    Some(elapsed) => {
                        elapsed.as_secs() >= self.params.mesh_message_delivery_activation_secs
                    }
                    None => false,
                },
            };
            let active = past_activation_window || counters.mesh_message_delivery_active;
            if active && counters.mesh_message_deliveries < self.params.mesh_message_delivery_threshold
            {
                let deficit =
                    self.params.mesh_message_delivery_threshold - counters.mesh_message_deliveries;
                total += self.params.topic_weight
                    * self.params.mesh_message_delivery_weight
                    * deficit
                    * deficit;
            }

            // P3b: mesh-failure penalty.
            total += self.params.topic_weight
                * self.params.mesh_failure_penalty_weight
                * counters.mesh_failures;

            // P4: invalid messages, squared.
            total += self.params.topic_weight
                * self.params.invalid_message_deliveries_weight
                * counters.invalid_messages
                * counters.invalid_messages;
        }

        // P5: application-specific score.
        total += record.application_score;

        // P6: IP colocation.
        if let Some(ip) = record.ip {
            if let Some(set) = self.ip_colocation.get(&ip) {
                let colocated = set.len();
                if colocated > self.params.ip_colocation_threshold {
                    let excess = (colocated - self.params.ip_colocation_threshold) as f64;
                    total += self.params.ip_colocation_weight * excess * excess;
                }
            }
        }

        // P7: cumulative protocol misconduct.
        total += self.params.behaviour_penalty_weight * record.behaviour.total();

        total.min(self.params.score_cap)
    }

    pub fn is_graylisted(&self, peer: &PeerId, now: Timestamp) -> bool {
        !self.is_protected(peer) && self.score(peer, now) <= self.params.graylist_threshold
    }

    pub fn below_publish_threshold(&self, peer: &PeerId, now: Timestamp) -> bool {
        !self.is_protected(peer) && self.score(peer, now) < self.params.publish_threshold
    }

    pub fn below_gossip_threshold(&self, peer: &PeerId, now: Timestamp) -> bool {
        !self.is_protected(peer) && self.score(peer, now) < self.params.gossip_threshold
    }

    /// Apply multiplicative decay to all counters; values that fall below
    /// `decay_to_zero` are zeroed.
    pub fn decay(&mut self) {
        let rate = self.params.decay_rate;
        let floor = self.params.decay_to_zero;
        for record in self.peers.values_mut() {
            for counters in record.topics.values_mut() {
                counters.first_message_deliveries *= rate;
                counters.mesh_message_deliveries *= rate;
                counters.invalid_messages *= rate;
                counters.mesh_failures *= rate;
                if counters.first_message_deliveries < floor {
                    counters.first_message_deliveries = 0.0;
                }
                if counters.mesh_message_deliveries < floor {
                    counters.mesh_message_deliveries = 0.0;
                }
                if counters.invalid_messages < floor {
                    counters.invalid_messages = 0.0;
                }
                if counters.mesh_failures < floor {
                    counters.mesh_failures = 0.0;
                }
            }
            record.behaviour.graft_during_backoff *= rate;
            record.behaviour.excessive_iwant *= rate;
            record.behaviour.broken_ihave_promise *= rate;
            record.behaviour.topic_mismatch *= rate;
        }
    }

    pub fn params(&self) -> &ScoringParameters {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        net_core::Keypair::generate_ed25519().public().to_peer_id()
    }

    #[test]
    fn protected_peers_are_clamped_at_zero() {
        let mut scorer = PeerScorer::new(ScoringParameters::default());
        let p = peer();
        scorer.protect(p);
        scorer.invalid_message(&p, &"t".into());
        scorer.graft_during_backoff(&p);
        assert_eq!(scorer.score(&p, Timestamp::from_secs(0)), 0.0);
        assert!(!scorer.is_graylisted(&p, Timestamp::from_secs(0)));
    }

    #[test]
    fn invalid_messages_penalize_quadratically() {
        let mut scorer = PeerScorer::new(ScoringParameters::default());
        let p = peer();
        let topic: TopicId = "t".into();
        scorer.invalid_message(&p, &topic);
        let one = scorer.score(&p, Timestamp::from_secs(0));
        scorer.invalid_message(&p, &topic);
        let two = scorer.score(&p, Timestamp::from_secs(0));

        assert!(one < 0.0);
        // Going from 1 to 2 invalid messages roughly quadruples the P4
        // penalty contribution, so the score should drop by more than 2x.
        assert!(two < one * 1.9);
    }

    #[test]
    fn ip_colocation_penalizes_past_threshold() {
        let mut scorer = PeerScorer::new(ScoringParameters {
            ip_colocation_threshold: 1,
            ..ScoringParameters::default()
        });
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let peers: Vec<_> = (0..3).map(|_| peer()).collect();
        for p in &peers {
            scorer.register_ip(*p, ip);
        }

        assert!(scorer.score(&peers[0], Timestamp::from_secs(0)) < 0.0);
    }

    #[test]
    fn decay_shrinks_counters_toward_zero() {
        let mut scorer = PeerScorer::new(ScoringParameters {
            decay_rate: 0.5,
            decay_to_zero: 0.01,
            ..ScoringParameters::default()
        });
        let p = peer();
        let topic: TopicId = "t".into();
        scorer.first_message_delivery(&p, &topic);
        let before = scorer.score(&p, Timestamp::from_secs(0));
        scorer.decay();
        let after = scorer.score(&p, Timestamp::from_secs(0));
        assert!(after < before);
    }

    #[test]
    fn graylist_threshold_trips_on_accumulated_penalties() {
        let mut scorer = PeerScorer::new(ScoringParameters::default());
        let p = peer();
        for _ in 0..10 {
            scorer.graft_during_backoff(&p);
        }
        assert!(scorer.is_graylisted(&p, Timestamp::from_secs(0)));
    }
}
