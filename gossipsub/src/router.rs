//! `GossipSubRouter`: the central state machine tying together mesh
//! maintenance, the message/seen caches, peer scoring, and the RPC
//! protocol (§4.1.1).
//!
//! The router is transport-agnostic: it never opens a stream itself.
//! Callers feed it inbound RPCs via [`GossipSubRouter::handle_rpc`] and
//! drain the returned outbox of `(PeerId, Rpc)` pairs to send.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::GossipsubParameters;
use crate::control::{ControlMessage, Graft, IDontWant, IHave, IWant, Prune};
use crate::error::GossipsubError;
use crate::message::RawGossipsubMessage;
use crate::mcache::{MessageCache, SeenCache};
use crate::mesh::MeshState;
use crate::peer_state::{Direction, PeerState};
use crate::scoring::{PeerScorer, ScoringParameters};
use crate::types::{MessageId, PeerId, Timestamp, Topic, TopicId};
use crate::validator::{AcceptAll, MessageValidator, ValidationResult};
use crate::wire::{encode_message_for_signing, Rpc};

/// Messages produced by processing a publish, subscription change, or
/// inbound RPC: the peers to deliver them to.
pub type Outbox = Vec<(PeerId, Rpc)>;

/// Central gossipsub protocol state.
pub struct GossipSubRouter {
    params: GossipsubParameters,
    local_peer: PeerId,
    keypair: Option<net_core::Keypair>,

    mesh: MeshState,
    mcache: MessageCache,
    seen: SeenCache,
    scorer: PeerScorer,

    peer_states: HashMap<PeerId, PeerState>,
    direct_peers: HashSet<PeerId>,
    topic_peers: HashMap<TopicId, HashSet<PeerId>>,
    validators: HashMap<TopicId, Box<dyn MessageValidator>>,
    idontwant: HashMap<PeerId, HashSet<MessageId>>,

    seqno_counter: u64,
}

impl GossipSubRouter {
    pub fn new(params: GossipsubParameters, local_peer: PeerId, keypair: Option<net_core::Keypair>) -> Self {
        Self {
            mesh: MeshState::new(params.clone()),
            mcache: MessageCache::new(params.mcache_len, params.mcache_gossip),
            seen: SeenCache::new(params.seen_ttl_secs),
            scorer: PeerScorer::new(ScoringParameters::default()),
            params,
            local_peer,
            keypair,
            peer_states: HashMap::new(),
            direct_peers: HashSet::new(),
            topic_peers: HashMap::new(),
            validators: HashMap::new(),
            idontwant: HashMap::new(),
            seqno_counter: 0,
        }
    }

    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    pub fn params(&self) -> &GossipsubParameters {
        &self.params
    }

    pub fn mesh(&self) -> &MeshState {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut MeshState {
        &mut self.mesh
    }

    pub fn mcache_mut(&mut self) -> &mut MessageCache {
        &mut self.mcache
    }

    pub fn seen_mut(&mut self) -> &mut SeenCache {
        &mut self.seen
    }

    pub fn scorer(&self) -> &PeerScorer {
        &self.scorer
    }

    pub fn scorer_mut(&mut self) -> &mut PeerScorer {
        &mut self.scorer
    }

    pub fn connected_peers(&self) -> impl Iterator<Item = &PeerId> {
        self.peer_states.keys()
    }

    pub fn topic_candidates(&self, topic: &TopicId) -> HashSet<PeerId> {
        self.topic_peers.get(topic).cloned().unwrap_or_default()
    }

    pub fn is_direct_peer(&self, peer: &PeerId) -> bool {
        self.direct_peers.contains(peer)
    }

    pub fn peer_direction(&self, peer: &PeerId) -> Option<Direction> {
        self.peer_states.get(peer).map(|s| s.direction)
    }

    pub fn cleanup_backoffs(&mut self, now: Timestamp) {
        for state in self.peer_states.values_mut() {
            state.cleanup_backoffs(now);
        }
    }

    pub fn decay_scores(&mut self) {
        self.scorer.decay();
    }

    pub fn reset_idontwant(&mut self) {
        self.idontwant.clear();
    }

    pub fn set_validator(&mut self, topic: TopicId, validator: Box<dyn MessageValidator>) {
        self.validators.insert(topic, validator);
    }

    pub fn add_peer(&mut self, peer: PeerId, direction: Direction) {
        self.peer_states
            .entry(peer)
            .or_insert_with(|| PeerState::new(self.params.protocol_id.clone(), direction));
    }

    pub fn remove_peer(&mut self, peer: &PeerId) {
        self.peer_states.remove(peer);
        self.direct_peers.remove(peer);
        self.mesh.remove_peer_everywhere(peer);
        self.scorer.remove_peer(peer);
        self.idontwant.remove(peer);
        for peers in self.topic_peers.values_mut() {
            peers.remove(peer);
        }
    }

    pub fn add_direct_peer(&mut self, peer: PeerId) {
        self.direct_peers.insert(peer);
        if let Some(state) = self.peer_states.get_mut(&peer) {
            state.is_direct = true;
        }
        self.scorer.protect(peer);
    }

    pub fn remove_direct_peer(&mut self, peer: &PeerId) {
        self.direct_peers.remove(peer);
        if let Some(state) = self.peer_states.get_mut(peer) {
            state.is_direct = false;
        }
        self.scorer.unprotect(peer);
    }

    /// Subscribe to `topic` locally and announce it to every connected
    /// peer. Mesh grafting for the topic happens at the next heartbeat.
    pub fn subscribe(&mut self, topic: TopicId) -> Outbox {
        self.mesh.subscribe(topic.clone());
        self.announce(topic, true)
    }

    /// Unsubscribe from `topic`: prune current mesh peers and announce
    /// the departure to every connected peer.
    pub fn unsubscribe(&mut self, topic: TopicId) -> Outbox {
        let mesh_peers = self.mesh.unsubscribe(&topic);
        let mut outbox = self.announce(topic.clone(), false);

        let backoff = self.params.prune_backoff_secs;
        for peer in mesh_peers {
            outbox.push((
                peer,
                Rpc {
                    control: Some(ControlMessage {
                        prunes: vec![Prune {
                            topic_id: topic.clone(),
                            backoff: Some(backoff),
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ));
        }
        outbox
    }

    fn announce(&self, topic: TopicId, subscribe: bool) -> Outbox {
        let sub = crate::topic::Subscription { topic, subscribe };
        self.peer_states
            .keys()
            .map(|peer| {
                (
                    *peer,
                    Rpc {
                        subscriptions: vec![sub.clone()],
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    /// Publish `data` to `topic`. Returns the derived message id and the
    /// set of outbound deliveries.
    pub fn publish(&mut self, topic: Topic, data: Vec<u8>, now: Timestamp) -> Result<(MessageId, Outbox), GossipsubError> {
        if data.len() > self.params.max_message_size {
            return Err(GossipsubError::MessageTooLarge {
                size: data.len(),
                max: self.params.max_message_size,
            });
        }

        self.seqno_counter += 1;
        let seqno = self.seqno_counter.to_be_bytes();
        let mut message = RawGossipsubMessage::new(topic.clone(), data).with_source(self.local_peer, seqno);

        if self.params.sign_messages {
            let key = self
                .keypair
                .as_ref()
                .ok_or(GossipsubError::SigningRequiredNoKey)?;
            let preimage = signing_preimage(&message);
            let signature = key.sign(&preimage).map_err(|_| GossipsubError::InvalidSignature)?;
            message = message.with_signature(signature, None);
        } else if self.params.require_signing_key && self.keypair.is_none() {
            return Err(GossipsubError::SigningRequiredNoKey);
        }

        let id = message.id();
        self.mcache.put(topic.clone(), message.clone());
        self.seen.add(id, now);

        let targets = self.peers_for_publish(&topic, now);
        let outbox = targets
            .into_iter()
            .map(|peer| {
                (
                    peer,
                    Rpc {
                        messages: vec![message.clone()],
                        ..Default::default()
                    },
                )
            })
            .collect();

        Ok((id, outbox))
    }

    /// Admit `peer` into `topic`'s mesh and return the GRAFT to send it.
    /// Used by heartbeat mesh maintenance, not the inbound RPC path.
    pub fn graft_peer(&mut self, topic: &TopicId, peer: PeerId, now: Timestamp) -> Rpc {
        self.mesh.add_to_mesh(topic, peer);
        self.scorer.mesh_graft(peer, topic.clone(), now);
        Rpc {
            control: Some(ControlMessage {
                grafts: vec![Graft { topic_id: topic.clone() }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Evict `peer` from `topic`'s mesh and return the PRUNE to send it.
    /// Used by heartbeat mesh maintenance, not the inbound RPC path.
    pub fn prune_peer(&mut self, topic: &TopicId, peer: &PeerId, now: Timestamp, failed: bool) -> Rpc {
        self.mesh.remove_from_mesh(topic, peer);
        self.scorer.mesh_prune(peer, topic, now, failed);
        let backoff = self.params.prune_backoff_secs;
        if let Some(state) = self.peer_states.get_mut(peer) {
            state.set_backoff(topic.clone(), now + Duration::from_secs(backoff));
        }
        Rpc {
            control: Some(ControlMessage {
                prunes: vec![Prune {
                    topic_id: topic.clone(),
                    backoff: Some(backoff),
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Peers eligible to receive a publish for `topic`: the mesh if
    /// subscribed, otherwise a lazily-grown fanout, excluding peers below
    /// the publish-score threshold.
    pub fn peers_for_publish(&mut self, topic: &TopicId, now: Timestamp) -> HashSet<PeerId> {
        let available = self.topic_peers.get(topic).cloned().unwrap_or_default();
        let candidates = self.mesh.update_fanout(topic, &available, now);
        let scorer = &self.scorer;
        let mut peers: HashSet<PeerId> = candidates
            .into_iter()
            .filter(|peer| !scorer.below_publish_threshold(peer, now))
            .collect();
        // Direct peers are always included, regardless of score (§4.1).
        peers.extend(self.direct_peers.iter().copied());
        peers
    }

    /// Process one inbound RPC from `from`, returning any resulting
    /// outbound traffic (forwards, IWANT requests, PRUNE replies, ...).
    pub fn handle_rpc(&mut self, from: PeerId, rpc: Rpc, now: Timestamp) -> Outbox {
        let mut outbox = Vec::new();

        for sub in rpc.subscriptions {
            self.handle_subscription(from, sub);
        }

        for message in rpc.messages {
            self.handle_message(from, message, now, &mut outbox);
        }

        if let Some(control) = rpc.control {
            self.handle_control(from, control, now, &mut outbox);
        }

        outbox
    }

    fn handle_subscription(&mut self, from: PeerId, sub: crate::topic::Subscription) {
        let peers = self.topic_peers.entry(sub.topic.clone()).or_default();
        if sub.subscribe {
            peers.insert(from);
        } else {
            peers.remove(&from);
            self.mesh.remove_from_mesh(&sub.topic, &from);
        }

        if let Some(state) = self.peer_states.get_mut(&from) {
            if sub.subscribe {
                state.subscriptions.insert(sub.topic);
            } else {
                state.subscriptions.remove(&sub.topic);
            }
        }
    }

    fn handle_message(&mut self, from: PeerId, message: RawGossipsubMessage, now: Timestamp, outbox: &mut Outbox) {
        if self.scorer.is_graylisted(&from, now) {
            return;
        }

        let id = message.id();

        if self.seen.has(&id) {
            if self.mesh.get_mesh_peers(&message.topic).contains(&from) {
                self.scorer.duplicate_message_delivery(&from, &message.topic);
            }
            return;
        }

        let result = match self.validators.get(&message.topic) {
            Some(validator) => validator.validate(&message, &from),
            None => AcceptAll.validate(&message, &from),
        };

        self.seen.add(id, now);

        match result {
            ValidationResult::Reject => {
                trace!(peer = %from, topic = %message.topic, "rejecting invalid message");
                self.scorer.invalid_message(&from, &message.topic);
            }
            ValidationResult::Ignore => {}
            ValidationResult::Accept => {
                if self.mesh.get_mesh_peers(&message.topic).contains(&from) {
                    self.scorer.first_message_delivery(&from, &message.topic);
                }
                self.mcache.put(message.topic.clone(), message.clone());
                self.forward(from, message, outbox);
            }
        }
    }

    fn forward(&mut self, from: PeerId, message: RawGossipsubMessage, outbox: &mut Outbox) {
        let id = message.id();
        let large = message.data.len() >= self.params.idontwant_message_size_threshold;
        let mut targets = self.mesh.get_mesh_peers(&message.topic);
        targets.extend(self.direct_peers.iter().copied());

        for peer in &targets {
            if *peer == from || Some(*peer) == message.source {
                continue;
            }
            if self.idontwant.get(peer).is_some_and(|ids| ids.contains(&id)) {
                continue;
            }
            outbox.push((
                *peer,
                Rpc {
                    messages: vec![message.clone()],
                    ..Default::default()
                },
            ));
        }

        if large {
            for peer in &targets {
                if *peer == from || Some(*peer) == message.source {
                    continue;
                }
                outbox.push((
                    *peer,
                    Rpc {
                        control: Some(ControlMessage {
                            idontwants: vec![IDontWant { message_ids: vec![id] }],
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ));
            }
        }
    }

    fn handle_control(&mut self, from: PeerId, control: ControlMessage, now: Timestamp, outbox: &mut Outbox) {
        if self.scorer.is_graylisted(&from, now) {
            return;
        }

        for graft in control.grafts {
            self.handle_graft(from, graft, now, outbox);
        }
        for prune in control.prunes {
            self.handle_prune(from, prune, now);
        }
        for ihave in control.ihaves {
            self.handle_ihave(from, ihave, outbox);
        }
        for iwant in control.iwants {
            self.handle_iwant(from, iwant, now, outbox);
        }
        for idontwant in control.idontwants {
            self.handle_idontwant(from, idontwant);
        }
    }

    fn handle_graft(&mut self, from: PeerId, graft: Graft, now: Timestamp, outbox: &mut Outbox) {
        if self.scorer.is_graylisted(&from, now) {
            return;
        }

        if !self.mesh.is_subscribed(&graft.topic_id) {
            outbox.push((
                from,
                Rpc {
                    control: Some(ControlMessage {
                        prunes: vec![Prune {
                            topic_id: graft.topic_id,
                            backoff: Some(self.params.prune_backoff_secs),
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ));
            return;
        }

        if let Some(state) = self.peer_states.get(&from) {
            if state.is_backed_off(&graft.topic_id, now) {
                self.scorer.graft_during_backoff(&from);
                outbox.push((
                    from,
                    Rpc {
                        control: Some(ControlMessage {
                            prunes: vec![Prune {
                                topic_id: graft.topic_id,
                                backoff: Some(self.params.prune_backoff_secs),
                            }],
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ));
                return;
            }
        }

        // Admit even above d_high; the next heartbeat's prune pass trims
        // the mesh back down (spec §4.1.2 meshDegreeHigh policy).
        self.mesh.add_to_mesh(&graft.topic_id, from);
        self.scorer.mesh_graft(from, graft.topic_id, now);
    }

    fn handle_prune(&mut self, from: PeerId, prune: Prune, now: Timestamp) {
        self.mesh.remove_from_mesh(&prune.topic_id, &from);
        self.scorer.mesh_prune(&from, &prune.topic_id, now, false);

        if let Some(backoff_secs) = prune.backoff {
            if let Some(state) = self.peer_states.get_mut(&from) {
                state.set_backoff(prune.topic_id, now + Duration::from_secs(backoff_secs));
            }
        }
    }

    fn handle_ihave(&mut self, from: PeerId, ihave: IHave, outbox: &mut Outbox) {
        let want: Vec<MessageId> = ihave
            .message_ids
            .into_iter()
            .filter(|id| !self.mcache.has(id) && !self.seen.has(id))
            .take(self.params.max_ihave_length)
            .collect();

        if !want.is_empty() {
            outbox.push((
                from,
                Rpc {
                    control: Some(ControlMessage {
                        iwants: vec![IWant { message_ids: want }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ));
        }
    }

    fn handle_iwant(&mut self, from: PeerId, iwant: IWant, now: Timestamp, outbox: &mut Outbox) {
        if self.scorer.is_graylisted(&from, now) {
            return;
        }

        for id in &iwant.message_ids {
            if let Some(message) = self.mcache.get(id) {
                outbox.push((
                    from,
                    Rpc {
                        messages: vec![message.clone()],
                        ..Default::default()
                    },
                ));
            } else {
                debug!(peer = %from, message = %id, "cannot satisfy IWANT, message already evicted");
            }
        }
    }

    fn handle_idontwant(&mut self, from: PeerId, idontwant: IDontWant) {
        let limit = self.params.max_ihave_length;
        let entry = self.idontwant.entry(from).or_default();
        entry.extend(idontwant.message_ids);
        if entry.len() > limit {
            warn!(peer = %from, count = entry.len(), "peer sent an oversized IDONTWANT batch");
        }
    }
}

fn signing_preimage(message: &RawGossipsubMessage) -> Vec<u8> {
    let mut buf = b"libp2p-pubsub:".to_vec();
    buf.extend(encode_message_for_signing(message));
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        net_core::Keypair::generate_ed25519().public().to_peer_id()
    }

    fn router() -> GossipSubRouter {
        GossipSubRouter::new(GossipsubParameters::default(), peer(), None)
    }

    #[test]
    fn publish_without_subscribers_populates_fanout() {
        let mut r = router();
        let topic: TopicId = "t".into();
        let p = peer();
        r.add_peer(p, Direction::Outbound);
        r.handle_subscription(
            p,
            crate::topic::Subscription {
                topic: topic.clone(),
                subscribe: true,
            },
        );

        let (_, outbox) = r.publish(topic, b"hello".to_vec(), Timestamp::from_secs(0)).unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, p);
    }

    #[test]
    fn publish_rejects_oversized_payloads() {
        let mut r = GossipSubRouter::new(
            GossipsubParameters {
                max_message_size: 4,
                ..GossipsubParameters::default()
            },
            peer(),
            None,
        );
        let err = r.publish("t".into(), vec![0u8; 16], Timestamp::from_secs(0)).unwrap_err();
        assert_eq!(
            err,
            GossipsubError::MessageTooLarge { size: 16, max: 4 }
        );
    }

    #[test]
    fn duplicate_messages_are_not_reforwarded() {
        let mut r = router();
        let topic: TopicId = "t".into();
        r.mesh.subscribe(topic.clone());
        let sender = peer();
        let mesh_peer = peer();
        r.add_peer(sender, Direction::Inbound);
        r.add_peer(mesh_peer, Direction::Outbound);
        r.mesh.add_to_mesh(&topic, mesh_peer);

        let msg = RawGossipsubMessage::new(topic, b"payload".to_vec());
        let rpc = Rpc {
            messages: vec![msg.clone()],
            ..Default::default()
        };

        let first = r.handle_rpc(sender, rpc.clone(), Timestamp::from_secs(0));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].0, mesh_peer);

        let second = r.handle_rpc(sender, rpc, Timestamp::from_secs(1));
        assert!(second.is_empty());
    }

    #[test]
    fn graft_for_unsubscribed_topic_is_pruned() {
        let mut r = router();
        let from = peer();
        r.add_peer(from, Direction::Inbound);

        let outbox = r.handle_rpc(
            from,
            Rpc {
                control: Some(ControlMessage {
                    grafts: vec![Graft { topic_id: "t".into() }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            Timestamp::from_secs(0),
        );

        assert_eq!(outbox.len(), 1);
        let (peer_id, rpc) = &outbox[0];
        assert_eq!(*peer_id, from);
        assert!(!rpc.control.as_ref().unwrap().prunes.is_empty());
    }

    #[test]
    fn graft_during_backoff_is_penalized_and_repruned() {
        let mut r = router();
        let topic: TopicId = "t".into();
        r.mesh.subscribe(topic.clone());
        let from = peer();
        r.add_peer(from, Direction::Inbound);
        r.handle_prune(
            from,
            Prune {
                topic_id: topic.clone(),
                backoff: Some(60),
            },
            Timestamp::from_secs(0),
        );

        let outbox = r.handle_rpc(
            from,
            Rpc {
                control: Some(ControlMessage {
                    grafts: vec![Graft { topic_id: topic.clone() }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            Timestamp::from_secs(1),
        );

        assert!(!r.mesh.get_mesh_peers(&topic).contains(&from));
        assert!(!outbox.is_empty());
        assert!(r.scorer.score(&from, Timestamp::from_secs(1)) < 0.0);
    }

    #[test]
    fn ihave_for_unknown_message_triggers_iwant() {
        let mut r = router();
        let from = peer();
        r.add_peer(from, Direction::Inbound);
        let unknown_id = MessageId::from_bytes([7; 20]);

        let outbox = r.handle_rpc(
            from,
            Rpc {
                control: Some(ControlMessage {
                    ihaves: vec![IHave {
                        topic_id: "t".into(),
                        message_ids: vec![unknown_id],
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            Timestamp::from_secs(0),
        );

        assert_eq!(outbox.len(), 1);
        let iwant = &outbox[0].1.control.as_ref().unwrap().iwants[0];
        assert_eq!(iwant.message_ids, vec![unknown_id]);
    }

    #[test]
    fn iwant_returns_cached_message() {
        let mut r = router();
        let topic: TopicId = "t".into();
        let msg = RawGossipsubMessage::new(topic.clone(), b"payload".to_vec());
        let id = msg.id();
        r.mcache.put(topic, msg);

        let from = peer();
        r.add_peer(from, Direction::Inbound);
        let outbox = r.handle_rpc(
            from,
            Rpc {
                control: Some(ControlMessage {
                    iwants: vec![IWant { message_ids: vec![id] }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            Timestamp::from_secs(0),
        );

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, from);
        assert_eq!(outbox[0].1.messages[0].data, b"payload");
    }

    fn graylist(r: &mut GossipSubRouter, p: &PeerId) {
        for _ in 0..10 {
            r.scorer.graft_during_backoff(p);
        }
        assert!(r.scorer.is_graylisted(p, Timestamp::from_secs(0)));
    }

    #[test]
    fn graylisted_peer_graft_is_ignored() {
        let mut r = router();
        let topic: TopicId = "t".into();
        r.mesh.subscribe(topic.clone());
        let from = peer();
        r.add_peer(from, Direction::Inbound);
        graylist(&mut r, &from);

        let outbox = r.handle_rpc(
            from,
            Rpc {
                control: Some(ControlMessage {
                    grafts: vec![Graft { topic_id: topic.clone() }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            Timestamp::from_secs(0),
        );

        assert!(outbox.is_empty());
        assert!(!r.mesh.get_mesh_peers(&topic).contains(&from));
    }

    #[test]
    fn graylisted_peer_message_is_not_forwarded() {
        let mut r = router();
        let topic: TopicId = "t".into();
        r.mesh.subscribe(topic.clone());
        let from = peer();
        let mesh_peer = peer();
        r.add_peer(from, Direction::Inbound);
        r.add_peer(mesh_peer, Direction::Outbound);
        r.mesh.add_to_mesh(&topic, mesh_peer);
        graylist(&mut r, &from);

        let msg = RawGossipsubMessage::new(topic, b"payload".to_vec());
        let outbox = r.handle_rpc(
            from,
            Rpc {
                messages: vec![msg],
                ..Default::default()
            },
            Timestamp::from_secs(0),
        );

        assert!(outbox.is_empty());
    }

    #[test]
    fn graylisted_peer_iwant_is_withheld() {
        let mut r = router();
        let topic: TopicId = "t".into();
        let msg = RawGossipsubMessage::new(topic.clone(), b"payload".to_vec());
        let id = msg.id();
        r.mcache.put(topic, msg);

        let from = peer();
        r.add_peer(from, Direction::Inbound);
        graylist(&mut r, &from);

        let outbox = r.handle_rpc(
            from,
            Rpc {
                control: Some(ControlMessage {
                    iwants: vec![IWant { message_ids: vec![id] }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            Timestamp::from_secs(0),
        );

        assert!(outbox.is_empty());
    }

    #[test]
    fn forward_excludes_message_source_even_if_not_sender() {
        let mut r = router();
        let topic: TopicId = "t".into();
        r.mesh.subscribe(topic.clone());
        let relay = peer();
        let source = peer();
        r.add_peer(relay, Direction::Inbound);
        r.add_peer(source, Direction::Outbound);
        r.mesh.add_to_mesh(&topic, source);

        let msg = RawGossipsubMessage::new(topic, b"payload".to_vec()).with_source(source, [0u8; 8]);
        let outbox = r.handle_rpc(
            relay,
            Rpc {
                messages: vec![msg],
                ..Default::default()
            },
            Timestamp::from_secs(0),
        );

        assert!(outbox.iter().all(|(p, _)| *p != source));
    }

    #[test]
    fn forward_reaches_direct_peers_outside_the_mesh() {
        let mut r = router();
        let topic: TopicId = "t".into();
        r.mesh.subscribe(topic.clone());
        let sender = peer();
        let direct = peer();
        r.add_peer(sender, Direction::Inbound);
        r.add_peer(direct, Direction::Outbound);
        r.add_direct_peer(direct);

        let msg = RawGossipsubMessage::new(topic, b"payload".to_vec());
        let outbox = r.handle_rpc(
            sender,
            Rpc {
                messages: vec![msg],
                ..Default::default()
            },
            Timestamp::from_secs(0),
        );

        assert!(outbox.iter().any(|(p, _)| *p == direct));
    }

    #[test]
    fn peers_for_publish_always_includes_direct_peers() {
        let mut r = router();
        let topic: TopicId = "t".into();
        let direct = peer();
        r.add_peer(direct, Direction::Outbound);
        r.add_direct_peer(direct);

        let peers = r.peers_for_publish(&topic, Timestamp::from_secs(0));
        assert!(peers.contains(&direct));
    }

    #[test]
    fn signing_preimage_uses_protobuf_encoding_of_cleared_message() {
        let topic: TopicId = "t".into();
        let msg = RawGossipsubMessage::new(topic, b"payload".to_vec()).with_source(peer(), [1u8; 8]);

        let preimage = signing_preimage(&msg);
        assert!(preimage.starts_with(b"libp2p-pubsub:"));

        let expected = {
            let mut buf = b"libp2p-pubsub:".to_vec();
            buf.extend(crate::wire::encode_message_for_signing(&msg));
            buf
        };
        assert_eq!(preimage, expected);

        // A naive raw-concatenation preimage would have been shorter than
        // the protobuf encoding (no field tags, no source bytes).
        let mut raw = msg.topic.as_str().as_bytes().to_vec();
        raw.extend_from_slice(&msg.data);
        assert_ne!(preimage.len(), raw.len() + b"libp2p-pubsub:".len());
    }
}
