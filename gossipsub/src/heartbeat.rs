//! Periodic mesh maintenance (§4.1.2): grafting below `d_low`, pruning
//! above `d_high`, dropping graylisted mesh peers, opportunistic
//! grafting, cache shifting, and backoff/seen-cache cleanup.
//!
//! [`HeartbeatManager`] holds no transport or timer itself — callers
//! drive it either manually (tests, deterministic simulations) via
//! [`HeartbeatManager::perform_heartbeat`] or by awaiting
//! [`HeartbeatManager::run`] against a [`futures_ticker::Ticker`].

use std::collections::HashSet;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::peer_state::Direction;
use crate::router::{GossipSubRouter, Outbox};
use crate::types::{PeerId, Timestamp, TopicId};

/// Minimum number of outbound mesh peers preserved when pruning
/// (spec §4.1.2's `mesh_outbound_min`). Kept as a constant rather than a
/// config field since changing it independently of `d_out` has no
/// described use case.
const MESH_OUTBOUND_MIN_FRACTION: f64 = 1.0;

pub struct HeartbeatManager {
    interval: std::time::Duration,
    count: u64,
}

impl HeartbeatManager {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval, count: 0 }
    }

    pub fn interval(&self) -> std::time::Duration {
        self.interval
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.count
    }

    /// Drive heartbeats forever on `interval`, handing each tick's outbox
    /// to `send`. Exits once `send` stops being polled (its future is
    /// dropped) or the ticker itself ends.
    pub async fn run<C, F, Fut>(&mut self, router: &mut GossipSubRouter, clock: &C, mut send: F)
    where
        C: net_core::Clock + ?Sized,
        F: FnMut(PeerId, crate::wire::Rpc) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        use futures::StreamExt;

        let mut ticker = futures_ticker::Ticker::new(self.interval);
        while ticker.next().await.is_some() {
            let now = clock.now();
            let outbox = self.perform_heartbeat(router, now);
            for (peer, rpc) in outbox {
                send(peer, rpc).await;
            }
        }
    }

    /// Run one heartbeat tick against `router`, returning the RPCs to
    /// send. Idempotent to call repeatedly; each call advances
    /// `heartbeat_count` by one.
    pub fn perform_heartbeat(&mut self, router: &mut GossipSubRouter, now: Timestamp) -> Outbox {
        self.count += 1;
        let mut outbox = Vec::new();

        self.maintain_mesh(router, now, &mut outbox);
        if self.count % router.params().opportunistic_graft_ticks.max(1) == 0 {
            self.opportunistic_graft(router, now, &mut outbox);
        }
        self.emit_ihave_gossip(router, &mut outbox);

        router.mcache_mut().shift();
        router.seen_mut().cleanup(now);
        router.mesh_mut().cleanup_fanouts(now);
        router.cleanup_backoffs(now);
        router.reset_idontwant();

        let heartbeat_interval_secs = router.params().heartbeat_interval_secs.max(0.001);
        let decay_interval_secs = router.scorer().params().decay_interval_secs as f64;
        let decay_interval_heartbeats = (decay_interval_secs / heartbeat_interval_secs).round().max(1.0) as u64;
        if self.count % decay_interval_heartbeats == 0 {
            router.decay_scores();
        }

        outbox
    }

    fn maintain_mesh(&self, router: &mut GossipSubRouter, now: Timestamp, outbox: &mut Outbox) {
        let topics: Vec<TopicId> = router.mesh().subscribed_topics().cloned().collect();
        let d = router.mesh().d();
        let d_low = router.mesh().d_low();
        let d_high = router.mesh().d_high();
        let mesh_outbound_min = ((d as f64) * MESH_OUTBOUND_MIN_FRACTION / 3.0).ceil() as usize;

        for topic in topics {
            // Drop graylisted/below-gossip-threshold peers unconditionally.
            let current = router.mesh().get_mesh_peers(&topic);
            for peer in &current {
                if router.scorer().below_gossip_threshold(peer, now) {
                    debug!(peer = %peer, topic = %topic, "pruning mesh peer below gossip threshold");
                    let rpc = router.prune_peer(&topic, peer, now, false);
                    outbox.push((*peer, rpc));
                }
            }

            let mesh_size = router.mesh().mesh_size(&topic);
            if mesh_size < d_low {
                let candidates = self.graft_candidates(router, &topic, now, d - mesh_size);
                for peer in candidates {
                    let rpc = router.graft_peer(&topic, peer, now);
                    outbox.push((peer, rpc));
                }
            } else if mesh_size > d_high {
                let excess = mesh_size - d;
                let victims = self.prune_candidates(router, &topic, now, excess, mesh_outbound_min);
                for peer in victims {
                    let rpc = router.prune_peer(&topic, &peer, now, false);
                    outbox.push((peer, rpc));
                }
            }
        }
    }

    fn graft_candidates(&self, router: &GossipSubRouter, topic: &TopicId, now: Timestamp, count: usize) -> Vec<PeerId> {
        let mesh_peers = router.mesh().get_mesh_peers(topic);
        let mut candidates: Vec<PeerId> = router
            .topic_candidates(topic)
            .into_iter()
            .filter(|peer| !mesh_peers.contains(peer))
            .filter(|peer| !router.is_direct_peer(peer))
            .filter(|peer| !router.scorer().below_gossip_threshold(peer, now))
            .collect();

        // Prefer outbound connections, matching the teacher's bias toward
        // peers we dialed ourselves when the mesh is being filled.
        candidates.sort_by_key(|peer| router.peer_direction(peer) != Some(Direction::Outbound));

        let mut rng = rand::thread_rng();
        candidates.shuffle(&mut rng);
        candidates.truncate(count);
        candidates
    }

    fn prune_candidates(
        &self,
        router: &GossipSubRouter,
        topic: &TopicId,
        now: Timestamp,
        count: usize,
        mesh_outbound_min: usize,
    ) -> Vec<PeerId> {
        let mesh_peers = router.mesh().get_mesh_peers(topic);
        let outbound_count = mesh_peers
            .iter()
            .filter(|p| router.peer_direction(p) == Some(Direction::Outbound))
            .count();

        let mut scored: Vec<(PeerId, f64)> = mesh_peers
            .iter()
            .map(|p| (*p, router.scorer().score(p, now)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut victims = Vec::new();
        let mut remaining_outbound = outbound_count;
        for (peer, _score) in scored {
            if victims.len() >= count {
                break;
            }
            let is_outbound = router.peer_direction(&peer) == Some(Direction::Outbound);
            if is_outbound && remaining_outbound <= mesh_outbound_min {
                continue;
            }
            if is_outbound {
                remaining_outbound -= 1;
            }
            victims.push(peer);
        }
        victims
    }

    fn opportunistic_graft(&self, router: &mut GossipSubRouter, now: Timestamp, outbox: &mut Outbox) {
        let topics: Vec<TopicId> = router.mesh().subscribed_topics().cloned().collect();
        let target = router.params().opportunistic_graft_peers;

        for topic in topics {
            let mesh_peers = router.mesh().get_mesh_peers(&topic);
            if mesh_peers.len() < router.mesh().d_low() {
                continue; // maintain_mesh already handles the low-degree case.
            }

            let median = median_score(router, &mesh_peers, now);
            let mut candidates: Vec<PeerId> = router
                .topic_candidates(&topic)
                .into_iter()
                .filter(|peer| !mesh_peers.contains(peer))
                .filter(|peer| router.scorer().score(peer, now) > median)
                .collect();

            let mut rng = rand::thread_rng();
            candidates.shuffle(&mut rng);
            candidates.truncate(target);

            for peer in candidates {
                let rpc = router.graft_peer(&topic, peer, now);
                outbox.push((peer, rpc));
            }
        }
    }

    fn emit_ihave_gossip(&self, router: &mut GossipSubRouter, outbox: &mut Outbox) {
        let topics: Vec<TopicId> = router.mesh().subscribed_topics().cloned().collect();

        for topic in topics {
            let candidates = router.topic_candidates(&topic);
            let gossip_targets = router.mesh().select_peers_for_gossip(&topic, &candidates);
            let ids = router.mcache_mut().get_gossip_ids(&topic);
            if ids.is_empty() {
                continue;
            }

            for peer in gossip_targets {
                outbox.push((
                    peer,
                    crate::wire::Rpc {
                        control: Some(crate::control::ControlMessage {
                            ihaves: vec![crate::control::IHave {
                                topic_id: topic.clone(),
                                message_ids: ids.clone(),
                            }],
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ));
            }
        }
    }
}

fn median_score(router: &GossipSubRouter, peers: &HashSet<PeerId>, now: Timestamp) -> f64 {
    if peers.is_empty() {
        return 0.0;
    }
    let mut scores: Vec<f64> = peers.iter().map(|p| router.scorer().score(p, now)).collect();
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    scores[scores.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GossipsubParameters;

    fn peer() -> PeerId {
        net_core::Keypair::generate_ed25519().public().to_peer_id()
    }

    #[test]
    fn low_mesh_triggers_graft_up_to_d() {
        let local = peer();
        let mut router = GossipSubRouter::new(
            GossipsubParameters {
                d: 3,
                d_low: 2,
                ..GossipsubParameters::default()
            },
            local,
            None,
        );
        let topic: TopicId = "t".into();
        router.mesh_mut().subscribe(topic.clone());

        for _ in 0..5 {
            let p = peer();
            router.add_peer(p, Direction::Outbound);
            router.handle_rpc(
                p,
                crate::wire::Rpc {
                    subscriptions: vec![crate::topic::Subscription {
                        topic: topic.clone(),
                        subscribe: true,
                    }],
                    ..Default::default()
                },
                Timestamp::from_secs(0),
            );
        }

        let mut hb = HeartbeatManager::new(std::time::Duration::from_secs(1));
        hb.perform_heartbeat(&mut router, Timestamp::from_secs(0));

        assert_eq!(router.mesh().mesh_size(&topic), 3);
    }

    #[test]
    fn high_mesh_triggers_prune_down_to_d() {
        let local = peer();
        let mut router = GossipSubRouter::new(
            GossipsubParameters {
                d: 3,
                d_low: 2,
                d_high: 4,
                ..GossipsubParameters::default()
            },
            local,
            None,
        );
        let topic: TopicId = "t".into();
        router.mesh_mut().subscribe(topic.clone());

        for _ in 0..6 {
            let p = peer();
            router.add_peer(p, Direction::Inbound);
            router.mesh_mut().add_to_mesh(&topic, p);
        }

        let mut hb = HeartbeatManager::new(std::time::Duration::from_secs(1));
        hb.perform_heartbeat(&mut router, Timestamp::from_secs(0));

        assert_eq!(router.mesh().mesh_size(&topic), 3);
    }

    #[test]
    fn heartbeat_count_is_monotonic() {
        let mut router = GossipSubRouter::new(GossipsubParameters::default(), peer(), None);
        let mut hb = HeartbeatManager::new(std::time::Duration::from_secs(1));
        hb.perform_heartbeat(&mut router, Timestamp::from_secs(0));
        hb.perform_heartbeat(&mut router, Timestamp::from_secs(1));
        assert_eq!(hb.heartbeat_count(), 2);
    }
}
