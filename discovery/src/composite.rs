use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use net_core::{Multiaddr, PeerId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::DiscoveryError;
use crate::events::PeerStoreEvent;

/// A source of addresses for peers, external to this crate — a DHT lookup,
/// an mDNS responder, a rendezvous client, or another `CompositeDiscovery`
/// nested inside one (spec §4.5).
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn find(&self, peer: &PeerId) -> Result<Vec<(Multiaddr, f64)>, DiscoveryError>;
    fn subscribe(&self) -> broadcast::Receiver<PeerStoreEvent>;
    async fn stop(&self);
}

/// A [`PeerStoreEvent`] re-numbered with a monotonic sequence as it's
/// forwarded out of [`CompositeDiscovery`], so subscribers can detect gaps
/// if their receiver lags.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedEvent {
    pub seq: u64,
    pub event: PeerStoreEvent,
}

struct WeightedService {
    service: Arc<dyn Discovery>,
    weight: f64,
}

/// Fans a lookup out across subordinate [`Discovery`] sources, merges their
/// results, and forwards their events under one sequence space (spec §4.5).
pub struct CompositeDiscovery {
    services: Vec<WeightedService>,
    event_tx: broadcast::Sender<ObservedEvent>,
    seq: Arc<AtomicU64>,
    forward_tasks: Vec<JoinHandle<()>>,
}

impl CompositeDiscovery {
    pub fn new(services: Vec<(Arc<dyn Discovery>, f64)>, event_buffer: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));
        let seq = Arc::new(AtomicU64::new(0));

        let forward_tasks = services
            .iter()
            .map(|(service, _)| {
                let mut rx = service.subscribe();
                let tx = event_tx.clone();
                let seq = seq.clone();
                tokio::spawn(async move {
                    loop {
                        match rx.recv().await {
                            Ok(event) => {
                                let seq = seq.fetch_add(1, Ordering::Relaxed);
                                let _ = tx.send(ObservedEvent { seq, event });
                            }
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                })
            })
            .collect();

        Self {
            services: services
                .into_iter()
                .map(|(service, weight)| WeightedService { service, weight })
                .collect(),
            event_tx,
            seq,
            forward_tasks,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObservedEvent> {
        self.event_tx.subscribe()
    }

    /// Query every subordinate for `peer`, merge address sets, and combine
    /// per-address scores as a weight-averaged sum across sources that
    /// reported it. Fails only when every subordinate fails.
    pub async fn find(&self, peer: &PeerId) -> Result<Vec<(Multiaddr, f64)>, DiscoveryError> {
        let mut errors = Vec::new();
        let mut merged: HashMap<Multiaddr, (f64, f64)> = HashMap::new(); // addr -> (weighted_sum, weight_total)

        for weighted in &self.services {
            match weighted.service.find(peer).await {
                Ok(addresses) => {
                    for (addr, score) in addresses {
                        let entry = merged.entry(addr).or_insert((0.0, 0.0));
                        entry.0 += score * weighted.weight;
                        entry.1 += weighted.weight;
                    }
                }
                Err(err) => errors.push(err.to_string()),
            }
        }

        if merged.is_empty() && !errors.is_empty() && errors.len() == self.services.len() {
            return Err(DiscoveryError::AllSourcesFailed(errors));
        }

        let mut result: Vec<(Multiaddr, f64)> = merged
            .into_iter()
            .map(|(addr, (sum, weight))| {
                let score = if weight > 0.0 { sum / weight } else { 0.0 };
                (addr, score)
            })
            .collect();
        result.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(result)
    }

    /// Cancel event forwarding, stop every subordinate, and drop the
    /// broadcaster. Safe to call more than once.
    pub async fn stop(&mut self) {
        for task in self.forward_tasks.drain(..) {
            task.abort();
        }
        for weighted in &self.services {
            weighted.service.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct FakeDiscovery {
        addresses: Vec<(Multiaddr, f64)>,
        fail: bool,
        event_tx: broadcast::Sender<PeerStoreEvent>,
        stopped: Arc<StdMutex<bool>>,
    }

    #[async_trait]
    impl Discovery for FakeDiscovery {
        async fn find(&self, _peer: &PeerId) -> Result<Vec<(Multiaddr, f64)>, DiscoveryError> {
            if self.fail {
                Err(DiscoveryError::AllSourcesFailed(vec!["boom".into()]))
            } else {
                Ok(self.addresses.clone())
            }
        }

        fn subscribe(&self) -> broadcast::Receiver<PeerStoreEvent> {
            self.event_tx.subscribe()
        }

        async fn stop(&self) {
            *self.stopped.lock().unwrap() = true;
        }
    }

    fn peer(seed: u8) -> PeerId {
        net_core::Keypair::ed25519_from_bytes([seed; 32])
            .unwrap()
            .public()
            .to_peer_id()
    }

    #[tokio::test]
    async fn merges_addresses_and_weight_averages_overlapping_scores() {
        let addr: Multiaddr = "/ip4/1.1.1.1/tcp/1".parse().unwrap();
        let (tx1, _) = broadcast::channel(4);
        let (tx2, _) = broadcast::channel(4);
        let a = Arc::new(FakeDiscovery {
            addresses: vec![(addr.clone(), 1.0)],
            fail: false,
            event_tx: tx1,
            stopped: Arc::new(StdMutex::new(false)),
        });
        let b = Arc::new(FakeDiscovery {
            addresses: vec![(addr.clone(), 0.0)],
            fail: false,
            event_tx: tx2,
            stopped: Arc::new(StdMutex::new(false)),
        });

        let composite = CompositeDiscovery::new(
            vec![(a as Arc<dyn Discovery>, 1.0), (b as Arc<dyn Discovery>, 1.0)],
            16,
        );
        let results = composite.find(&peer(1)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, 0.5);
    }

    #[tokio::test]
    async fn fails_only_when_every_subordinate_fails() {
        let (tx1, _) = broadcast::channel(4);
        let (tx2, _) = broadcast::channel(4);
        let a = Arc::new(FakeDiscovery {
            addresses: vec![],
            fail: true,
            event_tx: tx1,
            stopped: Arc::new(StdMutex::new(false)),
        });
        let b = Arc::new(FakeDiscovery {
            addresses: vec![("/ip4/2.2.2.2/tcp/2".parse().unwrap(), 0.9)],
            fail: false,
            event_tx: tx2,
            stopped: Arc::new(StdMutex::new(false)),
        });
        let composite = CompositeDiscovery::new(
            vec![(a as Arc<dyn Discovery>, 1.0), (b as Arc<dyn Discovery>, 1.0)],
            16,
        );
        let results = composite.find(&peer(1)).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
