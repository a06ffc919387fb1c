use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use net_core::{Dialer, Multiaddr, PeerId};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::error::BootstrapError;
use crate::peer_store::MemoryPeerStore;

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub max_concurrent_dials: usize,
    pub dial_timeout: Duration,
    pub min_peers: usize,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_concurrent_dials: 4,
            dial_timeout: Duration::from_secs(10),
            min_peers: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapResult {
    pub connected: Vec<PeerId>,
    pub failed: Vec<(PeerId, String)>,
}

impl BootstrapResult {
    pub fn is_success(&self) -> bool {
        !self.connected.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapEvent {
    Started { seed_count: usize },
    Completed(BootstrapResult),
}

/// Dials a fixed set of seed peers with bounded concurrency, recording
/// successes in the peer store (spec §4.5, §8 scenario #8).
pub struct Bootstrap {
    dialer: Arc<dyn Dialer>,
    store: Arc<Mutex<MemoryPeerStore>>,
    seeds: Vec<(PeerId, Multiaddr)>,
    config: BootstrapConfig,
    event_tx: broadcast::Sender<BootstrapEvent>,
    in_progress: Arc<AtomicBool>,
}

impl Bootstrap {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        store: Arc<Mutex<MemoryPeerStore>>,
        seeds: Vec<(PeerId, Multiaddr)>,
        config: BootstrapConfig,
        event_buffer: usize,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));
        Self {
            dialer,
            store,
            seeds,
            config,
            event_tx,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BootstrapEvent> {
        self.event_tx.subscribe()
    }

    /// Dial every configured seed, `max_concurrent_dials` at a time. Seeds
    /// already connected are skipped without consuming a dial slot.
    pub async fn run(&self, now: net_core::Timestamp) -> Result<BootstrapResult, BootstrapError> {
        if self.seeds.is_empty() {
            return Err(BootstrapError::NoSeeds);
        }
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BootstrapError::AlreadyInProgress);
        }

        let _ = self.event_tx.send(BootstrapEvent::Started {
            seed_count: self.seeds.len(),
        });

        let dialer = self.dialer.clone();
        let timeout = self.config.dial_timeout;
        let attempts = stream::iter(self.seeds.clone()).map(|(peer, addr)| {
            let dialer = dialer.clone();
            async move {
                if dialer.is_connected(&peer) {
                    return (peer, addr, Ok(()));
                }
                let outcome = tokio::time::timeout(timeout, dialer.dial(Some(peer), &addr)).await;
                let result = match outcome {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(_) => Err("dial timed out".to_string()),
                };
                (peer, addr, result)
            }
        });

        let mut connected = Vec::new();
        let mut failed = Vec::new();
        let mut results = attempts.buffer_unordered(self.config.max_concurrent_dials.max(1));
        while let Some((peer, addr, result)) = results.next().await {
            match result {
                Ok(()) => {
                    self.store.lock().await.add_address(peer, addr, now, None);
                    connected.push(peer);
                }
                Err(reason) => {
                    warn!(%peer, %reason, "bootstrap dial failed");
                    failed.push((peer, reason));
                }
            }
        }

        let result = BootstrapResult { connected, failed };
        debug!(connected = result.connected.len(), failed = result.failed.len(), "bootstrap complete");
        let _ = self.event_tx.send(BootstrapEvent::Completed(result.clone()));
        self.in_progress.store(false, Ordering::Release);

        if !result.is_success() {
            return Err(BootstrapError::AllSeedsFailed(
                result.failed.iter().map(|(_, reason)| reason.clone()).collect(),
            ));
        }
        Ok(result)
    }

    pub fn needs_rebootstrap(&self, connected_peer_count: usize) -> bool {
        connected_peer_count < self.config.min_peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use net_core::Timestamp;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as TokioMutex;

    struct CountingDialer {
        in_flight: AtomicUsize,
        max_observed: AtomicUsize,
        should_fail: HashSet<u8>,
    }

    #[async_trait]
    impl Dialer for CountingDialer {
        async fn dial(&self, peer: Option<PeerId>, _addr: &Multiaddr) -> std::io::Result<()> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_observed.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let seed = peer.map(|p| p.to_bytes()[0]).unwrap_or(0);
            if self.should_fail.contains(&seed) {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "refused"))
            } else {
                Ok(())
            }
        }

        fn is_connected(&self, _peer: &PeerId) -> bool {
            false
        }
    }

    fn peer(seed: u8) -> PeerId {
        net_core::Keypair::ed25519_from_bytes([seed; 32])
            .unwrap()
            .public()
            .to_peer_id()
    }

    #[tokio::test]
    async fn bounds_concurrent_dials_and_dials_every_seed() {
        let dialer = Arc::new(CountingDialer {
            in_flight: AtomicUsize::new(0),
            max_observed: AtomicUsize::new(0),
            should_fail: HashSet::new(),
        });
        let seeds: Vec<_> = (1..=10u8)
            .map(|i| (peer(i), format!("/ip4/10.0.0.{i}/tcp/4001").parse().unwrap()))
            .collect();
        let store = Arc::new(TokioMutex::new(MemoryPeerStore::new(
            crate::peer_store::PeerStoreConfig::default(),
            16,
        )));
        let bootstrap = Bootstrap::new(
            dialer.clone(),
            store.clone(),
            seeds,
            BootstrapConfig {
                max_concurrent_dials: 3,
                dial_timeout: Duration::from_secs(5),
                min_peers: 1,
            },
            8,
        );

        let result = bootstrap.run(Timestamp::from_secs(0)).await.unwrap();
        assert_eq!(result.connected.len(), 10);
        assert!(dialer.max_observed.load(Ordering::SeqCst) <= 3);
        assert_eq!(store.lock().await.peer_count(), 10);
    }

    #[tokio::test]
    async fn reports_failure_when_every_seed_fails() {
        let dialer = Arc::new(CountingDialer {
            in_flight: AtomicUsize::new(0),
            max_observed: AtomicUsize::new(0),
            should_fail: (1..=3u8).collect(),
        });
        let seeds: Vec<_> = (1..=3u8)
            .map(|i| (peer(i), format!("/ip4/10.0.0.{i}/tcp/4001").parse().unwrap()))
            .collect();
        let store = Arc::new(TokioMutex::new(MemoryPeerStore::new(
            crate::peer_store::PeerStoreConfig::default(),
            16,
        )));
        let bootstrap = Bootstrap::new(dialer, store, seeds, BootstrapConfig::default(), 8);
        let err = bootstrap.run(Timestamp::from_secs(0)).await.unwrap_err();
        assert!(matches!(err, BootstrapError::AllSeedsFailed(_)));
    }
}
