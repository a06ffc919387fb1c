use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use net_core::{PeerId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::peer_store::{MemoryPeerStore, PeerStoreConfig};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    peers: Vec<PeerSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PeerSnapshot {
    peer: String,
    addresses: Vec<AddressSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddressSnapshot {
    address: String,
    failure_count: u32,
}

/// Wraps [`MemoryPeerStore`] with a periodic JSON snapshot on disk.
///
/// Only `failureCount` per address survives a restart (an Open Question
/// decision, see DESIGN.md) — addresses themselves are re-learned through
/// discovery rather than trusted indefinitely from a stale file.
pub struct FilePeerStore {
    store: Arc<Mutex<MemoryPeerStore>>,
    path: PathBuf,
    flush_interval: Duration,
    dirty: Arc<AtomicBool>,
    flush_task: Option<JoinHandle<()>>,
}

impl FilePeerStore {
    pub fn new(dir: impl Into<PathBuf>, config: PeerStoreConfig, flush_interval: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(MemoryPeerStore::new(config, 64))),
            path: dir.into().join("peerstore.json"),
            flush_interval,
            dirty: Arc::new(AtomicBool::new(false)),
            flush_task: None,
        }
    }

    pub fn store(&self) -> Arc<Mutex<MemoryPeerStore>> {
        self.store.clone()
    }

    /// Load the snapshot (if any) and start the periodic flush loop. Loading
    /// happens before any caller has had a chance to subscribe to this
    /// store's events, so restoring failure counts never fires a
    /// [`crate::events::PeerStoreEvent`].
    pub async fn start(&mut self, now: Timestamp) -> std::io::Result<()> {
        self.load(now).await?;

        let store = self.store.clone();
        let dirty = self.dirty.clone();
        let path = self.path.clone();
        let interval = self.flush_interval;
        self.flush_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if dirty.swap(false, Ordering::AcqRel) {
                    let snapshot = {
                        let guard = store.lock().await;
                        build_snapshot(&guard)
                    };
                    if let Err(err) = write_snapshot(&path, &snapshot).await {
                        warn!(%err, "failed to flush peer store snapshot");
                        dirty.store(true, Ordering::Release);
                    }
                }
            }
        }));
        Ok(())
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Flush once and stop the background task.
    pub async fn stop(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
        let snapshot = {
            let guard = self.store.lock().await;
            build_snapshot(&guard)
        };
        if let Err(err) = write_snapshot(&self.path, &snapshot).await {
            warn!(%err, "failed to flush peer store snapshot on stop");
        }
    }

    async fn load(&self, now: Timestamp) -> std::io::Result<()> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };
        let snapshot: Snapshot = match serde_json::from_slice(&bytes) {
            Ok(s) => s,
            Err(err) => {
                warn!(%err, "ignoring unparseable peer store snapshot");
                return Ok(());
            }
        };

        let mut store = self.store.lock().await;
        for peer_snapshot in snapshot.peers {
            let Ok(peer) = peer_snapshot.peer.parse::<PeerId>() else {
                continue;
            };
            for address_snapshot in peer_snapshot.addresses {
                let Ok(address) = address_snapshot.address.parse() else {
                    continue;
                };
                store.add_address(peer, address.clone(), now, None);
                for _ in 0..address_snapshot.failure_count {
                    store.record_dial_failure(&peer, &address, now);
                }
            }
        }
        debug!(path = %self.path.display(), "restored peer store snapshot");
        Ok(())
    }
}

fn build_snapshot(store: &MemoryPeerStore) -> Snapshot {
    Snapshot {
        peers: store
            .iter_peers()
            .map(|(peer, record)| PeerSnapshot {
                peer: peer.to_string(),
                addresses: record
                    .addresses
                    .values()
                    .map(|a| AddressSnapshot {
                        address: a.address.to_string(),
                        failure_count: a.failure_count,
                    })
                    .collect(),
            })
            .collect(),
    }
}

async fn write_snapshot(path: &PathBuf, snapshot: &Snapshot) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(snapshot).expect("snapshot always serializes");
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
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

    #[tokio::test]
    async fn round_trips_failure_counts_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let now = Timestamp::from_secs(0);
        let p = peer(1);
        let addr: net_core::Multiaddr = "/ip4/1.1.1.1/tcp/1".parse().unwrap();

        {
            let mut fps = FilePeerStore::new(
                dir.path(),
                PeerStoreConfig::default(),
                Duration::from_secs(3600),
            );
            fps.start(now).await.unwrap();
            {
                let mut store = fps.store().lock().await;
                store.add_address(p, addr.clone(), now, None);
                store.record_dial_failure(&p, &addr, now);
                store.record_dial_failure(&p, &addr, now);
            }
            fps.stop().await;
        }

        let mut restored = FilePeerStore::new(
            dir.path(),
            PeerStoreConfig::default(),
            Duration::from_secs(3600),
        );
        restored.start(now).await.unwrap();
        let store = restored.store();
        let guard = store.lock().await;
        let records = guard.iter_peers().collect::<Vec<_>>();
        let (_, record) = records.into_iter().find(|(peer, _)| *peer == p).unwrap();
        assert_eq!(record.addresses.get(&addr).unwrap().failure_count, 2);
        restored.stop().await;
    }
}
