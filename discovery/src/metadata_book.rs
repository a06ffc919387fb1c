use std::collections::HashMap;
use std::marker::PhantomData;

use net_core::PeerId;
use tokio::sync::broadcast;

/// A typed key into [`MetadataBook`], carrying the value type in its phantom
/// parameter so callers can't mix up encodings of different metadata kinds.
pub struct MetadataKey<V> {
    name: &'static str,
    _marker: PhantomData<fn() -> V>,
}

impl<V> MetadataKey<V> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }
}

impl<V> Clone for MetadataKey<V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for MetadataKey<V> {}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEvent {
    pub peer: PeerId,
    pub key: &'static str,
}

/// Arbitrary per-peer, per-key metadata (spec §3, §4.5) — e.g. agent
/// version, observed latency, protocol-specific state. Values are stored
/// type-erased as bytes; [`MetadataKey`] is what keeps callers honest about
/// the encoding on either end.
#[derive(Default)]
pub struct MetadataBook {
    values: HashMap<PeerId, HashMap<&'static str, Vec<u8>>>,
    event_tx: Option<broadcast::Sender<MetadataEvent>>,
}

impl MetadataBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(event_buffer: usize) -> (Self, broadcast::Receiver<MetadataEvent>) {
        let (tx, rx) = broadcast::channel(event_buffer.max(1));
        (
            Self {
                values: HashMap::new(),
                event_tx: Some(tx),
            },
            rx,
        )
    }

    pub fn subscribe(&mut self, event_buffer: usize) -> broadcast::Receiver<MetadataEvent> {
        if let Some(tx) = &self.event_tx {
            return tx.subscribe();
        }
        let (tx, rx) = broadcast::channel(event_buffer.max(1));
        self.event_tx = Some(tx);
        rx
    }

    pub fn put<V: serde::Serialize>(&mut self, peer: PeerId, key: MetadataKey<V>, value: &V) {
        let encoded = serde_json::to_vec(value).expect("metadata value serializes");
        self.values.entry(peer).or_default().insert(key.name, encoded);
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(MetadataEvent { peer, key: key.name });
        }
    }

    pub fn get<V: serde::de::DeserializeOwned>(&self, peer: &PeerId, key: MetadataKey<V>) -> Option<V> {
        self.values
            .get(peer)?
            .get(key.name)
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }

    pub fn remove<V>(&mut self, peer: &PeerId, key: MetadataKey<V>) {
        if let Some(map) = self.values.get_mut(peer) {
            map.remove(key.name);
        }
    }

    pub fn remove_peer(&mut self, peer: &PeerId) {
        self.values.remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT_VERSION: MetadataKey<String> = MetadataKey::new("agent-version");
    const LATENCY_MS: MetadataKey<u64> = MetadataKey::new("latency-ms");

    fn peer(seed: u8) -> PeerId {
        net_core::Keypair::ed25519_from_bytes([seed; 32])
            .unwrap()
            .public()
            .to_peer_id()
    }

    #[test]
    fn stores_and_retrieves_typed_values_independently() {
        let mut book = MetadataBook::new();
        let p = peer(1);
        book.put(p, AGENT_VERSION, &"net/0.1".to_string());
        book.put(p, LATENCY_MS, &42u64);

        assert_eq!(book.get(&p, AGENT_VERSION), Some("net/0.1".to_string()));
        assert_eq!(book.get(&p, LATENCY_MS), Some(42));
    }

    #[test]
    fn emits_an_event_per_put_once_subscribed() {
        let mut book = MetadataBook::new();
        let mut rx = book.subscribe(8);
        let p = peer(2);
        book.put(p, LATENCY_MS, &7u64);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.peer, p);
        assert_eq!(event.key, "latency-ms");
    }
}
