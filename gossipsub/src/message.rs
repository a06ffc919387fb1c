//! Gossipsub message representation and ID computation.
//!
//! A message carries an optional source peer, payload, an 8-byte
//! sequence number, a topic, and an optional signature. Its ID is
//! deterministic from `(source, seqno)` by default; callers that run with
//! anonymous/unsigned messages fall back to [`MessageId::compute_from_hash`]
//! over the payload.

use crate::types::{MessageId, PeerId, Topic};
use std::sync::OnceLock;

/// A gossipsub message with lazy, cached ID computation.
#[derive(Clone)]
pub struct RawGossipsubMessage {
    /// Topic this message was published to.
    pub topic: Topic,

    /// Message payload.
    pub data: Vec<u8>,

    /// Monotonic per-source sequence number, 8 bytes.
    pub seqno: Option<[u8; 8]>,

    /// Publishing peer, when `signMessages`/anonymous mode isn't in use.
    pub source: Option<PeerId>,

    /// Signature over `"libp2p-pubsub:" ++ protobuf(message without
    /// signature/key)`, when signing is enabled.
    pub signature: Option<Vec<u8>>,

    /// Public key of the signer, included when it cannot be derived from
    /// `source` alone (e.g. non-identity key types).
    pub key: Option<Vec<u8>>,

    cached_id: OnceLock<MessageId>,
}

impl RawGossipsubMessage {
    pub fn new(topic: Topic, data: Vec<u8>) -> Self {
        Self {
            topic,
            data,
            seqno: None,
            source: None,
            signature: None,
            key: None,
            cached_id: OnceLock::new(),
        }
    }

    pub fn with_source(mut self, source: PeerId, seqno: [u8; 8]) -> Self {
        self.source = Some(source);
        self.seqno = Some(seqno);
        self
    }

    pub fn with_signature(mut self, signature: Vec<u8>, key: Option<Vec<u8>>) -> Self {
        self.signature = Some(signature);
        self.key = key;
        self
    }

    /// The message ID, computed once and cached.
    ///
    /// When `source` and `seqno` are both present the ID is derived from
    /// them (per the default gossipsub v1.1 rule); otherwise it falls back
    /// to the first 20 bytes of `SHA-256(data)`.
    pub fn id(&self) -> MessageId {
        *self.cached_id.get_or_init(|| self.compute_id())
    }

    fn compute_id(&self) -> MessageId {
        match (&self.source, &self.seqno) {
            (Some(source), Some(seqno)) => {
                let mut preimage = Vec::with_capacity(source.to_bytes().len() + 8);
                preimage.extend_from_slice(&source.to_bytes());
                preimage.extend_from_slice(seqno);
                MessageId::compute_from_hash(&preimage)
            }
            _ => MessageId::compute_from_hash(&self.data),
        }
    }
}

impl PartialEq for RawGossipsubMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for RawGossipsubMessage {}

impl std::fmt::Debug for RawGossipsubMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawGossipsubMessage")
            .field("topic", &self.topic)
            .field("data_len", &self.data.len())
            .field("source", &self.source)
            .field("id", &self.id())
            .finish()
    }
}

impl std::hash::Hash for RawGossipsubMessage {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic_from_source_and_seqno() {
        let kp = net_core::Keypair::generate_ed25519();
        let peer = kp.public().to_peer_id();

        let a = RawGossipsubMessage::new(Topic::new("t"), b"hello".to_vec())
            .with_source(peer, [0, 0, 0, 0, 0, 0, 0, 1]);
        let b = RawGossipsubMessage::new(Topic::new("t"), b"different-payload".to_vec())
            .with_source(peer, [0, 0, 0, 0, 0, 0, 0, 1]);

        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn id_changes_with_seqno() {
        let kp = net_core::Keypair::generate_ed25519();
        let peer = kp.public().to_peer_id();

        let a = RawGossipsubMessage::new(Topic::new("t"), b"hello".to_vec())
            .with_source(peer, [0, 0, 0, 0, 0, 0, 0, 1]);
        let b = RawGossipsubMessage::new(Topic::new("t"), b"hello".to_vec())
            .with_source(peer, [0, 0, 0, 0, 0, 0, 0, 2]);

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn anonymous_messages_hash_payload() {
        let a = RawGossipsubMessage::new(Topic::new("t"), b"hello".to_vec());
        let b = RawGossipsubMessage::new(Topic::new("t"), b"hello".to_vec());
        let c = RawGossipsubMessage::new(Topic::new("t"), b"world".to_vec());

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id(), MessageId::compute_from_hash(b"hello"));
    }

    #[test]
    fn id_is_cached() {
        let msg = RawGossipsubMessage::new(Topic::new("t"), b"hello".to_vec());
        let first = msg.id();
        let second = msg.id();
        assert_eq!(first, second);
    }
}
