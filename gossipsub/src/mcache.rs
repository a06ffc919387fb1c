//! Sliding-window message cache and TTL-based seen-cache.
//!
//! `MessageCache` enables the lazy-pull half of gossipsub: peers outside
//! the mesh learn about a message via IHAVE and can request its full
//! contents via IWANT. `SeenCache` only tracks IDs, for O(1) duplicate
//! detection without retaining payloads.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::message::RawGossipsubMessage;
use crate::types::{MessageId, Timestamp, TopicId};

/// A single entry in the message cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub message: RawGossipsubMessage,
    pub topic: TopicId,
}

/// Sliding-window cache of recently published/received messages.
///
/// Organized as `mcache_len` windows; the newest window is index 0. Each
/// heartbeat the windows shift via [`MessageCache::shift`] and the oldest
/// is evicted. Only the first `mcache_gossip` windows are eligible for
/// IHAVE advertisement.
#[derive(Debug, Clone)]
pub struct MessageCache {
    mcache_len: usize,
    mcache_gossip: usize,
    windows: VecDeque<HashSet<MessageId>>,
    by_id: HashMap<MessageId, CacheEntry>,
}

impl MessageCache {
    pub fn new(mcache_len: usize, mcache_gossip: usize) -> Self {
        let mut windows = VecDeque::with_capacity(mcache_len);
        windows.push_back(HashSet::new());

        Self {
            mcache_len,
            mcache_gossip,
            windows,
            by_id: HashMap::new(),
        }
    }

    /// Add a message to the newest window. Returns `false` if it was
    /// already cached.
    pub fn put(&mut self, topic: TopicId, message: RawGossipsubMessage) -> bool {
        let msg_id = message.id();

        if self.by_id.contains_key(&msg_id) {
            return false;
        }

        if let Some(window) = self.windows.front_mut() {
            window.insert(msg_id);
        }

        self.by_id.insert(msg_id, CacheEntry { message, topic });
        true
    }

    pub fn get(&self, msg_id: &MessageId) -> Option<&RawGossipsubMessage> {
        self.by_id.get(msg_id).map(|entry| &entry.message)
    }

    pub fn has(&self, msg_id: &MessageId) -> bool {
        self.by_id.contains_key(msg_id)
    }

    /// IDs from the most recent `mcache_gossip` windows belonging to
    /// `topic`, for an IHAVE advertisement.
    pub fn get_gossip_ids(&self, topic: &TopicId) -> Vec<MessageId> {
        let mut result = Vec::new();
        let windows_to_check = self.mcache_gossip.min(self.windows.len());

        for window in self.windows.iter().take(windows_to_check) {
            for msg_id in window {
                if let Some(entry) = self.by_id.get(msg_id) {
                    if &entry.topic == topic {
                        result.push(*msg_id);
                    }
                }
            }
        }

        result
    }

    /// Advance the window, evicting the oldest once at capacity. Returns
    /// the number of messages evicted.
    pub fn shift(&mut self) -> usize {
        let mut evicted = 0;

        if self.windows.len() >= self.mcache_len {
            if let Some(oldest) = self.windows.pop_back() {
                for msg_id in oldest {
                    if self.by_id.remove(&msg_id).is_some() {
                        evicted += 1;
                    }
                }
            }
        }

        self.windows.push_front(HashSet::new());
        evicted
    }

    pub fn clear(&mut self) {
        self.windows.clear();
        self.windows.push_back(HashSet::new());
        self.by_id.clear();
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// TTL-based cache tracking message IDs that have already been processed.
#[derive(Debug, Clone)]
pub struct SeenCache {
    ttl_seconds: u64,
    seen: HashSet<MessageId>,
    timestamps: HashMap<MessageId, Timestamp>,
}

impl SeenCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            seen: HashSet::new(),
            timestamps: HashMap::new(),
        }
    }

    /// Mark `msg_id` as seen. Returns `false` if it already was.
    pub fn add(&mut self, msg_id: MessageId, timestamp: Timestamp) -> bool {
        if self.seen.contains(&msg_id) {
            return false;
        }

        self.seen.insert(msg_id);
        self.timestamps.insert(msg_id, timestamp);
        true
    }

    pub fn has(&self, msg_id: &MessageId) -> bool {
        self.seen.contains(msg_id)
    }

    /// Remove entries older than `ttl_seconds` relative to `now`. Returns
    /// the number removed.
    pub fn cleanup(&mut self, now: Timestamp) -> usize {
        let cutoff_age = std::time::Duration::from_secs(self.ttl_seconds);
        let expired: Vec<MessageId> = self
            .timestamps
            .iter()
            .filter(|(_, ts)| match now.checked_sub(**ts) {
                Some(age) => age > cutoff_age,
                None => false,
            })
            .map(|(id, _)| *id)
            .collect();

        let count = expired.len();
        for msg_id in expired {
            self.seen.remove(&msg_id);
            self.timestamps.remove(&msg_id);
        }
        count
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.timestamps.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(topic: &str, data: &[u8]) -> RawGossipsubMessage {
        RawGossipsubMessage::new(topic.into(), data.to_vec())
    }

    #[test]
    fn put_and_get_roundtrip() {
        let mut cache = MessageCache::new(5, 3);
        let m = msg("t", b"hello");
        let id = m.id();
        assert!(cache.put("t".into(), m));
        assert!(cache.has(&id));
        assert_eq!(cache.get(&id).unwrap().data, b"hello");
    }

    #[test]
    fn duplicate_put_is_rejected() {
        let mut cache = MessageCache::new(5, 3);
        let m = msg("t", b"hello");
        assert!(cache.put("t".into(), m.clone()));
        assert!(!cache.put("t".into(), m));
    }

    #[test]
    fn gossip_ids_limited_to_gossip_window() {
        let mut cache = MessageCache::new(5, 1);
        let m1 = msg("t", b"one");
        cache.put("t".into(), m1.clone());
        cache.shift();
        let m2 = msg("t", b"two");
        cache.put("t".into(), m2.clone());

        let ids = cache.get_gossip_ids(&"t".into());
        assert_eq!(ids, vec![m2.id()]);
    }

    #[test]
    fn shift_evicts_beyond_history_length() {
        let mut cache = MessageCache::new(2, 2);
        let m1 = msg("t", b"one");
        let id1 = m1.id();
        cache.put("t".into(), m1);
        cache.shift();
        cache.put("t".into(), msg("t", b"two"));
        cache.shift();

        assert!(!cache.has(&id1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn seen_cache_deduplicates_and_expires() {
        let mut seen = SeenCache::new(10);
        let id = MessageId::from_bytes([1; 20]);

        assert!(seen.add(id, Timestamp::from_secs(0)));
        assert!(!seen.add(id, Timestamp::from_secs(1)));
        assert!(seen.has(&id));

        assert_eq!(seen.cleanup(Timestamp::from_secs(5)), 0);
        assert_eq!(seen.cleanup(Timestamp::from_secs(20)), 1);
        assert!(!seen.has(&id));
    }
}
