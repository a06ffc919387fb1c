//! Gossipsub type aliases and small value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Libp2p peer identifier.
///
/// Re-exported from `net-core`, which in turn re-exports
/// `libp2p_identity::PeerId` rather than reinventing identity.
pub type PeerId = net_core::PeerId;

/// Unix timestamp, shared with the rest of the workspace so heartbeat and
/// TTL logic can be driven by an injected [`net_core::Clock`].
pub type Timestamp = net_core::Timestamp;

/// 20-byte message identifier.
///
/// Default derivation is `SHA-256(data)[:20]` per the message-ID rule in
/// this workspace's wire contract; routers using `(source, seqno)` IDs
/// construct one directly via [`MessageId::from_bytes`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(#[serde(with = "serde_bytes_array")] [u8; 20]);

impl MessageId {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// First 20 bytes of SHA-256(data), per `MessageID.computeFromHash`.
    pub fn compute_from_hash(data: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(data);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[..20]);
        Self(bytes)
    }
}

impl From<&[u8]> for MessageId {
    fn from(slice: &[u8]) -> Self {
        let mut bytes = [0u8; 20];
        let len = slice.len().min(20);
        bytes[..len].copy_from_slice(&slice[..len]);
        Self(bytes)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", hex_fmt::HexFmt(&self.0))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex_fmt::HexFmt(&self.0))
    }
}

mod serde_bytes_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 20], ser: S) -> Result<S::Ok, S::Error> {
        hex_fmt::HexFmt(bytes).to_string().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 20], D::Error> {
        let s = String::deserialize(de)?;
        if s.len() != 40 {
            return Err(serde::de::Error::custom("expected 40 hex characters"));
        }
        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(serde::de::Error::custom)?;
        }
        Ok(bytes)
    }
}

/// Topic identifier.
///
/// Opaque from this workspace's point of view: applications decide on
/// their own topic naming scheme (e.g. `/app/1.0.0/name`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.0)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::borrow::Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Alias kept for modules that historically indexed maps by topic.
pub type TopicId = Topic;
