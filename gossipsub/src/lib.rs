//! GossipSub v1.1 mesh-routing pub/sub layer.
//!
//! [`router::GossipSubRouter`] owns mesh/fanout state, the message and
//! seen caches, and per-peer scoring; [`heartbeat::HeartbeatManager`]
//! drives periodic maintenance; [`wire`] encodes/decodes the RPC on the
//! wire. None of these types open network connections themselves —
//! callers own the transport and feed bytes in/out.

pub mod config;
pub mod control;
pub mod error;
pub mod heartbeat;
pub mod mcache;
pub mod mesh;
pub mod message;
pub mod peer_state;
pub mod router;
pub mod scoring;
pub mod topic;
pub mod types;
pub mod validator;
pub mod wire;

pub use config::GossipsubParameters;
pub use control::{ControlMessage, Graft, IDontWant, IHave, IWant, Prune};
pub use error::GossipsubError;
pub use heartbeat::HeartbeatManager;
pub use mcache::{CacheEntry, MessageCache, SeenCache};
pub use mesh::{FanoutEntry, MeshState, TopicMesh};
pub use message::RawGossipsubMessage;
pub use peer_state::{Direction, PeerState};
pub use router::{GossipSubRouter, Outbox};
pub use scoring::{PeerScorer, ScoringParameters};
pub use topic::Subscription;
pub use types::{MessageId, PeerId, Timestamp, Topic, TopicId};
pub use validator::{AcceptAll, MessageValidator, ValidationResult};
pub use wire::{decode_rpc, encode_rpc, Rpc};
