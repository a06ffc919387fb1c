//! Gossipsub configuration.
//!
//! Parameters controlling mesh topology, timing, and caching behavior.
//! Defaults follow the gossipsub v1.1 reference implementation, not any
//! particular application's tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Core gossipsub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipsubParameters {
    /// The protocol ID negotiated for gossip streams.
    #[serde(default = "default_protocol_id")]
    pub protocol_id: String,

    /// Target number of mesh peers per topic (D).
    #[serde(default = "default_d")]
    pub d: usize,

    /// Minimum mesh peers before grafting (D_low).
    #[serde(default = "default_d_low")]
    pub d_low: usize,

    /// Maximum mesh peers before pruning (D_high).
    #[serde(default = "default_d_high")]
    pub d_high: usize,

    /// Number of non-mesh peers for IHAVE gossip (D_lazy).
    #[serde(default = "default_d_lazy")]
    pub d_lazy: usize,

    /// Minimum outbound mesh peers to preserve when pruning.
    #[serde(default = "default_d_out")]
    pub d_out: usize,

    /// Fraction of `d_lazy` sampled as additional gossip targets each
    /// heartbeat (`gossipFactor` in §4.1.2).
    #[serde(default = "default_gossip_factor")]
    pub gossip_factor: f64,

    /// Interval between heartbeat ticks in seconds.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: f64,

    /// Time-to-live for fanout entries in seconds.
    #[serde(default = "default_fanout_ttl_secs")]
    pub fanout_ttl_secs: u64,

    /// Default backoff applied to PRUNE'd peers, in seconds.
    #[serde(default = "default_prune_backoff_secs")]
    pub prune_backoff_secs: u64,

    /// Heartbeats between opportunistic-graft attempts.
    #[serde(default = "default_opportunistic_graft_ticks")]
    pub opportunistic_graft_ticks: u64,

    /// Peers opportunistically grafted per attempt.
    #[serde(default = "default_opportunistic_graft_peers")]
    pub opportunistic_graft_peers: usize,

    /// Total number of history windows in the message cache.
    #[serde(default = "default_mcache_len")]
    pub mcache_len: usize,

    /// Number of recent windows included in IHAVE gossip.
    #[serde(default = "default_mcache_gossip")]
    pub mcache_gossip: usize,

    /// Time-to-live for seen message IDs in seconds.
    #[serde(default = "default_seen_ttl_secs")]
    pub seen_ttl_secs: u64,

    /// Minimum message size in bytes to trigger an IDONTWANT broadcast.
    #[serde(default = "default_idontwant_threshold")]
    pub idontwant_message_size_threshold: usize,

    /// Maximum accepted message payload size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Maximum number of topics a peer may subscribe to.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions: usize,

    /// Maximum unseen message ids accepted from a single IHAVE.
    #[serde(default = "default_max_ihave_length")]
    pub max_ihave_length: usize,

    /// Maximum number of IHAVE messages processed per peer per heartbeat.
    #[serde(default = "default_max_ihave_messages")]
    pub max_ihave_messages: usize,

    /// Whether published messages are signed with the local signing key.
    #[serde(default)]
    pub sign_messages: bool,

    /// Whether a signing key is mandatory to publish when `sign_messages`
    /// is set (fails `signing-required-no-key` otherwise).
    #[serde(default)]
    pub require_signing_key: bool,
}

fn default_protocol_id() -> String {
    "/meshsub/1.1.0".to_string()
}

fn default_d() -> usize {
    6
}

fn default_d_low() -> usize {
    4
}

fn default_d_high() -> usize {
    12
}

fn default_d_lazy() -> usize {
    6
}

fn default_d_out() -> usize {
    2
}

fn default_gossip_factor() -> f64 {
    0.25
}

fn default_heartbeat_interval_secs() -> f64 {
    1.0
}

fn default_fanout_ttl_secs() -> u64 {
    60
}

fn default_prune_backoff_secs() -> u64 {
    60
}

fn default_opportunistic_graft_ticks() -> u64 {
    60
}

fn default_opportunistic_graft_peers() -> usize {
    2
}

fn default_mcache_len() -> usize {
    5
}

fn default_mcache_gossip() -> usize {
    3
}

fn default_seen_ttl_secs() -> u64 {
    120
}

fn default_idontwant_threshold() -> usize {
    1000
}

fn default_max_message_size() -> usize {
    1024 * 1024
}

fn default_max_subscriptions() -> usize {
    256
}

fn default_max_ihave_length() -> usize {
    5000
}

fn default_max_ihave_messages() -> usize {
    10
}

impl Default for GossipsubParameters {
    fn default() -> Self {
        Self {
            protocol_id: default_protocol_id(),
            d: default_d(),
            d_low: default_d_low(),
            d_high: default_d_high(),
            d_lazy: default_d_lazy(),
            d_out: default_d_out(),
            gossip_factor: default_gossip_factor(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            fanout_ttl_secs: default_fanout_ttl_secs(),
            prune_backoff_secs: default_prune_backoff_secs(),
            opportunistic_graft_ticks: default_opportunistic_graft_ticks(),
            opportunistic_graft_peers: default_opportunistic_graft_peers(),
            mcache_len: default_mcache_len(),
            mcache_gossip: default_mcache_gossip(),
            seen_ttl_secs: default_seen_ttl_secs(),
            idontwant_message_size_threshold: default_idontwant_threshold(),
            max_message_size: default_max_message_size(),
            max_subscriptions: default_max_subscriptions(),
            max_ihave_length: default_max_ihave_length(),
            max_ihave_messages: default_max_ihave_messages(),
            sign_messages: false,
            require_signing_key: false,
        }
    }
}

impl GossipsubParameters {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_interval_secs)
    }

    pub fn fanout_ttl(&self) -> Duration {
        Duration::from_secs(self.fanout_ttl_secs)
    }

    pub fn seen_ttl(&self) -> Duration {
        Duration::from_secs(self.seen_ttl_secs)
    }

    pub fn prune_backoff(&self) -> Duration {
        Duration::from_secs(self.prune_backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_satisfy_mesh_ordering() {
        let params = GossipsubParameters::default();

        assert!(params.d_low < params.d);
        assert!(params.d < params.d_high);
        assert!(params.d_lazy <= params.d_high);
        assert!(params.mcache_gossip <= params.mcache_len);
        assert_eq!(params.protocol_id, "/meshsub/1.1.0");
    }

    #[test]
    fn deserializes_with_partial_json_using_defaults() {
        let json = r#"{"d": 10}"#;
        let params: GossipsubParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.d, 10);
        assert_eq!(params.d_low, default_d_low());
    }
}
