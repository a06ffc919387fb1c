pub mod server;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // GossipSub mesh
    mesh_peers: IntGauge,
    fanout_peers: IntGauge,
    subscribed_topics: IntGauge,
    messages_published: IntCounterVec,
    messages_received: IntCounterVec,
    messages_duplicate: IntCounterVec,
    messages_rejected: IntCounterVec,
    heartbeat_duration: HistogramVec,

    // GossipSub scoring
    peers_graylisted: IntGauge,
    peer_score: HistogramVec,

    // AutoNAT
    nat_status: IntGauge,
    probes_total: IntCounterVec,
    dial_back_total: IntCounterVec,
    rate_limited_total: IntCounterVec,

    // Discovery
    known_peers: IntGauge,
    known_addresses: IntGauge,
    bootstrap_attempts: IntCounterVec,
    discovery_find_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let mesh_peers = IntGauge::with_opts(Opts::new("gossipsub_mesh_peers", "Number of peers across all mesh topics")).unwrap();
        registry.register(Box::new(mesh_peers.clone())).unwrap();

        let fanout_peers = IntGauge::with_opts(Opts::new("gossipsub_fanout_peers", "Number of peers across all fanout topics")).unwrap();
        registry.register(Box::new(fanout_peers.clone())).unwrap();

        let subscribed_topics = IntGauge::with_opts(Opts::new("gossipsub_subscribed_topics", "Number of currently subscribed topics")).unwrap();
        registry.register(Box::new(subscribed_topics.clone())).unwrap();

        let messages_published = IntCounterVec::new(
            Opts::new("gossipsub_messages_published_total", "Total number of messages published"),
            &["topic"],
        ).unwrap();
        registry.register(Box::new(messages_published.clone())).unwrap();

        let messages_received = IntCounterVec::new(
            Opts::new("gossipsub_messages_received_total", "Total number of messages received"),
            &["topic"],
        ).unwrap();
        registry.register(Box::new(messages_received.clone())).unwrap();

        let messages_duplicate = IntCounterVec::new(
            Opts::new("gossipsub_messages_duplicate_total", "Total number of duplicate messages seen"),
            &["topic"],
        ).unwrap();
        registry.register(Box::new(messages_duplicate.clone())).unwrap();

        let messages_rejected = IntCounterVec::new(
            Opts::new("gossipsub_messages_rejected_total", "Total number of messages rejected by validation"),
            &["topic", "reason"],
        ).unwrap();
        registry.register(Box::new(messages_rejected.clone())).unwrap();

        let heartbeat_duration = HistogramVec::new(
            HistogramOpts::new("gossipsub_heartbeat_duration_seconds", "Time taken to run one heartbeat")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5]),
            &[],
        ).unwrap();
        registry.register(Box::new(heartbeat_duration.clone())).unwrap();

        let peers_graylisted = IntGauge::with_opts(Opts::new("gossipsub_peers_graylisted", "Number of graylisted peers")).unwrap();
        registry.register(Box::new(peers_graylisted.clone())).unwrap();

        let peer_score = HistogramVec::new(
            HistogramOpts::new("gossipsub_peer_score", "Distribution of peer scores")
                .buckets(vec![-100.0, -50.0, -10.0, 0.0, 10.0, 50.0, 100.0]),
            &[],
        ).unwrap();
        registry.register(Box::new(peer_score.clone())).unwrap();

        let nat_status = IntGauge::with_opts(Opts::new("autonat_status", "Current NAT status: 0=unknown, 1=public, 2=private")).unwrap();
        registry.register(Box::new(nat_status.clone())).unwrap();

        let probes_total = IntCounterVec::new(
            Opts::new("autonat_probes_total", "Total number of AutoNAT probes run"),
            &["version", "outcome"],
        ).unwrap();
        registry.register(Box::new(probes_total.clone())).unwrap();

        let dial_back_total = IntCounterVec::new(
            Opts::new("autonat_dial_back_total", "Total number of server-initiated dial-backs"),
            &["result"],
        ).unwrap();
        registry.register(Box::new(dial_back_total.clone())).unwrap();

        let rate_limited_total = IntCounterVec::new(
            Opts::new("autonat_rate_limited_total", "Total number of dial requests rejected by rate limiting"),
            &["reason"],
        ).unwrap();
        registry.register(Box::new(rate_limited_total.clone())).unwrap();

        let known_peers = IntGauge::with_opts(Opts::new("discovery_known_peers", "Number of peers tracked in the peer store")).unwrap();
        registry.register(Box::new(known_peers.clone())).unwrap();

        let known_addresses = IntGauge::with_opts(Opts::new("discovery_known_addresses", "Number of addresses tracked across all peers")).unwrap();
        registry.register(Box::new(known_addresses.clone())).unwrap();

        let bootstrap_attempts = IntCounterVec::new(
            Opts::new("discovery_bootstrap_attempts_total", "Total number of bootstrap seed dial attempts"),
            &["result"],
        ).unwrap();
        registry.register(Box::new(bootstrap_attempts.clone())).unwrap();

        let discovery_find_duration = HistogramVec::new(
            HistogramOpts::new("discovery_find_duration_seconds", "Time taken by CompositeDiscovery::find")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0]),
            &[],
        ).unwrap();
        registry.register(Box::new(discovery_find_duration.clone())).unwrap();

        Self {
            registry,
            mesh_peers,
            fanout_peers,
            subscribed_topics,
            messages_published,
            messages_received,
            messages_duplicate,
            messages_rejected,
            heartbeat_duration,
            peers_graylisted,
            peer_score,
            nat_status,
            probes_total,
            dial_back_total,
            rate_limited_total,
            known_peers,
            known_addresses,
            bootstrap_attempts,
            discovery_find_duration,
        }
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer).expect("failed to encode metrics");
        String::from_utf8(buffer).expect("metrics not utf8")
    }

    // GossipSub
    pub fn set_mesh_peers(&self, v: i64) {
        self.mesh_peers.set(v);
    }

    pub fn set_fanout_peers(&self, v: i64) {
        self.fanout_peers.set(v);
    }

    pub fn set_subscribed_topics(&self, v: i64) {
        self.subscribed_topics.set(v);
    }

    pub fn inc_messages_published(&self, topic: &str) {
        self.messages_published.with_label_values(&[topic]).inc();
    }

    pub fn inc_messages_received(&self, topic: &str) {
        self.messages_received.with_label_values(&[topic]).inc();
    }

    pub fn inc_messages_duplicate(&self, topic: &str) {
        self.messages_duplicate.with_label_values(&[topic]).inc();
    }

    pub fn inc_messages_rejected(&self, topic: &str, reason: &str) {
        self.messages_rejected.with_label_values(&[topic, reason]).inc();
    }

    pub fn observe_heartbeat_duration(&self, duration: f64) {
        self.heartbeat_duration.with_label_values::<&str>(&[]).observe(duration);
    }

    pub fn set_peers_graylisted(&self, v: i64) {
        self.peers_graylisted.set(v);
    }

    pub fn observe_peer_score(&self, score: f64) {
        self.peer_score.with_label_values::<&str>(&[]).observe(score);
    }

    // AutoNAT
    pub fn set_nat_status(&self, v: i64) {
        self.nat_status.set(v);
    }

    pub fn inc_probes(&self, version: &str, outcome: &str) {
        self.probes_total.with_label_values(&[version, outcome]).inc();
    }

    pub fn inc_dial_back(&self, result: &str) {
        self.dial_back_total.with_label_values(&[result]).inc();
    }

    pub fn inc_rate_limited(&self, reason: &str) {
        self.rate_limited_total.with_label_values(&[reason]).inc();
    }

    // Discovery
    pub fn set_known_peers(&self, v: i64) {
        self.known_peers.set(v);
    }

    pub fn set_known_addresses(&self, v: i64) {
        self.known_addresses.set(v);
    }

    pub fn inc_bootstrap_attempts(&self, result: &str) {
        self.bootstrap_attempts.with_label_values(&[result]).inc();
    }

    pub fn observe_discovery_find_duration(&self, duration: f64) {
        self.discovery_find_duration.with_label_values::<&str>(&[]).observe(duration);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<Metrics>;
