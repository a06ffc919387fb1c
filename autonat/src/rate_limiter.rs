//! Per-peer and global dial-back rate limiting (spec §4.3/§4.4).
//!
//! Ported from `ipld/resolver::limiter::RateLimiter`: a `gcra` state per
//! key, forgotten after inactivity via an `lru_time_cache::LruCache`.
//! Concurrency caps and post-rejection backoff are new, since the teacher's
//! limiter only throttles request rate, not concurrent in-flight dials.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gcra::GcraState;
pub use gcra::RateLimit;
use lru_time_cache::LruCache;
use net_core::{PeerId, Timestamp};

use crate::error::RateLimitReason;

#[derive(Debug, Clone)]
pub struct DialRateLimiterConfig {
    pub peer_limit: RateLimit,
    pub global_limit: RateLimit,
    pub max_peer_concurrent_dials: usize,
    pub max_global_concurrent_dials: usize,
    /// How long a peer is refused after a rejected/failed probe.
    pub backoff: Duration,
    /// How long an inactive peer's rate-limit state is retained.
    pub state_ttl: Duration,
}

pub struct DialRateLimiter {
    config: DialRateLimiterConfig,
    peer_states: LruCache<PeerId, GcraState>,
    global_state: GcraState,
    peer_concurrent: HashMap<PeerId, usize>,
    global_concurrent: usize,
    backoff_until: LruCache<PeerId, Timestamp>,
}

impl DialRateLimiter {
    pub fn new(config: DialRateLimiterConfig) -> Self {
        let state_ttl = config.state_ttl;
        Self {
            config,
            peer_states: LruCache::with_expiry_duration(state_ttl),
            global_state: GcraState::default(),
            peer_concurrent: HashMap::new(),
            global_concurrent: 0,
            backoff_until: LruCache::with_expiry_duration(state_ttl),
        }
    }

    /// Checks whether `peer` may start a new dial-back right now. Does not
    /// itself reserve a concurrency slot; call [`Self::begin_dial`] once the
    /// dial actually starts.
    pub fn check(&mut self, peer: PeerId, now: Timestamp) -> Result<(), RateLimitReason> {
        if let Some(until) = self.backoff_until.peek(&peer) {
            if now < *until {
                return Err(RateLimitReason::Backoff);
            }
        }

        if self.global_concurrent >= self.config.max_global_concurrent_dials {
            return Err(RateLimitReason::GlobalConcurrency);
        }
        let peer_concurrent = *self.peer_concurrent.get(&peer).unwrap_or(&0);
        if peer_concurrent >= self.config.max_peer_concurrent_dials {
            return Err(RateLimitReason::PeerConcurrency);
        }

        let instant = Instant::now();
        if self
            .global_state
            .check_and_modify_at(&self.config.global_limit, instant, 1)
            .is_err()
        {
            return Err(RateLimitReason::GlobalRate);
        }

        #[allow(clippy::unwrap_or_default)]
        let peer_state = self.peer_states.entry(peer).or_insert_with(GcraState::default);
        if peer_state.check_and_modify_at(&self.config.peer_limit, instant, 1).is_err() {
            return Err(RateLimitReason::PeerRate);
        }

        Ok(())
    }

    pub fn begin_dial(&mut self, peer: PeerId) {
        self.global_concurrent += 1;
        *self.peer_concurrent.entry(peer).or_insert(0) += 1;
    }

    pub fn end_dial(&mut self, peer: PeerId) {
        self.global_concurrent = self.global_concurrent.saturating_sub(1);
        if let Some(count) = self.peer_concurrent.get_mut(&peer) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.peer_concurrent.remove(&peer);
            }
        }
    }

    /// Put `peer` into backoff starting at `now`, e.g. after a rejected or
    /// failed probe.
    pub fn record_rejection(&mut self, peer: PeerId, now: Timestamp) {
        self.backoff_until.insert(peer, now + self.config.backoff);
    }
}

/// Simple per-peer cooldown used by AutoNAT v2 (spec §4.4): a probe is
/// refused if the peer's last checked timestamp is within `cooldown`,
/// unlike v1's sliding-window-plus-concurrency limiter.
pub struct CooldownLimiter {
    cooldown: Duration,
    last_checked: LruCache<PeerId, Timestamp>,
}

impl CooldownLimiter {
    pub fn new(cooldown: Duration, state_ttl: Duration) -> Self {
        Self { cooldown, last_checked: LruCache::with_expiry_duration(state_ttl) }
    }

    pub fn check(&mut self, peer: PeerId, now: Timestamp) -> Result<(), RateLimitReason> {
        if let Some(last) = self.last_checked.peek(&peer) {
            if now.checked_sub(*last).map(|d| d < self.cooldown).unwrap_or(false) {
                return Err(RateLimitReason::Backoff);
            }
        }
        Ok(())
    }

    pub fn record_checked(&mut self, peer: PeerId, now: Timestamp) {
        self.last_checked.insert(peer, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DialRateLimiterConfig {
        DialRateLimiterConfig {
            peer_limit: RateLimit::new(2, Duration::from_secs(60)),
            global_limit: RateLimit::new(10, Duration::from_secs(60)),
            max_peer_concurrent_dials: 1,
            max_global_concurrent_dials: 2,
            backoff: Duration::from_secs(30),
            state_ttl: Duration::from_secs(3600),
        }
    }

    #[test]
    fn enforces_peer_concurrency_cap() {
        let mut limiter = DialRateLimiter::new(config());
        let peer = net_core::Keypair::generate_ed25519().public().to_peer_id();

        assert!(limiter.check(peer, Timestamp::from_secs(0)).is_ok());
        limiter.begin_dial(peer);
        assert_eq!(limiter.check(peer, Timestamp::from_secs(0)), Err(RateLimitReason::PeerConcurrency));
        limiter.end_dial(peer);
        assert!(limiter.check(peer, Timestamp::from_secs(0)).is_ok());
    }

    #[test]
    fn backoff_rejects_until_it_elapses() {
        let mut limiter = DialRateLimiter::new(config());
        let peer = net_core::Keypair::generate_ed25519().public().to_peer_id();

        limiter.record_rejection(peer, Timestamp::from_secs(100));
        assert_eq!(limiter.check(peer, Timestamp::from_secs(110)), Err(RateLimitReason::Backoff));
        assert!(limiter.check(peer, Timestamp::from_secs(131)).is_ok());
    }

    #[test]
    fn cooldown_limiter_blocks_until_it_elapses() {
        let mut limiter = CooldownLimiter::new(Duration::from_secs(60), Duration::from_secs(3600));
        let peer = net_core::Keypair::generate_ed25519().public().to_peer_id();

        assert!(limiter.check(peer, Timestamp::from_secs(0)).is_ok());
        limiter.record_checked(peer, Timestamp::from_secs(0));
        assert_eq!(limiter.check(peer, Timestamp::from_secs(30)), Err(RateLimitReason::Backoff));
        assert!(limiter.check(peer, Timestamp::from_secs(61)).is_ok());
    }
}
