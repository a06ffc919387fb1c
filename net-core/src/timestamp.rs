use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::time::{Duration, SystemTime};

/// Unix timestamp in seconds since epoch.
///
/// Every long-lived component in this workspace reads "now" through a
/// [`Clock`] instead of calling `SystemTime::now()` directly, so tests can
/// inject deterministic time (TTL expiry, backoff deadlines, nonce expiry).
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Debug, Serialize, Deserialize, Default, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn checked_sub(self, other: Timestamp) -> Option<Duration> {
        self.0.checked_sub(other.0).map(Duration::from_secs)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self {
        Self(self.as_secs().saturating_sub(rhs.as_secs()))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.as_secs().saturating_add(rhs.as_secs()))
    }
}

/// Source of "now", injected so heartbeat/backoff/TTL logic is testable
/// without sleeping real time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Clock backed by the OS wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("now() is never before UNIX_EPOCH")
            .as_secs();
        Timestamp::from_secs(secs)
    }
}

#[cfg(test)]
mod arb {
    use super::Timestamp;

    impl quickcheck::Arbitrary for Timestamp {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            Self(u64::arbitrary(g))
        }
    }
}
