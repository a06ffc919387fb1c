//! AutoNAT reachability probing (spec §4.3/§4.4): v1's plain dial-back
//! and v2's nonce-verified dial-back, a shared [`status::NatStatusTracker`]
//! for aggregating outcomes, and dial-rate limiting for the server side.
//!
//! None of the client/server types in this crate open sockets themselves
//! — they're driven by the [`net_core::StreamOpener`]/[`net_core::Dialer`]
//! capabilities, same as `gossipsub`.

pub mod error;
pub mod framing;
pub mod probe_service;
pub mod rate_limiter;
pub mod status;
pub mod types;
pub mod v1;
pub mod v2;

pub use error::{AutoNatError, RateLimitReason};
pub use probe_service::ProbeService;
pub use rate_limiter::{CooldownLimiter, DialRateLimiter, DialRateLimiterConfig, RateLimit};
pub use status::{NatStatusTracker, NatStatusTrackerConfig};
pub use types::{Event, NatStatus, PendingCheck, ProbeOutcome, ProbeOutcomeSummary};
