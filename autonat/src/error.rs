use thiserror::Error;

/// Reasons a rate limit can reject a probe, distinguished so callers can
/// decide whether to retry immediately or back off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    GlobalRate,
    GlobalConcurrency,
    PeerRate,
    PeerConcurrency,
    Backoff,
}

impl std::fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RateLimitReason::GlobalRate => "global-rate",
            RateLimitReason::GlobalConcurrency => "global-concurrency",
            RateLimitReason::PeerRate => "peer-rate",
            RateLimitReason::PeerConcurrency => "peer-concurrency",
            RateLimitReason::Backoff => "backoff",
        };
        f.write_str(s)
    }
}

/// Error kinds shared by AutoNAT v1 and v2 (spec §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AutoNatError {
    #[error("no autonat servers available to probe")]
    NoServersAvailable,
    #[error("no local addresses to offer for probing")]
    NoLocalAddresses,
    #[error("dial failed: {0}")]
    DialFailed(String),
    #[error("dial refused by server")]
    DialRefused,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error("probe timed out")]
    Timeout,
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("insufficient probes to determine a status")]
    InsufficientProbes,
    #[error("rate limited: {0}")]
    RateLimited(RateLimitReason),
    #[error("peer id mismatch")]
    PeerIdMismatch,
    #[error("port {0} is not allowed to be dialed back")]
    PortNotAllowed(u16),

    // v2-specific.
    #[error("dial-back nonce did not verify")]
    NonceVerificationFailed,
    #[error("dial-back nonce expired before verification")]
    NonceExpired,
    #[error("dial-back failed: {0}")]
    DialBackFailed(String),
    #[error("service is shutting down")]
    ServiceShutdown,
    #[error("no address supplied to probe")]
    NoAddress,
}
