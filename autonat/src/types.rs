use net_core::{Multiaddr, PeerId, Timestamp};

use crate::error::{AutoNatError, RateLimitReason};

/// A node's believed external reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NatStatus {
    #[default]
    Unknown,
    Public,
    Private,
}

/// Outcome of a single dial-back attempt against one server, before it is
/// folded into the [`crate::status::NatStatusTracker`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The server reached us back on `addr`.
    Reachable(Multiaddr),
    /// The server tried and failed to reach us.
    Unreachable,
    /// The probe itself could not be completed (bad request, timeout, ...).
    Error(AutoNatError),
}

/// Observable events, broadcast to any number of subscribers (spec §4.3/4.4).
#[derive(Debug, Clone)]
pub enum Event {
    ProbeStarted { server: PeerId },
    ProbeCompleted { server: PeerId, outcome: ProbeOutcomeSummary },
    StatusChanged { old: NatStatus, new: NatStatus },
    DialBackRequested { client: PeerId, addr: Multiaddr },
    DialBackCompleted { client: PeerId, success: bool },
    RateLimitStateChanged { peer: Option<PeerId>, reason: RateLimitReason },
    DialRequestRejected { peer: PeerId, reason: RateLimitReason },
}

/// `Clone`-friendly summary of a [`ProbeOutcome`] for event consumers that
/// don't need the full error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcomeSummary {
    Reachable,
    Unreachable,
    Error,
}

impl From<&ProbeOutcome> for ProbeOutcomeSummary {
    fn from(outcome: &ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Reachable(_) => ProbeOutcomeSummary::Reachable,
            ProbeOutcome::Unreachable => ProbeOutcomeSummary::Unreachable,
            ProbeOutcome::Error(_) => ProbeOutcomeSummary::Error,
        }
    }
}

/// A pending AutoNAT v2 dial-back check awaiting verification (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCheck {
    pub address: Multiaddr,
    pub nonce: u64,
    pub expires_at: Timestamp,
}

impl PendingCheck {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}
