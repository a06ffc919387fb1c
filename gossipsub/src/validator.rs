//! The application-registered hook deciding what to do with an incoming
//! message on a given topic, ahead of forwarding.

use crate::message::RawGossipsubMessage;
use crate::types::PeerId;

/// Outcome of validating one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    /// The message is well-formed and should be cached and forwarded.
    Accept,
    /// The message is malformed or malicious: penalize the sender, do not
    /// cache or forward.
    Reject,
    /// The message should be dropped silently: no penalty, no forwarding.
    Ignore,
}

/// External collaborator invoked once per topic, per message, before the
/// dedup/accept path runs. Transport- and domain-agnostic: this crate
/// never inspects message payloads itself.
pub trait MessageValidator: Send + Sync {
    fn validate(&self, message: &RawGossipsubMessage, from: &PeerId) -> ValidationResult;
}

/// A validator that accepts everything; the default when no validator is
/// registered for a topic.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl MessageValidator for AcceptAll {
    fn validate(&self, _message: &RawGossipsubMessage, _from: &PeerId) -> ValidationResult {
        ValidationResult::Accept
    }
}
