use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GossipsubError {
    #[error("already subscribed to topic")]
    AlreadySubscribed,
    #[error("subscription limit reached ({0})")]
    SubscriptionLimitReached(usize),
    #[error("message too large ({size} > {max})")]
    MessageTooLarge { size: usize, max: usize },
    #[error("message signing is enabled but no signing key is configured")]
    SigningRequiredNoKey,
    #[error("message signing requires a source peer id")]
    SigningRequiresSource,
    #[error("message signature does not validate")]
    InvalidSignature,
    #[error("failed to decode RPC: {0}")]
    RpcDecodeFailure(String),
}
