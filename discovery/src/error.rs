use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertifiedRecordError {
    #[error("envelope signature does not validate")]
    InvalidSignature,
    #[error("payload type does not match the expected peer record type")]
    PayloadTypeMismatch,
    #[error("signer of the envelope does not match the record's peer id")]
    PeerIdMismatch,
    #[error("failed to extract the peer record from the envelope payload")]
    RecordExtractionFailed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("public key derives to {derived}, expected {expected}")]
pub struct PeerIdMismatchError {
    pub expected: net_core::PeerId,
    pub derived: net_core::PeerId,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("all discovery sources failed: {0:?}")]
    AllSourcesFailed(Vec<String>),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("bootstrap timed out")]
    Timeout,
    #[error("no seed peers configured")]
    NoSeeds,
    #[error("all seed peers failed: {0:?}")]
    AllSeedsFailed(Vec<String>),
    #[error("a bootstrap is already in progress")]
    AlreadyInProgress,
}
