use libp2p_identity::{Keypair, PeerId, PublicKey};
use thiserror::Error;

/// A payload type that can be carried inside a [`Envelope`].
///
/// Mirrors `ipld/resolver::signed_record::Record`: the payload names its
/// own type tag and can assert that a recovered public key is the one it
/// expects to have signed it.
pub trait Payload {
    /// Domain-separating type tag included in the signed payload, e.g.
    /// `"libp2p/peer-record"`.
    fn payload_type() -> &'static str;

    /// Checks that `key` is consistent with this payload (e.g. that the
    /// key derives to the `peerID` the payload claims to describe).
    fn check_signing_key(&self, key: &PublicKey) -> bool;
}

/// A signed container binding a payload to a signer [`PeerId`].
///
/// This is the external "Envelope" collaborator named in spec §3/§6:
/// construction and signature verification are delegated to
/// `libp2p_identity::Keypair`/`PublicKey`, never reimplemented here.
#[derive(Debug, Clone)]
pub struct Envelope {
    public_key: PublicKey,
    domain: String,
    payload_type: Vec<u8>,
    payload: Vec<u8>,
    signature: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope signature does not validate")]
    InvalidSignature,
    #[error("envelope payload type does not match expected `{expected}`, got `{actual}`")]
    PayloadTypeMismatch { expected: String, actual: String },
    #[error("signer of the envelope does not match the record's claimed peer id")]
    PeerIdMismatch,
}

impl Envelope {
    pub fn new(key: &Keypair, domain: String, payload_type: Vec<u8>, payload: Vec<u8>) -> Self {
        let mut signing_input = Vec::with_capacity(
            domain.len() + payload_type.len() + payload.len() + 16,
        );
        signing_input.extend_from_slice(domain.as_bytes());
        signing_input.extend_from_slice(&(payload_type.len() as u64).to_be_bytes());
        signing_input.extend_from_slice(&payload_type);
        signing_input.extend_from_slice(&payload);

        let signature = key.sign(&signing_input).expect("ed25519/secp256k1 signing never fails");

        Self {
            public_key: key.public(),
            domain,
            payload_type,
            payload,
            signature,
        }
    }

    pub fn signer(&self) -> PeerId {
        self.public_key.to_peer_id()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    fn signing_input(&self) -> Vec<u8> {
        let mut signing_input = Vec::with_capacity(
            self.domain.len() + self.payload_type.len() + self.payload.len() + 16,
        );
        signing_input.extend_from_slice(self.domain.as_bytes());
        signing_input.extend_from_slice(&(self.payload_type.len() as u64).to_be_bytes());
        signing_input.extend_from_slice(&self.payload_type);
        signing_input.extend_from_slice(&self.payload);
        signing_input
    }

    /// Verify the signature and return the raw payload bytes, checked
    /// against `expected_domain`/`expected_payload_type`.
    pub fn payload_and_signing_key(
        &self,
        expected_domain: &str,
        expected_payload_type: &[u8],
    ) -> Result<(&[u8], &PublicKey), EnvelopeError> {
        if !self
            .public_key
            .verify(&self.signing_input(), &self.signature)
        {
            return Err(EnvelopeError::InvalidSignature);
        }
        if self.domain != expected_domain || self.payload_type != expected_payload_type {
            return Err(EnvelopeError::PayloadTypeMismatch {
                expected: String::from_utf8_lossy(expected_payload_type).into_owned(),
                actual: String::from_utf8_lossy(&self.payload_type).into_owned(),
            });
        }
        Ok((&self.payload, &self.public_key))
    }
}
