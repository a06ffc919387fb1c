use std::collections::HashMap;

use net_core::{Envelope, EnvelopeError, PeerId, Payload};

use crate::error::CertifiedRecordError;
use crate::types::CertifiedPeerRecord;

/// Domain separator passed to [`Envelope::payload_and_signing_key`] for
/// certified peer records (spec §4.5).
pub const DOMAIN: &str = "libp2p-peer-record";

/// Peer records accepted only when signed by the peer they describe, and
/// only when newer than what's already stored (spec §4.5, §8 invariant 6).
#[derive(Default)]
pub struct CertifiedAddressBook {
    records: HashMap<PeerId, CertifiedPeerRecord>,
}

impl CertifiedAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, peer: &PeerId) -> Option<&CertifiedPeerRecord> {
        self.records.get(peer)
    }

    /// Verify `envelope`, decode the enclosed record, and accept it if its
    /// `seq` is strictly greater than whatever is currently stored for that
    /// peer. Returns `Ok(true)` if the record replaced the stored one.
    pub fn consume(&mut self, envelope: &Envelope) -> Result<bool, CertifiedRecordError> {
        let (payload_bytes, signing_key) = envelope
            .payload_and_signing_key(DOMAIN, CertifiedPeerRecord::payload_type().as_bytes())
            .map_err(|err| match err {
                EnvelopeError::InvalidSignature => CertifiedRecordError::InvalidSignature,
                EnvelopeError::PayloadTypeMismatch { .. } => CertifiedRecordError::PayloadTypeMismatch,
                EnvelopeError::PeerIdMismatch => CertifiedRecordError::PeerIdMismatch,
            })?;

        let record: CertifiedPeerRecord = serde_json::from_slice(payload_bytes)
            .map_err(|_| CertifiedRecordError::RecordExtractionFailed)?;

        if !record.check_signing_key(signing_key) {
            return Err(CertifiedRecordError::PeerIdMismatch);
        }
        if envelope.signer() != record.peer_id {
            return Err(CertifiedRecordError::PeerIdMismatch);
        }

        match self.records.get(&record.peer_id) {
            Some(existing) if record.seq <= existing.seq => Ok(false),
            _ => {
                self.records.insert(record.peer_id, record);
                Ok(true)
            }
        }
    }

    pub fn remove(&mut self, peer: &PeerId) {
        self.records.remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> net_core::Keypair {
        net_core::Keypair::ed25519_from_bytes([seed; 32]).unwrap()
    }

    fn envelope_for(kp: &net_core::Keypair, record: &CertifiedPeerRecord) -> Envelope {
        let payload = serde_json::to_vec(record).unwrap();
        Envelope::new(
            kp,
            DOMAIN.to_string(),
            CertifiedPeerRecord::payload_type().as_bytes().to_vec(),
            payload,
        )
    }

    #[test]
    fn accepts_a_strictly_newer_record_and_rejects_a_stale_one() {
        let kp = keypair(1);
        let peer = kp.public().to_peer_id();
        let mut book = CertifiedAddressBook::new();

        let record_v5 = CertifiedPeerRecord {
            peer_id: peer,
            addresses: vec!["/ip4/1.1.1.1/tcp/1".parse().unwrap()],
            seq: 5,
        };
        assert_eq!(book.consume(&envelope_for(&kp, &record_v5)).unwrap(), true);
        assert_eq!(book.consume(&envelope_for(&kp, &record_v5)).unwrap(), false);

        let record_v6 = CertifiedPeerRecord { seq: 6, ..record_v5 };
        assert_eq!(book.consume(&envelope_for(&kp, &record_v6)).unwrap(), true);
        assert_eq!(book.get(&peer).unwrap().seq, 6);
    }

    #[test]
    fn rejects_a_record_signed_by_someone_other_than_its_subject() {
        let signer = keypair(1);
        let claimed_peer = keypair(2).public().to_peer_id();
        let record = CertifiedPeerRecord {
            peer_id: claimed_peer,
            addresses: vec![],
            seq: 1,
        };
        let mut book = CertifiedAddressBook::new();
        let err = book.consume(&envelope_for(&signer, &record)).unwrap_err();
        assert_eq!(err, CertifiedRecordError::PeerIdMismatch);
    }
}
