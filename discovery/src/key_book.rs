use std::collections::HashMap;

use net_core::{PeerId, PublicKey};

use crate::error::PeerIdMismatchError;

/// Public keys known per peer (spec §3, §4.5).
///
/// A key is only accepted if it derives to the peer id it's being stored
/// under — this is what lets `PeerId` stay a content hash of the key rather
/// than an arbitrary label.
#[derive(Default)]
pub struct KeyBook {
    keys: HashMap<PeerId, PublicKey>,
}

impl KeyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, peer: PeerId, key: PublicKey) -> Result<(), PeerIdMismatchError> {
        let derived = key.to_peer_id();
        if derived != peer {
            return Err(PeerIdMismatchError {
                expected: peer,
                derived,
            });
        }
        self.keys.insert(peer, key);
        Ok(())
    }

    pub fn get(&self, peer: &PeerId) -> Option<&PublicKey> {
        self.keys.get(peer)
    }

    pub fn remove(&mut self, peer: &PeerId) -> Option<PublicKey> {
        self.keys.remove(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> net_core::Keypair {
        net_core::Keypair::ed25519_from_bytes([seed; 32]).unwrap()
    }

    #[test]
    fn accepts_a_key_that_derives_to_its_peer_id() {
        let kp = keypair(1);
        let peer = kp.public().to_peer_id();
        let mut book = KeyBook::new();
        assert!(book.set_key(peer, kp.public()).is_ok());
        assert!(book.get(&peer).is_some());
    }

    #[test]
    fn rejects_a_key_that_derives_to_a_different_peer_id() {
        let kp = keypair(1);
        let other_peer = keypair(2).public().to_peer_id();
        let mut book = KeyBook::new();
        let err = book.set_key(other_peer, kp.public()).unwrap_err();
        assert_eq!(err.expected, other_peer);
    }
}
