use net_core::{Multiaddr, PeerId};

/// Broadcast to any number of subscribers as the peer store changes
/// (spec §4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum PeerStoreEvent {
    AddressAdded { peer: PeerId, address: Multiaddr },
    AddressUpdated { peer: PeerId, address: Multiaddr },
    AddressRemoved { peer: PeerId, address: Multiaddr },
    PeerRemoved { peer: PeerId },
}
