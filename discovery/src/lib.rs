//! Discovery substrate (spec §3/§4.5): books tracking what's known about a
//! peer (addresses, keys, protocols, metadata), a certified-record variant
//! for self-signed peer records, composition across discovery sources, and
//! bootstrap dialing of seed peers.
//!
//! Like `gossipsub`/`autonat`, nothing here opens a socket directly — the
//! [`net_core::Dialer`] capability drives bootstrap dialing.

pub mod address_book;
pub mod bootstrap;
pub mod certified_book;
pub mod composite;
pub mod error;
pub mod events;
pub mod file_store;
pub mod key_book;
pub mod metadata_book;
pub mod peer_store;
pub mod proto_book;
pub mod types;

pub use address_book::{AddressBook, ScoringConfig};
pub use bootstrap::{Bootstrap, BootstrapConfig, BootstrapEvent, BootstrapResult};
pub use certified_book::CertifiedAddressBook;
pub use composite::{CompositeDiscovery, Discovery, ObservedEvent};
pub use error::{BootstrapError, CertifiedRecordError, DiscoveryError, PeerIdMismatchError};
pub use events::PeerStoreEvent;
pub use file_store::FilePeerStore;
pub use key_book::KeyBook;
pub use metadata_book::{MetadataBook, MetadataEvent, MetadataKey};
pub use peer_store::{MemoryPeerStore, PeerStoreConfig};
pub use proto_book::ProtoBook;
pub use types::{AddressRecord, CertifiedPeerRecord, PeerRecord};
