pub mod signing;
pub mod stream;
pub mod timestamp;

pub use libp2p::Multiaddr;
pub use libp2p_identity::{Keypair, PeerId, PublicKey};

pub use signing::{Envelope, EnvelopeError, Payload};
pub use stream::{Dialer, MuxedStream, StreamOpener};
pub use timestamp::{Clock, SystemClock, Timestamp};
