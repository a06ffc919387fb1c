use async_trait::async_trait;
use libp2p::Multiaddr;
use libp2p_identity::PeerId;
use std::io;

/// A single, already-negotiated substream to a remote peer.
///
/// Transport and stream-muxer implementations are out of scope for this
/// workspace; protocols (GossipSub's RPC stream, AutoNAT's dial/dial-back
/// streams) are written against this capability set only.
#[async_trait]
pub trait MuxedStream: Send + Sync {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    async fn close_read(&mut self) -> io::Result<()>;
    async fn close_write(&mut self) -> io::Result<()>;
    async fn close(&mut self) -> io::Result<()>;
    async fn reset(&mut self) -> io::Result<()>;
}

/// Opens outbound substreams to a peer on a named protocol.
///
/// Implemented by the transport/swarm layer; GossipSub and AutoNAT depend
/// on this trait object rather than any concrete transport.
#[async_trait]
pub trait StreamOpener: Send + Sync {
    async fn new_stream(
        &self,
        peer: PeerId,
        protocol: &str,
    ) -> io::Result<Box<dyn MuxedStream>>;
}

/// Dials a peer at a specific address and reports whether the dial
/// succeeded, without exposing any transport internals.
///
/// AutoNAT's server uses this to perform the dial-back probe, and
/// Bootstrap uses it to connect to seed peers.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, peer: Option<PeerId>, addr: &Multiaddr) -> io::Result<()>;

    /// True if the local node already holds an open connection to `peer`.
    fn is_connected(&self, peer: &PeerId) -> bool;
}
