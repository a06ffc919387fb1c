//! AutoNAT v2 (spec §4.4): nonce-based anti-spoofing over two separate
//! protocols, since the dial-back arrives on a connection the server
//! opens to the client rather than a reply on the request stream.

pub mod client;
pub mod server;
pub mod wire;

pub const DIAL_REQUEST_PROTOCOL: &str = "/libp2p/autonat/2/dial-request";
pub const DIAL_BACK_PROTOCOL: &str = "/libp2p/autonat/2/dial-back";

pub use client::{Client, ClientConfig};
pub use server::{RequestOutcome, Server, ServerConfig};
