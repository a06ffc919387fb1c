//! AutoNAT v1 (spec §4.3): dial-back reachability probing with
//! IP-match anti-amplification on the server side.

pub mod client;
pub mod server;
pub mod wire;

pub const PROTOCOL_ID: &str = "/libp2p/autonat/1.0.0";

pub use client::{Client, ClientConfig};
pub use server::{Server, ServerConfig};
