use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libp2p::multiaddr::Protocol;
use net_core::{Dialer, Multiaddr, PeerId, Timestamp};
use tracing::debug;

use crate::rate_limiter::DialRateLimiter;
use crate::v1::wire::{decode_message, encode_message, DialResponse, Message, ResponseStatus};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub dial_timeout: Duration,
    pub max_addresses: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { dial_timeout: Duration::from_secs(30), max_addresses: 8 }
    }
}

/// Handles inbound `/libp2p/autonat/1.0.0` DIAL requests: filters the
/// client's claimed addresses down to ones matching the observed TCP
/// remote IP (anti-amplification, spec §4.3), then dials back.
pub struct Server {
    dialer: Arc<dyn Dialer>,
    config: ServerConfig,
    limiter: Mutex<DialRateLimiter>,
}

impl Server {
    pub fn new(dialer: Arc<dyn Dialer>, config: ServerConfig, limiter: DialRateLimiter) -> Self {
        Self { dialer, config, limiter: Mutex::new(limiter) }
    }

    pub async fn handle_request(&self, client: PeerId, observed_remote: &Multiaddr, request: &[u8], now: Timestamp) -> Vec<u8> {
        let dial = match decode_message(request) {
            Ok(Message::Dial(d)) => d,
            Ok(Message::DialResponse(_)) => {
                return respond(ResponseStatus::BadRequest, Some("expected dial, got dialResponse".into()), None);
            }
            Err(e) => return respond(ResponseStatus::BadRequest, Some(e.to_string()), None),
        };

        if let Err(reason) = self.limiter.lock().unwrap().check(client, now) {
            debug!(peer = %client, %reason, "autonat v1 dial request rejected by rate limiter");
            return respond(ResponseStatus::DialRefused, Some(format!("rate limited: {reason}")), None);
        }

        let observed_ip = extract_ip(observed_remote);
        let matched: Vec<Multiaddr> = dial
            .addrs
            .iter()
            .filter_map(|b| Multiaddr::try_from(b.clone()).ok())
            .take(self.config.max_addresses)
            .filter(|a| extract_ip(a) == observed_ip)
            .collect();

        if matched.is_empty() {
            self.limiter.lock().unwrap().record_rejection(client, now);
            return respond(ResponseStatus::DialRefused, Some("no claimed address matches the observed IP".into()), None);
        }

        self.limiter.lock().unwrap().begin_dial(client);
        let mut last_error = None;
        let mut reachable = None;
        for addr in &matched {
            match tokio::time::timeout(self.config.dial_timeout, self.dialer.dial(Some(client), addr)).await {
                Ok(Ok(())) => {
                    reachable = Some(addr.clone());
                    break;
                }
                Ok(Err(e)) => last_error = Some(e.to_string()),
                Err(_) => last_error = Some("dial-back timed out".to_string()),
            }
        }
        self.limiter.lock().unwrap().end_dial(client);

        match reachable {
            Some(addr) => respond(ResponseStatus::Ok, None, Some(addr.to_vec())),
            None => {
                self.limiter.lock().unwrap().record_rejection(client, now);
                respond(ResponseStatus::DialError, last_error, None)
            }
        }
    }
}

fn respond(status: ResponseStatus, status_text: Option<String>, addr: Option<Vec<u8>>) -> Vec<u8> {
    encode_message(&Message::DialResponse(DialResponse { status, status_text, addr }))
}

fn extract_ip(addr: &Multiaddr) -> Option<IpAddr> {
    addr.iter().find_map(|p| match p {
        Protocol::Ip4(ip) => Some(IpAddr::V4(ip)),
        Protocol::Ip6(ip) => Some(IpAddr::V6(ip)),
        _ => None,
    })
}
