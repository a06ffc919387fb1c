use std::sync::{Arc, Mutex};
use std::time::Duration;

use net_core::{Dialer, Multiaddr, PeerId, StreamOpener, Timestamp};
use tracing::debug;

use crate::error::AutoNatError;
use crate::framing::{read_length_prefixed, write_length_prefixed};
use crate::rate_limiter::CooldownLimiter;
use crate::v2::wire::{
    decode_dial_back_response, decode_dial_request, encode_dial_back, encode_dial_response, DialBack, DialRequest,
    DialResponse, DialStatus,
};
use crate::v2::DIAL_BACK_PROTOCOL;

const MAX_REQUEST_LEN: usize = 2048;
const MAX_RESPONSE_LEN: usize = 512;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub dial_timeout: Duration,
    pub cooldown: Duration,
    pub cooldown_state_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(30),
            cooldown: Duration::from_secs(10),
            cooldown_state_ttl: Duration::from_secs(3600),
        }
    }
}

/// Outcome of validating an inbound `DialRequest`, before the dial-back
/// is attempted.
pub enum RequestOutcome {
    /// Rejected; these are the bytes to send back on the request stream.
    Rejected(Vec<u8>),
    /// Accepted; `ack` is the bytes to send back on the request stream,
    /// and `request` should be handed to [`Server::perform_dial_back`].
    Accepted { request: DialRequest, ack: Vec<u8> },
}

pub struct Server {
    dialer: Arc<dyn Dialer>,
    opener: Arc<dyn StreamOpener>,
    config: ServerConfig,
    cooldown: Mutex<CooldownLimiter>,
}

impl Server {
    pub fn new(dialer: Arc<dyn Dialer>, opener: Arc<dyn StreamOpener>, config: ServerConfig) -> Self {
        let cooldown = CooldownLimiter::new(config.cooldown, config.cooldown_state_ttl);
        Self { dialer, opener, config, cooldown: Mutex::new(cooldown) }
    }

    /// Parses and rate-limits an inbound `DialRequest` on the
    /// dial-request stream.
    pub fn handle_request(&self, client: PeerId, request_bytes: &[u8], now: Timestamp) -> RequestOutcome {
        let request = match decode_dial_request(request_bytes) {
            Ok(r) => r,
            Err(e) => return RequestOutcome::Rejected(respond(DialStatus::BadRequest, Some(e.to_string()))),
        };

        if let Err(reason) = self.cooldown.lock().unwrap().check(client, now) {
            debug!(peer = %client, %reason, "autonat v2 dial request rejected by cooldown");
            return RequestOutcome::Rejected(respond(DialStatus::DialError, Some(format!("rate limited: {reason}"))));
        }
        self.cooldown.lock().unwrap().record_checked(client, now);

        RequestOutcome::Accepted { ack: respond(DialStatus::Ok, None), request }
    }

    /// Dials `client` at the address it claimed, then proves it by
    /// opening a fresh stream on the dial-back protocol and sending the
    /// nonce back (spec §4.4).
    pub async fn perform_dial_back(&self, client: PeerId, request: DialRequest) -> Result<(), AutoNatError> {
        let addr = Multiaddr::try_from(request.address).map_err(|e| AutoNatError::BadRequest(e.to_string()))?;

        tokio::time::timeout(self.config.dial_timeout, self.dialer.dial(Some(client), &addr))
            .await
            .map_err(|_| AutoNatError::Timeout)?
            .map_err(|e| AutoNatError::DialFailed(e.to_string()))?;

        let mut stream = self
            .opener
            .new_stream(client, DIAL_BACK_PROTOCOL)
            .await
            .map_err(|e| AutoNatError::DialBackFailed(e.to_string()))?;

        let dial_back = encode_dial_back(&DialBack { nonce: request.nonce });
        write_length_prefixed(&mut *stream, &dial_back)
            .await
            .map_err(|e| AutoNatError::DialBackFailed(e.to_string()))?;

        let response_bytes = tokio::time::timeout(
            self.config.dial_timeout,
            read_length_prefixed(&mut *stream, MAX_RESPONSE_LEN),
        )
        .await
        .map_err(|_| AutoNatError::Timeout)?
        .map_err(|e| AutoNatError::DialBackFailed(e.to_string()))?;

        let response = decode_dial_back_response(&response_bytes)?;
        if !response.ok {
            return Err(AutoNatError::DialBackFailed("client rejected dial-back".into()));
        }
        Ok(())
    }
}

fn respond(status: DialStatus, status_text: Option<String>) -> Vec<u8> {
    encode_dial_response(&DialResponse { status, status_text })
}
