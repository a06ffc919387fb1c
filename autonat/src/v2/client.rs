use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use net_core::{Multiaddr, PeerId, StreamOpener, Timestamp};
use rand::RngCore;

use crate::error::AutoNatError;
use crate::framing::{read_length_prefixed, write_length_prefixed};
use crate::types::{PendingCheck, ProbeOutcome};
use crate::v2::wire::{decode_dial_back, decode_dial_response, encode_dial_request, DialRequest, DialStatus};
use crate::v2::DIAL_REQUEST_PROTOCOL;

const MAX_RESPONSE_LEN: usize = 2048;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub dial_timeout: Duration,
    /// How long a [`PendingCheck`] stays valid waiting for a dial-back.
    pub pending_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { dial_timeout: Duration::from_secs(30), pending_ttl: Duration::from_secs(60) }
    }
}

pub struct Client {
    opener: Arc<dyn StreamOpener>,
    config: ClientConfig,
    pending: Mutex<HashMap<u64, PendingCheck>>,
}

impl Client {
    pub fn new(opener: Arc<dyn StreamOpener>, config: ClientConfig) -> Self {
        Self { opener, config, pending: Mutex::new(HashMap::new()) }
    }

    /// Sends a `DialRequest` for `address` to `server`, registering a
    /// [`PendingCheck`] on acceptance. The probe's outcome is only known
    /// once the server's dial-back arrives, via [`Self::handle_dial_back`].
    pub async fn request(&self, server: PeerId, address: Multiaddr, now: Timestamp) -> Result<u64, AutoNatError> {
        let nonce = rand::thread_rng().next_u64();
        let request = DialRequest { address: address.to_vec(), nonce };

        let mut stream = self
            .opener
            .new_stream(server, DIAL_REQUEST_PROTOCOL)
            .await
            .map_err(|e| AutoNatError::DialFailed(e.to_string()))?;

        let bytes = encode_dial_request(&request);
        tokio::time::timeout(self.config.dial_timeout, write_length_prefixed(&mut *stream, &bytes))
            .await
            .map_err(|_| AutoNatError::Timeout)?
            .map_err(|e| AutoNatError::DialFailed(e.to_string()))?;

        let response_bytes = tokio::time::timeout(
            self.config.dial_timeout,
            read_length_prefixed(&mut *stream, MAX_RESPONSE_LEN),
        )
        .await
        .map_err(|_| AutoNatError::Timeout)?
        .map_err(|e| AutoNatError::DialFailed(e.to_string()))?;

        let response = decode_dial_response(&response_bytes)?;
        match response.status {
            DialStatus::Ok => {}
            DialStatus::DialError => return Err(AutoNatError::DialFailed(response.status_text.unwrap_or_default())),
            DialStatus::DialBackError => {
                return Err(AutoNatError::DialBackFailed(response.status_text.unwrap_or_default()))
            }
            DialStatus::BadRequest => return Err(AutoNatError::BadRequest(response.status_text.unwrap_or_default())),
            DialStatus::InternalError => {
                return Err(AutoNatError::InternalError(response.status_text.unwrap_or_default()))
            }
        }

        self.pending.lock().unwrap().insert(
            nonce,
            PendingCheck { address, nonce, expires_at: now + self.config.pending_ttl },
        );
        Ok(nonce)
    }

    /// Handles an inbound `DialBack` on the dial-back protocol. The nonce
    /// is consumed on lookup, so a replayed or guessed nonce verifies at
    /// most once (spec §8 invariant 8).
    pub fn handle_dial_back(&self, request_bytes: &[u8], now: Timestamp) -> Result<ProbeOutcome, AutoNatError> {
        let dial_back = decode_dial_back(request_bytes)?;
        let check = self
            .pending
            .lock()
            .unwrap()
            .remove(&dial_back.nonce)
            .ok_or(AutoNatError::NonceVerificationFailed)?;

        if check.is_expired(now) {
            return Err(AutoNatError::NonceExpired);
        }
        Ok(ProbeOutcome::Reachable(check.address))
    }

    /// Drops expired pending checks that never received a dial-back.
    pub fn expire_stale(&self, now: Timestamp) {
        self.pending.lock().unwrap().retain(|_, check| !check.is_expired(now));
    }
}
