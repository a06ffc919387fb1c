use std::sync::Arc;
use std::time::Duration;

use net_core::{Multiaddr, PeerId, StreamOpener};

use crate::error::AutoNatError;
use crate::framing::{read_length_prefixed, write_length_prefixed};
use crate::types::ProbeOutcome;
use crate::v1::wire::{decode_message, encode_message, DialRequest, Message, ResponseStatus};
use crate::v1::PROTOCOL_ID;

const MAX_RESPONSE_LEN: usize = 4096;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub max_addresses: usize,
    pub dial_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { max_addresses: 8, dial_timeout: Duration::from_secs(30) }
    }
}

pub struct Client {
    local_peer: PeerId,
    opener: Arc<dyn StreamOpener>,
    config: ClientConfig,
}

impl Client {
    pub fn new(local_peer: PeerId, opener: Arc<dyn StreamOpener>, config: ClientConfig) -> Self {
        Self { local_peer, opener, config }
    }

    /// Probe `servers` in turn for reachability of `local_addrs`, failing
    /// fast if there is nothing to probe with or no servers to ask (spec
    /// §4.3).
    pub async fn probe(
        &self,
        servers: &[PeerId],
        local_addrs: &[Multiaddr],
    ) -> Result<Vec<(PeerId, Result<ProbeOutcome, AutoNatError>)>, AutoNatError> {
        if servers.is_empty() {
            return Err(AutoNatError::NoServersAvailable);
        }
        if local_addrs.is_empty() {
            return Err(AutoNatError::NoLocalAddresses);
        }

        let mut results = Vec::with_capacity(servers.len());
        for &server in servers {
            results.push((server, self.probe_one(server, local_addrs).await));
        }
        Ok(results)
    }

    pub(crate) async fn probe_one(&self, server: PeerId, local_addrs: &[Multiaddr]) -> Result<ProbeOutcome, AutoNatError> {
        let mut stream = self
            .opener
            .new_stream(server, PROTOCOL_ID)
            .await
            .map_err(|e| AutoNatError::DialFailed(e.to_string()))?;

        let addrs = local_addrs
            .iter()
            .take(self.config.max_addresses)
            .map(|a| a.to_vec())
            .collect();
        let request = Message::Dial(DialRequest { peer_id: self.local_peer.to_bytes(), addrs });
        let bytes = encode_message(&request);

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

        match decode_message(&response_bytes)? {
            Message::DialResponse(r) => match r.status {
                ResponseStatus::Ok => {
                    let addr_bytes = r
                        .addr
                        .ok_or_else(|| AutoNatError::ProtocolViolation("ok response missing addr".into()))?;
                    let addr = Multiaddr::try_from(addr_bytes)
                        .map_err(|e| AutoNatError::ProtocolViolation(e.to_string()))?;
                    Ok(ProbeOutcome::Reachable(addr))
                }
                ResponseStatus::DialError | ResponseStatus::DialRefused => Ok(ProbeOutcome::Unreachable),
                ResponseStatus::BadRequest => {
                    Err(AutoNatError::BadRequest(r.status_text.unwrap_or_default()))
                }
                ResponseStatus::InternalError => {
                    Err(AutoNatError::InternalError(r.status_text.unwrap_or_default()))
                }
            },
            Message::Dial(_) => Err(AutoNatError::ProtocolViolation("expected dialResponse, got dial".into())),
        }
    }
}
