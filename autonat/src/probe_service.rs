//! Drives repeated AutoNAT v1 probes against a set of servers, folding
//! outcomes into a [`NatStatusTracker`] and broadcasting [`Event`]s to any
//! number of subscribers — the same `tokio::sync::broadcast` shape
//! `ipld/resolver::service::Service` uses for its subnet events.

use net_core::{Multiaddr, PeerId};
use tokio::sync::broadcast;

use crate::error::AutoNatError;
use crate::status::{NatStatusTracker, NatStatusTrackerConfig};
use crate::types::{Event, NatStatus, ProbeOutcomeSummary};
use crate::v1::Client;

pub struct ProbeService {
    client: Client,
    tracker: std::sync::Mutex<NatStatusTracker>,
    event_tx: broadcast::Sender<Event>,
}

impl ProbeService {
    pub fn new(client: Client, tracker_config: NatStatusTrackerConfig, event_buffer: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_buffer);
        Self { client, tracker: std::sync::Mutex::new(NatStatusTracker::new(tracker_config)), event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub fn status(&self) -> NatStatus {
        self.tracker.lock().unwrap().status()
    }

    /// Probes every server in turn, updating the tracker and emitting
    /// events as it goes. Returns the status after folding in all of
    /// this round's outcomes.
    pub async fn run_probe(&self, servers: &[PeerId], local_addrs: &[Multiaddr]) -> Result<NatStatus, AutoNatError> {
        if servers.is_empty() {
            return Err(AutoNatError::NoServersAvailable);
        }
        if local_addrs.is_empty() {
            return Err(AutoNatError::NoLocalAddresses);
        }

        for &server in servers {
            let _ = self.event_tx.send(Event::ProbeStarted { server });

            let outcome = self.client.probe_one(server, local_addrs).await;
            let summary = match &outcome {
                Ok(o) => ProbeOutcomeSummary::from(o),
                Err(_) => ProbeOutcomeSummary::Error,
            };
            let _ = self.event_tx.send(Event::ProbeCompleted { server, outcome: summary });

            if let Ok(o) = &outcome {
                let old = self.tracker.lock().unwrap().status();
                if let Some(new) = self.tracker.lock().unwrap().record(o) {
                    let _ = self.event_tx.send(Event::StatusChanged { old, new });
                }
            }
        }

        Ok(self.status())
    }
}
