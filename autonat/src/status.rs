//! Aggregates individual dial-back outcomes into a stable [`NatStatus`]
//! (spec §4.3): a single conflicting probe shouldn't flip the status, so
//! transitions only happen once the sliding window's majority truly shifts.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{NatStatus, ProbeOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatStatusTrackerConfig {
    /// Minimum number of probes in the window before a status is reported.
    pub min_probes: usize,
    /// Maximum number of recent probes kept in the window.
    pub max_history: usize,
    /// Confidence ceiling; also the number of consecutive conflicting
    /// probes required to flip the status once it is established.
    pub max_confidence: u32,
}

impl Default for NatStatusTrackerConfig {
    fn default() -> Self {
        Self { min_probes: 3, max_history: 10, max_confidence: 3 }
    }
}

pub struct NatStatusTracker {
    config: NatStatusTrackerConfig,
    history: VecDeque<bool>,
    status: NatStatus,
    confidence: u32,
}

impl NatStatusTracker {
    pub fn new(config: NatStatusTrackerConfig) -> Self {
        Self { config, history: VecDeque::new(), status: NatStatus::Unknown, confidence: 0 }
    }

    pub fn status(&self) -> NatStatus {
        self.status
    }

    pub fn confidence(&self) -> u32 {
        self.confidence
    }

    pub fn probe_count(&self) -> usize {
        self.history.len()
    }

    /// Record a probe outcome. Errors don't modify history (spec §4.3).
    /// Returns `Some(new_status)` only when the status actually changed.
    pub fn record(&mut self, outcome: &ProbeOutcome) -> Option<NatStatus> {
        let reachable = match outcome {
            ProbeOutcome::Reachable(_) => true,
            ProbeOutcome::Unreachable => false,
            ProbeOutcome::Error(_) => return None,
        };

        self.history.push_back(reachable);
        while self.history.len() > self.config.max_history {
            self.history.pop_front();
        }

        if self.history.len() < self.config.min_probes {
            return None;
        }

        let reachable_count = self.history.iter().filter(|r| **r).count();
        let majority =
            if reachable_count * 2 > self.history.len() { NatStatus::Public } else { NatStatus::Private };

        if self.status == NatStatus::Unknown {
            self.status = majority;
            self.confidence = 1;
            return Some(self.status);
        }

        if majority == self.status {
            self.confidence = (self.confidence + 1).min(self.config.max_confidence);
            None
        } else {
            self.confidence = self.confidence.saturating_sub(1);
            if self.confidence == 0 {
                self.status = majority;
                self.confidence = 1;
                Some(self.status)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_unknown_below_min_probes() {
        let mut tracker = NatStatusTracker::new(NatStatusTrackerConfig { min_probes: 3, ..Default::default() });
        assert_eq!(tracker.record(&ProbeOutcome::Reachable(net_core::Multiaddr::empty())), None);
        assert_eq!(tracker.status(), NatStatus::Unknown);
    }

    #[test]
    fn majority_reachable_yields_public() {
        let mut tracker = NatStatusTracker::new(NatStatusTrackerConfig { min_probes: 2, max_history: 10, max_confidence: 3 });
        tracker.record(&ProbeOutcome::Reachable(net_core::Multiaddr::empty()));
        let changed = tracker.record(&ProbeOutcome::Reachable(net_core::Multiaddr::empty()));
        assert_eq!(changed, Some(NatStatus::Public));
        assert_eq!(tracker.status(), NatStatus::Public);
    }

    #[test]
    fn single_conflicting_probe_does_not_flip_status() {
        let mut tracker = NatStatusTracker::new(NatStatusTrackerConfig { min_probes: 2, max_history: 10, max_confidence: 3 });
        tracker.record(&ProbeOutcome::Reachable(net_core::Multiaddr::empty()));
        tracker.record(&ProbeOutcome::Reachable(net_core::Multiaddr::empty()));
        assert_eq!(tracker.status(), NatStatus::Public);

        let changed = tracker.record(&ProbeOutcome::Unreachable);
        assert_eq!(changed, None);
        assert_eq!(tracker.status(), NatStatus::Public);
    }

    #[test]
    fn errors_do_not_modify_history() {
        let mut tracker = NatStatusTracker::new(NatStatusTrackerConfig::default());
        for _ in 0..10 {
            tracker.record(&ProbeOutcome::Error(crate::error::AutoNatError::Timeout));
        }
        assert_eq!(tracker.probe_count(), 0);
        assert_eq!(tracker.status(), NatStatus::Unknown);
    }
}
