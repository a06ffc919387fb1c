//! Control-message types carried inside a gossipsub RPC: GRAFT, PRUNE,
//! IHAVE, IWANT, and IDONTWANT.

use crate::types::{MessageId, Topic};

/// Request to be admitted to a topic's mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graft {
    pub topic_id: Topic,
}

/// Notification of removal from a topic's mesh, with an optional backoff
/// (seconds) before the sender may be re-grafted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prune {
    pub topic_id: Topic,
    pub backoff: Option<u64>,
}

/// Advertisement of cached message IDs available for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IHave {
    pub topic_id: Topic,
    pub message_ids: Vec<MessageId>,
}

/// Request for the full contents of previously-advertised message IDs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IWant {
    pub message_ids: Vec<MessageId>,
}

/// Best-effort hint that the sender does not want these message IDs
/// forwarded to it (v1.2-style optimization).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IDontWant {
    pub message_ids: Vec<MessageId>,
}

/// The control-message batch carried by one RPC.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlMessage {
    pub grafts: Vec<Graft>,
    pub prunes: Vec<Prune>,
    pub ihaves: Vec<IHave>,
    pub iwants: Vec<IWant>,
    pub idontwants: Vec<IDontWant>,
}

impl ControlMessage {
    pub fn is_empty(&self) -> bool {
        self.grafts.is_empty()
            && self.prunes.is_empty()
            && self.ihaves.is_empty()
            && self.iwants.is_empty()
            && self.idontwants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graft_creation() {
        let graft = Graft {
            topic_id: Topic::new("test_topic"),
        };
        assert_eq!(graft.topic_id.as_str(), "test_topic");
    }

    #[test]
    fn prune_creation() {
        let prune = Prune {
            topic_id: Topic::new("test_topic"),
            backoff: Some(60),
        };
        assert_eq!(prune.topic_id.as_str(), "test_topic");
        assert_eq!(prune.backoff, Some(60));
    }

    #[test]
    fn ihave_creation() {
        let msg_ids = vec![
            MessageId::from_bytes([1u8; 20]),
            MessageId::from_bytes([2u8; 20]),
        ];
        let ihave = IHave {
            topic_id: Topic::new("test_topic"),
            message_ids: msg_ids.clone(),
        };

        assert_eq!(ihave.topic_id.as_str(), "test_topic");
        assert_eq!(ihave.message_ids.len(), 2);
    }

    #[test]
    fn iwant_creation() {
        let msg_ids = vec![MessageId::from_bytes([1u8; 20])];
        let iwant = IWant {
            message_ids: msg_ids,
        };

        assert_eq!(iwant.message_ids.len(), 1);
    }

    #[test]
    fn idontwant_creation() {
        let msg_ids = vec![MessageId::from_bytes([1u8; 20])];
        let idontwant = IDontWant {
            message_ids: msg_ids,
        };

        assert_eq!(idontwant.message_ids.len(), 1);
    }

    #[test]
    fn control_message_aggregation() {
        let graft = Graft {
            topic_id: Topic::new("topic1"),
        };
        let prune = Prune {
            topic_id: Topic::new("topic2"),
            backoff: None,
        };

        let control = ControlMessage {
            grafts: vec![graft],
            prunes: vec![prune],
            ihaves: vec![],
            iwants: vec![],
            idontwants: vec![],
        };

        assert_eq!(control.grafts.len(), 1);
        assert_eq!(control.prunes.len(), 1);
        assert!(!control.is_empty());
    }

    #[test]
    fn control_message_empty_check() {
        let empty_control = ControlMessage::default();
        assert!(empty_control.is_empty());

        let non_empty = ControlMessage {
            grafts: vec![Graft {
                topic_id: Topic::new("topic"),
            }],
            ..Default::default()
        };
        assert!(!non_empty.is_empty());
    }
}
