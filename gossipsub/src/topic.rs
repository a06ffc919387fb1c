//! Subscription announcements.

use crate::types::Topic;

/// One entry of an RPC's `subscriptions` list: a topic plus whether the
/// sender is subscribing or unsubscribing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: Topic,
    pub subscribe: bool,
}

impl Subscription {
    pub fn subscribe(topic: Topic) -> Self {
        Self {
            topic,
            subscribe: true,
        }
    }

    pub fn unsubscribe(topic: Topic) -> Self {
        Self {
            topic,
            subscribe: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_the_right_flag() {
        let sub = Subscription::subscribe(Topic::new("t"));
        assert!(sub.subscribe);
        let unsub = Subscription::unsubscribe(Topic::new("t"));
        assert!(!unsub.subscribe);
    }
}
