//! Consumers of engine events. The worker hands every event to each listener in
//! registration order and applies the actions they return.

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::{EngineEvent, OutboundAction};

pub trait EventListener {
    fn on_event(&mut self, event: &EngineEvent) -> Vec<OutboundAction>;
}

/// Forwards every event to a channel, e.g. for the UI layer.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelListener {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }

    /// Create a listener and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventListener for ChannelListener {
    fn on_event(&mut self, event: &EngineEvent) -> Vec<OutboundAction> {
        if self.tx.send(event.clone()).is_err() {
            debug!("Event receiver dropped");
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_listener_forwards_events() {
        let (mut listener, mut rx) = ChannelListener::channel();
        let event = EngineEvent::ConnectionStatus {
            friend_number: 2,
            connected: true,
        };
        assert!(listener.on_event(&event).is_empty());
        assert_eq!(rx.try_recv().unwrap(), event);
    }

    #[test]
    fn dropped_receiver_is_harmless() {
        let (mut listener, rx) = ChannelListener::channel();
        drop(rx);
        let event = EngineEvent::ContactMessage {
            friend_number: 0,
            text: "hi".into(),
        };
        assert!(listener.on_event(&event).is_empty());
    }
}
