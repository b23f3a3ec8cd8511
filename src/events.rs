use serde_json::Value;
use tokio::sync::broadcast;

/// Broadcasts notification strings to all subscribers (session-change and
/// claim-completion events). Subscribers are in-process today; the channel
/// shape matches a future push transport.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Send a notification to all subscribers.
    pub fn broadcast(&self, event: &str, params: Value) {
        let notification = serde_json::json!({
            "event": event,
            "params": params
        });
        // Ignore errors — no subscribers is fine
        let _ = self
            .tx
            .send(serde_json::to_string(&notification).unwrap_or_default());
    }

    /// Subscribe to all broadcast events.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}
