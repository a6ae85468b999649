//! Change notifications for the in-memory store.
//!
//! Every successful write is announced on a tokio broadcast channel; live
//! queries subscribe to it and re-run themselves when their collection
//! changes.

use tokio::sync::broadcast;

/// Default buffer size for the broadcast channel.
/// A watcher that falls this far behind re-reads its collection anyway.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Set,
    Patched,
    Removed,
}

/// A single committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: String,
    pub key: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(collection: impl Into<String>, key: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            kind,
        }
    }
}

/// Broadcaster for committed writes.
#[derive(Clone)]
pub struct ChangeBroadcaster {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Watchers more than `capacity` writes behind get a lag signal instead
    /// of the missed events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Announce a write. Returns the number of watchers that will see it.
    pub fn send(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Subscribe to writes committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active watchers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
