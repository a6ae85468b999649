//! In-process message log.
//!
//! Keeps a bounded history of user messages and broadcasts each new one to
//! listeners, so a UI can render the backlog and then follow along.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::sink::NotificationSink;
use crate::types::Message;

const DEFAULT_HISTORY: usize = 100;
const DEFAULT_BUFFER_SIZE: usize = 64;

/// Message history plus live listeners
pub struct MessageLog {
    history: Mutex<VecDeque<Message>>,
    max_history: usize,
    sender: broadcast::Sender<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Keeps at most `max_history` messages; older ones are dropped first.
    pub fn with_history(max_history: usize) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_BUFFER_SIZE);
        Self {
            history: Mutex::new(VecDeque::with_capacity(max_history.min(DEFAULT_HISTORY))),
            max_history: max_history.max(1),
            sender,
        }
    }

    pub fn push(&self, message: Message) {
        {
            let mut history = self.history.lock();
            if history.len() == self.max_history {
                history.pop_front();
            }
            history.push_back(message.clone());
        }
        let listeners = self.sender.send(message).unwrap_or_default();
        debug!(listeners, "Message recorded");
    }

    /// Snapshot of the retained messages, oldest first
    pub fn messages(&self) -> Vec<Message> {
        self.history.lock().iter().cloned().collect()
    }

    /// Retained error messages, oldest first
    pub fn errors(&self) -> Vec<Message> {
        self.history
            .lock()
            .iter()
            .filter(|m| m.is_error())
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<Message> {
        self.history.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    pub fn clear(&self) {
        self.history.lock().clear();
    }

    /// Listens for messages recorded after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLog")
            .field("len", &self.len())
            .field("max_history", &self.max_history)
            .field("listeners", &self.sender.receiver_count())
            .finish()
    }
}

impl NotificationSink for MessageLog {
    fn add(&self, text: &str) {
        self.push(Message::info(text));
    }

    fn add_error(&self, text: &str) {
        warn!(message = %text, "User error message");
        self.push(Message::error(text));
    }
}
