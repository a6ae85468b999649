//! Replay-multicast stream with a reference-counted upstream.
//!
//! [`ReplayShared::spawn`] drives an upstream stream on a background task and
//! fans every value out to any number of [`Subscription`]s. A subscription
//! that joins late receives the most recent value first. The upstream is
//! dropped as soon as the last handle goes away.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_util::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, trace, warn};

struct State<T> {
    last: Option<T>,
    /// `None` once the upstream has ended.
    sender: Option<broadcast::Sender<T>>,
}

struct Inner<T> {
    label: String,
    state: Mutex<State<T>>,
    pump: Mutex<Option<AbortHandle>>,
}

impl<T: Clone> Inner<T> {
    fn publish(&self, value: T) {
        let mut state = self.state.lock();
        state.last = Some(value.clone());
        if let Some(sender) = &state.sender {
            let receivers = sender.send(value).unwrap_or_default();
            trace!(label = %self.label, receivers, "Published value");
        }
    }

    fn complete(&self) {
        self.state.lock().sender = None;
        debug!(label = %self.label, "Upstream completed");
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
        debug!(label = %self.label, "Last subscriber detached, upstream released");
    }
}

/// Strong handle to a shared stream.
///
/// Every live handle, including every [`Subscription`], keeps the upstream
/// running.
pub struct ReplayShared<T> {
    inner: Arc<Inner<T>>,
}

/// Non-owning handle used to memoize a shared stream.
pub struct WeakShared<T> {
    inner: Weak<Inner<T>>,
}

impl<T> ReplayShared<T>
where
    T: Clone + Send + 'static,
{
    /// Starts pumping `upstream` on the current Tokio runtime.
    ///
    /// `capacity` bounds how far a slow subscriber may fall behind before it
    /// skips ahead.
    pub fn spawn(label: impl Into<String>, upstream: BoxStream<'static, T>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let inner = Arc::new(Inner {
            label: label.into(),
            state: Mutex::new(State {
                last: None,
                sender: Some(sender),
            }),
            pump: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let task = tokio::spawn(async move {
            let mut upstream = upstream;
            while let Some(value) = upstream.next().await {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                inner.publish(value);
            }
            if let Some(inner) = weak.upgrade() {
                inner.complete();
            }
        });
        *inner.pump.lock() = Some(task.abort_handle());
        debug!(label = %inner.label, "Shared stream created");

        Self { inner }
    }

    /// Attaches a new subscriber. It sees the latest value (if any) and then
    /// every later one.
    pub fn subscribe(&self) -> Subscription<T> {
        let state = self.inner.state.lock();
        let pending = state.last.clone();
        let updates = state
            .sender
            .as_ref()
            .map(|sender| BroadcastStream::new(sender.subscribe()));
        drop(state);

        Subscription {
            shared: self.clone(),
            pending,
            updates,
        }
    }

    /// Most recent value, if one has arrived.
    pub fn latest(&self) -> Option<T> {
        self.inner.state.lock().last.clone()
    }
}

impl<T> ReplayShared<T> {
    pub fn downgrade(&self) -> WeakShared<T> {
        WeakShared {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Number of live handles, this one included.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Returns true once the upstream has ended.
    pub fn is_complete(&self) -> bool {
        self.inner.state.lock().sender.is_none()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl<T> Clone for ReplayShared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ReplayShared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayShared")
            .field("label", &self.inner.label)
            .field("handles", &self.handle_count())
            .finish()
    }
}

impl<T> WeakShared<T> {
    pub fn upgrade(&self) -> Option<ReplayShared<T>> {
        self.inner.upgrade().map(|inner| ReplayShared { inner })
    }

    /// Number of strong handles still alive.
    pub fn handle_count(&self) -> usize {
        self.inner.strong_count()
    }

    pub fn is_alive(&self) -> bool {
        self.handle_count() > 0
    }
}

impl<T> Clone for WeakShared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for WeakShared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakShared")
            .field("handles", &self.handle_count())
            .finish()
    }
}

/// One subscriber's view of a [`ReplayShared`] stream.
///
/// Ends when the upstream ends. Dropping it detaches the subscriber.
pub struct Subscription<T> {
    shared: ReplayShared<T>,
    pending: Option<T>,
    updates: Option<BroadcastStream<T>>,
}

impl<T> Subscription<T> {
    /// The shared stream this subscription belongs to.
    pub fn shared(&self) -> &ReplayShared<T> {
        &self.shared
    }
}

// Fields are never pinned.
impl<T> Unpin for Subscription<T> {}

impl<T> Stream for Subscription<T>
where
    T: Clone + Send + 'static,
{
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if let Some(value) = this.pending.take() {
            return Poll::Ready(Some(value));
        }
        let Some(updates) = this.updates.as_mut() else {
            return Poll::Ready(None);
        };
        loop {
            match updates.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(value))) => return Poll::Ready(Some(value)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(label = %this.shared.inner.label, skipped, "Subscriber lagged, skipping ahead");
                }
                Poll::Ready(None) => {
                    this.updates = None;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T> Clone for Subscription<T>
where
    T: Clone + Send + 'static,
{
    /// Attaches another subscriber, starting from the latest value.
    fn clone(&self) -> Self {
        self.shared.subscribe()
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.shared.inner.label)
            .field("has_pending", &self.pending.is_some())
            .finish()
    }
}
