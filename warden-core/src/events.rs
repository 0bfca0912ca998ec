//! Session lifecycle notifications
//!
//! [`SessionEventBus`] is an explicit, per-session publish/subscribe channel.
//! Fan-out is synchronous, there is no buffering and no replay: a subscriber
//! only observes events published while it is subscribed.

use std::fmt;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::token::Token;

/// Kind of lifecycle event, used to pick what to subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    /// Terminal: the session is gone and the user must re-authenticate
    Expired,
    /// Informational: a new access token was obtained
    Refreshed,
}

impl SessionEventKind {
    /// Wire name consumed by the presentation layer
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEventKind::Expired => "auth:token-expired",
            SessionEventKind::Refreshed => "auth:token-refreshed",
        }
    }
}

impl fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session ended and the store was cleared.
    Expired,
    /// A refresh succeeded.
    Refreshed {
        /// The newly issued access token
        access: Token,
    },
}

impl SessionEvent {
    /// Kind used to route the event to subscribers.
    pub fn kind(&self) -> SessionEventKind {
        match self {
            SessionEvent::Expired => SessionEventKind::Expired,
            SessionEvent::Refreshed { .. } => SessionEventKind::Refreshed,
        }
    }
}

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct Entry {
    id: u64,
    kind: SessionEventKind,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    entries: RwLock<Vec<Entry>>,
}

impl BusInner {
    fn remove(&self, id: u64) {
        self.entries.write().retain(|entry| entry.id != id);
    }
}

/// Synchronous fan-out of [`SessionEvent`]s
#[derive(Clone, Default)]
pub struct SessionEventBus {
    inner: Arc<BusInner>,
}

impl fmt::Debug for SessionEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl SessionEventBus {
    /// A bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every handler subscribed to its kind, in
    /// subscription order. Handlers may subscribe or unsubscribe while
    /// being called; such changes apply from the next publish on.
    pub fn publish(&self, event: SessionEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .inner
            .entries
            .read()
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| Arc::clone(&entry.handler))
            .collect();

        log::debug!(
            "[SessionEventBus] Publishing {} to {} subscriber(s)",
            kind,
            handlers.len()
        );

        for handler in handlers {
            handler(&event);
        }
    }

    /// Register `handler` for events of `kind`. It runs synchronously on the publishing thread.
    pub fn subscribe<F>(&self, kind: SessionEventKind, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.entries.write().push(Entry {
            id,
            kind,
            handler: Arc::new(handler),
        });

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
            active: true,
        }
    }

    /// Subscribe through an unbounded channel instead of a callback.
    pub fn subscribe_channel(
        &self,
        kind: SessionEventKind,
    ) -> (Subscription, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(kind, move |event| {
            // Receiver gone: the subscription is about to be dropped too.
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Number of live handlers across both kinds.
    pub fn subscriber_count(&self) -> usize {
        self.inner.entries.read().len()
    }
}

/// Handle returned by [`SessionEventBus::subscribe`]
///
/// Dropping it unsubscribes; call [`Subscription::detach`] to keep the
/// handler for the lifetime of the bus instead.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
    active: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl Subscription {
    /// Remove the handler now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Leave the handler registered for as long as the bus lives.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            if let Some(bus) = self.bus.upgrade() {
                bus.remove(self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
