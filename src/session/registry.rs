//! Fixed-capacity topic-handler table
//!
//! Maps exact topic strings to handler objects. The table never grows past
//! its construction-time capacity and stays contiguous across removals, so
//! dispatch is a short linear scan with no allocation.

use tracing::trace;

/// Default number of handler slots, matching the controller's topic budget.
pub const DEFAULT_HANDLER_CAPACITY: usize = 30;

/// Contract for anything that can consume an inbound message.
///
/// Blanket-implemented for `FnMut` closures so callers can register either a
/// closure or a stateful handler type.
pub trait TopicHandler: Send {
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

impl<F> TopicHandler for F
where
    F: FnMut(&str, &[u8]) + Send,
{
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self(topic, payload)
    }
}

struct HandlerEntry {
    topic: String,
    handler: Box<dyn TopicHandler>,
    subscribed: bool,
}

/// Insertion-ordered handler table with a hard capacity.
pub struct HandlerRegistry {
    entries: Vec<HandlerEntry>,
    capacity: usize,
}

impl HandlerRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a handler for `topic`, marked for subscription.
    ///
    /// Returns `false` without mutating the table when capacity is
    /// exhausted. Duplicate topics are not rejected; dispatch routes to the
    /// earliest registration, so later duplicates are shadowed.
    pub fn insert<H>(&mut self, topic: &str, handler: H) -> bool
    where
        H: TopicHandler + 'static,
    {
        if self.entries.len() >= self.capacity {
            return false;
        }

        self.entries.push(HandlerEntry {
            topic: topic.to_owned(),
            handler: Box::new(handler),
            subscribed: true,
        });
        true
    }

    /// Remove the handler registered for exactly `topic`.
    ///
    /// Later entries shift down one slot so the table stays gap-free. No
    /// broker unsubscribe is issued; inbound traffic on the topic simply
    /// stops matching and is dropped at dispatch time.
    pub fn remove(&mut self, topic: &str) -> bool {
        match self.entries.iter().position(|entry| entry.topic == topic) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Route one inbound message to the first matching handler.
    ///
    /// Returns `false` on a routing miss (no handler for the topic).
    pub fn dispatch(&mut self, topic: &str, payload: &[u8]) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.topic == topic)
        {
            Some(entry) => {
                trace!(topic, bytes = payload.len(), "dispatching inbound message");
                entry.handler.on_message(topic, payload);
                true
            }
            None => false,
        }
    }

    /// Topics still marked for subscription, in registration order.
    pub fn subscribed_topics(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.subscribed)
            .map(|entry| entry.topic.as_str())
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.entries.iter().any(|entry| entry.topic == topic)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
