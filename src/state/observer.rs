//! Store change notifications
//!
//! Collaborators register a callback and are told which slice of the store
//! changed. Events are batched per operation and deduplicated before
//! delivery.

use std::fmt;

/// Slice of store state that changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreEvent {
    TracksChanged,
    SelectionChanged,
    CurrentTrackChanged,
    RepeatRegionChanged,
    ClipboardChanged,
    HistoryChanged,
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Subscriber callback
pub type Callback = Box<dyn FnMut(StoreEvent) + Send>;

/// Registry of subscribers plus the events pending delivery
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback)>,
    pending: Vec<StoreEvent>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.subscribers.len())
            .field("pending", &self.pending)
            .finish()
    }
}

impl Observers {
    pub fn subscribe(&mut self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, callback));
        id
    }

    /// Remove a subscriber; false if the id was unknown
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Queue an event for the next flush
    pub fn emit(&mut self, event: StoreEvent) {
        if !self.pending.contains(&event) {
            self.pending.push(event);
        }
    }

    /// Deliver queued events to every subscriber, in emission order
    pub fn flush(&mut self) {
        let events = std::mem::take(&mut self.pending);
        for event in events {
            for (_, callback) in &mut self.subscribers {
                callback(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_events_are_deduplicated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut observers = Observers::default();
        observers.subscribe(Box::new(move |e| sink.lock().unwrap().push(e)));

        observers.emit(StoreEvent::TracksChanged);
        observers.emit(StoreEvent::HistoryChanged);
        observers.emit(StoreEvent::TracksChanged);
        observers.flush();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![StoreEvent::TracksChanged, StoreEvent::HistoryChanged]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let mut observers = Observers::default();
        let id = observers.subscribe(Box::new(move |_| *sink.lock().unwrap() += 1));

        observers.emit(StoreEvent::SelectionChanged);
        observers.flush();
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.emit(StoreEvent::SelectionChanged);
        observers.flush();

        assert_eq!(*count.lock().unwrap(), 1);
    }
}
