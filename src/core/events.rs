// ─── Structural Change Events ───
// Row-level notifications consumed by list and tree projections.

use std::fmt;

/// A structural change to an ordered collection. Ranges are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange {
    /// Every previous index is invalid.
    Reset,
    Inserted { first: usize, last: usize },
    Removed { first: usize, last: usize },
    Changed {
        first: usize,
        last: usize,
        fields: Vec<&'static str>,
    },
}

impl ListChange {
    pub fn inserted(first: usize, count: usize) -> Option<Self> {
        (count > 0).then(|| ListChange::Inserted {
            first,
            last: first + count - 1,
        })
    }

    pub fn removed(first: usize, count: usize) -> Option<Self> {
        (count > 0).then(|| ListChange::Removed {
            first,
            last: first + count - 1,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback<E> = Box<dyn FnMut(&E) + Send>;

/// Callback list. Callbacks run synchronously on the emitting thread.
pub struct Subscribers<E> {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback<E>)>,
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }
}

impl<E> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

impl<E> Subscribers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&E) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        before != self.callbacks.len()
    }

    pub fn emit(&mut self, event: &E) {
        for (_, callback) in &mut self.callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// Test helper: a subscriber that records every event.
#[cfg(test)]
pub(crate) fn recorder<E: Clone + Send + 'static>(
    subscribers: &mut Subscribers<E>,
) -> std::sync::Arc<std::sync::Mutex<Vec<E>>> {
    let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = log.clone();
    subscribers.subscribe(move |e: &E| sink.lock().unwrap().push(e.clone()));
    log
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ranges_produce_no_event() {
        assert_eq!(ListChange::inserted(3, 0), None);
        assert_eq!(
            ListChange::inserted(3, 2),
            Some(ListChange::Inserted { first: 3, last: 4 })
        );
        assert_eq!(
            ListChange::removed(0, 1),
            Some(ListChange::Removed { first: 0, last: 0 })
        );
    }

    #[test]
    fn unsubscribed_callbacks_stop_receiving() {
        let mut subs: Subscribers<ListChange> = Subscribers::new();
        let log = recorder(&mut subs);
        let other = subs.subscribe(|_| {});
        assert_eq!(subs.len(), 2);

        subs.emit(&ListChange::Reset);
        assert!(subs.unsubscribe(other));
        assert!(!subs.unsubscribe(other));
        subs.emit(&ListChange::Reset);

        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(subs.len(), 1);
    }
}
