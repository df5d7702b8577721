use std::collections::VecDeque;

use dashmap::{DashMap, mapref::entry::Entry};

use crate::question::Question;

/// Storage for the questions each conversation is waiting on.
///
/// Queue order is evaluation order. Implementations must drop a key as soon
/// as its queue becomes empty.
pub trait PendingStore<E>: Send + Sync {
    /// Replace whatever is pending at `key` with `questions`.
    fn install(&self, key: &str, questions: Vec<Question<E>>);

    /// The question currently awaiting an answer at `key`.
    fn peek_head(&self, key: &str) -> Option<Question<E>>;

    /// Retire the head question. Returns the number still pending.
    fn advance(&self, key: &str) -> usize;

    /// Drop everything pending at `key`. Returns whether anything was pending.
    fn clear(&self, key: &str) -> bool;

    /// Number of questions pending at `key`.
    fn pending(&self, key: &str) -> usize;

    /// Number of conversations with at least one pending question.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local [`PendingStore`] backed by a concurrent map.
pub struct InMemoryPendingStore<E> {
    entries: DashMap<String, VecDeque<Question<E>>>,
}

impl<E> Default for InMemoryPendingStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryPendingStore<E> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<E: Send + Sync> PendingStore<E> for InMemoryPendingStore<E> {
    fn install(&self, key: &str, questions: Vec<Question<E>>) {
        if questions.is_empty() {
            self.entries.remove(key);
            return;
        }
        self.entries.insert(key.to_string(), questions.into());
    }

    fn peek_head(&self, key: &str) -> Option<Question<E>> {
        self.entries.get(key).and_then(|queue| queue.front().cloned())
    }

    fn advance(&self, key: &str) -> usize {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().pop_front();
                let remaining = entry.get().len();
                if remaining == 0 {
                    entry.remove();
                }
                remaining
            },
            Entry::Vacant(_) => 0,
        }
    }

    fn clear(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn pending(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, |queue| queue.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
