use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::types::value::Value;

/// Deadline-based debounce scheduler.
///
/// Holds at most one pending entry per key; scheduling again under the same
/// key discards the intermediate value and restarts the window, so a burst
/// of edits collapses into a single evaluation of the last value. There are
/// no ambient timers: the owner supplies `now`, drains [`take_due`], and may
/// arm a single host timer from [`next_deadline`]. Dropping the scheduler
/// cancels everything still pending, so deferred work can never touch a
/// disposed form.
///
/// [`take_due`]: Self::take_due
/// [`next_deadline`]: Self::next_deadline
#[derive(Debug, Clone)]
pub struct DebounceScheduler<K> {
    pending: HashMap<K, Pending>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct Pending {
    value: Value,
    deadline: Instant,
    seq: u64,
}

impl<K> Default for DebounceScheduler<K> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            seq: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> DebounceScheduler<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `key`, due at `now + window`. Replaces any entry
    /// already pending for the key and restarts its window.
    pub fn schedule(&mut self, key: K, value: Value, window: Duration, now: Instant) {
        self.seq += 1;
        self.pending.insert(
            key,
            Pending {
                value,
                deadline: now + window,
                seq: self.seq,
            },
        );
    }

    /// Remove and return every entry whose deadline has passed, in deadline
    /// order with FIFO tie-breaking. Each entry carries only the most recent
    /// value scheduled for its key.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, Value)> {
        let keys: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();

        let mut due: Vec<(K, Pending)> = keys
            .into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (k, p)))
            .collect();
        due.sort_by_key(|(_, p)| (p.deadline, p.seq));
        due.into_iter().map(|(k, p)| (k, p.value)).collect()
    }

    /// Earliest pending deadline, for hosts that arm a real timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Drop the pending entry for `key`, if any. Returns whether one existed.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Cancel everything.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
