//! Cancellable one-shot timers keyed by owner.
//!
//! Each key holds at most one pending timer. Scheduling a key that is already
//! pending replaces its deadline, which is how debounced timers restart.

use std::collections::BTreeMap;
use std::fmt::Debug;

use foundation::time::Time;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Copy, Clone, PartialEq)]
struct Pending {
    id: TimerId,
    deadline: Time,
}

#[derive(Debug)]
pub struct TimerArena<K> {
    next_id: u64,
    pending: BTreeMap<K, Pending>,
}

impl<K: Ord + Copy + Debug> Default for TimerArena<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Copy + Debug> TimerArena<K> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Arms the timer for `key`, replacing any pending deadline.
    pub fn schedule(&mut self, key: K, deadline: Time) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert(key, Pending { id, deadline });
        id
    }

    /// Disarms `key`. Returns whether a timer was pending.
    pub fn cancel(&mut self, key: K) -> bool {
        self.pending.remove(&key).is_some()
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn deadline(&self, key: K) -> Option<Time> {
        self.pending.get(&key).map(|p| p.deadline)
    }

    /// Removes and returns every key whose deadline is at or before `now`,
    /// earliest deadline first (ties broken by key order).
    pub fn fire_due(&mut self, now: Time) -> Vec<K> {
        let mut due: Vec<(Time, K)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, p)| (p.deadline, *k))
            .collect();
        due.sort_by(|(ta, ka), (tb, kb)| {
            ta.0.total_cmp(&tb.0).then_with(|| ka.cmp(kb))
        });
        for (_, key) in &due {
            self.pending.remove(key);
        }
        due.into_iter().map(|(_, k)| k).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
