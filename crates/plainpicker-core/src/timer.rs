use std::collections::BTreeMap;
use std::time::Duration;

use tracing::trace;

/// Deferred actions keyed by kind. Scheduling a key again replaces the
/// pending entry, so only the most recent request for a kind ever fires.
///
/// Time is supplied by the caller as a monotonic offset.
#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    pending: BTreeMap<K, Duration>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy + std::fmt::Debug> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, key: K, now: Duration, delay: Duration) {
        let deadline = now.saturating_add(delay);
        trace!(?key, ?deadline, "scheduling timer");
        self.pending.insert(key, deadline);
    }

    pub fn cancel(&mut self, key: K) -> bool {
        self.pending.remove(&key).is_some()
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.pending.contains_key(&key)
    }

    /// Removes and returns every key whose deadline is at or before `now`,
    /// earliest first.
    pub fn due(&mut self, now: Duration) -> Vec<K> {
        let mut fired: Vec<(Duration, K)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, *key))
            .collect();
        fired.sort();
        for (_, key) in &fired {
            self.pending.remove(key);
        }
        fired.into_iter().map(|(_, key)| key).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
