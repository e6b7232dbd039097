use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Identifies one scheduled entry of a [`TimerSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Delayed events owned by a single trial.
///
/// Entries are ordered by deadline, then by registration order, so two timers
/// with the same deadline fire first-registered-first. The set never invokes
/// anything itself: the owner drains due entries with [`TimerSet::pop_due`]
/// and handles the payload. A cancelled entry is removed immediately and can
/// never be returned afterwards.
#[derive(Debug)]
pub struct TimerSet<E> {
    queue: BTreeMap<(Duration, u64), E>,
    deadlines: HashMap<u64, Duration>,
    next_id: u64,
}

impl<E> TimerSet<E> {
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
            next_id: 0,
        }
    }

    /// Schedules `event` to become due `delay` after `now`.
    pub fn schedule(&mut self, now: Duration, delay: Duration, event: E) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;

        let due = now + delay;
        self.queue.insert((due, id), event);
        self.deadlines.insert(id, due);
        TimerHandle(id)
    }

    /// Cancels one entry. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(due) => self.queue.remove(&(due, handle.0)).is_some(),
            None => false,
        }
    }

    /// Cancels every pending entry and returns how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let pending = self.queue.len();
        self.queue.clear();
        self.deadlines.clear();
        pending
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.first_key_value().map(|(&(due, _), _)| due)
    }

    /// Removes and returns the earliest entry whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerHandle, E)> {
        let (&(due, _), _) = self.queue.first_key_value()?;
        if due > now {
            return None;
        }
        let ((_, id), event) = self.queue.pop_first()?;
        self.deadlines.remove(&id);
        Some((TimerHandle(id), event))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<E> Default for TimerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn drain<E>(set: &mut TimerSet<E>, now: Duration) -> Vec<E> {
        std::iter::from_fn(|| set.pop_due(now).map(|(_, e)| e)).collect()
    }

    #[test]
    fn nothing_fires_before_its_deadline() {
        let mut set = TimerSet::new();
        set.schedule(ms(0), ms(100), "hide");
        assert!(set.pop_due(ms(99)).is_none());
        assert_eq!(drain(&mut set, ms(100)), vec!["hide"]);
    }

    #[test]
    fn same_deadline_fires_in_registration_order() {
        let mut set = TimerSet::new();
        set.schedule(ms(0), ms(1000), "first");
        set.schedule(ms(500), ms(500), "second");
        set.schedule(ms(0), ms(200), "early");
        assert_eq!(drain(&mut set, ms(5000)), vec!["early", "first", "second"]);
    }

    #[test]
    fn cancel_all_is_idempotent_and_final() {
        let mut set = TimerSet::new();
        assert_eq!(set.cancel_all(), 0);

        let handle = set.schedule(ms(0), ms(10), 1);
        set.schedule(ms(0), ms(20), 2);
        assert_eq!(set.cancel_all(), 2);
        assert_eq!(set.cancel_all(), 0);

        assert!(!set.cancel(handle));
        assert!(set.pop_due(ms(u64::MAX / 2)).is_none());
        assert_eq!(set.next_deadline(), None);
    }

    #[test]
    fn cancel_single_entry_leaves_others() {
        let mut set = TimerSet::new();
        let timeout = set.schedule(ms(0), ms(3000), "timeout");
        set.schedule(ms(0), ms(1000), "countdown");

        assert!(set.cancel(timeout));
        assert!(!set.cancel(timeout));
        assert_eq!(drain(&mut set, ms(10_000)), vec!["countdown"]);
    }

    #[test]
    fn fired_entry_cannot_be_cancelled() {
        let mut set = TimerSet::new();
        let handle = set.schedule(ms(0), ms(0), ());
        assert!(set.pop_due(ms(0)).is_some());
        assert!(!set.cancel(handle));
    }

    proptest! {
        #[test]
        fn pops_are_sorted_by_deadline(delays in proptest::collection::vec(0u64..5_000, 0..40)) {
            let mut set = TimerSet::new();
            for (i, d) in delays.iter().enumerate() {
                set.schedule(ms(0), ms(*d), i);
            }
            let fired = drain(&mut set, ms(5_000));
            prop_assert_eq!(fired.len(), delays.len());
            for pair in fired.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(delays[a] < delays[b] || (delays[a] == delays[b] && a < b));
            }
        }
    }
}
