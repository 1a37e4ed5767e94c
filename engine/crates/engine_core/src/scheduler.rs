use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use instance::InstanceId;
use serde::{Deserialize, Serialize};

/// Handle to a scheduled task. Cancelling an unknown or already-finished
/// handle is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// Who a task belongs to; removing an entity cancels all of its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerOwner {
    World,
    Entity(InstanceId),
}

#[derive(Debug)]
struct Entry<T> {
    owner: TimerOwner,
    due: u64,
    period: Option<u64>,
    task: T,
}

/// A task whose due time has been reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    pub handle: TimerHandle,
    pub owner: TimerOwner,
    pub due: u64,
    pub task: T,
}

/// Central timer queue on a virtual millisecond clock.
///
/// Tasks fire in due-time order, ties broken by scheduling order. Interval
/// tasks are re-armed before they are handed out, so a handler may cancel
/// its own interval. Cancelled entries stay in the heap and are skipped
/// lazily when popped.
#[derive(Debug)]
pub struct Scheduler<T> {
    heap: BinaryHeap<Reverse<(u64, u64)>>,
    entries: BTreeMap<u64, Entry<T>>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, owner: TimerOwner, due: u64, period: Option<u64>, task: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            seq,
            Entry {
                owner,
                due,
                period,
                task,
            },
        );
        self.heap.push(Reverse((due, seq)));
        TimerHandle(seq)
    }

    /// Run `task` once at `at`.
    pub fn once(&mut self, owner: TimerOwner, at: u64, task: T) -> TimerHandle {
        self.insert(owner, at, None, task)
    }

    /// Run `task` at `first` and then every `period` ms until cancelled.
    pub fn every(&mut self, owner: TimerOwner, first: u64, period: u64, task: T) -> TimerHandle {
        self.insert(owner, first, Some(period.max(1)), task)
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&handle.0).is_some()
    }

    /// Cancel every task belonging to `owner`. Returns how many were dropped.
    pub fn cancel_owner(&mut self, owner: TimerOwner) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.owner != owner);
        before - self.entries.len()
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle.0)
    }

    pub fn owned_by(&self, owner: TimerOwner) -> usize {
        self.entries.values().filter(|e| e.owner == owner).count()
    }

    /// Pop the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<Fired<T>> {
        while let Some(Reverse((due, seq))) = self.heap.peek().copied() {
            if due > now {
                return None;
            }
            self.heap.pop();

            let Some(entry) = self.entries.get_mut(&seq) else {
                continue;
            };
            if entry.due != due {
                continue;
            }

            let fired = Fired {
                handle: TimerHandle(seq),
                owner: entry.owner,
                due,
                task: entry.task.clone(),
            };
            match entry.period {
                Some(period) => {
                    entry.due = due + period;
                    self.heap.push(Reverse((entry.due, seq)));
                }
                None => {
                    self.entries.remove(&seq);
                }
            }
            return Some(fired);
        }
        None
    }

    /// Due time of the next live task.
    pub fn next_due(&mut self) -> Option<u64> {
        while let Some(Reverse((due, seq))) = self.heap.peek().copied() {
            match self.entries.get(&seq) {
                Some(entry) if entry.due == due => return Some(due),
                _ => {
                    self.heap.pop();
                }
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance::EntityKind;

    fn owner(seq: u32) -> TimerOwner {
        TimerOwner::Entity(InstanceId::new(EntityKind::Mob, seq))
    }

    fn drain(s: &mut Scheduler<&'static str>, now: u64) -> Vec<(u64, &'static str)> {
        let mut out = Vec::new();
        while let Some(f) = s.pop_due(now) {
            out.push((f.due, f.task));
        }
        out
    }

    #[test]
    fn fires_in_due_order_then_schedule_order() {
        let mut s = Scheduler::new();
        s.once(TimerOwner::World, 20, "b");
        s.once(TimerOwner::World, 10, "a");
        s.once(TimerOwner::World, 20, "c");

        assert!(drain(&mut s, 5).is_empty());
        assert_eq!(drain(&mut s, 20), vec![(10, "a"), (20, "b"), (20, "c")]);
        assert!(s.is_empty());
    }

    #[test]
    fn interval_rearms_until_cancelled() {
        let mut s = Scheduler::new();
        let h = s.every(owner(1), 100, 100, "tick");
        assert_eq!(drain(&mut s, 350).len(), 3);
        assert!(s.cancel(h));
        assert!(drain(&mut s, 1000).is_empty());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut s = Scheduler::new();
        let h = s.once(TimerOwner::World, 5, "x");
        assert!(s.cancel(h));
        assert!(!s.cancel(h));
        assert!(!s.is_scheduled(h));
        assert!(drain(&mut s, 10).is_empty());
    }

    #[test]
    fn cancel_owner_drops_only_that_owner() {
        let mut s = Scheduler::new();
        s.every(owner(1), 10, 10, "attack");
        s.every(owner(1), 10, 40, "follow");
        s.once(owner(2), 10, "respawn");

        assert_eq!(s.cancel_owner(owner(1)), 2);
        assert_eq!(s.owned_by(owner(1)), 0);
        assert_eq!(drain(&mut s, 10), vec![(10, "respawn")]);
    }

    #[test]
    fn next_due_skips_cancelled() {
        let mut s = Scheduler::new();
        let early = s.once(TimerOwner::World, 5, "early");
        s.once(TimerOwner::World, 50, "late");
        s.cancel(early);
        assert_eq!(s.next_due(), Some(50));
    }

    #[test]
    fn handler_can_cancel_its_own_interval() {
        let mut s = Scheduler::new();
        s.every(owner(3), 10, 10, "check");
        let fired = s.pop_due(10).unwrap();
        assert!(s.cancel(fired.handle));
        assert!(s.pop_due(100).is_none());
    }
}
