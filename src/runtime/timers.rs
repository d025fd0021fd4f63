//! Cancellable deferred actions, fired from the tick

use crate::attention::LockId;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// What to do when a timer comes due. The target may be gone by then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Finish a normal lock after its turn animation
    FreezeLock(LockId),
}

/// Pending actions keyed by id. Nothing runs outside `drain_due`, so every
/// callback executes on the tick.
#[derive(Debug, Default)]
pub struct Timers {
    next_id: u64,
    pending: BTreeMap<TimerId, (Instant, DeferredAction)>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Instant, action: DeferredAction) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.insert(id, (at, action));
        id
    }

    /// Returns false if the timer already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Remove and return every action due at `now`, earliest first
    pub fn drain_due(&mut self, now: Instant) -> Vec<(TimerId, DeferredAction)> {
        let mut due: Vec<(Instant, TimerId, DeferredAction)> = self
            .pending
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(id, (at, action))| (*at, *id, *action))
            .collect();
        due.sort_by_key(|(at, id, _)| (*at, *id));
        for (_, id, _) in &due {
            self.pending.remove(id);
        }
        due.into_iter().map(|(_, id, action)| (id, action)).collect()
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
