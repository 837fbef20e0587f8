//! Tick clock and deferred work queue
//!
//! Work that must happen "one frame later" (e.g. CVR calibration after the
//! room lock, so the pose tracker has produced a sample against the new
//! anchor) is scheduled against a tick number and drained at the start of
//! the tick it becomes due.

use serde::{Deserialize, Serialize};

/// A discrete tick identifier
pub type Tick = u64;

/// Queue of tasks due at a future tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredQueue<T> {
    tick: Tick,
    scheduled: Vec<(Tick, T)>,
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self {
            tick: 0,
            scheduled: Vec::new(),
        }
    }

    /// Current tick
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Number of tasks still waiting
    pub fn pending(&self) -> usize {
        self.scheduled.len()
    }

    /// Schedule a task `delay_ticks` after the current tick
    ///
    /// Tasks due on the same tick run in scheduling order.
    pub fn schedule(&mut self, task: T, delay_ticks: u64) {
        let target = self.tick + delay_ticks.max(1);
        let pos = self.scheduled.partition_point(|(tick, _)| *tick <= target);
        self.scheduled.insert(pos, (target, task));
    }

    /// Schedule a task for the next tick
    pub fn schedule_next_tick(&mut self, task: T) {
        self.schedule(task, 1);
    }

    /// Advance one tick and return the tasks that became due
    pub fn advance(&mut self) -> Vec<T> {
        self.tick += 1;
        let due = self
            .scheduled
            .partition_point(|(tick, _)| *tick <= self.tick);
        self.scheduled.drain(..due).map(|(_, task)| task).collect()
    }

    /// Drop every pending task matching `pred`
    pub fn cancel(&mut self, mut pred: impl FnMut(&T) -> bool) {
        self.scheduled.retain(|(_, task)| !pred(task));
    }
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_tick_runs_once() {
        let mut queue = DeferredQueue::new();
        queue.schedule_next_tick("calibrate");
        assert_eq!(queue.pending(), 1);

        assert_eq!(queue.advance(), vec!["calibrate"]);
        assert!(queue.advance().is_empty());
        assert_eq!(queue.tick(), 2);
    }

    #[test]
    fn test_ordering_by_due_tick() {
        let mut queue = DeferredQueue::new();
        queue.schedule("late", 3);
        queue.schedule("a", 1);
        queue.schedule("b", 1);

        assert_eq!(queue.advance(), vec!["a", "b"]);
        assert!(queue.advance().is_empty());
        assert_eq!(queue.advance(), vec!["late"]);
    }

    #[test]
    fn test_zero_delay_defers_to_next_tick() {
        let mut queue = DeferredQueue::new();
        queue.schedule(1, 0);
        assert_eq!(queue.advance(), vec![1]);
    }

    #[test]
    fn test_cancel() {
        let mut queue = DeferredQueue::new();
        queue.schedule_next_tick(1);
        queue.schedule_next_tick(2);
        queue.cancel(|task| *task == 1);
        assert_eq!(queue.advance(), vec![2]);
    }
}
