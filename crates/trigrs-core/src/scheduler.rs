// Trigrs Scheduler
// Cancelable deadline queue driving deferred work

use std::collections::BTreeMap;
use std::time::Instant;

use indexmap::IndexMap;

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Tasks ordered by deadline; tasks with the same deadline run in the
/// order they were scheduled.
#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    queue: BTreeMap<(Instant, TaskId), T>,
    deadlines: IndexMap<TaskId, Instant>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            queue: BTreeMap::new(),
            deadlines: IndexMap::new(),
        }
    }

    pub fn schedule(&mut self, at: Instant, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.queue.insert((at, id), task);
        self.deadlines.insert(id, at);
        id
    }

    /// Remove a task. Returns it if it had not run yet.
    pub fn cancel(&mut self, id: TaskId) -> Option<T> {
        let at = self.deadlines.swap_remove(&id)?;
        self.queue.remove(&(at, id))
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn deadline(&self, id: TaskId) -> Option<Instant> {
        self.deadlines.get(&id).copied()
    }

    /// The earliest task due at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<(TaskId, T)> {
        let (&(at, id), _) = self.queue.first_key_value()?;
        if at > now {
            return None;
        }
        self.deadlines.swap_remove(&id);
        self.queue.remove(&(at, id)).map(|task| (id, task))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
