//! Delayed and recurring administrative tasks
//!
//! Tasks live in a min-heap ordered by execution time, with the insertion id
//! as tie-breaker so tasks due at the same instant run in the order they were
//! added. The session only ever looks at the head of the queue.

use crate::error::RconError;
use log::{debug, warn};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Broadcast `data` to every player.
    GlobalMessage,
    /// Kick everyone currently in the roster.
    KickAll,
    Shutdown,
    Lock,
    Unlock,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub data: String,
    pub repeat: bool,
    pub period: Duration,
    pub exec_at: Instant,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        self.exec_at
            .cmp(&other.exec_at)
            .then(self.id.cmp(&other.id))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Task>>,
    next_id: TaskId,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a task whose first run is one `period` from `now`.
    ///
    /// `initial_delay` is accepted for interface compatibility but does not
    /// move the first run. A period too large to add to `now` is rejected.
    pub fn add_task(
        &mut self,
        kind: TaskKind,
        data: impl Into<String>,
        repeat: bool,
        period: Duration,
        initial_delay: Duration,
        now: Instant,
    ) -> Result<TaskId, RconError> {
        let exec_at = now
            .checked_add(period)
            .ok_or(RconError::InvalidPeriod(period))?;
        let id = self.next_id;
        self.next_id += 1;

        if !initial_delay.is_zero() {
            debug!(
                "Task {} requested initial delay {:?}; first run stays at one period",
                id, initial_delay
            );
        }

        self.insert_task(Task {
            id,
            kind,
            data: data.into(),
            repeat,
            period,
            exec_at,
        });
        Ok(id)
    }

    pub fn insert_task(&mut self, task: Task) {
        self.queue.push(Reverse(task));
    }

    /// Removes and returns the head if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Task> {
        let due = self
            .queue
            .peek()
            .map_or(false, |Reverse(head)| head.exec_at <= now);
        if due {
            self.queue.pop().map(|Reverse(task)| task)
        } else {
            None
        }
    }

    /// Re-queues a repeating task one period after `executed_at`.
    ///
    /// The task is dropped if the next run cannot be represented.
    pub fn reschedule(&mut self, mut task: Task, executed_at: Instant) {
        match executed_at.checked_add(task.period) {
            Some(exec_at) => {
                task.exec_at = exec_at;
                self.insert_task(task);
            }
            None => warn!("Dropping task {}: next run is out of range", task.id),
        }
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|Reverse(task)| task.id != id);
        self.queue.len() != before
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.queue.peek().map(|Reverse(head)| head.exec_at)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
