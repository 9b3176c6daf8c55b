//! Cooperative scheduling primitives.
//!
//! The engine never runs deferred work on its own. Edits and cursor moves
//! queue idle tasks that the host drains when nothing else is happening,
//! and the render poll timer is an explicit handle the host checks for
//! its deadline.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Deferred work waiting for the next idle slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTask {
    /// Revalidate all dirty lines.
    Revalidate,
    /// Recompute the active-region set from the cursor.
    CursorMoved,
}

/// Queue of idle tasks where each task is pending at most once.
#[derive(Debug, Clone, Default)]
pub struct IdleQueue {
    tasks: VecDeque<IdleTask>,
}

impl IdleQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a task. Returns false if it was already pending.
    pub fn schedule(&mut self, task: IdleTask) -> bool {
        if self.tasks.contains(&task) {
            return false;
        }
        self.tasks.push_back(task);
        true
    }

    /// Returns true if `task` is pending.
    pub fn is_scheduled(&self, task: IdleTask) -> bool {
        self.tasks.contains(&task)
    }

    /// Takes every pending task in scheduling order.
    ///
    /// Tasks scheduled while these run belong to the next idle slice.
    pub fn take_all(&mut self) -> Vec<IdleTask> {
        self.tasks.drain(..).collect()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drops every pending task.
    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }
}

/// A repeating timer with an explicit deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimer {
    interval: Duration,
    deadline: Instant,
}

impl PollTimer {
    /// Starts a timer that first fires one interval from `now`.
    pub fn start(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            deadline: now + interval,
        }
    }

    /// Returns when the timer next fires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns the timer interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true if the timer has fired by `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Schedules the next firing one interval after `now`.
    pub fn rearm(&mut self, now: Instant) {
        self.deadline = now + self.interval;
    }
}
