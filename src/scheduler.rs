//! Cooperative single-threaded scheduler over a millisecond timeline.
//!
//! Runners suspend by handing back a delay; the scheduler wakes tasks in deadline order,
//! breaking ties by scheduling order. A [`Clock`] decides whether reaching the next deadline
//! costs wall time.

use crate::timers::TimerKey;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockMode {
    #[default]
    Virtual,
    Realtime,
}

impl ClockMode {
    pub fn clock(self) -> Box<dyn Clock> {
        match self {
            ClockMode::Virtual => Box::new(VirtualClock),
            ClockMode::Realtime => Box::new(RealtimeClock),
        }
    }
}

impl Display for ClockMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockMode::Virtual => f.write_str("virtual"),
            ClockMode::Realtime => f.write_str("realtime"),
        }
    }
}

pub trait Clock {
    /// Called before the timeline jumps forward by `ms`.
    fn wait(&mut self, ms: u64);
}

/// Simulated time: every wait returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualClock;

impl Clock for VirtualClock {
    fn wait(&mut self, _ms: u64) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealtimeClock;

impl Clock for RealtimeClock {
    fn wait(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Task {
    Runner(usize),
    Timer { key: TimerKey, generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Wakeup {
    at: u64,
    seq: u64,
    task: Task,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: u64,
    seq: u64,
    queue: BinaryHeap<Reverse<Wakeup>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn schedule(&mut self, delay_ms: u64, task: Task) {
        self.seq += 1;
        self.queue.push(Reverse(Wakeup {
            at: self.now.saturating_add(delay_ms),
            seq: self.seq,
            task,
        }));
    }

    /// Pops the earliest task, moving the timeline (and the clock) up to its deadline.
    pub fn next(&mut self, clock: &mut dyn Clock) -> Option<Task> {
        let Reverse(wakeup) = self.queue.pop()?;
        if wakeup.at > self.now {
            clock.wait(wakeup.at - self.now);
            self.now = wakeup.at;
        }
        Some(wakeup.task)
    }

    /// Drops every pending timer wakeup, keeping runner wakeups.
    pub fn drop_timers(&mut self) {
        self.queue
            .retain(|Reverse(wakeup)| matches!(wakeup.task, Task::Runner(_)));
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
