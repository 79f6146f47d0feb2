//! Frame scheduler on a virtual clock.
//!
//! Time only moves when a frame is run, so tests are deterministic: every
//! frame advances the clock by [`FRAME`], fires the timers that came due,
//! drains the microtask queue and then commits effects.

use std::collections::VecDeque;
use std::time::Duration;

use enhook_core::MountTarget;

/// Virtual time between two frames.
pub const FRAME: Duration = Duration::from_millis(16);

pub type Task = Box<dyn FnOnce()>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

pub(crate) enum Job {
    Render(MountTarget),
    Task(Task),
}

struct Timer {
    id: TimerId,
    due: Duration,
    task: Task,
}

#[derive(Default)]
pub(crate) struct Scheduler {
    now: Duration,
    tick: u64,
    next_timer: u64,
    microtasks: VecDeque<Job>,
    timers: Vec<Timer>,
    /// Renders held back until the next frame.
    next_frame: Vec<MountTarget>,
}

impl Scheduler {
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn queue(&mut self, job: Job) {
        self.microtasks.push_back(job);
    }

    pub fn pop_microtask(&mut self) -> Option<Job> {
        self.microtasks.pop_front()
    }

    pub fn drop_microtasks(&mut self) -> usize {
        let n = self.microtasks.len();
        self.microtasks.clear();
        n
    }

    /// Forgets queued renders of `target`, once it has been rendered early.
    pub fn cancel_render(&mut self, target: MountTarget) {
        self.microtasks
            .retain(|job| !matches!(job, Job::Render(t) if *t == target));
    }

    pub fn defer_render(&mut self, target: MountTarget) {
        if !self.next_frame.contains(&target) {
            self.next_frame.push(target);
        }
    }

    pub fn take_deferred(&mut self) -> Vec<MountTarget> {
        std::mem::take(&mut self.next_frame)
    }

    pub fn set_timeout(&mut self, delay: Duration, task: Task) -> TimerId {
        let id = TimerId(self.next_timer);
        self.next_timer += 1;
        self.timers.push(Timer {
            id,
            due: self.now + delay,
            task,
        });
        id
    }

    pub fn clear_timeout(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Moves the clock one frame forward and returns the new tick.
    pub fn advance_frame(&mut self) -> u64 {
        self.now += FRAME;
        self.tick += 1;
        self.tick
    }

    /// Earliest timer due by now; ties fire in the order they were set.
    pub fn pop_due_timer(&mut self) -> Option<Task> {
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= self.now)
            .min_by_key(|(_, t)| (t.due, t.id.0))
            .map(|(i, _)| i)?;
        Some(self.timers.remove(idx).task)
    }

    pub fn has_work(&self) -> bool {
        !self.microtasks.is_empty() || !self.timers.is_empty() || !self.next_frame.is_empty()
    }
}
