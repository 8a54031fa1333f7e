//! Central dispatcher: bounded admission queue, decision hold, placement.

use crate::machine::MachineView;
use crate::placement::Placement;
use crate::task::{MachineId, Task, TaskState};
use std::collections::VecDeque;

/// Outcome of offering a task to the scheduler
#[derive(Debug)]
pub enum SchedulerAdmission {
    Accepted,
    /// Scheduler queue full; the task is returned in its terminal state
    Dropped(Task),
}

#[derive(Debug)]
pub struct Scheduler {
    queue: VecDeque<Task>,
    capacity: usize,
    hold_time: f64,
    /// Task popped from the queue and waiting out the hold time
    holding: Option<Task>,
    placement: Placement,
    arrivals: u64,
    drops: u64,
}

impl Scheduler {
    pub fn new(capacity: usize, hold_time: f64, placement: Placement) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
            hold_time,
            holding: None,
            placement,
            arrivals: 0,
            drops: 0,
        }
    }

    pub fn admit(&mut self, mut task: Task) -> SchedulerAdmission {
        if self.queue.len() >= self.capacity {
            self.drops += 1;
            task.transition(TaskState::DroppedAtScheduler);
            return SchedulerAdmission::Dropped(task);
        }

        task.transition(TaskState::AtScheduler);
        self.queue.push_back(task);
        self.arrivals += 1;
        SchedulerAdmission::Accepted
    }

    /// If idle and work is queued, pop the head and return when its hold ends
    pub fn begin_hold(&mut self, now: f64) -> Option<f64> {
        if self.holding.is_some() {
            return None;
        }
        let task = self.queue.pop_front()?;
        self.holding = Some(task);
        Some(now + self.hold_time)
    }

    /// Release the held task once its hold expired
    pub fn take_held(&mut self) -> Option<Task> {
        self.holding.take()
    }

    pub fn place(&mut self, task: &Task, machines: &[MachineView]) -> Option<MachineId> {
        self.placement.select(task, machines)
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_holding(&self) -> bool {
        self.holding.is_some()
    }

    /// Tasks accepted but not yet forwarded
    pub fn pending(&self) -> usize {
        self.queue.len() + usize::from(self.is_holding())
    }

    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    pub fn drops(&self) -> u64 {
        self.drops
    }
}
