//! Single-slot grid machine fronted by a bounded FIFO waiting room.

use crate::task::{MachineId, Task, TaskState};
use grid_stats::{SampleMonitor, TimeWeightedMonitor};
use run_report::MachineReport;
use std::collections::VecDeque;
use tracing::trace;

/// Whether the task in service occupies one of the `queue_capacity` slots.
///
/// With `false`, capacity counts only waiting tasks and a machine holds at
/// most `queue_capacity + 1` tasks; capacity 0 means "no waiting room".
///
/// Placement treats a machine as full once its resident count reaches
/// `max(capacity, 1)`. An idle machine is never full, and with capacity 3
/// the fourth task still moves on to the next machine.
pub const SERVICE_SLOT_COUNTS_TOWARD_CAPACITY: bool = false;

/// Read-only machine state handed to placement algorithms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineView {
    pub id: MachineId,
    /// Tasks waiting, excluding the one in service
    pub queue_len: usize,
    pub in_service: bool,
    pub capacity: usize,
    pub performance_factor: f64,
}

impl MachineView {
    /// Tasks held by the machine (waiting + in service)
    pub fn resident(&self) -> usize {
        self.queue_len + usize::from(self.in_service)
    }

    /// Resident count has reached the configured capacity; never true when idle
    pub fn is_full(&self) -> bool {
        self.resident() >= self.capacity.max(1)
    }
}

/// Outcome of offering a task to a machine
#[derive(Debug)]
pub enum Admission {
    /// Machine was idle; service ends at `finish_at`
    Started { finish_at: f64 },
    /// Appended to the waiting room at `position` (0 = next)
    Queued { position: usize },
    /// Waiting room full; the task is returned in its terminal state
    Dropped(Task),
}

/// Task that left the machine, plus the finish time of the next one started
#[derive(Debug)]
pub struct Completion {
    pub task: Task,
    pub next_finish_at: Option<f64>,
}

#[derive(Debug)]
pub struct GridMachine {
    id: MachineId,
    name: String,
    performance_factor: f64,
    queue_capacity: usize,
    queue: VecDeque<Task>,
    in_service: Option<Task>,
    busy_time: f64,
    arrivals: u64,
    completions: u64,
    drops: u64,
    population: TimeWeightedMonitor,
    residence: SampleMonitor,
    service: SampleMonitor,
}

impl GridMachine {
    pub fn new(id: MachineId, queue_capacity: usize, performance_factor: f64) -> Self {
        Self {
            id,
            name: format!("M{}:{}", id, performance_factor),
            performance_factor,
            queue_capacity,
            queue: VecDeque::new(),
            in_service: None,
            busy_time: 0.0,
            arrivals: 0,
            completions: 0,
            drops: 0,
            population: TimeWeightedMonitor::new(0.0),
            residence: SampleMonitor::new(),
            service: SampleMonitor::new(),
        }
    }

    pub fn id(&self) -> MachineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn performance_factor(&self) -> f64 {
        self.performance_factor
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_busy(&self) -> bool {
        self.in_service.is_some()
    }

    pub fn resident(&self) -> usize {
        self.queue.len() + usize::from(self.is_busy())
    }

    /// Maximum tasks held at once
    pub fn occupancy_limit(&self) -> usize {
        if SERVICE_SLOT_COUNTS_TOWARD_CAPACITY {
            self.queue_capacity
        } else {
            self.queue_capacity.saturating_add(1)
        }
    }

    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    pub fn completions(&self) -> u64 {
        self.completions
    }

    pub fn drops(&self) -> u64 {
        self.drops
    }

    pub fn busy_time(&self) -> f64 {
        self.busy_time
    }

    pub fn view(&self) -> MachineView {
        MachineView {
            id: self.id,
            queue_len: self.queue.len(),
            in_service: self.is_busy(),
            capacity: self.queue_capacity,
            performance_factor: self.performance_factor,
        }
    }

    /// Admission control. A dispatched task is either accepted or dropped.
    pub fn admit(&mut self, mut task: Task, now: f64) -> Admission {
        if self.resident() >= self.occupancy_limit() {
            self.drops += 1;
            task.transition(TaskState::DroppedAtMachine);
            trace!(machine = self.id, task = task.id, "waiting room full");
            return Admission::Dropped(task);
        }

        self.arrivals += 1;
        self.population.step(now, 1.0);

        if self.in_service.is_none() {
            let finish_at = self.start(task, now);
            Admission::Started { finish_at }
        } else {
            task.transition(TaskState::QueuedAtMachine);
            self.queue.push_back(task);
            Admission::Queued {
                position: self.queue.len() - 1,
            }
        }
    }

    fn start(&mut self, mut task: Task, now: f64) -> f64 {
        task.transition(TaskState::InService);
        let finish_at = now + task.service_duration;
        self.in_service = Some(task);
        finish_at
    }

    /// Finish the task in service and start the next waiting one, if any.
    pub fn complete(&mut self, now: f64) -> Option<Completion> {
        let mut task = self.in_service.take()?;
        task.complete(now);

        self.completions += 1;
        self.busy_time += task.service_duration;
        self.service.record(task.service_duration);
        if let Some(residence) = task.residence_time() {
            self.residence.record(residence);
        }
        self.population.step(now, -1.0);

        let next_finish_at = self.queue.pop_front().map(|next| self.start(next, now));

        Some(Completion { task, next_finish_at })
    }

    /// Fraction of `elapsed` spent serving completed tasks
    pub fn utilization(&self, elapsed: f64) -> Option<f64> {
        (elapsed > 0.0).then(|| self.busy_time / elapsed)
    }

    pub fn report(&self, now: f64) -> MachineReport {
        MachineReport {
            id: self.id,
            name: self.name.clone(),
            performance_factor: self.performance_factor,
            queue_capacity: self.queue_capacity,
            arrivals: self.arrivals,
            completions: self.completions,
            drops: self.drops,
            busy_time: self.busy_time,
            resident: self.resident(),
            population: self.population.summary(now),
            residence: self.residence.summary(),
            service: self.service.summary(),
        }
    }
}
