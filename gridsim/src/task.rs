//! Job records flowing through the grid.

use serde::{Deserialize, Serialize};

pub type TaskId = u64;
pub type MachineId = usize;

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Generated,
    AtScheduler,
    Dispatched,
    QueuedAtMachine,
    InService,
    Completed,
    DroppedAtScheduler,
    DroppedAtMachine,
}

impl TaskState {
    /// No transition leaves a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::DroppedAtScheduler | TaskState::DroppedAtMachine
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Generated => "generated",
            TaskState::AtScheduler => "at_scheduler",
            TaskState::Dispatched => "dispatched",
            TaskState::QueuedAtMachine => "queued_at_machine",
            TaskState::InService => "in_service",
            TaskState::Completed => "completed",
            TaskState::DroppedAtScheduler => "dropped_at_scheduler",
            TaskState::DroppedAtMachine => "dropped_at_machine",
        }
    }
}

/// Simulated job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub class_name: String,
    pub arrival_time: f64,
    pub service_duration: f64,
    pub assigned_machine: Option<MachineId>,
    pub dispatch_time: Option<f64>,
    pub completion_time: Option<f64>,
    state: TaskState,
}

impl Task {
    pub fn new(id: TaskId, class_name: impl Into<String>, arrival_time: f64, service_duration: f64) -> Self {
        Self {
            id,
            class_name: class_name.into(),
            arrival_time,
            service_duration,
            assigned_machine: None,
            dispatch_time: None,
            completion_time: None,
            state: TaskState::Generated,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Move to `next`. Terminal states are final; a transition out of one is ignored.
    pub(crate) fn transition(&mut self, next: TaskState) {
        debug_assert!(!self.state.is_terminal(), "task {} already {:?}", self.id, self.state);
        if !self.state.is_terminal() {
            self.state = next;
        }
    }

    pub(crate) fn dispatch(&mut self, machine: MachineId, now: f64) {
        self.assigned_machine = Some(machine);
        self.dispatch_time = Some(now);
        self.transition(TaskState::Dispatched);
    }

    pub(crate) fn complete(&mut self, now: f64) {
        self.completion_time = Some(now);
        self.transition(TaskState::Completed);
    }

    /// Arrival to completion, once completed
    pub fn sojourn_time(&self) -> Option<f64> {
        self.completion_time.map(|c| c - self.arrival_time)
    }

    /// Dispatch to completion, once completed
    pub fn residence_time(&self) -> Option<f64> {
        Some(self.completion_time? - self.dispatch_time?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut task = Task::new(7, "simple", 2.0, 1.5);
        assert_eq!(task.state(), TaskState::Generated);

        task.transition(TaskState::AtScheduler);
        task.dispatch(3, 2.5);
        assert_eq!(task.state(), TaskState::Dispatched);
        assert_eq!(task.assigned_machine, Some(3));

        task.transition(TaskState::InService);
        task.complete(4.0);

        assert!(task.state().is_terminal());
        assert_eq!(task.sojourn_time(), Some(2.0));
        assert_eq!(task.residence_time(), Some(1.5));
    }

    #[test]
    fn test_times_absent_before_completion() {
        let task = Task::new(1, "normal", 0.0, 50.0);
        assert_eq!(task.sojourn_time(), None);
        assert_eq!(task.residence_time(), None);
        assert!(!task.state().is_terminal());
    }
}
