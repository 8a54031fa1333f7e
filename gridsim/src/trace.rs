//! Dispatch log and per-task CSV export.

use crate::task::{MachineId, Task, TaskId};
use serde::Serialize;
use std::io;

/// One scheduler decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assignment {
    pub task_id: TaskId,
    pub machine: MachineId,
    pub at: f64,
}

/// Ordered record of every dispatch, folded into a running CRC32
#[derive(Debug, Clone, Default)]
pub struct AssignmentTrace {
    entries: Vec<Assignment>,
    hasher: crc32fast::Hasher,
}

impl AssignmentTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, task_id: TaskId, machine: MachineId, at: f64) {
        self.hasher.update(&task_id.to_le_bytes());
        self.hasher.update(&(machine as u64).to_le_bytes());
        self.hasher.update(&at.to_bits().to_le_bytes());
        self.entries.push(Assignment { task_id, machine, at });
    }

    pub fn entries(&self) -> &[Assignment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Digest of the sequence so far; equal digests mean equal dispatch order
    pub fn digest(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Machine chosen for each dispatch, in order
    pub fn machines(&self) -> Vec<MachineId> {
        self.entries.iter().map(|a| a.machine).collect()
    }
}

#[derive(Debug, Serialize)]
struct TaskRow<'a> {
    id: TaskId,
    class: &'a str,
    arrival: f64,
    service: f64,
    dispatch: Option<f64>,
    completion: Option<f64>,
    machine: Option<MachineId>,
    state: &'static str,
}

/// Write one CSV row per task
pub fn write_task_csv<W: io::Write>(tasks: &[Task], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for task in tasks {
        wtr.serialize(TaskRow {
            id: task.id,
            class: &task.class_name,
            arrival: task.arrival_time,
            service: task.service_duration,
            dispatch: task.dispatch_time,
            completion: task.completion_time,
            machine: task.assigned_machine,
            state: task.state().as_str(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_tracks_order() {
        let mut a = AssignmentTrace::new();
        let mut b = AssignmentTrace::new();
        a.record(1, 0, 0.5);
        a.record(2, 1, 0.7);
        b.record(1, 0, 0.5);
        b.record(2, 1, 0.7);
        assert_eq!(a.digest(), b.digest());

        let mut c = AssignmentTrace::new();
        c.record(1, 1, 0.5);
        c.record(2, 0, 0.7);
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.machines(), vec![0, 1]);
    }

    #[test]
    fn test_task_csv() {
        let tasks = vec![Task::new(3, "simple", 1.5, 2.0)];
        let mut out = Vec::new();
        write_task_csv(&tasks, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,class,arrival,service,dispatch,completion,machine,state")
        );
        assert_eq!(lines.next(), Some("3,simple,1.5,2.0,,,,generated"));
    }
}
