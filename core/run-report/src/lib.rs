//! Grid Run Report Format
//!
//! Result artifact of one simulation run, consumed by reporting and plotting
//! tools. Binary layout: [Header][JSON payload][Checksum]

use grid_stats::MonitorSummary;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

/// Magic bytes: "GRS1"
pub const MAGIC: [u8; 4] = *b"GRS1";

/// Current format version
pub const VERSION: u16 = 1;

/// Errors reading or writing a report container
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report too short: {0} bytes")]
    Truncated(usize),

    #[error("invalid magic: {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),

    #[error("CRC mismatch: expected {expected}, got {actual}")]
    Checksum { expected: u32, actual: u32 },

    #[error("payload length {declared} does not match {actual} bytes present")]
    PayloadLength { declared: u32, actual: usize },

    #[error("payload encoding: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Report header (fixed size)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub machine_count: u32,
    pub payload_size_bytes: u32,
}

impl ReportHeader {
    pub const SIZE: usize = 14; // 4 + 2 + 4 + 4

    pub fn new(machine_count: u32, payload_size_bytes: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            machine_count,
            payload_size_bytes,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.magic);
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..10].copy_from_slice(&self.machine_count.to_le_bytes());
        out[10..14].copy_from_slice(&self.payload_size_bytes.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReportError> {
        if bytes.len() < Self::SIZE {
            return Err(ReportError::Truncated(bytes.len()));
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        let machine_count = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let payload_size_bytes = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);

        Ok(Self {
            magic,
            version,
            machine_count,
            payload_size_bytes,
        })
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.magic != MAGIC {
            return Err(ReportError::BadMagic(self.magic));
        }
        if self.version != VERSION {
            return Err(ReportError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Inputs that identify and reproduce a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub algorithm: String,
    pub task_arrival_seed: u64,
    pub task_class_seed: u64,
    pub task_duration_seed: u64,
    pub placement_seed: u64,
    pub task_arrival_mean: f64,
    pub horizon: f64,
}

/// Counters and monitors of one grid machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineReport {
    pub id: usize,
    pub name: String,
    pub performance_factor: f64,
    pub queue_capacity: usize,
    pub arrivals: u64,
    pub completions: u64,
    pub drops: u64,
    pub busy_time: f64,
    /// Tasks waiting or in service when the run stopped
    pub resident: usize,
    pub population: MonitorSummary,
    pub residence: MonitorSummary,
    pub service: MonitorSummary,
}

/// Grid-wide counters and monitors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemReport {
    pub total_tasks: u64,
    pub total_arriving_tasks: u64,
    pub total_leaving_tasks: u64,
    pub total_task_drops: u64,
    pub scheduler_arrivals: u64,
    pub scheduler_drops: u64,
    pub in_flight: u64,
    pub population: MonitorSummary,
    pub sojourn: MonitorSummary,
    pub drop_sojourn: MonitorSummary,
}

/// Complete result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    /// Simulated time covered by the statistics
    pub elapsed: f64,
    pub system: SystemReport,
    pub machines: Vec<MachineReport>,
    pub assignments: u64,
    pub assignment_digest: u32,
}

/// Operational laws for one machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MachineLaws {
    /// U_i = B_i / T
    pub utilization: Option<f64>,
    /// X_i = C_i / T
    pub throughput: Option<f64>,
    /// S_i = B_i / C_i
    pub service_time: Option<f64>,
    /// lambda_i = A_i / T
    pub arrival_rate: Option<f64>,
    /// V_i = C_i / C_0
    pub visit_ratio: Option<f64>,
    pub mean_population: Option<f64>,
    pub mean_residence: Option<f64>,
}

/// Operational laws for the grid as a whole
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemLaws {
    pub arrival_rate: Option<f64>,
    pub throughput: Option<f64>,
    pub mean_population: Option<f64>,
    pub mean_sojourn: Option<f64>,
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}

impl MachineReport {
    pub fn laws(&self, elapsed: f64, system_completions: u64) -> MachineLaws {
        MachineLaws {
            utilization: ratio(self.busy_time, elapsed),
            throughput: ratio(self.completions as f64, elapsed),
            service_time: ratio(self.busy_time, self.completions as f64),
            arrival_rate: ratio(self.arrivals as f64, elapsed),
            visit_ratio: ratio(self.completions as f64, system_completions as f64),
            mean_population: self.population.mean,
            mean_residence: self.residence.mean,
        }
    }
}

impl SystemReport {
    pub fn laws(&self, elapsed: f64) -> SystemLaws {
        SystemLaws {
            arrival_rate: ratio(self.scheduler_arrivals as f64, elapsed),
            throughput: ratio(self.total_leaving_tasks as f64, elapsed),
            mean_population: self.population.mean,
            mean_sojourn: self.sojourn.mean,
        }
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.6}", v))
}

impl RunReport {
    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let payload = serde_json::to_vec(self)?;
        let header = ReportHeader::new(self.machines.len() as u32, payload.len() as u32);

        let mut buf = Vec::with_capacity(ReportHeader::SIZE + payload.len() + 4);
        buf.write_all(&header.to_bytes())?;
        buf.write_all(&payload)?;

        let crc = crc32fast::hash(&buf);
        buf.write_all(&crc.to_le_bytes())?;

        Ok(buf)
    }

    /// Deserialize from binary format
    pub fn from_bytes(data: &[u8]) -> Result<Self, ReportError> {
        if data.len() < ReportHeader::SIZE + 4 {
            return Err(ReportError::Truncated(data.len()));
        }

        let body_len = data.len() - 4;
        let body = &data[..body_len];
        let expected = u32::from_le_bytes([
            data[body_len],
            data[body_len + 1],
            data[body_len + 2],
            data[body_len + 3],
        ]);
        let actual = crc32fast::hash(body);
        if actual != expected {
            return Err(ReportError::Checksum { expected, actual });
        }

        let header = ReportHeader::from_bytes(body)?;
        header.validate()?;

        let payload = &body[ReportHeader::SIZE..];
        if payload.len() != header.payload_size_bytes as usize {
            return Err(ReportError::PayloadLength {
                declared: header.payload_size_bytes,
                actual: payload.len(),
            });
        }

        Ok(serde_json::from_slice(payload)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn system_laws(&self) -> SystemLaws {
        self.system.laws(self.elapsed)
    }

    pub fn machine_laws(&self) -> Vec<MachineLaws> {
        self.machines
            .iter()
            .map(|m| m.laws(self.elapsed, self.system.total_leaving_tasks))
            .collect()
    }

    /// Human-readable operational validation
    pub fn render(&self, per_machine: bool) -> String {
        let mut out = String::new();
        let t = self.elapsed;

        let _ = writeln!(out, "Total tasks: {}", self.system.total_arriving_tasks);
        let _ = writeln!(out, "Algorithm: {}", self.metadata.algorithm);
        let _ = writeln!(out, "task arrival seed: {}", self.metadata.task_arrival_seed);
        let _ = writeln!(out, "task class seed: {}", self.metadata.task_class_seed);
        let _ = writeln!(out, "task duration seed: {}", self.metadata.task_duration_seed);
        let _ = writeln!(out, "placement seed: {}", self.metadata.placement_seed);

        if per_machine {
            let _ = writeln!(out, "\n=== Operational Validation ===");
            for (m, laws) in self.machines.iter().zip(self.machine_laws()) {
                let _ = writeln!(out, "--- {} ---", m.name);
                let _ = writeln!(out, "current tasks = {}", m.resident);
                let _ = writeln!(out, "Ai = {}", m.arrivals);
                let _ = writeln!(out, "Bi = {:.6}", m.busy_time);
                let _ = writeln!(out, "Ci = {}", m.completions);
                let _ = writeln!(out, "drops = {}", m.drops);
                let _ = writeln!(out, "Ui = {}", fmt_opt(laws.utilization));
                let _ = writeln!(out, "Xi = {}", fmt_opt(laws.throughput));
                let _ = writeln!(out, "Si = {}", fmt_opt(laws.service_time));
                let _ = writeln!(out, "lambda-i = {}", fmt_opt(laws.arrival_rate));
                let _ = writeln!(out, "Vi = {}", fmt_opt(laws.visit_ratio));
                let _ = writeln!(out, "N = {}", fmt_opt(laws.mean_population));
                let _ = writeln!(out, "T = {}", fmt_opt(laws.mean_residence));
            }
        }

        let laws = self.system_laws();
        let _ = writeln!(out, "\n=== System as a whole ===");
        let _ = writeln!(out, "t = {:.6}", t);
        let _ = writeln!(out, "Ao = {}", self.system.scheduler_arrivals);
        let _ = writeln!(out, "lambda = {}", fmt_opt(laws.arrival_rate));
        let _ = writeln!(out, "Co = {}", self.system.total_leaving_tasks);
        let _ = writeln!(out, "Xo = {}", fmt_opt(laws.throughput));
        let _ = writeln!(out, "drops = {}", self.system.total_task_drops);
        let _ = writeln!(out, "in flight = {}", self.system.in_flight);
        let _ = writeln!(out, "N = {}", fmt_opt(laws.mean_population));
        let _ = writeln!(out, "T = {}", fmt_opt(laws.mean_sojourn));
        let _ = writeln!(out, "assignment digest = {:08x} ({} dispatches)", self.assignment_digest, self.assignments);

        out
    }
}
