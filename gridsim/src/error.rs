//! Error types for grid simulation runs.

use crate::task::MachineId;
use thiserror::Error;

/// Invalid scenario setup. Raised before any event is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A size, rate, seed or time that must be strictly positive was not
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: String },

    /// Grid description yields no machines
    #[error("grid description contains no machines")]
    EmptyGrid,

    /// No task classes configured
    #[error("task distribution is empty")]
    NoTaskClasses,

    /// A task class is malformed (bad weight, inverted duration range, ...)
    #[error("task class '{name}': {reason}")]
    InvalidTaskClass { name: String, reason: String },

    /// Hold time vanishes when added to times near the horizon
    #[error("scheduler_hold_time {hold_time} is below the float resolution at horizon {horizon}")]
    HoldTimeTooSmall { hold_time: f64, horizon: f64 },

    /// Base seed leaves no room for the derived stream seeds
    #[error("base seed {0} is out of range (expected 1..={max})", max = u64::MAX - 3)]
    SeedOutOfRange(u64),

    /// Algorithm name not in the lookup table
    #[error("unknown scheduling algorithm '{0}' (expected one of random, least_full, round_robin, fill_queue, weighted_random)")]
    UnknownAlgorithm(String),

    /// Objects were already built for this scenario
    #[error("objects already initiated")]
    AlreadyInitialized,

    /// Operation requires `init_objects` first
    #[error("scenario objects not initiated")]
    NotInitialized,

    /// Injected task names a class that is not configured
    #[error("unknown task class '{0}'")]
    UnknownTaskClass(String),

    /// Config file could not be read
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a non-positive value error.
    pub fn not_positive(field: &'static str, value: impl std::fmt::Display) -> Self {
        Self::NotPositive {
            field,
            value: value.to_string(),
        }
    }

    /// Creates an invalid task class error.
    pub fn task_class(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTaskClass {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Structural fault inside the event engine. Aborts the run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Event scheduled before the current clock
    #[error("causality violation: event at t={at} scheduled while clock is at t={now}")]
    CausalityViolation { at: f64, now: f64 },

    /// Event time is NaN or infinite
    #[error("non-finite event time {0}")]
    NonFiniteTime(f64),

    /// Placement returned a machine id outside the grid
    #[error("placement selected machine {id} but the grid has {count} machines")]
    NoSuchMachine { id: MachineId, count: usize },
}

/// Any failure of a simulation run
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
