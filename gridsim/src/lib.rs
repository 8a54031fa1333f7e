//! Compute Grid Scheduling Simulator
//!
//! Discrete-event simulation of a grid of single-slot machines behind a
//! central dispatcher. Tasks arrive from a seeded stochastic generator, wait
//! in the scheduler's bounded queue, are placed by a pluggable algorithm after
//! a short decision hold, and are served FIFO by the chosen machine or dropped
//! when its waiting room is full.
//!
//! # Event flow
//!
//! ```text
//! Arrival ──► Scheduler queue ──(hold)──► DispatchReady ──► placement
//!                 │ full                                        │
//!                 ▼                                             ▼
//!               drop                       machine admission ──► ServiceComplete
//!                                                  │ full
//!                                                  ▼
//!                                                drop
//! ```
//!
//! Events at equal timestamps fire in scheduling order, so a run is fully
//! determined by its configuration and seeds.
//!
//! # Usage
//!
//! ```no_run
//! use gridsim::{AlgorithmKind, GridSimScenario, ScenarioConfig};
//!
//! let mut config = ScenarioConfig::default().with_grid_size(4);
//! config.schedule_algorithm = AlgorithmKind::LeastFull;
//!
//! let mut scenario = GridSimScenario::new(config)?;
//! let report = scenario.run()?;
//! println!("{}", report.render(false));
//! # Ok::<(), gridsim::SimError>(())
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod generator;
pub mod machine;
pub mod placement;
pub mod scenario;
pub mod scheduler;
pub mod task;
pub mod trace;

pub use config::{AlgorithmKind, DurationSpec, MachineGroup, ScenarioConfig, TaskClass};
pub use error::{ConfigError, EngineError, SimError};
pub use machine::{GridMachine, MachineView, SERVICE_SLOT_COUNTS_TOWARD_CAPACITY};
pub use placement::Placement;
pub use run_report::RunReport;
pub use scenario::{GridSimScenario, SystemTotals};
pub use task::{MachineId, Task, TaskId, TaskState};

/// Build a scenario from `config` and run it to the horizon
pub fn run(config: ScenarioConfig) -> Result<RunReport, SimError> {
    GridSimScenario::new(config)?.run()
}
