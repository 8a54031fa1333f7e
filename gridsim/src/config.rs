//! Scenario configuration.
//!
//! Supplied once at setup and immutable for the run. Every field has a
//! default so partial JSON files are accepted.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

pub const SCHEDULER_MAX_QUEUE_SIZE: usize = 5_000_000;
pub const MACHINE_MAX_QUEUE_SIZE: usize = 100_000;
pub const GRID_SIZE: usize = 10;
pub const SCHEDULER_HOLD_TIME: f64 = 0.000_001;
pub const DEFAULT_TASK_ARRIVAL_MEAN: f64 = 10.0;
pub const DEFAULT_SIMULATION_TIME: f64 = 10_000.0;

pub const SIMPLE_TASK_TIME: f64 = 1.0;
pub const NORMAL_TASK_TIME: f64 = 50.0;
pub const COMPLEX_TASK_TIME: f64 = 150.0;

/// Tolerance before a class distribution is reported as not summing to one
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Homogeneous group of machines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineGroup {
    pub count: usize,
    pub performance_factor: f64,
}

/// Service duration of a task class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Fixed { duration: f64 },
    Uniform { min_duration: f64, max_duration: f64 },
}

/// Named task class with its selection weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskClass {
    pub name: String,
    pub probability: f64,
    #[serde(flatten)]
    pub duration: DurationSpec,
}

impl TaskClass {
    pub fn fixed(name: impl Into<String>, probability: f64, duration: f64) -> Self {
        Self {
            name: name.into(),
            probability,
            duration: DurationSpec::Fixed { duration },
        }
    }

    pub fn uniform(name: impl Into<String>, probability: f64, min_duration: f64, max_duration: f64) -> Self {
        Self {
            name: name.into(),
            probability,
            duration: DurationSpec::Uniform {
                min_duration,
                max_duration,
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.probability.is_finite() || self.probability < 0.0 {
            return Err(ConfigError::task_class(
                &self.name,
                format!("probability must be a finite non-negative weight, got {}", self.probability),
            ));
        }
        match self.duration {
            DurationSpec::Fixed { duration } => {
                if !duration.is_finite() || duration <= 0.0 {
                    return Err(ConfigError::task_class(
                        &self.name,
                        format!("duration must be positive, got {}", duration),
                    ));
                }
            }
            DurationSpec::Uniform {
                min_duration,
                max_duration,
            } => {
                if !min_duration.is_finite() || !max_duration.is_finite() || min_duration <= 0.0 {
                    return Err(ConfigError::task_class(
                        &self.name,
                        format!("duration range [{}, {}] must be positive", min_duration, max_duration),
                    ));
                }
                if min_duration > max_duration {
                    return Err(ConfigError::task_class(
                        &self.name,
                        format!("min duration {} exceeds max duration {}", min_duration, max_duration),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Placement algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Random,
    LeastFull,
    RoundRobin,
    FillQueue,
    WeightedRandom,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 5] = [
        AlgorithmKind::Random,
        AlgorithmKind::LeastFull,
        AlgorithmKind::RoundRobin,
        AlgorithmKind::FillQueue,
        AlgorithmKind::WeightedRandom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmKind::Random => "random",
            AlgorithmKind::LeastFull => "least_full",
            AlgorithmKind::RoundRobin => "round_robin",
            AlgorithmKind::FillQueue => "fill_queue",
            AlgorithmKind::WeightedRandom => "weighted_random",
        }
    }
}

impl Default for AlgorithmKind {
    fn default() -> Self {
        AlgorithmKind::WeightedRandom
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()))
    }
}

/// Full run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub grid_description: Vec<MachineGroup>,
    pub schedule_algorithm: AlgorithmKind,
    pub task_distribution: Vec<TaskClass>,
    pub scheduler_queue_size: usize,
    /// Waiting room per machine, excluding the service slot
    pub machine_queue_size: usize,
    pub task_class_seed: u64,
    pub task_duration_seed: u64,
    pub task_arrival_seed: u64,
    pub placement_seed: u64,
    pub task_arrival_mean: f64,
    pub scheduler_hold_time: f64,
    pub sim_time: f64,
    /// Run the stochastic generator; when false only injected tasks arrive
    pub stochastic_arrivals: bool,
    /// Keep every terminal task for `finished_tasks` and the CSV trace
    pub record_finished_tasks: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            grid_description: vec![MachineGroup {
                count: GRID_SIZE,
                performance_factor: 1.0,
            }],
            schedule_algorithm: AlgorithmKind::default(),
            task_distribution: vec![TaskClass::fixed("simple", 1.0, SIMPLE_TASK_TIME)],
            scheduler_queue_size: SCHEDULER_MAX_QUEUE_SIZE,
            machine_queue_size: MACHINE_MAX_QUEUE_SIZE,
            task_class_seed: 202,
            task_duration_seed: 303,
            task_arrival_seed: 101,
            placement_seed: 404,
            task_arrival_mean: DEFAULT_TASK_ARRIVAL_MEAN,
            scheduler_hold_time: SCHEDULER_HOLD_TIME,
            sim_time: DEFAULT_SIMULATION_TIME,
            stochastic_arrivals: true,
            record_finished_tasks: false,
        }
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::not_positive(field, value))
    }
}

impl ScenarioConfig {
    /// Load a (possibly partial) JSON config; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Three classes with equal-ish weights and increasing cost
    pub fn mixed_workload() -> Vec<TaskClass> {
        vec![
            TaskClass::fixed("simple", 0.33, SIMPLE_TASK_TIME),
            TaskClass::fixed("normal", 0.33, NORMAL_TASK_TIME),
            TaskClass::fixed("complex", 0.34, COMPLEX_TASK_TIME),
        ]
    }

    /// Replace the grid with `count` machines of factor 1
    pub fn with_grid_size(mut self, count: usize) -> Self {
        self.grid_description = vec![MachineGroup {
            count,
            performance_factor: 1.0,
        }];
        self
    }

    /// Derive the four stream seeds as `seed`, `seed + 1`, `seed + 2`, `seed + 3`
    pub fn with_base_seed(mut self, seed: u64) -> Result<Self, ConfigError> {
        let derived = |offset: u64| seed.checked_add(offset).ok_or(ConfigError::SeedOutOfRange(seed));
        self.task_arrival_seed = seed;
        self.task_class_seed = derived(1)?;
        self.task_duration_seed = derived(2)?;
        self.placement_seed = derived(3)?;
        Ok(self)
    }

    pub fn machine_count(&self) -> usize {
        self.grid_description.iter().map(|g| g.count).sum()
    }

    /// Performance factor of every machine, in id order
    pub fn machine_factors(&self) -> Vec<f64> {
        self.grid_description
            .iter()
            .flat_map(|g| std::iter::repeat(g.performance_factor).take(g.count))
            .collect()
    }

    pub fn task_class(&self, name: &str) -> Option<&TaskClass> {
        self.task_distribution.iter().find(|c| c.name == name)
    }

    /// Check every structural constraint. Nothing is built before this passes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machine_count() == 0 {
            return Err(ConfigError::EmptyGrid);
        }
        for group in &self.grid_description {
            require_positive("performance_factor", group.performance_factor)?;
        }

        if self.scheduler_queue_size == 0 {
            return Err(ConfigError::not_positive("scheduler_queue_size", 0));
        }

        for (field, seed) in [
            ("task_class_seed", self.task_class_seed),
            ("task_duration_seed", self.task_duration_seed),
            ("task_arrival_seed", self.task_arrival_seed),
            ("placement_seed", self.placement_seed),
        ] {
            if seed == 0 {
                return Err(ConfigError::not_positive(field, seed));
            }
        }

        require_positive("task_arrival_mean", self.task_arrival_mean)?;
        require_positive("scheduler_hold_time", self.scheduler_hold_time)?;
        require_positive("sim_time", self.sim_time)?;
        // dispatch must land strictly after arrival anywhere before the horizon
        if self.sim_time + self.scheduler_hold_time == self.sim_time {
            return Err(ConfigError::HoldTimeTooSmall {
                hold_time: self.scheduler_hold_time,
                horizon: self.sim_time,
            });
        }

        if self.task_distribution.is_empty() {
            return Err(ConfigError::NoTaskClasses);
        }
        for (i, class) in self.task_distribution.iter().enumerate() {
            class.validate()?;
            if self.task_distribution[..i].iter().any(|c| c.name == class.name) {
                return Err(ConfigError::task_class(&class.name, "duplicate class name"));
            }
        }

        let weight_sum: f64 = self.task_distribution.iter().map(|c| c.probability).sum();
        if weight_sum <= 0.0 {
            return Err(ConfigError::task_class(
                &self.task_distribution[0].name,
                "all class probabilities are zero",
            ));
        }
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            warn!(weight_sum, "task class probabilities do not sum to 1; normalizing");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScenarioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.machine_count(), GRID_SIZE);
        assert_eq!(config.schedule_algorithm, AlgorithmKind::WeightedRandom);
    }

    #[test]
    fn test_algorithm_lookup() {
        for kind in AlgorithmKind::ALL {
            assert_eq!(kind.name().parse::<AlgorithmKind>().unwrap(), kind);
        }
        assert!(matches!(
            "shortest_job".parse::<AlgorithmKind>(),
            Err(ConfigError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_non_positive_values_rejected() {
        let mut config = ScenarioConfig::default();
        config.scheduler_hold_time = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "scheduler_hold_time", .. })
        ));

        let mut config = ScenarioConfig::default();
        config.task_arrival_seed = 0;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.scheduler_queue_size = 0;
        assert!(config.validate().is_err());

        let config = ScenarioConfig::default().with_grid_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::EmptyGrid)));
    }

    #[test]
    fn test_hold_time_must_survive_horizon_rounding() {
        let mut config = ScenarioConfig::default();
        config.sim_time = 1e11;
        assert!(matches!(config.validate(), Err(ConfigError::HoldTimeTooSmall { .. })));

        config.scheduler_hold_time = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_seed_derives_streams() {
        let config = ScenarioConfig::default().with_base_seed(10).unwrap();
        assert_eq!(config.task_arrival_seed, 10);
        assert_eq!(config.task_class_seed, 11);
        assert_eq!(config.task_duration_seed, 12);
        assert_eq!(config.placement_seed, 13);

        assert!(ScenarioConfig::default().with_base_seed(u64::MAX - 3).is_ok());
        assert!(matches!(
            ScenarioConfig::default().with_base_seed(u64::MAX - 1),
            Err(ConfigError::SeedOutOfRange(_))
        ));
    }

    #[test]
    fn test_zero_machine_waiting_room_allowed() {
        let mut config = ScenarioConfig::default();
        config.machine_queue_size = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_task_class_validation() {
        let mut config = ScenarioConfig::default();
        config.task_distribution = vec![TaskClass::uniform("broken", 1.0, 5.0, 2.0)];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTaskClass { .. })));

        config.task_distribution = vec![TaskClass::fixed("neg", -0.5, 1.0)];
        assert!(config.validate().is_err());

        config.task_distribution = vec![TaskClass::fixed("a", 0.0, 1.0), TaskClass::fixed("b", 0.0, 1.0)];
        assert!(config.validate().is_err());

        config.task_distribution = vec![TaskClass::fixed("a", 1.0, 1.0), TaskClass::fixed("a", 1.0, 2.0)];
        assert!(config.validate().is_err());

        // unnormalized weights are accepted
        config.task_distribution = vec![TaskClass::fixed("a", 2.0, 1.0), TaskClass::fixed("b", 6.0, 2.0)];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_machine_factors_follow_grid_order() {
        let mut config = ScenarioConfig::default();
        config.grid_description = vec![
            MachineGroup { count: 2, performance_factor: 1.0 },
            MachineGroup { count: 1, performance_factor: 4.0 },
        ];
        assert_eq!(config.machine_factors(), vec![1.0, 1.0, 4.0]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "schedule_algorithm": "fill_queue",
            "machine_queue_size": 3,
            "task_distribution": [
                {"name": "simple", "probability": 0.5, "duration": 1.0},
                {"name": "ranged", "probability": 0.5, "min_duration": 2.0, "max_duration": 8.0}
            ]
        }"#;
        let config: ScenarioConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.schedule_algorithm, AlgorithmKind::FillQueue);
        assert_eq!(config.machine_queue_size, 3);
        assert_eq!(config.scheduler_queue_size, SCHEDULER_MAX_QUEUE_SIZE);
        assert_eq!(
            config.task_distribution[1].duration,
            DurationSpec::Uniform { min_duration: 2.0, max_duration: 8.0 }
        );
        assert!(config.validate().is_ok());
    }
}
