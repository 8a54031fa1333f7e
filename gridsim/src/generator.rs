//! Stochastic task generator.
//!
//! Arrival timing, class choice and duration sampling each draw from their
//! own seeded stream, so changing one seed leaves the other two sequences
//! untouched.

use crate::config::{DurationSpec, ScenarioConfig, TaskClass};
use crate::error::ConfigError;
use crate::task::{Task, TaskId};
use rand::distributions::WeightedIndex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};

#[derive(Debug, Clone)]
pub struct TaskGenerator {
    arrival_rng: ChaCha8Rng,
    class_rng: ChaCha8Rng,
    duration_rng: ChaCha8Rng,
    inter_arrival: Exp<f64>,
    classes: Vec<TaskClass>,
    class_index: WeightedIndex<f64>,
    generated: u64,
}

impl TaskGenerator {
    pub fn new(config: &ScenarioConfig) -> Result<Self, ConfigError> {
        let inter_arrival = Exp::new(1.0 / config.task_arrival_mean)
            .map_err(|_| ConfigError::not_positive("task_arrival_mean", config.task_arrival_mean))?;

        let class_index = WeightedIndex::new(config.task_distribution.iter().map(|c| c.probability))
            .map_err(|e| {
                let name = config
                    .task_distribution
                    .first()
                    .map_or_else(String::new, |c| c.name.clone());
                ConfigError::task_class(name, e.to_string())
            })?;

        Ok(Self {
            arrival_rng: ChaCha8Rng::seed_from_u64(config.task_arrival_seed),
            class_rng: ChaCha8Rng::seed_from_u64(config.task_class_seed),
            duration_rng: ChaCha8Rng::seed_from_u64(config.task_duration_seed),
            inter_arrival,
            classes: config.task_distribution.clone(),
            class_index,
            generated: 0,
        })
    }

    /// Exponential inter-arrival delay
    pub fn next_delay(&mut self) -> f64 {
        self.inter_arrival.sample(&mut self.arrival_rng)
    }

    /// Build the task arriving at `now`
    pub fn next_task(&mut self, id: TaskId, now: f64) -> Task {
        let class = &self.classes[self.class_index.sample(&mut self.class_rng)];
        let duration = match class.duration {
            DurationSpec::Fixed { duration } => duration,
            DurationSpec::Uniform {
                min_duration,
                max_duration,
            } => self.duration_rng.gen_range(min_duration..=max_duration),
        };
        self.generated += 1;
        Task::new(id, class.name.clone(), now, duration)
    }

    pub fn generated(&self) -> u64 {
        self.generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScenarioConfig {
        let mut config = ScenarioConfig::default();
        config.task_distribution = vec![
            TaskClass::fixed("simple", 0.5, 1.0),
            TaskClass::uniform("ranged", 0.5, 10.0, 20.0),
        ];
        config
    }

    fn draw(config: &ScenarioConfig, n: u64) -> (Vec<f64>, Vec<(String, f64)>) {
        let mut g = TaskGenerator::new(config).unwrap();
        let delays = (0..n).map(|_| g.next_delay()).collect();
        let tasks = (0..n)
            .map(|i| {
                let t = g.next_task(i, 0.0);
                (t.class_name, t.service_duration)
            })
            .collect();
        (delays, tasks)
    }

    #[test]
    fn test_same_seeds_same_stream() {
        assert_eq!(draw(&config(), 100), draw(&config(), 100));
    }

    #[test]
    fn test_streams_are_independent() {
        let base = config();
        let mut other = config();
        other.task_arrival_seed += 1;

        let (delays_a, tasks_a) = draw(&base, 100);
        let (delays_b, tasks_b) = draw(&other, 100);
        assert_ne!(delays_a, delays_b);
        assert_eq!(tasks_a, tasks_b);

        let mut other = config();
        other.task_duration_seed += 1;
        let (delays_c, tasks_c) = draw(&other, 100);
        assert_eq!(delays_a, delays_c);
        let classes_a: Vec<_> = tasks_a.iter().map(|(c, _)| c.clone()).collect();
        let classes_c: Vec<_> = tasks_c.iter().map(|(c, _)| c.clone()).collect();
        assert_eq!(classes_a, classes_c);
    }

    #[test]
    fn test_durations_respect_class() {
        let (_, tasks) = draw(&config(), 500);
        for (class, duration) in tasks {
            match class.as_str() {
                "simple" => assert_eq!(duration, 1.0),
                "ranged" => assert!((10.0..=20.0).contains(&duration)),
                other => panic!("unexpected class {}", other),
            }
        }
    }

    #[test]
    fn test_mean_inter_arrival() {
        let mut g = TaskGenerator::new(&config()).unwrap();
        let n = 20_000;
        let mean = (0..n).map(|_| g.next_delay()).sum::<f64>() / n as f64;
        assert!((mean - 10.0).abs() < 0.5, "mean inter-arrival {}", mean);
    }

    #[test]
    fn test_unnormalized_weights() {
        let mut config = config();
        config.task_distribution = vec![
            TaskClass::fixed("rare", 1.0, 1.0),
            TaskClass::fixed("common", 3.0, 1.0),
        ];
        let mut g = TaskGenerator::new(&config).unwrap();
        let common = (0..8_000).filter(|&i| g.next_task(i, 0.0).class_name == "common").count();
        assert!((5_700..6_300).contains(&common), "common drawn {} times", common);
        assert_eq!(g.generated(), 8_000);
    }
}
