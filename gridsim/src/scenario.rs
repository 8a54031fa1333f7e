//! Scenario lifecycle and the event loop driving generator, scheduler and machines.

use crate::clock::EventQueue;
use crate::config::ScenarioConfig;
use crate::error::{ConfigError, EngineError, SimError};
use crate::generator::TaskGenerator;
use crate::machine::{Admission, GridMachine, MachineView};
use crate::placement::Placement;
use crate::scheduler::{Scheduler, SchedulerAdmission};
use crate::task::{MachineId, Task, TaskId};
use crate::trace::AssignmentTrace;
use grid_stats::{SampleMonitor, TimeWeightedMonitor};
use run_report::{RunMetadata, RunReport, SystemReport};
use tracing::{debug, info, trace};

/// Scheduled occurrences in the grid
#[derive(Debug)]
enum Event {
    /// Generator wakes up after an inter-arrival delay
    Arrival,
    /// Explicitly injected task enters the system
    Injected { class_name: String, service_duration: f64 },
    /// Scheduler hold expired; place and forward the held task
    DispatchReady,
    /// Machine finished its task in service
    ServiceComplete(MachineId),
}

/// Grid-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemTotals {
    /// Task ids issued
    pub total_tasks: u64,
    /// Tasks offered to the scheduler
    pub total_arriving_tasks: u64,
    pub total_leaving_tasks: u64,
    /// Drops at the scheduler and at machines
    pub total_task_drops: u64,
}

/// Run-scoped aggregates mutated by the event handlers
#[derive(Debug)]
struct RunStats {
    totals: SystemTotals,
    population: TimeWeightedMonitor,
    sojourn: SampleMonitor,
    drop_sojourn: SampleMonitor,
}

impl RunStats {
    fn new() -> Self {
        Self {
            totals: SystemTotals::default(),
            population: TimeWeightedMonitor::new(0.0),
            sojourn: SampleMonitor::new(),
            drop_sojourn: SampleMonitor::new(),
        }
    }

    fn next_id(&mut self) -> TaskId {
        let id = self.totals.total_tasks;
        self.totals.total_tasks += 1;
        id
    }
}

/// Simulation objects built by `init_objects`
#[derive(Debug)]
struct Grid {
    events: EventQueue<Event>,
    scheduler: Scheduler,
    machines: Vec<GridMachine>,
    generator: Option<TaskGenerator>,
    assignments: AssignmentTrace,
    /// Terminal tasks, kept only when `record_finished_tasks` is set
    finished: Option<Vec<Task>>,
    views: Vec<MachineView>,
}

impl Grid {
    fn build(config: &ScenarioConfig) -> Result<Self, SimError> {
        let placement = Placement::new(config.schedule_algorithm, config.placement_seed);
        let scheduler = Scheduler::new(config.scheduler_queue_size, config.scheduler_hold_time, placement);

        let machines: Vec<GridMachine> = config
            .machine_factors()
            .into_iter()
            .enumerate()
            .map(|(id, factor)| GridMachine::new(id, config.machine_queue_size, factor))
            .collect();

        let mut events = EventQueue::new();
        let generator = if config.stochastic_arrivals {
            let mut generator = TaskGenerator::new(config)?;
            events.schedule(Event::Arrival, generator.next_delay())?;
            Some(generator)
        } else {
            None
        };

        Ok(Self {
            events,
            scheduler,
            views: Vec::with_capacity(machines.len()),
            machines,
            generator,
            assignments: AssignmentTrace::new(),
            finished: config.record_finished_tasks.then(Vec::new),
        })
    }

    fn handle(&mut self, event: Event, now: f64, stats: &mut RunStats) -> Result<(), EngineError> {
        match event {
            Event::Arrival => {
                let Some(generator) = self.generator.as_mut() else {
                    return Ok(());
                };
                let task = generator.next_task(stats.next_id(), now);
                let delay = generator.next_delay();
                self.offer(task, now, stats)?;
                self.events.schedule_in(Event::Arrival, delay)
            }
            Event::Injected {
                class_name,
                service_duration,
            } => {
                let task = Task::new(stats.next_id(), class_name, now, service_duration);
                self.offer(task, now, stats)
            }
            Event::DispatchReady => self.dispatch(now, stats),
            Event::ServiceComplete(id) => self.complete(id, now, stats),
        }
    }

    /// Scheduler admission for a newly arrived task
    fn offer(&mut self, task: Task, now: f64, stats: &mut RunStats) -> Result<(), EngineError> {
        stats.totals.total_arriving_tasks += 1;

        match self.scheduler.admit(task) {
            SchedulerAdmission::Accepted => {
                stats.population.step(now, 1.0);
                self.begin_hold(now)
            }
            SchedulerAdmission::Dropped(task) => {
                stats.totals.total_task_drops += 1;
                debug!(task = task.id, t = now, "dropped at scheduler");
                self.retire(task);
                Ok(())
            }
        }
    }

    fn begin_hold(&mut self, now: f64) -> Result<(), EngineError> {
        match self.scheduler.begin_hold(now) {
            Some(release_at) => self.events.schedule(Event::DispatchReady, release_at),
            None => Ok(()),
        }
    }

    /// Place the held task and forward it to the chosen machine
    fn dispatch(&mut self, now: f64, stats: &mut RunStats) -> Result<(), EngineError> {
        let Some(mut task) = self.scheduler.take_held() else {
            return Ok(());
        };

        self.views.clear();
        self.views.extend(self.machines.iter().map(GridMachine::view));

        let count = self.machines.len();
        let id = self
            .scheduler
            .place(&task, &self.views)
            .ok_or(EngineError::NoSuchMachine { id: 0, count })?;
        let machine = self
            .machines
            .get_mut(id)
            .ok_or(EngineError::NoSuchMachine { id, count })?;

        task.dispatch(id, now);
        self.assignments.record(task.id, id, now);
        trace!(task = task.id, machine = id, t = now, "dispatched");

        match machine.admit(task, now) {
            Admission::Started { finish_at } => {
                self.events.schedule(Event::ServiceComplete(id), finish_at)?;
            }
            Admission::Queued { .. } => {}
            Admission::Dropped(task) => {
                stats.totals.total_task_drops += 1;
                stats.population.step(now, -1.0);
                stats.drop_sojourn.record(now - task.arrival_time);
                debug!(task = task.id, machine = id, t = now, "dropped at machine");
                self.retire(task);
            }
        }

        self.begin_hold(now)
    }

    fn complete(&mut self, id: MachineId, now: f64, stats: &mut RunStats) -> Result<(), EngineError> {
        let count = self.machines.len();
        let machine = self
            .machines
            .get_mut(id)
            .ok_or(EngineError::NoSuchMachine { id, count })?;

        let Some(completion) = machine.complete(now) else {
            return Ok(());
        };
        if let Some(finish_at) = completion.next_finish_at {
            self.events.schedule(Event::ServiceComplete(id), finish_at)?;
        }

        stats.totals.total_leaving_tasks += 1;
        stats.population.step(now, -1.0);
        if let Some(sojourn) = completion.task.sojourn_time() {
            stats.sojourn.record(sojourn);
        }
        self.retire(completion.task);
        Ok(())
    }

    fn retire(&mut self, task: Task) {
        if let Some(finished) = self.finished.as_mut() {
            finished.push(task);
        }
    }

    fn in_flight(&self) -> u64 {
        let at_machines: usize = self.machines.iter().map(GridMachine::resident).sum();
        (self.scheduler.pending() + at_machines) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Configured,
    Initialized,
    Finished,
}

/// One simulation run: configuration, grid objects and aggregates.
///
/// Objects can be built exactly once; a scenario is not reusable after `run`.
#[derive(Debug)]
pub struct GridSimScenario {
    config: ScenarioConfig,
    phase: Phase,
    stats: RunStats,
    grid: Option<Grid>,
}

impl GridSimScenario {
    pub fn new(config: ScenarioConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            phase: Phase::Configured,
            stats: RunStats::new(),
            grid: None,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn totals(&self) -> SystemTotals {
        self.stats.totals
    }

    pub fn is_initialized(&self) -> bool {
        self.phase != Phase::Configured
    }

    /// Build scheduler, machines and generator
    pub fn init_objects(&mut self) -> Result<(), SimError> {
        if self.phase != Phase::Configured {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        self.grid = Some(Grid::build(&self.config)?);
        self.phase = Phase::Initialized;
        Ok(())
    }

    /// Schedule a task of a configured class to arrive at `at`
    pub fn inject_task(&mut self, at: f64, class_name: &str, service_duration: f64) -> Result<(), SimError> {
        if self.config.task_class(class_name).is_none() {
            return Err(ConfigError::UnknownTaskClass(class_name.to_string()).into());
        }
        if !(service_duration.is_finite() && service_duration > 0.0) {
            return Err(ConfigError::not_positive("service_duration", service_duration).into());
        }
        let grid = match (self.phase, self.grid.as_mut()) {
            (Phase::Initialized, Some(grid)) => grid,
            (Phase::Finished, _) => return Err(ConfigError::AlreadyInitialized.into()),
            _ => return Err(ConfigError::NotInitialized.into()),
        };

        grid.events.schedule(
            Event::Injected {
                class_name: class_name.to_string(),
                service_duration,
            },
            at,
        )?;
        Ok(())
    }

    /// Drive the event loop up to the horizon and report.
    ///
    /// Tasks still queued or in service at the horizon stay where they are.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        match self.phase {
            Phase::Configured => self.init_objects()?,
            Phase::Initialized => {}
            Phase::Finished => return Err(ConfigError::AlreadyInitialized.into()),
        }
        self.phase = Phase::Finished;

        let horizon = self.config.sim_time;
        let grid = self.grid.as_mut().ok_or(ConfigError::NotInitialized)?;

        info!(
            algorithm = %self.config.schedule_algorithm,
            machines = grid.machines.len(),
            horizon,
            "simulation started"
        );

        while let Some((now, event)) = grid.events.pop_until(horizon) {
            trace!(t = now, ?event, "event");
            grid.handle(event, now, &mut self.stats)?;
        }
        grid.events.advance_to(horizon);

        let report = self.report().ok_or(ConfigError::NotInitialized)?;
        info!(
            arrivals = report.system.total_arriving_tasks,
            completions = report.system.total_leaving_tasks,
            drops = report.system.total_task_drops,
            in_flight = report.system.in_flight,
            "simulation finished"
        );
        Ok(report)
    }

    /// Current simulated time, once initialized
    pub fn now(&self) -> Option<f64> {
        self.grid.as_ref().map(|g| g.events.now())
    }

    pub fn machines(&self) -> &[GridMachine] {
        self.grid.as_ref().map(|g| g.machines.as_slice()).unwrap_or_default()
    }

    pub fn scheduler(&self) -> Option<&Scheduler> {
        self.grid.as_ref().map(|g| &g.scheduler)
    }

    pub fn assignments(&self) -> Option<&AssignmentTrace> {
        self.grid.as_ref().map(|g| &g.assignments)
    }

    /// Tasks that reached a terminal state, in the order they got there.
    ///
    /// Empty unless `record_finished_tasks` was set.
    pub fn finished_tasks(&self) -> &[Task] {
        self.grid
            .as_ref()
            .and_then(|g| g.finished.as_deref())
            .unwrap_or_default()
    }

    /// Tasks accepted but neither completed nor dropped
    pub fn in_flight(&self) -> u64 {
        self.grid.as_ref().map_or(0, Grid::in_flight)
    }

    /// Snapshot of all counters and monitors at the current clock
    pub fn report(&self) -> Option<RunReport> {
        let grid = self.grid.as_ref()?;
        let now = grid.events.now();
        let stats = &self.stats;

        Some(RunReport {
            metadata: RunMetadata {
                algorithm: self.config.schedule_algorithm.name().to_string(),
                task_arrival_seed: self.config.task_arrival_seed,
                task_class_seed: self.config.task_class_seed,
                task_duration_seed: self.config.task_duration_seed,
                placement_seed: self.config.placement_seed,
                task_arrival_mean: self.config.task_arrival_mean,
                horizon: self.config.sim_time,
            },
            elapsed: now,
            system: SystemReport {
                total_tasks: stats.totals.total_tasks,
                total_arriving_tasks: stats.totals.total_arriving_tasks,
                total_leaving_tasks: stats.totals.total_leaving_tasks,
                total_task_drops: stats.totals.total_task_drops,
                scheduler_arrivals: grid.scheduler.arrivals(),
                scheduler_drops: grid.scheduler.drops(),
                in_flight: grid.in_flight(),
                population: stats.population.summary(now),
                sojourn: stats.sojourn.summary(),
                drop_sojourn: stats.drop_sojourn.summary(),
            },
            machines: grid.machines.iter().map(|m| m.report(now)).collect(),
            assignments: grid.assignments.len() as u64,
            assignment_digest: grid.assignments.digest(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlgorithmKind, TaskClass};
    use crate::task::TaskState;

    fn manual(algorithm: AlgorithmKind, machines: usize, machine_qs: usize) -> ScenarioConfig {
        let mut config = ScenarioConfig::default().with_grid_size(machines);
        config.schedule_algorithm = algorithm;
        config.machine_queue_size = machine_qs;
        config.stochastic_arrivals = false;
        config.record_finished_tasks = true;
        config.sim_time = 100.0;
        config
    }

    #[test]
    fn test_double_init_is_fatal() {
        let mut scenario = GridSimScenario::new(ScenarioConfig::default()).unwrap();
        scenario.init_objects().unwrap();
        assert!(matches!(
            scenario.init_objects(),
            Err(SimError::Config(ConfigError::AlreadyInitialized))
        ));
    }

    #[test]
    fn test_run_twice_is_fatal() {
        let mut config = ScenarioConfig::default();
        config.sim_time = 50.0;
        let mut scenario = GridSimScenario::new(config).unwrap();
        scenario.run().unwrap();
        assert!(matches!(
            scenario.run(),
            Err(SimError::Config(ConfigError::AlreadyInitialized))
        ));
    }

    #[test]
    fn test_invalid_config_never_builds() {
        let mut config = ScenarioConfig::default();
        config.task_arrival_mean = -1.0;
        assert!(GridSimScenario::new(config).is_err());
    }

    #[test]
    fn test_inject_requires_init_and_known_class() {
        let mut scenario = GridSimScenario::new(manual(AlgorithmKind::RoundRobin, 1, 10)).unwrap();
        assert!(matches!(
            scenario.inject_task(1.0, "simple", 1.0),
            Err(SimError::Config(ConfigError::NotInitialized))
        ));

        scenario.init_objects().unwrap();
        assert!(matches!(
            scenario.inject_task(1.0, "mystery", 1.0),
            Err(SimError::Config(ConfigError::UnknownTaskClass(_)))
        ));
        assert!(scenario.inject_task(1.0, "simple", 0.0).is_err());
        assert!(scenario.inject_task(1.0, "simple", 1.0).is_ok());
    }

    #[test]
    fn test_single_task_lifecycle() {
        let mut scenario = GridSimScenario::new(manual(AlgorithmKind::LeastFull, 2, 10)).unwrap();
        scenario.init_objects().unwrap();
        scenario.inject_task(2.0, "simple", 3.0).unwrap();
        let report = scenario.run().unwrap();

        let task = &scenario.finished_tasks()[0];
        assert_eq!(task.state(), TaskState::Completed);
        assert_eq!(task.assigned_machine, Some(0));
        assert_eq!(task.dispatch_time, Some(2.0 + scenario.config().scheduler_hold_time));
        assert_eq!(task.completion_time, Some(task.dispatch_time.unwrap() + 3.0));

        assert_eq!(report.elapsed, 100.0);
        assert_eq!(report.system.total_leaving_tasks, 1);
        assert_eq!(report.system.in_flight, 0);
        assert_eq!(report.machines[0].busy_time, 3.0);
        assert_eq!(report.machines[1].arrivals, 0);
    }

    #[test]
    fn test_horizon_leaves_tasks_in_flight() {
        let mut scenario = GridSimScenario::new(manual(AlgorithmKind::RoundRobin, 1, 10)).unwrap();
        scenario.init_objects().unwrap();
        scenario.inject_task(10.0, "simple", 500.0).unwrap();
        scenario.inject_task(11.0, "simple", 1.0).unwrap();
        scenario.inject_task(150.0, "simple", 1.0).unwrap();
        let report = scenario.run().unwrap();

        // third task arrives after the horizon and never enters
        assert_eq!(report.system.total_arriving_tasks, 2);
        assert_eq!(report.system.total_leaving_tasks, 0);
        assert_eq!(report.system.in_flight, 2);
        assert_eq!(report.machines[0].resident, 2);
        assert!(scenario.finished_tasks().is_empty());
    }

    #[test]
    fn test_scheduler_overflow_drops() {
        let mut config = manual(AlgorithmKind::RoundRobin, 1, 10);
        config.scheduler_queue_size = 1;
        config.scheduler_hold_time = 1.0;
        let mut scenario = GridSimScenario::new(config).unwrap();
        scenario.init_objects().unwrap();
        // first is held immediately, second waits, third finds the queue full
        for _ in 0..3 {
            scenario.inject_task(0.0, "simple", 1.0).unwrap();
        }
        let report = scenario.run().unwrap();

        assert_eq!(report.system.scheduler_drops, 1);
        assert_eq!(report.system.total_task_drops, 1);
        assert_eq!(report.system.total_leaving_tasks, 2);
        assert_eq!(scenario.finished_tasks()[0].state(), TaskState::DroppedAtScheduler);
    }

    #[test]
    fn test_machine_drop_records_sojourn() {
        let mut config = manual(AlgorithmKind::RoundRobin, 1, 0);
        config.task_distribution = vec![TaskClass::fixed("simple", 1.0, 1.0)];
        let mut scenario = GridSimScenario::new(config).unwrap();
        scenario.init_objects().unwrap();
        scenario.inject_task(0.0, "simple", 10.0).unwrap();
        scenario.inject_task(1.0, "simple", 10.0).unwrap();
        let report = scenario.run().unwrap();

        assert_eq!(report.machines[0].drops, 1);
        assert_eq!(report.system.total_task_drops, 1);
        assert_eq!(report.system.drop_sojourn.count, 1);
        assert_eq!(report.system.total_leaving_tasks, 1);
    }

    #[test]
    fn test_finished_tasks_not_kept_by_default() {
        let mut config = manual(AlgorithmKind::RoundRobin, 1, 10);
        config.record_finished_tasks = false;
        let mut scenario = GridSimScenario::new(config).unwrap();
        scenario.init_objects().unwrap();
        scenario.inject_task(0.0, "simple", 1.0).unwrap();
        let report = scenario.run().unwrap();

        assert_eq!(report.system.total_leaving_tasks, 1);
        assert!(scenario.finished_tasks().is_empty());
    }
}
