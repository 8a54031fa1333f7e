//! Invariants that must hold for any configuration and seed set

use gridsim::placement::LeastFull;
use gridsim::{AlgorithmKind, GridSimScenario, MachineView, ScenarioConfig, TaskClass};
use proptest::prelude::*;

fn algorithm() -> impl Strategy<Value = AlgorithmKind> {
    prop::sample::select(AlgorithmKind::ALL.to_vec())
}

fn config(
    seed: u64,
    kind: AlgorithmKind,
    machines: usize,
    machine_qs: usize,
    scheduler_qs: usize,
    mean: f64,
) -> ScenarioConfig {
    let mut config = ScenarioConfig::default()
        .with_grid_size(machines)
        .with_base_seed(seed)
        .unwrap();
    config.schedule_algorithm = kind;
    config.machine_queue_size = machine_qs;
    config.scheduler_queue_size = scheduler_qs;
    config.task_arrival_mean = mean;
    config.task_distribution = vec![
        TaskClass::fixed("short", 0.7, 0.5),
        TaskClass::uniform("long", 0.3, 1.0, 6.0),
    ];
    config.sim_time = 200.0;
    config
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn conservation_of_tasks(
        seed in 1u64..100_000,
        kind in algorithm(),
        machines in 1usize..5,
        machine_qs in 0usize..4,
        scheduler_qs in 1usize..4,
        mean in 0.05f64..3.0,
    ) {
        let mut scenario = GridSimScenario::new(config(seed, kind, machines, machine_qs, scheduler_qs, mean)).unwrap();
        let report = scenario.run().unwrap();
        let sys = &report.system;

        prop_assert_eq!(
            sys.total_arriving_tasks,
            sys.total_leaving_tasks + sys.total_task_drops + sys.in_flight
        );
        prop_assert_eq!(sys.total_arriving_tasks, sys.total_tasks);

        let machine_drops: u64 = report.machines.iter().map(|m| m.drops).sum();
        prop_assert_eq!(sys.total_task_drops, sys.scheduler_drops + machine_drops);

        for m in &report.machines {
            prop_assert_eq!(m.arrivals, m.completions + m.resident as u64);
            prop_assert!(m.resident <= machine_qs + 1);
        }
    }

    #[test]
    fn utilization_is_a_fraction(
        seed in 1u64..100_000,
        kind in algorithm(),
        machines in 1usize..5,
        mean in 0.05f64..3.0,
    ) {
        let report = gridsim::run(config(seed, kind, machines, 5, 1_000, mean)).unwrap();
        for laws in report.machine_laws() {
            let u = laws.utilization.unwrap();
            prop_assert!((0.0..=1.0 + 1e-9).contains(&u), "utilization {}", u);
        }
    }

    #[test]
    fn no_drops_with_slack(
        seed in 1u64..100_000,
        kind in algorithm(),
        machines in 1usize..4,
        mean in 0.05f64..3.0,
    ) {
        let report = gridsim::run(config(seed, kind, machines, 1_000_000, 1_000_000, mean)).unwrap();
        prop_assert_eq!(report.system.total_task_drops, 0);
    }

    #[test]
    fn round_robin_is_cyclic(n in 1usize..6, k in 1usize..6) {
        let mut config = ScenarioConfig::default().with_grid_size(n);
        config.schedule_algorithm = AlgorithmKind::RoundRobin;
        config.stochastic_arrivals = false;
        config.sim_time = 1_000.0;

        let mut scenario = GridSimScenario::new(config).unwrap();
        scenario.init_objects().unwrap();
        for i in 0..n * k {
            scenario.inject_task(i as f64, "simple", 0.5).unwrap();
        }
        let report = scenario.run().unwrap();

        let picks = scenario.assignments().unwrap().machines();
        prop_assert_eq!(picks, (0..n * k).map(|i| i % n).collect::<Vec<_>>());
        prop_assert!(report.machines.iter().all(|m| m.arrivals == k as u64));
    }

    #[test]
    fn least_full_never_picks_a_fuller_machine(
        load in prop::collection::vec((0usize..8, any::<bool>()), 1..12)
    ) {
        // a machine with waiting tasks always has one in service
        let views: Vec<MachineView> = load
            .iter()
            .enumerate()
            .map(|(id, &(queue_len, busy))| MachineView {
                id,
                queue_len,
                in_service: busy || queue_len > 0,
                capacity: 4,
                performance_factor: 1.0,
            })
            .collect();

        let chosen = LeastFull.select(&views).unwrap();
        let chosen_queue = views[chosen].queue_len;
        prop_assert!(views.iter().all(|v| chosen_queue <= v.queue_len));

        let chosen_load = views[chosen].resident();
        prop_assert!(views.iter().all(|v| chosen_load <= v.resident()));
        prop_assert!(views[..chosen].iter().all(|v| v.resident() > chosen_load));
    }
}
