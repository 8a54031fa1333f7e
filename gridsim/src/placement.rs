//! Placement algorithms.
//!
//! Each algorithm only picks a machine id from a snapshot of machine state.
//! Admission at the machine is a separate step and may still drop the task.

use crate::config::AlgorithmKind;
use crate::machine::MachineView;
use crate::task::{MachineId, Task};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Uniform choice over all machines, ignoring load
#[derive(Debug, Clone)]
pub struct RandomPlacement {
    rng: ChaCha8Rng,
}

impl RandomPlacement {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn select(&mut self, machines: &[MachineView]) -> Option<MachineId> {
        if machines.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..machines.len());
        Some(machines[idx].id)
    }
}

/// Cyclic cursor, advanced on every call regardless of occupancy
#[derive(Debug, Clone, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, machines: &[MachineView]) -> Option<MachineId> {
        if machines.is_empty() {
            return None;
        }
        let idx = self.cursor % machines.len();
        self.cursor = (idx + 1) % machines.len();
        Some(machines[idx].id)
    }
}

/// Fewest resident tasks, lowest id on ties. Ignores capacity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastFull;

impl LeastFull {
    pub fn select(&self, machines: &[MachineView]) -> Option<MachineId> {
        machines.iter().min_by_key(|m| m.resident()).map(|m| m.id)
    }
}

/// Greedy bin-packing: stay on the current machine until it is seen full.
#[derive(Debug, Clone, Default)]
pub struct FillQueue {
    current: usize,
}

impl FillQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// When every machine is full the cursor comes back to where it started
    /// and that machine is returned; its admission control drops the task.
    pub fn select(&mut self, machines: &[MachineView]) -> Option<MachineId> {
        if machines.is_empty() {
            return None;
        }
        self.current %= machines.len();
        for _ in 0..machines.len() {
            if !machines[self.current].is_full() {
                break;
            }
            self.current = (self.current + 1) % machines.len();
        }
        Some(machines[self.current].id)
    }
}

/// Random choice weighted by performance factor
#[derive(Debug, Clone)]
pub struct WeightedRandom {
    rng: ChaCha8Rng,
}

impl WeightedRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn select(&mut self, machines: &[MachineView]) -> Option<MachineId> {
        let weights = WeightedIndex::new(machines.iter().map(|m| m.performance_factor)).ok()?;
        Some(machines[weights.sample(&mut self.rng)].id)
    }
}

/// The configured algorithm together with its private selection state
#[derive(Debug, Clone)]
pub enum Placement {
    Random(RandomPlacement),
    LeastFull(LeastFull),
    RoundRobin(RoundRobin),
    FillQueue(FillQueue),
    WeightedRandom(WeightedRandom),
}

impl Placement {
    /// `seed` feeds the dedicated stream of the randomized variants
    pub fn new(kind: AlgorithmKind, seed: u64) -> Self {
        match kind {
            AlgorithmKind::Random => Placement::Random(RandomPlacement::new(seed)),
            AlgorithmKind::LeastFull => Placement::LeastFull(LeastFull),
            AlgorithmKind::RoundRobin => Placement::RoundRobin(RoundRobin::new()),
            AlgorithmKind::FillQueue => Placement::FillQueue(FillQueue::new()),
            AlgorithmKind::WeightedRandom => Placement::WeightedRandom(WeightedRandom::new(seed)),
        }
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Placement::Random(_) => AlgorithmKind::Random,
            Placement::LeastFull(_) => AlgorithmKind::LeastFull,
            Placement::RoundRobin(_) => AlgorithmKind::RoundRobin,
            Placement::FillQueue(_) => AlgorithmKind::FillQueue,
            Placement::WeightedRandom(_) => AlgorithmKind::WeightedRandom,
        }
    }

    /// Pick a target machine for `task`. `None` only for an empty grid.
    pub fn select(&mut self, _task: &Task, machines: &[MachineView]) -> Option<MachineId> {
        match self {
            Placement::Random(p) => p.select(machines),
            Placement::LeastFull(p) => p.select(machines),
            Placement::RoundRobin(p) => p.select(machines),
            Placement::FillQueue(p) => p.select(machines),
            Placement::WeightedRandom(p) => p.select(machines),
        }
    }
}
