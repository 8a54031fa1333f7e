//! Simulated clock and time-ordered event queue.
//!
//! Events with equal timestamps fire in the order they were scheduled.

use crate::error::EngineError;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Pending event with its firing time and insertion sequence
#[derive(Debug)]
struct Scheduled<E> {
    at: f64,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.total_cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

/// Event queue owning the simulated clock
#[derive(Debug)]
pub struct EventQueue<E> {
    now: f64,
    next_seq: u64,
    dispatched: u64,
    heap: BinaryHeap<Reverse<Scheduled<E>>>,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_seq: 0,
            dispatched: 0,
            heap: BinaryHeap::new(),
        }
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    /// Events popped so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Enqueue `event` to fire at absolute time `at`
    pub fn schedule(&mut self, event: E, at: f64) -> Result<(), EngineError> {
        if !at.is_finite() {
            return Err(EngineError::NonFiniteTime(at));
        }
        if at < self.now {
            return Err(EngineError::CausalityViolation { at, now: self.now });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled { at, seq, event }));
        Ok(())
    }

    /// Enqueue `event` to fire `delay` after now
    pub fn schedule_in(&mut self, event: E, delay: f64) -> Result<(), EngineError> {
        self.schedule(event, self.now + delay)
    }

    /// Time of the earliest pending event
    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(s)| s.at)
    }

    /// Pop the earliest event if it fires no later than `horizon`, advancing the clock to it
    pub fn pop_until(&mut self, horizon: f64) -> Option<(f64, E)> {
        if self.peek_time()? > horizon {
            return None;
        }
        let Reverse(next) = self.heap.pop()?;
        self.now = next.at;
        self.dispatched += 1;
        Some((next.at, next.event))
    }

    /// Move the clock forward to `t` without firing anything
    pub fn advance_to(&mut self, t: f64) {
        if t > self.now {
            self.now = t;
        }
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_order() {
        let mut q = EventQueue::new();
        q.schedule("c", 3.0).unwrap();
        q.schedule("a", 1.0).unwrap();
        q.schedule("b", 2.0).unwrap();

        let order: Vec<_> = std::iter::from_fn(|| q.pop_until(10.0)).map(|(_, e)| e).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(q.now(), 3.0);
        assert_eq!(q.dispatched(), 3);
    }

    #[test]
    fn test_equal_timestamps_fire_fifo() {
        let mut q = EventQueue::new();
        for i in 0..5 {
            q.schedule(i, 1.0).unwrap();
        }
        let order: Vec<_> = std::iter::from_fn(|| q.pop_until(1.0)).map(|(_, e)| e).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_horizon_stops_dispatch() {
        let mut q = EventQueue::new();
        q.schedule("in", 5.0).unwrap();
        q.schedule("out", 5.5).unwrap();

        assert_eq!(q.pop_until(5.0), Some((5.0, "in")));
        assert_eq!(q.pop_until(5.0), None);
        assert_eq!(q.pending(), 1);
        assert_eq!(q.now(), 5.0);
    }

    #[test]
    fn test_past_event_is_rejected() {
        let mut q = EventQueue::new();
        q.schedule((), 4.0).unwrap();
        q.pop_until(10.0);

        assert!(matches!(
            q.schedule((), 3.0),
            Err(EngineError::CausalityViolation { .. })
        ));
        assert!(matches!(q.schedule((), f64::NAN), Err(EngineError::NonFiniteTime(_))));
        assert!(q.schedule_in((), 0.0).is_ok());
    }
}
