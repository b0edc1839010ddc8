use crate::error::SimError;
use crate::model::Snapshot;
use serde::{Deserialize, Serialize};

/// Stateful stepper owning the state of one run.
pub trait StepDriver {
    /// Labels of [`Snapshot::values`], in emission order.
    fn value_labels(&self) -> Vec<String>;

    /// Labels of [`Snapshot::antibiotics`], in emission order.
    fn antibiotic_labels(&self) -> Vec<String>;

    /// Snapshot of the current state, including its outcome.
    fn snapshot(&self) -> Snapshot;

    /// Evaluate uptake, apply the equations once and advance time by one step.
    fn step(&mut self);

    /// Fresh driver at tick 0 with the same parameters.
    fn reset(&self) -> Self
    where
        Self: Sized;
}

/// Lifecycle of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Created,
    Running,
    Terminated,
}

/// Pull-based sequence of snapshots over one [`StepDriver`].
///
/// Each pull applies exactly one step, except the first, which emits the
/// initial state as-is. Nothing changes between pulls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSequence<D> {
    driver: D,
    phase: Phase,
}

impl<D: StepDriver> SimulationSequence<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            phase: Phase::Created,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the driver, for externally driven inputs such as
    /// the user treatment toggle.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Produce the next snapshot.
    ///
    /// # Errors
    /// Returns [`SimError::SequenceExhausted`] once a terminal snapshot has
    /// been emitted.
    pub fn pull(&mut self) -> Result<Snapshot, SimError> {
        match self.phase {
            Phase::Terminated => return Err(SimError::SequenceExhausted),
            Phase::Created => {}
            Phase::Running => self.driver.step(),
        }

        let snapshot = self.driver.snapshot();
        self.phase = if snapshot.outcome.is_terminal() {
            Phase::Terminated
        } else {
            Phase::Running
        };

        Ok(snapshot)
    }

    /// Abandon the current run and start over from tick 0.
    pub fn restart(&mut self) {
        self.driver = self.driver.reset();
        self.phase = Phase::Created;
    }
}

/// Yields snapshots up to and including the terminal one.
impl<D: StepDriver> Iterator for SimulationSequence<D> {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Self::Item> {
        self.pull().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;

    /// Counts down to zero, one per step.
    #[derive(Debug, Clone)]
    struct Countdown {
        start: u64,
        tick: u64,
    }

    impl StepDriver for Countdown {
        fn value_labels(&self) -> Vec<String> {
            vec!["left".to_string()]
        }

        fn antibiotic_labels(&self) -> Vec<String> {
            Vec::new()
        }

        fn snapshot(&self) -> Snapshot {
            let left = self.start - self.tick;
            Snapshot {
                tick: self.tick,
                time: self.tick as f64,
                values: vec![left as f64],
                antibiotics: Vec::new(),
                outcome: if left == 0 {
                    Outcome::BacteriaExtinct
                } else {
                    Outcome::StillRunning
                },
            }
        }

        fn step(&mut self) {
            self.tick += 1;
        }

        fn reset(&self) -> Self {
            Countdown {
                start: self.start,
                tick: 0,
            }
        }
    }

    #[test]
    fn first_pull_emits_initial_state() {
        let mut sequence = SimulationSequence::new(Countdown { start: 3, tick: 0 });
        assert_eq!(sequence.phase(), Phase::Created);

        let snapshot = sequence.pull().unwrap();
        assert_eq!(snapshot.tick, 0);
        assert_eq!(sequence.phase(), Phase::Running);
    }

    #[test]
    fn pulling_after_termination_fails() {
        let mut sequence = SimulationSequence::new(Countdown { start: 2, tick: 0 });
        let ticks: Vec<u64> = sequence.by_ref().map(|snapshot| snapshot.tick).collect();
        assert_eq!(ticks, vec![0, 1, 2]);
        assert_eq!(sequence.phase(), Phase::Terminated);
        assert_eq!(sequence.pull(), Err(SimError::SequenceExhausted));
    }

    #[test]
    fn paused_sequence_resumes_where_it_stopped() {
        let mut sequence = SimulationSequence::new(Countdown { start: 10, tick: 0 });
        for _ in 0..4 {
            sequence.pull().unwrap();
        }
        let paused = sequence.clone();
        assert_eq!(sequence.pull().unwrap().tick, 4);
        assert_eq!(paused.driver().tick, 3);
    }

    #[test]
    fn restart_goes_back_to_created() {
        let mut sequence = SimulationSequence::new(Countdown { start: 1, tick: 0 });
        sequence.by_ref().for_each(drop);
        assert_eq!(sequence.phase(), Phase::Terminated);

        sequence.restart();
        assert_eq!(sequence.phase(), Phase::Created);
        assert_eq!(sequence.pull().unwrap().tick, 0);
    }
}
