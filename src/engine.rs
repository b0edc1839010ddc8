use crate::config::Config;
use crate::driver::Driver;
use crate::model::{Outcome, Trajectory};
use crate::sequence::{Phase, SimulationSequence, StepDriver};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration and the snapshot sequence of one run,
/// and provides methods to initialize, run, save, and load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    sequence: SimulationSequence<Driver>,
}

impl Engine {
    /// Create a new `Engine` at tick 0 of the configured model.
    pub fn new(cfg: Config) -> Result<Self> {
        let driver = cfg.build_driver().context("failed to build driver")?;
        let sequence = SimulationSequence::new(driver);
        Ok(Self { cfg, sequence })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn phase(&self) -> Phase {
        self.sequence.phase()
    }

    /// Discard the run's progress and go back to tick 0.
    pub fn restart(&mut self) {
        self.sequence.restart();
    }

    /// Toggle user-controlled treatment before the next step.
    pub fn set_administering(&mut self, antibiotic: Option<&str>, on: bool) -> Result<()> {
        self.sequence
            .driver_mut()
            .set_administering(antibiotic, on)
            .context("failed to toggle treatment")?;
        log::debug!("set administering of {antibiotic:?} to {on}");
        Ok(())
    }

    /// Perform the simulation and save the recorded snapshots to a binary file.
    ///
    /// Stops early if the run terminates; the terminal snapshot is always
    /// recorded. Returns the outcome of the last pulled snapshot.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<Outcome> {
        let steps_per_save = self.cfg.output.steps_per_save;
        let saves_per_file = self.cfg.output.saves_per_file;

        let driver = self.sequence.driver();
        let mut trajectory = Trajectory {
            value_labels: driver.value_labels(),
            antibiotic_labels: driver.antibiotic_labels(),
            snapshots: Vec::with_capacity(saves_per_file),
        };

        let mut outcome = Outcome::StillRunning;
        for i_pull in 0..saves_per_file * steps_per_save {
            let snapshot = self.sequence.pull().context("failed to pull snapshot")?;
            outcome = snapshot.outcome;

            if i_pull % steps_per_save == 0 || outcome.is_terminal() {
                let time = snapshot.time;
                trajectory.snapshots.push(snapshot);

                let progress = 100.0 * trajectory.snapshots.len() as f64 / saves_per_file as f64;
                log::info!("completed {progress:06.2}% (t = {time:.4} days)");
            }

            if outcome.is_terminal() {
                log::info!("run terminated with {outcome:?}");
                break;
            }
        }

        trajectory.save(file).context("failed to save trajectory")?;

        Ok(outcome)
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }
}
