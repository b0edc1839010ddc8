use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Outcome reported with every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    StillRunning,
    /// Both strains fell below one cell (scenario 1).
    BacteriaExtinct,
    /// Total bacterial density reached the host death density (scenario 1).
    HostDied,
    /// Every genus is dead (scenario 2).
    AllBacteriaExtinct,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::StillRunning
    }
}

/// State of the simulation at a single tick.
///
/// `values` follow the driver's value labels and `antibiotics` its
/// antibiotic labels; both orders are fixed for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of steps applied since the run was created.
    pub tick: u64,

    /// Simulated time in days.
    pub time: f64,

    /// Densities (scenario 1) or relative frequencies (scenario 2).
    pub values: Vec<f64>,

    /// Effective antibiotic concentration (uptake × concentration) during
    /// the step that produced this snapshot.
    pub antibiotics: Vec<f64>,

    pub outcome: Outcome,
}

/// Snapshots recorded during one invocation, with their column labels.
#[derive(Debug, Serialize, Deserialize)]
pub struct Trajectory {
    pub value_labels: Vec<String>,
    pub antibiotic_labels: Vec<String>,
    pub snapshots: Vec<Snapshot>,
}

impl Trajectory {
    /// Save the trajectory to a MessagePack-encoded file.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize trajectory")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a trajectory previously written by [`Trajectory::save`].
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let trajectory = decode::from_read(&mut reader).context("failed to deserialize trajectory")?;
        Ok(trajectory)
    }
}
