use crate::model::{Outcome, Snapshot, Trajectory};
use crate::stats::Accumulator;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::{fs, path::Path};

/// Summary of one recorded series.
#[derive(Debug, Serialize)]
pub struct SeriesReport {
    pub label: String,
    /// `value` or `antibiotic`.
    pub kind: &'static str,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize)]
pub struct RunResults {
    pub outcome: Outcome,
    pub n_snapshots: usize,
    pub final_tick: u64,
    pub final_time: f64,
    pub series: Vec<SeriesReport>,
}

struct Series {
    label: String,
    kind: &'static str,
    acc: Accumulator,
}

/// Accumulates the trajectory files of one run.
pub struct Analyzer {
    series: Vec<Series>,
    n_snapshots: usize,
    last: Option<Snapshot>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            series: Vec::new(),
            n_snapshots: 0,
            last: None,
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let trajectory = Trajectory::load(file).context("failed to load trajectory")?;
        self.add_trajectory(trajectory)
    }

    pub fn add_trajectory(&mut self, trajectory: Trajectory) -> Result<()> {
        let labels = trajectory
            .value_labels
            .iter()
            .map(|label| (label, "value"))
            .chain(trajectory.antibiotic_labels.iter().map(|label| (label, "antibiotic")));

        if self.series.is_empty() {
            self.series = labels
                .map(|(label, kind)| Series {
                    label: label.clone(),
                    kind,
                    acc: Accumulator::new(),
                })
                .collect();
        } else if !self
            .series
            .iter()
            .map(|series| (&series.label, series.kind))
            .eq(labels)
        {
            bail!("trajectory labels differ from the previous files");
        }

        for snapshot in trajectory.snapshots {
            let vals = snapshot.values.iter().chain(&snapshot.antibiotics);
            for (series, &val) in self.series.iter_mut().zip(vals) {
                series.acc.add(val);
            }
            self.n_snapshots += 1;
            self.last = Some(snapshot);
        }

        Ok(())
    }

    pub fn results(&self) -> Result<RunResults> {
        let last = self.last.as_ref().context("no snapshots were recorded")?;
        Ok(RunResults {
            outcome: last.outcome,
            n_snapshots: self.n_snapshots,
            final_tick: last.tick,
            final_time: last.time,
            series: self
                .series
                .iter()
                .map(|series| {
                    let report = series.acc.report();
                    SeriesReport {
                        label: series.label.clone(),
                        kind: series.kind,
                        mean: report.mean,
                        std_dev: report.std_dev,
                        min: report.min,
                        max: report.max,
                    }
                })
                .collect(),
        })
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let results = self.results()?;
        let contents = toml::to_string_pretty(&results).context("failed to serialize results")?;
        fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tick: u64, values: Vec<f64>, outcome: Outcome) -> Snapshot {
        Snapshot {
            tick,
            time: tick as f64 / 1440.0,
            values,
            antibiotics: vec![6.0],
            outcome,
        }
    }

    fn trajectory(snapshots: Vec<Snapshot>) -> Trajectory {
        Trajectory {
            value_labels: vec!["sensitive".to_string(), "resistant".to_string()],
            antibiotic_labels: vec!["antibiotic".to_string()],
            snapshots,
        }
    }

    #[test]
    fn summarizes_across_files() {
        let mut analyzer = Analyzer::new();
        analyzer
            .add_trajectory(trajectory(vec![
                snapshot(0, vec![10.0, 2.0], Outcome::StillRunning),
                snapshot(60, vec![20.0, 4.0], Outcome::StillRunning),
            ]))
            .unwrap();
        analyzer
            .add_trajectory(trajectory(vec![snapshot(
                120,
                vec![0.5, 0.5],
                Outcome::BacteriaExtinct,
            )]))
            .unwrap();

        let results = analyzer.results().unwrap();
        assert_eq!(results.outcome, Outcome::BacteriaExtinct);
        assert_eq!(results.n_snapshots, 3);
        assert_eq!(results.final_tick, 120);
        assert_eq!(results.series.len(), 3);
        assert_eq!(results.series[0].max, 20.0);
        assert_eq!(results.series[1].min, 0.5);
        assert_eq!(results.series[2].kind, "antibiotic");
        assert_eq!(results.series[2].mean, 6.0);
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        let mut analyzer = Analyzer::new();
        analyzer.add_trajectory(trajectory(Vec::new())).unwrap();

        let mut other = trajectory(Vec::new());
        other.value_labels.reverse();
        assert!(analyzer.add_trajectory(other).is_err());
    }

    #[test]
    fn empty_run_has_no_results() {
        assert!(Analyzer::new().results().is_err());
    }
}
