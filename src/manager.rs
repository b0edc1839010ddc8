use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::model::Trajectory;
use crate::sequence::Phase;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Start a new run from the configuration and simulate one file.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let engine = Engine::new(self.cfg.clone()).context("failed to construct engine")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        self.simulate(run_idx, 0, engine)
    }

    /// Continue a run from its checkpoint and simulate one more file.
    ///
    /// `administer` toggles user-controlled treatment before the first step,
    /// for `antibiotic` only if given.
    pub fn resume_run(
        &self,
        run_idx: usize,
        administer: Option<bool>,
        antibiotic: Option<&str>,
    ) -> Result<()> {
        let file_idx = self
            .count_trajectory_files(run_idx)
            .context("failed to count trajectory files")?;

        let checkpoint_file = self.checkpoint_file(run_idx);
        let mut engine = Engine::load_checkpoint(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;
        if engine.cfg() != &self.cfg {
            bail!("checkpoint config differs from the current config");
        }
        if engine.phase() == Phase::Terminated {
            bail!("run {run_idx} has already terminated");
        }
        log::info!("loaded {checkpoint_file:?}");

        if let Some(on) = administer {
            engine.set_administering(antibiotic, on)?;
            log::info!("set administering to {on}");
        }

        self.simulate(run_idx, file_idx, engine)
    }

    /// Discard the trajectory files of a run and simulate it again from tick 0.
    pub fn restart_run(&self, run_idx: usize) -> Result<()> {
        let checkpoint_file = self.checkpoint_file(run_idx);
        let mut engine = Engine::load_checkpoint(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;
        if engine.cfg() != &self.cfg {
            bail!("checkpoint config differs from the current config");
        }
        engine.restart();

        let n_files = self
            .count_trajectory_files(run_idx)
            .context("failed to count trajectory files")?;
        for file_idx in 0..n_files {
            let file = self.trajectory_file(run_idx, file_idx);
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
        }
        log::info!("restarted run {run_idx}");

        self.simulate(run_idx, 0, engine)
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new();

            let n_files = self
                .count_trajectory_files(run_idx)
                .context("failed to count trajectory files")?;
            for file_idx in 0..n_files {
                analyzer
                    .add_file(self.trajectory_file(run_idx, file_idx))
                    .context("failed to add file")?;
            }

            let results_file = self.results_file(run_idx);
            analyzer
                .save_results(&results_file)
                .context("failed to save results")?;
            log::info!("saved {results_file:?}");
        }

        Ok(())
    }

    /// Write every recorded snapshot of a run as CSV, next to the
    /// parameters it was simulated with.
    pub fn export_run(&self, run_idx: usize) -> Result<()> {
        let n_files = self
            .count_trajectory_files(run_idx)
            .context("failed to count trajectory files")?;
        if n_files == 0 {
            bail!("run {run_idx} has no trajectory files");
        }

        let csv_file = self.run_dir(run_idx).join("trajectory.csv");
        let mut writer = csv::Writer::from_path(&csv_file)
            .with_context(|| format!("failed to create {csv_file:?}"))?;

        for file_idx in 0..n_files {
            let trajectory = Trajectory::load(self.trajectory_file(run_idx, file_idx))
                .context("failed to load trajectory")?;

            if file_idx == 0 {
                let header = ["time".to_string()]
                    .into_iter()
                    .chain(trajectory.value_labels.iter().cloned())
                    .chain(trajectory.antibiotic_labels.iter().cloned());
                writer
                    .write_record(header)
                    .context("failed to write header")?;
            }

            for snapshot in &trajectory.snapshots {
                let record = [snapshot.time]
                    .into_iter()
                    .chain(snapshot.values.iter().copied())
                    .chain(snapshot.antibiotics.iter().copied())
                    .map(|value| value.to_string());
                writer
                    .write_record(record)
                    .context("failed to write record")?;
            }
        }

        writer.flush().context("failed to flush writer stream")?;
        log::info!("exported {csv_file:?}");

        let parameters_file = self.run_dir(run_idx).join("parameters.txt");
        let parameters =
            toml::to_string_pretty(&self.cfg).context("failed to serialize parameters")?;
        fs::write(&parameters_file, parameters)
            .with_context(|| format!("failed to write {parameters_file:?}"))?;
        log::info!("exported {parameters_file:?}");

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for entry in glob(pattern).context("failed to glob run dirs")? {
            let run_dir = entry.context("failed to read glob entry")?;
            if run_dir.is_dir() {
                fs::remove_dir_all(&run_dir)
                    .with_context(|| format!("failed to remove {run_dir:?}"))?;
                log::info!("removed {run_dir:?}");
            }
        }
        Ok(())
    }

    fn simulate(&self, run_idx: usize, file_idx: usize, mut engine: Engine) -> Result<()> {
        let outcome = engine
            .perform_simulation(self.trajectory_file(run_idx, file_idx))
            .context("failed to perform simulation")?;
        log::info!("run {run_idx} outcome: {outcome:?}");

        engine
            .save_checkpoint(self.checkpoint_file(run_idx))
            .context("failed to save checkpoint")?;

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn count_trajectory_files(&self, run_idx: usize) -> Result<usize> {
        let pattern = self.run_dir(run_idx).join("trajectory-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob trajectory files")?
            .filter_map(Result::ok)
            .count();
        Ok(count)
    }

    fn checkpoint_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("checkpoint.msgpack")
    }

    fn trajectory_file(&self, run_idx: usize, file_idx: usize) -> PathBuf {
        self.run_dir(run_idx)
            .join(format!("trajectory-{file_idx:04}.msgpack"))
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.toml")
    }
}
