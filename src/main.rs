mod analysis;
mod chemostat;
mod config;
mod driver;
mod engine;
mod enterotype;
mod error;
mod manager;
mod model;
mod sequence;
mod single_strain;
mod stats;
mod uptake;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Create,

    Resume {
        #[arg(long)]
        run_idx: usize,

        /// Switch user-controlled treatment on or off before resuming.
        #[arg(long, action = ArgAction::Set)]
        administer: Option<bool>,

        /// Antibiotic to switch; all user-controlled antibiotics if omitted.
        #[arg(long, requires = "administer")]
        antibiotic: Option<String>,
    },

    Restart {
        #[arg(long)]
        run_idx: usize,
    },

    Analyze,

    Export {
        #[arg(long)]
        run_idx: usize,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Create => mgr.create_run()?,
        Command::Resume {
            run_idx,
            administer,
            antibiotic,
        } => mgr.resume_run(run_idx, administer, antibiotic.as_deref())?,
        Command::Restart { run_idx } => mgr.restart_run(run_idx)?,
        Command::Analyze => mgr.analyze_sim()?,
        Command::Export { run_idx } => mgr.export_run(run_idx)?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
