use clap::{Parser, Subcommand};

use self::{
    checkpoints::CheckpointsArg, defaults::DefaultsArg, inspect::InspectArg, train::TrainArg,
};

mod checkpoints;
mod defaults;
mod inspect;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve controller networks, writing checkpoints as training goes
    Train(#[clap(flatten)] TrainArg),
    /// List checkpoint files of a directory
    Checkpoints(#[clap(flatten)] CheckpointsArg),
    /// Show what a checkpoint file contains
    Inspect(#[clap(flatten)] InspectArg),
    /// Print default settings and hyperparameters as JSON
    Defaults(#[clap(flatten)] DefaultsArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Checkpoints(arg) => checkpoints::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
        Mode::Defaults(arg) => defaults::run(&arg)?,
    }
    Ok(())
}
