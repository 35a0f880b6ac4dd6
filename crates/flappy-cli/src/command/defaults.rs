use std::path::PathBuf;

use flappy_training::{hyperparams::EvolutionParams, settings::Settings};
use serde::Serialize;

use crate::util::Output;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct DefaultsArg {
    /// Output file path (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Defaults {
    settings: Settings,
    hyperparams: EvolutionParams,
}

pub(crate) fn run(arg: &DefaultsArg) -> anyhow::Result<()> {
    let defaults = Defaults {
        settings: Settings::default(),
        hyperparams: EvolutionParams::default(),
    };
    Output::save_json(&defaults, arg.output.as_deref())
}
