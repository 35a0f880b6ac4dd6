use std::{
    io::{self, BufRead as _},
    path::PathBuf,
    thread,
};

use anyhow::Context;
use flappy_engine::SpawnSeed;
use flappy_evaluator::stop::{StopReason, StopSignal};
use flappy_training::{
    checkpoint::CheckpointManager,
    controller::TrainingController,
    genetic::NeuroEvolution,
    hyperparams::EvolutionParams,
    settings::Settings,
};
use rand::SeedableRng as _;
use rand_pcg::Pcg32;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Settings file (world, fitness shaping, run length)
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Evolution hyperparameter file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory checkpoints are written to
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
    /// Number of generations to run
    #[arg(long)]
    generations: Option<u64>,
    /// Obstacle course seed (32 hex digits)
    #[arg(long)]
    seed: Option<SpawnSeed>,
    /// Checkpoint to continue from
    #[arg(long)]
    resume: Option<PathBuf>,
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let TrainArg {
        settings,
        config,
        checkpoint_dir,
        generations,
        seed,
        resume,
    } = arg;

    let mut settings = match settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(dir) = checkpoint_dir {
        settings.training.checkpoint_dir.clone_from(dir);
    }
    if let Some(generations) = generations {
        settings.training.generations = *generations;
    }
    if seed.is_some() {
        settings.training.seed = *seed;
    }
    settings.validate().context("Invalid settings")?;

    let params = match config {
        Some(path) => EvolutionParams::load(path)
            .with_context(|| format!("Failed to load hyperparameters: {}", path.display()))?,
        None => EvolutionParams::default(),
    };
    let rng = match settings.training.seed {
        // big-endian here, the controller's course stream uses little-endian
        Some(seed) => Pcg32::from_seed(seed.as_u128().to_be_bytes()),
        None => Pcg32::from_rng(&mut rand::rng()),
    };
    let engine = NeuroEvolution::new(params, rng).context("Invalid hyperparameters")?;

    let stop = StopSignal::new();
    let mut controller = TrainingController::new(engine, &settings, stop.clone());
    if let Some(path) = resume {
        let loaded = CheckpointManager::load(path)
            .with_context(|| format!("Failed to load checkpoint: {}", path.display()))?;
        controller
            .resume(loaded)
            .with_context(|| format!("Failed to resume from {}", path.display()))?;
    }

    spawn_stop_listener(stop);
    eprintln!(
        "Training for {} generations, checkpoints in {} (type `stop` and Enter to stop)",
        settings.training.generations,
        settings.training.checkpoint_dir.display()
    );

    let report = controller.run().context("Training failed")?;

    eprintln!("Training {}:", report.state);
    eprintln!("  Generations completed: {}", report.generations_completed);
    eprintln!("  Last generation:       {}", report.last_generation);
    match &report.best {
        Some(best) => {
            eprintln!("  Best fitness:          {:.3}", best.fitness);
            eprintln!(
                "  Best genome:           {} (generation {})",
                best.genome.id, best.generation
            );
        }
        None => eprintln!("  Best genome:           none"),
    }
    Ok(())
}

/// Turns `stop` or `q` on stdin into a manual stop request.
///
/// The thread ends at end of input and is never joined.
fn spawn_stop_listener(stop: StopSignal) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match line.trim() {
                "stop" | "q" => {
                    log::info!("stop requested, finishing at the next tick");
                    stop.request(StopReason::Manual);
                    break;
                }
                "" => {}
                other => log::warn!("unknown command {other:?}, type `stop` or `q`"),
            }
        }
    });
}
