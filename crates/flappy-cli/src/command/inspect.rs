use std::path::PathBuf;

use anyhow::Context;
use flappy_training::{
    checkpoint::{CheckpointManager, LoadedCheckpoint},
    genetic::{NetworkGenome, NetworkPopulation, Species},
    stats::FitnessStats,
};

use crate::util::Output;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Checkpoint file (any supported shape)
    file: PathBuf,
    /// Also write the recovered genome as JSON to this file
    #[arg(long)]
    genome_output: Option<PathBuf>,
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let InspectArg {
        file,
        genome_output,
    } = arg;
    let loaded: LoadedCheckpoint<NetworkGenome, NetworkPopulation, Vec<Species>> =
        CheckpointManager::load(file)
            .with_context(|| format!("Failed to load checkpoint: {}", file.display()))?;

    eprintln!("{}:", file.display());
    match loaded.kind {
        Some(kind) => eprintln!("  Kind:        {kind}"),
        None => eprintln!("  Kind:        untagged"),
    }
    if let Some(generation) = loaded.generation {
        eprintln!("  Generation:  {generation}");
    }
    if let Some(timestamp) = loaded.timestamp {
        eprintln!("  Saved at:    {}", timestamp.to_rfc3339());
    }
    if let Some(score) = loaded.score {
        eprintln!("  Score:       {score}");
    }
    let fitness = loaded.fitness.unwrap_or(loaded.genome.fitness);
    eprintln!("  Genome:      {}", loaded.genome.id);
    eprintln!("  Fitness:     {fitness:.3}");
    eprintln!("  Weights:     {:.3?}", loaded.genome.weights);

    if let Some(population) = &loaded.population {
        eprintln!(
            "  Population:  {} genomes, {} hidden units",
            population.genomes.len(),
            population.hidden_units
        );
        if let Some(stats) = FitnessStats::new(population.genomes.iter().map(|g| g.fitness)) {
            eprintln!("  Fitness:     {stats}");
        }
    }
    if let Some(species) = &loaded.species {
        let sizes = species.iter().map(|s| s.members.len()).collect::<Vec<_>>();
        eprintln!("  Species:     {} {sizes:?}", species.len());
    }

    if let Some(path) = genome_output {
        Output::save_json(&loaded.genome, Some(path.as_path()))?;
    }
    Ok(())
}
