use std::path::PathBuf;

use anyhow::Context;
use flappy_training::checkpoint::CheckpointManager;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct CheckpointsArg {
    /// Directory to list
    #[arg(long, default_value = "models")]
    checkpoint_dir: PathBuf,
}

pub(crate) fn run(arg: &CheckpointsArg) -> anyhow::Result<()> {
    let manager = CheckpointManager::new(&arg.checkpoint_dir);
    let entries = manager
        .list()
        .with_context(|| format!("Failed to list {}", arg.checkpoint_dir.display()))?;
    if entries.is_empty() {
        eprintln!("No checkpoints in {}", arg.checkpoint_dir.display());
        return Ok(());
    }

    println!("{:<16} {:>10} {:>8}  FILE", "KIND", "GENERATION", "SCORE");
    for entry in &entries {
        let kind = entry.kind.map_or_else(|| "-".to_owned(), |k| k.to_string());
        let generation = entry
            .generation
            .map_or_else(|| "-".to_owned(), |g| g.to_string());
        let score = entry.score.map_or_else(|| "-".to_owned(), |s| s.to_string());
        let name = entry
            .path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        println!("{kind:<16} {generation:>10} {score:>8}  {name}");
    }
    eprintln!("{} checkpoints", entries.len());
    Ok(())
}
