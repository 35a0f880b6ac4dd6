use std::{path::PathBuf, time::Duration};

use flappy_engine::{SpawnSeed, WorldConfig};
use flappy_evaluator::population_evaluator::FitnessShaping;
use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigError};

/// Everything a training run needs besides the evolution hyperparameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub world: WorldConfig,
    pub fitness: FitnessShaping,
    pub training: TrainingConfig,
}

impl Settings {
    pub fn load<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<std::path::Path>,
    {
        let settings: Self = config::load_json(path)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        if self.training.generations == 0 {
            return Err(ConfigError::Invalid {
                field: "training.generations",
                reason: "must be positive",
            });
        }
        if self.training.milestone_score == 0 {
            return Err(ConfigError::Invalid {
                field: "training.milestone_score",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Run length, checkpoint cadence and reproducibility knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Generations to run (counted from the start or the resumed generation)
    pub generations: u64,
    /// Minimum wall-clock time between two autosaves
    pub autosave_interval_secs: u64,
    /// Shared score that triggers a milestone checkpoint
    pub milestone_score: u32,
    pub checkpoint_dir: PathBuf,
    /// Seed of the per-generation obstacle courses; random when absent
    pub seed: Option<SpawnSeed>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            generations: 100,
            autosave_interval_secs: 60,
            milestone_score: 50,
            checkpoint_dir: PathBuf::from("models"),
            seed: None,
        }
    }
}

impl TrainingConfig {
    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}
