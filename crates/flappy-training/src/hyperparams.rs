use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigError};

/// Parameters of the built-in neuro-evolution engine.
///
/// Loaded from the hyperparameter file with [`EvolutionParams::load`]; missing
/// fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionParams {
    /// Genomes per generation
    pub population_size: usize,
    /// Number of top genomes copied unchanged into the next generation
    pub elite_count: usize,
    /// Tournament size for parent selection (larger = stronger selection pressure)
    pub tournament_size: usize,
    /// Probability of mutating each weight
    pub mutation_rate: f32,
    /// Standard deviation of Gaussian mutation noise
    pub mutation_sigma: f32,
    /// BLX-α crossover parameter
    pub blx_alpha: f32,
    /// Weights are kept inside `[-weight_limit, weight_limit]`
    pub weight_limit: f32,
    /// Hidden units of the controller network
    pub hidden_units: usize,
    /// Weight distance under which a genome joins an existing species
    pub compatibility_threshold: f32,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            population_size: 50,
            elite_count: 2,
            tournament_size: 3,
            mutation_rate: 0.2,
            mutation_sigma: 0.5,
            blx_alpha: 0.5,
            weight_limit: 5.0,
            hidden_units: 6,
            compatibility_threshold: 3.0,
        }
    }
}

impl EvolutionParams {
    /// Loads and validates the hyperparameter file.
    ///
    /// Inline `#` annotations are stripped (and the file rewritten) when they
    /// prevent the file from parsing.
    pub fn load<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let params: Self = config::load_json_repairing(path)?;
        params.validate()?;
        Ok(params)
    }

    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let err = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.population_size == 0 {
            return err("population_size", "must be positive");
        }
        if self.elite_count > self.population_size {
            return err("elite_count", "must not exceed population_size");
        }
        if self.tournament_size == 0 || self.tournament_size > self.population_size {
            return err("tournament_size", "must be in 1..=population_size");
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return err("mutation_rate", "must be in [0, 1]");
        }
        if !(self.mutation_sigma > 0.0) || !self.mutation_sigma.is_finite() {
            return err("mutation_sigma", "must be positive and finite");
        }
        if !(self.blx_alpha >= 0.0) {
            return err("blx_alpha", "must not be negative");
        }
        if !(self.weight_limit > 0.0) || !self.weight_limit.is_finite() {
            return err("weight_limit", "must be positive and finite");
        }
        if !(self.compatibility_threshold >= 0.0) {
            return err("compatibility_threshold", "must not be negative");
        }
        Ok(())
    }
}
