//! Neuroevolution training for flappy agents.
//!
//! This crate evolves controller networks for the shared-world simulator. Each
//! generation, every genome flies one agent through the same obstacle course;
//! the fitness each agent collects drives selection and reproduction.
//!
//! # How Training Works
//!
//! 1. **Population** - The engine creates random networks ([`genetic`])
//! 2. **Evaluation** - All genomes fly together in one simulator
//!    (`flappy-evaluator`)
//! 3. **Bookkeeping** - The controller tracks the best genome and writes
//!    checkpoints ([`controller`], [`checkpoint`])
//! 4. **Reproduction** - Elitism, tournament selection, BLX-α crossover and
//!    Gaussian mutation create the next generation
//! 5. **Repeat** - Until the generation budget is exhausted or a stop is requested
//!
//! # Architecture
//!
//! ```text
//! TrainingController
//!     ↓ asks for genomes
//! EvolutionEngine (NeuroEvolution)
//!     ↓ builds policies via
//! PolicyFactory (FeedForwardNetwork)
//!     ↓ evaluated by
//! PopulationEvaluator (flappy-evaluator)
//!     ↓ fitness
//! TrainingController
//!     ↓ persists
//! CheckpointManager
//! ```
//!
//! # Configuration
//!
//! Two JSON files configure a run:
//!
//! - [`settings::Settings`] - world physics, fitness shaping, run length,
//!   checkpoint directory and seed
//! - [`hyperparams::EvolutionParams`] - population and reproduction parameters
//!
//! Missing fields take their defaults. The hyperparameter file is also
//! repaired in place when it contains `#` annotations (see [`config`]).
//!
//! # Example
//!
//! ```no_run
//! use flappy_evaluator::stop::StopSignal;
//! use flappy_training::{
//!     controller::TrainingController, genetic::NeuroEvolution,
//!     hyperparams::EvolutionParams, settings::Settings,
//! };
//! use rand::SeedableRng as _;
//! use rand_pcg::Pcg32;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let engine = NeuroEvolution::new(EvolutionParams::default(), Pcg32::seed_from_u64(1))?;
//! let mut controller = TrainingController::new(engine, &settings, StopSignal::new());
//! let report = controller.run()?;
//! println!("{} after {} generations", report.state, report.generations_completed);
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod config;
pub mod controller;
pub mod genetic;
pub mod hyperparams;
pub mod network;
pub mod settings;
pub mod stats;
pub mod weights;
