//! Evaluation of neural controllers inside the shared obstacle world.
//!
//! This crate sits between the simulator (`flappy-engine`) and whatever evolves
//! the controllers (`flappy-training`):
//!
//! 1. **Observation** ([`observation`]) - Turns the world, as seen from one agent,
//!    into six normalized features.
//!
//! 2. **Policy** ([`policy`]) - The capability contract a genome and its decision
//!    function must satisfy; nothing else about genomes is known here.
//!
//! 3. **Population Evaluation** ([`population_evaluator`]) - Runs a whole generation
//!    in one shared simulator and accumulates each genome's fitness.
//!
//! [`stop`] provides the cooperative stop flag polled at tick boundaries.
//!
//! # Architecture
//!
//! ```text
//! PopulationEvaluator (one generation)
//!     ↓ per tick, per live agent
//! FeatureExtractor → Policy → Action
//!     ↓ jump requests
//! Simulator::step
//! ```
//!
//! # Example
//!
//! ```rust
//! use flappy_engine::{Simulator, SpawnSeed, WorldConfig};
//! use flappy_evaluator::{
//!     observation::{FeatureExtractor, Observation},
//!     policy::{Genome, GenomeId},
//!     population_evaluator::{FitnessShaping, PopulationEvaluator},
//!     stop::StopSignal,
//! };
//!
//! struct Constant(GenomeId, f32);
//!
//! impl Genome for Constant {
//!     fn id(&self) -> GenomeId { self.0 }
//!     fn fitness(&self) -> f32 { self.1 }
//!     fn set_fitness(&mut self, fitness: f32) { self.1 = fitness; }
//! }
//!
//! let config = WorldConfig::default();
//! let mut sim = Simulator::new(config, SpawnSeed::from_u128(7));
//! let evaluator = PopulationEvaluator::new(
//!     FeatureExtractor::new(&config),
//!     FitnessShaping::default(),
//!     50,
//! );
//!
//! let mut genomes = vec![Constant(GenomeId(0), 0.0)];
//! let outcome = evaluator
//!     .evaluate(
//!         &mut sim,
//!         &mut genomes,
//!         |_: &Constant| Ok::<_, std::convert::Infallible>(|_: &Observation| vec![0.0]),
//!         &StopSignal::new(),
//!         &mut (),
//!     )
//!     .unwrap();
//!
//! assert!(outcome.status.is_completed());
//! assert!(genomes[0].fitness() > 0.0);
//! ```

pub mod observation;
pub mod policy;
pub mod population_evaluator;
pub mod stop;
