//! World rules and the tick-based simulator.
//!
//! - [`WorldConfig`] - World constants (dimensions, physics, obstacle cadence)
//! - [`SpawnSeed`] - Seed of the obstacle course
//! - [`gap_policy`] - Bimodal gap-center selection for new obstacle pairs
//! - [`Simulator`] - The shared world all agents of one generation live in

pub use self::{simulator::*, spawn_seed::*, world_config::*};

pub mod gap_policy;
mod simulator;
mod spawn_seed;
mod world_config;
