//! Deterministic side-scrolling obstacle world shared by every agent of a generation.
//!
//! This crate models the game world the evolved controllers are scored in:
//!
//! - [`core`] - Plain data: axis-aligned rectangles, agents, obstacle pairs
//! - [`engine`] - World constants, the seeded gap policy, and the tick-based [`Simulator`]
//!
//! # Tick Model
//!
//! One call to [`Simulator::step`] advances every live agent and every obstacle pair
//! by exactly one fixed tick:
//!
//! 1. Gravity (or a requested jump impulse) is applied to each live agent
//! 2. The spawn timer advances and a new pair may be injected
//! 3. Obstacles move left and pairs fully past the left edge are dropped
//! 4. Each live agent is checked against the world bounds and every obstacle
//! 5. Surviving agents may score the pair they just passed
//!
//! All agents share one score counter. A pair is counted once, no matter how many
//! agents pass it.
//!
//! # Example
//!
//! ```
//! use flappy_engine::{Simulator, SpawnSeed, WorldConfig};
//!
//! let config = WorldConfig::default();
//! let mut sim = Simulator::new(config, SpawnSeed::from_u128(7));
//! let (x, y) = config.agent_start();
//! let handle = sim.spawn_agent(x, y);
//!
//! sim.step();
//! let agent = sim.agent(handle).unwrap();
//! assert!((agent.velocity() - config.gravity).abs() < 1e-6);
//! ```
//!
//! # Non-goals
//!
//! Only axis-aligned rectangle overlap and vertical gravity are modeled. There is
//! no rendering, no audio, and no horizontal agent motion.

pub use self::{core::*, engine::*};

pub mod core;
pub mod engine;
