//! Population evaluation: one generation, one shared world.
//!
//! Every genome of a generation gets one agent inside the same freshly reset
//! [`Simulator`]. All agents face the same obstacle course tick for tick, which
//! is what makes their fitness values comparable.
//!
//! # How It Works
//!
//! 1. **Reset** - The simulator is reset and every genome's fitness is zeroed
//! 2. **Spawn** - One policy and one agent per genome, all at the same start position
//! 3. **Tick loop** - For every live agent (in genome order): observe, decide,
//!    maybe jump, accumulate fitness; then the world steps once
//! 4. **Stop** - When no agent is alive, or when a stop is requested at a tick boundary
//!
//! # Fitness Shaping
//!
//! Each live agent earns, every tick, before the world steps:
//!
//! ```text
//! reward = survival                                   (0.1)
//!        + gap_proximity × (1 - |y - gap_center| / H)  (0.05, nearest pair ahead only)
//!        + score_bonus × score                        (10, only once score > 0)
//! ```
//!
//! ## Known Quirks
//!
//! - **Compounding score bonus**: the score term is paid every tick, not once per
//!   cleared pair. An agent that keeps surviving after the first pair keeps earning
//!   `10 × score` per tick, so long survival after scoring dominates the reward.
//! - **Shared score**: the score belongs to the world, not to an agent. An agent
//!   that never cleared a pair still collects the score bonus once another one did.
//!
//! Both are kept as-is; the integration tests pin them down.
//!
//! # Milestone
//!
//! The first time the shared score reaches `milestone_score` during a generation,
//! the [`EvaluationObserver`] is told once, with the genome being processed at
//! that moment. Evaluation then carries on unchanged.

use flappy_engine::{Agent, AgentHandle, ObstaclePair, Simulator};
use serde::{Deserialize, Serialize};

use crate::{
    observation::{FeatureExtractor, nearest_pair_ahead},
    policy::{Action, Genome, Policy},
    stop::StopSignal,
};

/// Per-tick reward coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessShaping {
    /// Flat reward per tick survived
    pub survival: f32,
    /// Maximum reward per tick for sitting exactly on the next gap's center
    pub gap_proximity: f32,
    /// Multiplier of the shared score, paid every tick once the score is positive
    pub score_bonus: f32,
}

impl Default for FitnessShaping {
    fn default() -> Self {
        Self {
            survival: 0.1,
            gap_proximity: 0.05,
            score_bonus: 10.0,
        }
    }
}

impl FitnessShaping {
    /// Reward earned by `agent` for one tick.
    #[must_use]
    pub fn reward(
        &self,
        agent: &Agent,
        nearest: Option<&ObstaclePair>,
        score: u32,
        world_height: f32,
    ) -> f32 {
        let mut reward = self.survival;
        if let Some(pair) = nearest {
            let distance = (agent.y() - pair.gap_center()).abs();
            reward += (1.0 - distance / world_height).max(0.0) * self.gap_proximity;
        }
        if score > 0 {
            #[expect(clippy::cast_precision_loss)]
            let score = score as f32;
            reward += score * self.score_bonus;
        }
        reward
    }
}

/// Receives out-of-band events raised while a generation is evaluated.
pub trait EvaluationObserver<G> {
    /// The shared score reached the milestone threshold for the first time this
    /// generation; `genome` is the one being processed at that tick.
    fn on_milestone(&mut self, genome: &G, score: u32);
}

impl<G> EvaluationObserver<G> for () {
    fn on_milestone(&mut self, _genome: &G, _score: u32) {}
}

/// How an evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum EvaluationStatus {
    /// Every agent died.
    Completed,
    /// A stop was observed at a tick boundary; fitness values are partial.
    Cancelled,
}

/// Summary of one generation's evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOutcome {
    pub status: EvaluationStatus,
    /// Ticks stepped
    pub ticks: u64,
    /// Shared score at the end
    pub score: u32,
    pub milestone_reached: bool,
}

/// Drives a generation of genomes through one shared [`Simulator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationEvaluator {
    extractor: FeatureExtractor,
    shaping: FitnessShaping,
    milestone_score: u32,
}

impl PopulationEvaluator {
    #[must_use]
    pub fn new(extractor: FeatureExtractor, shaping: FitnessShaping, milestone_score: u32) -> Self {
        Self {
            extractor,
            shaping,
            milestone_score,
        }
    }

    #[must_use]
    pub fn shaping(&self) -> &FitnessShaping {
        &self.shaping
    }

    #[must_use]
    pub fn milestone_score(&self) -> u32 {
        self.milestone_score
    }

    /// Evaluates `genomes`, overwriting each genome's fitness.
    ///
    /// The simulator is reset first, so whatever it held before is discarded.
    /// Policies are built up front; if `policy_factory` fails, the error is
    /// returned before any tick runs (fitness values may already be zeroed).
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `policy_factory`.
    pub fn evaluate<G, P, E, F, O>(
        &self,
        sim: &mut Simulator,
        genomes: &mut [G],
        mut policy_factory: F,
        stop: &StopSignal,
        observer: &mut O,
    ) -> Result<EvaluationOutcome, E>
    where
        G: Genome,
        P: Policy,
        F: FnMut(&G) -> Result<P, E>,
        O: EvaluationObserver<G> + ?Sized,
    {
        sim.reset();
        let (x, y) = sim.config().agent_start();
        let world_height = sim.config().height;

        let mut slots: Vec<(AgentHandle, P)> = Vec::with_capacity(genomes.len());
        for genome in genomes.iter_mut() {
            genome.set_fitness(0.0);
            let policy = policy_factory(genome)?;
            slots.push((sim.spawn_agent(x, y), policy));
        }

        let mut milestone_reached = false;
        let status = loop {
            if stop.is_requested() {
                break EvaluationStatus::Cancelled;
            }
            if sim.live_agent_count() == 0 {
                break EvaluationStatus::Completed;
            }

            let score = sim.score();
            for (genome, (handle, policy)) in genomes.iter_mut().zip(&mut slots) {
                let Some(agent) = sim.agent(*handle).filter(|agent| agent.is_alive()) else {
                    continue;
                };
                let observation = self.extractor.extract(agent, sim.obstacles());
                let action = Action::from_output(&policy.activate(&observation));
                let nearest = nearest_pair_ahead(agent, sim.obstacles());
                let reward = self.shaping.reward(agent, nearest, score, world_height);
                genome.set_fitness(genome.fitness() + reward);

                if !milestone_reached && score > 0 && score >= self.milestone_score {
                    milestone_reached = true;
                    log::info!("{} reached milestone score {score}", genome.id());
                    observer.on_milestone(genome, score);
                }

                if action.is_jump() {
                    sim.jump(*handle);
                }
            }

            let step = sim.step();
            if step.scored > 0 {
                log::trace!("tick {}: score {}", sim.tick(), sim.score());
            }
        };

        Ok(EvaluationOutcome {
            status,
            ticks: sim.tick(),
            score: sim.score(),
            milestone_reached,
        })
    }
}
