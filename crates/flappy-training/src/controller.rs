//! Generation loop, best-genome bookkeeping and checkpoint cadence.
//!
//! # State Machine
//!
//! ```text
//! Idle ──run()──► Running ──budget exhausted──► Completed   (final checkpoint)
//!                    │
//!                    ├──stop requested──────► Interrupted (manual_stop?, interrupted)
//!                    │
//!                    └──error or panic──────► Failed      (error checkpoint, error returned)
//! ```
//!
//! # One Generation
//!
//! 1. Ask the engine for the next generation
//! 2. Reseed the simulator with a course drawn from the run's seed stream
//! 3. Evaluate every genome in the shared simulator
//! 4. Log fitness statistics
//! 5. Advance the best genome if the generation's best is strictly better,
//!    writing a `best` checkpoint
//! 6. Write the `per_generation` checkpoint
//! 7. Write an `autosave` checkpoint when the autosave interval has elapsed
//! 8. Check the stop signal
//!
//! A stop observed during evaluation cancels the generation: its partial
//! fitness values never reach the best genome, and the run ends `Interrupted`.
//! Snapshots taken before a generation finished evaluating are marked
//! `unevaluated`; resuming from one evaluates that generation again instead of
//! breeding from its partial fitness.
//!
//! Generation `g` always races on the `g`-th course of the run's seed stream,
//! including after a resume.
//!
//! Only the controller advances the best genome, so the recorded best fitness
//! never decreases over a run.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    time::{Duration, Instant},
};

use chrono::Utc;
use flappy_engine::{Simulator, SpawnSeed};
use flappy_evaluator::{
    observation::FeatureExtractor,
    policy::Genome,
    population_evaluator::{EvaluationObserver, PopulationEvaluator},
    stop::{StopReason, StopSignal},
};
use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::{
    checkpoint::{
        Checkpoint, CheckpointError, CheckpointManager, GenomeRecord, LoadedCheckpoint,
        TrainingSnapshot,
    },
    genetic::{EvolutionEngine, PolicyFactory as _},
    settings::Settings,
    stats::FitnessStats,
};

/// Checkpoint type written for engine `E`.
pub type EngineCheckpoint<E> = Checkpoint<
    <E as EvolutionEngine>::Genome,
    <E as EvolutionEngine>::Population,
    <E as EvolutionEngine>::Species,
>;

/// Snapshot type written for engine `E`.
pub type EngineSnapshot<E> = TrainingSnapshot<
    <E as EvolutionEngine>::Genome,
    <E as EvolutionEngine>::Population,
    <E as EvolutionEngine>::Species,
>;

/// Loaded checkpoint type accepted by [`TrainingController::resume`] for engine `E`.
pub type EngineLoadedCheckpoint<E> = LoadedCheckpoint<
    <E as EvolutionEngine>::Genome,
    <E as EvolutionEngine>::Population,
    <E as EvolutionEngine>::Species,
>;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
pub enum TrainingState {
    #[display("idle")]
    Idle,
    #[display("running")]
    Running,
    #[display("completed")]
    Completed,
    #[display("interrupted")]
    Interrupted,
    #[display("failed")]
    Failed,
}

/// Best genome seen so far in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestGenome<G> {
    pub genome: G,
    pub fitness: f32,
    /// Generation the genome was evaluated in
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport<G> {
    pub state: TrainingState,
    /// Generations fully evaluated during this run
    pub generations_completed: u64,
    /// Engine generation when the run ended
    pub last_generation: u64,
    pub best: Option<BestGenome<G>>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TrainingError<E> {
    #[display("generation {generation} failed: {source}")]
    Engine { generation: u64, source: E },
    #[display("generation {generation}: {source}")]
    Checkpoint {
        generation: u64,
        source: CheckpointError,
    },
    #[display("generation {generation} panicked: {message}")]
    Panicked { generation: u64, message: String },
    #[display("cannot resume: {reason}")]
    InvalidResume { reason: &'static str },
    #[display("training is {state}, expected idle")]
    NotIdle { state: TrainingState },
}

enum GenerationEnd {
    Evaluated,
    Cancelled,
}

/// Drives an [`EvolutionEngine`] through generations of shared-world evaluation.
pub struct TrainingController<E>
where
    E: EvolutionEngine,
{
    engine: E,
    simulator: Simulator,
    evaluator: PopulationEvaluator,
    checkpoints: CheckpointManager,
    generations: u64,
    autosave_interval: Duration,
    seeds: Pcg32,
    stop: StopSignal,
    state: TrainingState,
    best: Option<BestGenome<E::Genome>>,
    generations_completed: u64,
    /// The engine's current population has not finished evaluation
    unevaluated: bool,
    /// Restored generation to evaluate before asking the engine for another
    pending: Option<u64>,
}

impl<E> TrainingController<E>
where
    E: EvolutionEngine,
{
    #[must_use]
    pub fn new(engine: E, settings: &Settings, stop: StopSignal) -> Self {
        let seed: SpawnSeed = settings
            .training
            .seed
            .unwrap_or_else(|| rand::rng().random());
        log::info!("obstacle course seed: {seed}");

        Self {
            engine,
            simulator: Simulator::new(settings.world, seed),
            evaluator: PopulationEvaluator::new(
                FeatureExtractor::new(&settings.world),
                settings.fitness,
                settings.training.milestone_score,
            ),
            checkpoints: CheckpointManager::new(&settings.training.checkpoint_dir),
            generations: settings.training.generations,
            autosave_interval: settings.training.autosave_interval(),
            seeds: Pcg32::from_seed(seed.as_u128().to_le_bytes()),
            stop,
            state: TrainingState::Idle,
            best: None,
            generations_completed: 0,
            unevaluated: false,
            pending: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> TrainingState {
        self.state
    }

    #[must_use]
    pub fn best(&self) -> Option<&BestGenome<E::Genome>> {
        self.best.as_ref()
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Handle that stops this controller at the next tick or generation boundary.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Continues from a checkpoint holding a population.
    ///
    /// The engine resumes from the checkpointed generation and the checkpoint's
    /// best genome becomes the best so far. An `unevaluated` checkpoint's
    /// generation is evaluated again before the engine breeds.
    pub fn resume(
        &mut self,
        loaded: EngineLoadedCheckpoint<E>,
    ) -> Result<(), TrainingError<E::Error>> {
        if !self.state.is_idle() {
            return Err(TrainingError::NotIdle { state: self.state });
        }
        let generation = loaded.generation.ok_or(TrainingError::InvalidResume {
            reason: "checkpoint has no generation",
        })?;
        let population = loaded.population.ok_or(TrainingError::InvalidResume {
            reason: "checkpoint has no population",
        })?;
        self.engine
            .restore(generation, population)
            .map_err(|source| TrainingError::Engine { generation, source })?;

        let next = if loaded.unevaluated {
            self.pending = Some(generation);
            generation
        } else {
            generation + 1
        };
        for _ in 0..next {
            let _: SpawnSeed = self.seeds.random();
        }

        self.unevaluated = loaded.unevaluated;

        // an unevaluated population's fitness values say nothing about its genomes
        let fitness = match loaded.fitness {
            Some(fitness) => fitness,
            None if loaded.unevaluated => {
                log::info!("resuming at generation {next} without a best genome");
                return Ok(());
            }
            None => loaded.genome.fitness(),
        };
        log::info!("resuming at generation {next} (best fitness {fitness:.3})");
        self.best = Some(BestGenome {
            genome: loaded.genome,
            fitness,
            generation,
        });
        Ok(())
    }

    /// Runs the configured number of generations.
    ///
    /// Returns a report for `Completed` and `Interrupted` runs. Failures write an
    /// `error` checkpoint (best effort) and are returned as errors.
    pub fn run(&mut self) -> Result<TrainingReport<E::Genome>, TrainingError<E::Error>> {
        if !self.state.is_idle() {
            return Err(TrainingError::NotIdle { state: self.state });
        }
        self.state = TrainingState::Running;
        let mut last_autosave = Instant::now();

        for _ in 0..self.generations {
            let generation = match self.pending.take() {
                Some(generation) => generation,
                None => match self.engine.next_generation() {
                    Ok(generation) => generation,
                    Err(source) => {
                        let generation = self.engine.generation();
                        let err = TrainingError::Engine { generation, source };
                        return Err(self.fail(generation, err));
                    }
                },
            };
            self.unevaluated = true;

            match panic::catch_unwind(AssertUnwindSafe(|| self.run_generation(generation))) {
                Ok(Ok(GenerationEnd::Evaluated)) => {}
                Ok(Ok(GenerationEnd::Cancelled)) => {
                    log::info!("generation {generation} cancelled during evaluation");
                    return self.interrupt(generation);
                }
                Ok(Err(err)) => return Err(self.fail(generation, err)),
                Err(payload) => {
                    let message = panic_message(&*payload);
                    let err = TrainingError::Panicked {
                        generation,
                        message,
                    };
                    return Err(self.fail(generation, err));
                }
            }

            if last_autosave.elapsed() >= self.autosave_interval {
                self.save_snapshot(Checkpoint::Autosave, generation)
                    .map_err(|source| {
                        self.fail(generation, TrainingError::Checkpoint { generation, source })
                    })?;
                last_autosave = Instant::now();
            }

            if self.stop.is_requested() {
                return self.interrupt(generation);
            }
        }

        let generation = self.engine.generation();
        self.save_snapshot(Checkpoint::Final, generation)
            .map_err(|source| {
                self.fail(generation, TrainingError::Checkpoint { generation, source })
            })?;
        self.state = TrainingState::Completed;
        log::info!(
            "training completed after {} generations",
            self.generations_completed
        );
        Ok(self.report())
    }

    fn run_generation(
        &mut self,
        generation: u64,
    ) -> Result<GenerationEnd, TrainingError<E::Error>> {
        self.simulator.reseed(self.seeds.random());
        let factory = self.engine.policy_factory();
        let mut observer = MilestoneWriter {
            checkpoints: &self.checkpoints,
            generation,
        };
        let outcome = self
            .evaluator
            .evaluate(
                &mut self.simulator,
                self.engine.genomes_mut(),
                |genome| factory.build(genome),
                &self.stop,
                &mut observer,
            )
            .map_err(|source| TrainingError::Engine { generation, source })?;
        if outcome.status.is_cancelled() {
            return Ok(GenerationEnd::Cancelled);
        }
        self.unevaluated = false;

        if let Some(stats) = FitnessStats::new(self.engine.genomes().iter().map(Genome::fitness)) {
            log::info!(
                "generation {generation}: fitness {stats}, score {}, {} ticks",
                outcome.score,
                outcome.ticks
            );
        }

        let checkpoint_err = |source| TrainingError::Checkpoint { generation, source };
        self.update_best(generation).map_err(checkpoint_err)?;
        self.save_snapshot(Checkpoint::PerGeneration, generation)
            .map_err(checkpoint_err)?;
        self.generations_completed += 1;
        Ok(GenerationEnd::Evaluated)
    }

    /// Replaces the best genome iff the generation's best fitness is strictly greater.
    fn update_best(&mut self, generation: u64) -> Result<(), CheckpointError> {
        let Some(candidate) = self
            .engine
            .genomes()
            .iter()
            .filter(|genome| !genome.fitness().is_nan())
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
        else {
            return Ok(());
        };
        let fitness = candidate.fitness();
        if self.best.as_ref().is_some_and(|best| fitness <= best.fitness) {
            return Ok(());
        }

        log::info!(
            "generation {generation}: new best {} with fitness {fitness:.3}",
            candidate.id()
        );
        let best = BestGenome {
            genome: candidate.clone(),
            fitness,
            generation,
        };
        let record: EngineCheckpoint<E> = Checkpoint::Best(GenomeRecord {
            generation,
            timestamp: Utc::now(),
            genome: best.genome.clone(),
            fitness,
            score: None,
        });
        self.best = Some(best);
        self.checkpoints.save(&record)?;
        Ok(())
    }

    fn interrupt(
        &mut self,
        generation: u64,
    ) -> Result<TrainingReport<E::Genome>, TrainingError<E::Error>> {
        let reason = self.stop.reason();
        log::info!(
            "stopping at generation {generation} ({})",
            reason.map_or_else(|| "no reason".to_owned(), |r| r.to_string())
        );
        let checkpoint_err = |source| TrainingError::Checkpoint { generation, source };
        if reason == Some(StopReason::Manual) {
            self.save_snapshot(Checkpoint::ManualStop, generation)
                .map_err(|err| self.fail(generation, checkpoint_err(err)))?;
        }
        self.save_snapshot(Checkpoint::Interrupted, generation)
            .map_err(|err| self.fail(generation, checkpoint_err(err)))?;
        self.state = TrainingState::Interrupted;
        Ok(self.report())
    }

    /// Moves to `Failed` and writes an `error` checkpoint, logging a failure to do so.
    fn fail(
        &mut self,
        generation: u64,
        error: TrainingError<E::Error>,
    ) -> TrainingError<E::Error> {
        log::error!("{error}");
        let snapshot = TrainingSnapshot {
            error: Some(error.to_string()),
            ..self.snapshot(generation)
        };
        match self.checkpoints.save(&Checkpoint::Error(snapshot)) {
            Ok(path) => log::info!("error checkpoint written to {}", path.display()),
            Err(err) => log::warn!("failed to write error checkpoint: {err}"),
        }
        self.state = TrainingState::Failed;
        error
    }

    fn snapshot(&self, generation: u64) -> EngineSnapshot<E> {
        TrainingSnapshot {
            generation,
            timestamp: Utc::now(),
            best_genome: self.best.as_ref().map(|best| best.genome.clone()),
            best_fitness: self.best.as_ref().map(|best| best.fitness),
            population: Some(self.engine.population()),
            species: Some(self.engine.species()),
            unevaluated: self.unevaluated,
            error: None,
        }
    }

    fn save_snapshot(
        &self,
        wrap: fn(EngineSnapshot<E>) -> EngineCheckpoint<E>,
        generation: u64,
    ) -> Result<PathBuf, CheckpointError> {
        self.checkpoints.save(&wrap(self.snapshot(generation)))
    }

    fn report(&self) -> TrainingReport<E::Genome> {
        TrainingReport {
            state: self.state,
            generations_completed: self.generations_completed,
            last_generation: self.engine.generation(),
            best: self.best.clone(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Writes a `milestone` checkpoint the first time a generation reaches the
/// milestone score. Write failures are logged; evaluation carries on.
struct MilestoneWriter<'a> {
    checkpoints: &'a CheckpointManager,
    generation: u64,
}

impl<G> EvaluationObserver<G> for MilestoneWriter<'_>
where
    G: Genome + Clone + Serialize,
{
    fn on_milestone(&mut self, genome: &G, score: u32) {
        let checkpoint: Checkpoint<G, (), ()> = Checkpoint::Milestone(GenomeRecord {
            generation: self.generation,
            timestamp: Utc::now(),
            genome: genome.clone(),
            fitness: genome.fitness(),
            score: Some(score),
        });
        match self.checkpoints.save(&checkpoint) {
            Ok(path) => log::info!("score {score} reached, saved {}", path.display()),
            Err(err) => log::warn!("failed to write milestone checkpoint: {err}"),
        }
    }
}
