use std::{fs, path::Path};

use flappy_engine::{SpawnSeed, WorldConfig};
use flappy_evaluator::{
    observation::Observation,
    policy::{Genome, GenomeId, Policy},
    population_evaluator::FitnessShaping,
    stop::{StopReason, StopSignal},
};
use flappy_training::{
    checkpoint::{CheckpointKind, CheckpointManager, LoadedCheckpoint},
    controller::{TrainingController, TrainingError, TrainingState},
    genetic::{
        EvolutionEngine, NetworkGenome, NetworkPopulation, NeuroEvolution, PolicyFactory, Species,
    },
    hyperparams::EvolutionParams,
    settings::{Settings, TrainingConfig},
};
use rand::SeedableRng as _;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScriptedGenome {
    id: GenomeId,
    fitness: f32,
    jumps: bool,
    broken: bool,
}

impl Genome for ScriptedGenome {
    fn id(&self) -> GenomeId {
        self.id
    }

    fn fitness(&self) -> f32 {
        self.fitness
    }

    fn set_fitness(&mut self, fitness: f32) {
        self.fitness = fitness;
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("scripted engine failure")]
struct ScriptedError;

/// Requests a stop with the given reason on a policy's n-th activation.
#[derive(Debug, Clone)]
struct StopPlan {
    signal: StopSignal,
    reason: StopReason,
    after: usize,
}

struct ScriptedPolicy {
    jumps: bool,
    calls: usize,
    stop: Option<StopPlan>,
    panic_at: Option<usize>,
}

impl Policy for ScriptedPolicy {
    fn activate(&mut self, _observation: &Observation) -> Vec<f32> {
        self.calls += 1;
        assert_ne!(self.panic_at, Some(self.calls), "decision function gave up");
        if let Some(plan) = &self.stop
            && self.calls == plan.after
        {
            plan.signal.request(plan.reason);
        }
        vec![if self.jumps { 1.0 } else { 0.0 }]
    }
}

struct ScriptedFactory {
    stop: Option<StopPlan>,
    panic_at: Option<usize>,
}

impl PolicyFactory<ScriptedGenome> for ScriptedFactory {
    type Policy = ScriptedPolicy;
    type Error = ScriptedError;

    fn build(&self, genome: &ScriptedGenome) -> Result<ScriptedPolicy, ScriptedError> {
        if genome.broken {
            return Err(ScriptedError);
        }
        Ok(ScriptedPolicy {
            jumps: genome.jumps,
            calls: 0,
            stop: self.stop.clone(),
            panic_at: self.panic_at,
        })
    }
}

/// Three idle genomes per generation, with optional twists.
#[derive(Default)]
struct ScriptedEngine {
    generation: u64,
    started: bool,
    genomes: Vec<ScriptedGenome>,
    /// The third genome jumps every tick in this generation
    jumper_generation: Option<u64>,
    /// The second genome cannot build a policy in this generation
    broken_generation: Option<u64>,
    /// Breeding fails after this generation was evaluated
    fail_after: Option<u64>,
    stop: Option<StopPlan>,
    /// Every policy panics on this activation
    panic_at: Option<usize>,
}

impl ScriptedEngine {
    fn populate(&mut self) {
        let generation = self.generation;
        self.genomes = (0..3)
            .map(|i| ScriptedGenome {
                id: GenomeId(generation * 10 + i),
                fitness: 0.0,
                jumps: i == 2 && self.jumper_generation == Some(generation),
                broken: i == 1 && self.broken_generation == Some(generation),
            })
            .collect();
    }
}

impl EvolutionEngine for ScriptedEngine {
    type Genome = ScriptedGenome;
    type Population = Vec<ScriptedGenome>;
    type Species = ();
    type Factory = ScriptedFactory;
    type Error = ScriptedError;

    fn generation(&self) -> u64 {
        self.generation
    }

    fn next_generation(&mut self) -> Result<u64, ScriptedError> {
        if self.started {
            if self.fail_after == Some(self.generation) {
                return Err(ScriptedError);
            }
            self.generation += 1;
        }
        self.started = true;
        self.populate();
        Ok(self.generation)
    }

    fn genomes(&self) -> &[ScriptedGenome] {
        &self.genomes
    }

    fn genomes_mut(&mut self) -> &mut [ScriptedGenome] {
        &mut self.genomes
    }

    fn policy_factory(&self) -> ScriptedFactory {
        ScriptedFactory {
            stop: self.stop.clone(),
            panic_at: self.panic_at,
        }
    }

    fn population(&self) -> Vec<ScriptedGenome> {
        self.genomes.clone()
    }

    fn species(&self) {}

    fn restore(
        &mut self,
        generation: u64,
        population: Vec<ScriptedGenome>,
    ) -> Result<(), ScriptedError> {
        self.generation = generation;
        self.genomes = population;
        self.started = true;
        Ok(())
    }
}

/// Fitness is a pure function of survival time: 0.1 per tick.
fn settings(dir: &Path, generations: u64) -> Settings {
    Settings {
        fitness: FitnessShaping {
            gap_proximity: 0.0,
            ..FitnessShaping::default()
        },
        training: TrainingConfig {
            generations,
            autosave_interval_secs: 3600,
            milestone_score: 1000,
            checkpoint_dir: dir.to_owned(),
            seed: Some(SpawnSeed::from_u128(7)),
        },
        ..Settings::default()
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    CheckpointManager::new(dir)
        .list()
        .unwrap()
        .into_iter()
        .map(|entry| entry.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn load(path: impl AsRef<Path>) -> LoadedCheckpoint<ScriptedGenome, Vec<ScriptedGenome>, ()> {
    CheckpointManager::load(path).unwrap()
}

mod completion {
    use super::*;

    #[test]
    fn test_budget_exhausted_writes_final_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = TrainingController::new(
            ScriptedEngine::default(),
            &settings(dir.path(), 3),
            StopSignal::new(),
        );
        assert_eq!(controller.state(), TrainingState::Idle);

        let report = controller.run().unwrap();
        assert_eq!(report.state, TrainingState::Completed);
        assert_eq!(controller.state(), TrainingState::Completed);
        assert_eq!(report.generations_completed, 3);
        assert_eq!(report.last_generation, 2);

        let names = file_names(dir.path());
        for expected in [
            "best_genome_gen_0.json",
            "checkpoint_gen_0.json",
            "checkpoint_gen_1.json",
            "checkpoint_gen_2.json",
            "final_gen_2.json",
        ] {
            assert!(names.iter().any(|n| n == expected), "{expected} missing in {names:?}");
        }
        assert!(!names.iter().any(|n| n.starts_with("interrupted")));

        let final_checkpoint = load(dir.path().join("final_gen_2.json"));
        assert_eq!(final_checkpoint.kind, Some(CheckpointKind::Final));
        assert_eq!(final_checkpoint.population.unwrap()[0].id, GenomeId(20));
    }

    #[test]
    fn test_best_only_moves_on_strict_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine {
            jumper_generation: Some(1),
            ..ScriptedEngine::default()
        };
        let mut controller =
            TrainingController::new(engine, &settings(dir.path(), 3), StopSignal::new());
        let report = controller.run().unwrap();

        let best = report.best.unwrap();
        assert_eq!(best.generation, 1);
        assert_eq!(best.genome.id, GenomeId(12));
        assert!(best.genome.jumps);

        let names = file_names(dir.path());
        assert!(names.iter().any(|n| n == "best_genome_gen_0.json"));
        assert!(names.iter().any(|n| n == "best_genome_gen_1.json"));
        assert!(!names.iter().any(|n| n == "best_genome_gen_2.json"));

        let gen0_best = load(dir.path().join("best_genome_gen_0.json"));
        assert!(gen0_best.fitness.unwrap() < best.fitness);
        let last = load(dir.path().join("checkpoint_gen_2.json"));
        assert_eq!(last.genome.id, GenomeId(12));
        assert_eq!(last.fitness, Some(best.fitness));
    }

    #[test]
    fn test_zero_interval_autosaves_every_generation() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path(), 2);
        settings.training.autosave_interval_secs = 0;
        let mut controller =
            TrainingController::new(ScriptedEngine::default(), &settings, StopSignal::new());
        controller.run().unwrap();

        let names = file_names(dir.path());
        assert!(names.iter().any(|n| n == "autosave_gen_0.json"));
        assert!(names.iter().any(|n| n == "autosave_gen_1.json"));
    }

    #[test]
    fn test_run_only_starts_from_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = TrainingController::new(
            ScriptedEngine::default(),
            &settings(dir.path(), 1),
            StopSignal::new(),
        );
        controller.run().unwrap();
        assert!(matches!(
            controller.run(),
            Err(TrainingError::NotIdle {
                state: TrainingState::Completed
            })
        ));
    }
}

mod interruption {
    use super::*;

    #[test]
    fn test_manual_stop_before_first_tick() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let mut controller = TrainingController::new(
            ScriptedEngine::default(),
            &settings(dir.path(), 5),
            stop.clone(),
        );
        stop.request(StopReason::Manual);

        let report = controller.run().unwrap();
        assert_eq!(report.state, TrainingState::Interrupted);
        assert_eq!(report.generations_completed, 0);
        assert!(report.best.is_none());
        assert_eq!(
            file_names(dir.path()),
            ["interrupted_gen_0.json", "stopped_at_gen_0.json"]
        );

        let interrupted = load(dir.path().join("interrupted_gen_0.json"));
        assert_eq!(interrupted.kind, Some(CheckpointKind::Interrupted));
        assert_eq!(interrupted.population.unwrap().len(), 3);
    }

    #[test]
    fn test_cancelled_generation_does_not_update_best() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let engine = ScriptedEngine {
            stop: Some(StopPlan {
                signal: stop.clone(),
                reason: StopReason::External,
                after: 10,
            }),
            ..ScriptedEngine::default()
        };
        let mut controller = TrainingController::new(engine, &settings(dir.path(), 5), stop);

        let report = controller.run().unwrap();
        assert_eq!(report.state, TrainingState::Interrupted);
        assert!(report.best.is_none());
        let names = file_names(dir.path());
        assert_eq!(names, ["interrupted_gen_0.json"]);
    }

    #[test]
    fn test_milestone_checkpoint_before_stop() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let mut settings = settings(dir.path(), 5);
        // agents hover forever and obstacles never collide
        settings.world = WorldConfig {
            gravity: 0.0,
            gap_height: 600.0,
            ..WorldConfig::default()
        };
        settings.training.milestone_score = 1;
        let engine = ScriptedEngine {
            stop: Some(StopPlan {
                signal: stop.clone(),
                reason: StopReason::Manual,
                after: 300,
            }),
            ..ScriptedEngine::default()
        };
        let mut controller = TrainingController::new(engine, &settings, stop);

        let report = controller.run().unwrap();
        assert_eq!(report.state, TrainingState::Interrupted);
        assert_eq!(
            file_names(dir.path()),
            [
                "interrupted_gen_0.json",
                "score_1_gen_0.json",
                "stopped_at_gen_0.json"
            ]
        );
        let milestone = load(dir.path().join("score_1_gen_0.json"));
        assert_eq!(milestone.kind, Some(CheckpointKind::Milestone));
        assert_eq!(milestone.score, Some(1));
        assert_eq!(milestone.genome.id, GenomeId(0));
    }
}

mod failure {
    use super::*;

    #[test]
    fn test_engine_error_writes_error_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine {
            fail_after: Some(0),
            ..ScriptedEngine::default()
        };
        let mut controller =
            TrainingController::new(engine, &settings(dir.path(), 5), StopSignal::new());

        let err = controller.run().unwrap_err();
        assert!(matches!(err, TrainingError::Engine { generation: 0, .. }));
        assert_eq!(controller.state(), TrainingState::Failed);

        let path = dir.path().join("error_checkpoint_gen_0.json");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("scripted engine failure"));
        let loaded = load(&path);
        assert_eq!(loaded.kind, Some(CheckpointKind::Error));
        assert_eq!(loaded.genome.id, controller.best().unwrap().genome.id);
    }

    #[test]
    fn test_policy_factory_error_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine {
            broken_generation: Some(0),
            ..ScriptedEngine::default()
        };
        let mut controller =
            TrainingController::new(engine, &settings(dir.path(), 5), StopSignal::new());

        assert!(controller.run().is_err());
        assert_eq!(controller.state(), TrainingState::Failed);
        assert!(controller.best().is_none());
        assert_eq!(file_names(dir.path()), ["error_checkpoint_gen_0.json"]);

        // no best genome yet: the genome comes from the population
        let loaded = load(dir.path().join("error_checkpoint_gen_0.json"));
        assert_eq!(loaded.genome.id, GenomeId(0));
        assert_eq!(loaded.fitness, None);
    }

    #[test]
    fn test_policy_panic_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine {
            panic_at: Some(5),
            ..ScriptedEngine::default()
        };
        let mut controller =
            TrainingController::new(engine, &settings(dir.path(), 5), StopSignal::new());

        let err = controller.run().unwrap_err();
        match &err {
            TrainingError::Panicked {
                generation,
                message,
            } => {
                assert_eq!(*generation, 0);
                assert!(message.contains("decision function gave up"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(controller.state(), TrainingState::Failed);
        assert_eq!(file_names(dir.path()), ["error_checkpoint_gen_0.json"]);

        let path = dir.path().join("error_checkpoint_gen_0.json");
        assert!(fs::read_to_string(&path).unwrap().contains("panicked"));
        let loaded = load(&path);
        assert_eq!(loaded.kind, Some(CheckpointKind::Error));
        assert!(loaded.unevaluated);
    }
}

mod resume {
    use super::*;

    #[test]
    fn test_resume_continues_after_checkpointed_generation() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine {
            jumper_generation: Some(0),
            ..ScriptedEngine::default()
        };
        let mut first =
            TrainingController::new(engine, &settings(dir.path(), 2), StopSignal::new());
        let first_report = first.run().unwrap();
        let first_best = first_report.best.unwrap();

        let mut second = TrainingController::new(
            ScriptedEngine::default(),
            &settings(dir.path(), 2),
            StopSignal::new(),
        );
        second
            .resume(load(dir.path().join("final_gen_1.json")))
            .unwrap();
        assert_eq!(second.engine().generation(), 1);
        assert_eq!(second.best().unwrap().fitness, first_best.fitness);

        let report = second.run().unwrap();
        assert_eq!(report.last_generation, 3);
        assert_eq!(report.generations_completed, 2);
        // idle genomes never beat the carried-over jumper
        assert_eq!(report.best.unwrap().genome.id, first_best.genome.id);
        assert!(file_names(dir.path()).iter().any(|n| n == "final_gen_3.json"));
    }

    #[test]
    fn test_resume_from_cancelled_generation_evaluates_it_again() {
        let reference_dir = tempfile::tempdir().unwrap();
        let mut reference = TrainingController::new(
            ScriptedEngine::default(),
            &settings(reference_dir.path(), 1),
            StopSignal::new(),
        );
        reference.run().unwrap();
        let expected = load(reference_dir.path().join("checkpoint_gen_0.json"))
            .population
            .unwrap();

        let stopped_dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let engine = ScriptedEngine {
            stop: Some(StopPlan {
                signal: stop.clone(),
                reason: StopReason::Manual,
                after: 5,
            }),
            ..ScriptedEngine::default()
        };
        let mut stopped = TrainingController::new(engine, &settings(stopped_dir.path(), 5), stop);
        assert_eq!(stopped.run().unwrap().state, TrainingState::Interrupted);
        let interrupted = load(stopped_dir.path().join("interrupted_gen_0.json"));
        assert!(interrupted.unevaluated);
        assert!(interrupted.population.as_ref().unwrap()[0].fitness < expected[0].fitness);

        let dir = tempfile::tempdir().unwrap();
        let mut resumed = TrainingController::new(
            ScriptedEngine::default(),
            &settings(dir.path(), 1),
            StopSignal::new(),
        );
        resumed.resume(interrupted).unwrap();
        assert!(resumed.best().is_none());

        let report = resumed.run().unwrap();
        assert_eq!(report.last_generation, 0);
        assert_eq!(report.generations_completed, 1);
        let evaluated = load(dir.path().join("checkpoint_gen_0.json"));
        assert!(!evaluated.unevaluated);
        assert_eq!(evaluated.population.unwrap(), expected);
    }

    #[test]
    fn test_resumed_generation_races_its_own_course() {
        // gap proximity makes fitness depend on where the gaps are
        let with_proximity = |dir: &Path, generations| Settings {
            fitness: FitnessShaping::default(),
            ..settings(dir, generations)
        };

        let full_dir = tempfile::tempdir().unwrap();
        let mut full = TrainingController::new(
            ScriptedEngine::default(),
            &with_proximity(full_dir.path(), 3),
            StopSignal::new(),
        );
        full.run().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut resumed = TrainingController::new(
            ScriptedEngine::default(),
            &with_proximity(dir.path(), 1),
            StopSignal::new(),
        );
        resumed
            .resume(load(full_dir.path().join("checkpoint_gen_1.json")))
            .unwrap();
        assert_eq!(resumed.run().unwrap().last_generation, 2);

        let expected = load(full_dir.path().join("checkpoint_gen_2.json"));
        let actual = load(dir.path().join("checkpoint_gen_2.json"));
        assert_eq!(actual.population, expected.population);
    }

    #[test]
    fn test_resume_needs_a_population() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = TrainingController::new(
            ScriptedEngine::default(),
            &settings(dir.path(), 1),
            StopSignal::new(),
        );
        let loaded = LoadedCheckpoint {
            kind: None,
            generation: Some(3),
            timestamp: None,
            genome: ScriptedGenome {
                id: GenomeId(1),
                fitness: 2.0,
                jumps: false,
                broken: false,
            },
            fitness: None,
            score: None,
            population: None,
            species: None,
            unevaluated: false,
        };
        assert!(matches!(
            controller.resume(loaded),
            Err(TrainingError::InvalidResume { .. })
        ));
        assert_eq!(controller.state(), TrainingState::Idle);
    }

    #[test]
    fn test_network_population_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path(), 2);
        // every agent leaves the world on the first tick
        settings.world.agent_height = 2.0 * settings.world.height;
        let params = EvolutionParams {
            population_size: 6,
            elite_count: 1,
            hidden_units: 2,
            ..EvolutionParams::default()
        };

        let engine = NeuroEvolution::new(params.clone(), Pcg32::seed_from_u64(3)).unwrap();
        let mut first = TrainingController::new(engine, &settings, StopSignal::new());
        let report = first.run().unwrap();
        assert_eq!(report.state, TrainingState::Completed);
        let best = report.best.unwrap();
        assert!((best.fitness - 0.1).abs() < 1e-6);
        assert_eq!(best.generation, 0);

        let loaded: LoadedCheckpoint<NetworkGenome, NetworkPopulation, Vec<Species>> =
            CheckpointManager::load(dir.path().join("final_gen_1.json")).unwrap();
        let population = loaded.population.clone().unwrap();
        assert_eq!(population.genomes.len(), 6);

        let engine = NeuroEvolution::new(params, Pcg32::seed_from_u64(4)).unwrap();
        let mut second = TrainingController::new(engine, &settings, StopSignal::new());
        second.resume(loaded).unwrap();
        assert_eq!(second.engine().genomes(), population.genomes.as_slice());
        let report = second.run().unwrap();
        assert_eq!(report.last_generation, 3);
        let inherited = |id| population.genomes.iter().any(|g| g.id == id);
        assert!(
            second
                .engine()
                .genomes()
                .iter()
                .all(|g| g.id.0 >= population.next_genome_id || inherited(g.id))
        );
    }
}
