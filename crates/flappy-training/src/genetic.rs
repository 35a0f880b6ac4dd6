//! Genetic algorithm that evolves controller networks.
//!
//! The training loop only talks to evolution through [`EvolutionEngine`]; it never
//! looks inside genomes, populations or species beyond serializing them into
//! checkpoints. [`NeuroEvolution`] is the built-in implementation.
//!
//! # Algorithm Overview
//!
//! 1. **Evaluate Fitness** - Each genome controls one agent of the shared world
//!    (done by the caller between two [`EvolutionEngine::next_generation`] calls)
//! 2. **Elite Selection** - Top genomes are copied unchanged into the next generation
//! 3. **Tournament Selection** - Parents are picked by tournament on species-shared fitness
//! 4. **Crossover (BLX-α)** - Two parents' weights are blended into a child
//! 5. **Mutation** - Gaussian noise is added to some weights
//! 6. **Speciation** - Genomes are grouped by weight distance
//!
//! # Genome Representation
//!
//! A [`NetworkGenome`] is a flat weight vector for a fixed
//! [`FeedForwardNetwork`] topology (see [`network`](crate::network)). The
//! topology never changes during a run; only weights evolve.
//!
//! # Speciation
//!
//! Every species keeps a representative weight vector. A genome joins the first
//! species whose representative lies within `compatibility_threshold` (Euclidean
//! distance), otherwise it founds a new species. Empty species disappear and the
//! representative moves to the species' first member after each assignment.
//!
//! During selection, fitness is divided by the size of the genome's species
//! (explicit fitness sharing), so one large species cannot take over the
//! population just by numbers. Elitism still uses raw fitness.
//!
//! # Current Limitations
//!
//! - **Fixed topology**: hidden layer width is a hyperparameter, not evolved
//! - **Sequential evaluation**: all genomes share one simulator, so there is
//!   nothing to parallelize per genome
//! - **No stagnation handling**: species are never culled for lack of progress

use std::collections::HashMap;

use flappy_evaluator::policy::{Genome, GenomeId, Policy};
use rand::{Rng, seq::IndexedRandom as _};
use rand_distr::Normal;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    config::ConfigError,
    hyperparams::EvolutionParams,
    network::{self, FeedForwardNetwork, WeightCountError},
    weights,
};

/// Builds the decision function of a genome.
pub trait PolicyFactory<G> {
    type Policy: Policy;
    type Error;

    fn build(&self, genome: &G) -> Result<Self::Policy, Self::Error>;
}

/// Capability contract of an evolutionary search engine.
///
/// The engine owns the genomes. The caller evaluates the current generation
/// through [`genomes_mut`](Self::genomes_mut) (writing fitness only) and then
/// asks for the next one.
pub trait EvolutionEngine {
    type Genome: Genome + Clone + Serialize + DeserializeOwned;
    /// Everything needed to resume the search, written into checkpoints as-is.
    type Population: Clone + Serialize + DeserializeOwned;
    type Species: Clone + Serialize + DeserializeOwned;
    type Factory: PolicyFactory<Self::Genome, Error = Self::Error>;
    type Error: std::error::Error + 'static;

    /// Index of the current generation.
    fn generation(&self) -> u64;

    /// Advances to the generation that should be evaluated next and returns its index.
    ///
    /// The first call on a fresh engine hands out the initial population without
    /// breeding. After [`restore`](Self::restore), the first call breeds from the
    /// restored (already evaluated) population.
    fn next_generation(&mut self) -> Result<u64, Self::Error>;

    fn genomes(&self) -> &[Self::Genome];
    fn genomes_mut(&mut self) -> &mut [Self::Genome];
    fn policy_factory(&self) -> Self::Factory;
    fn population(&self) -> Self::Population;
    fn species(&self) -> Self::Species;

    /// Replaces the search state with a checkpointed population of `generation`.
    fn restore(&mut self, generation: u64, population: Self::Population)
    -> Result<(), Self::Error>;
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum NeuroEvolutionError {
    #[display("cannot build network of {genome}: {source}")]
    Network {
        genome: GenomeId,
        source: WeightCountError,
    },
    #[display("cannot restore an empty population")]
    EmptyPopulation,
    #[display("population uses {actual} hidden units, configured for {expected}")]
    TopologyMismatch { expected: usize, actual: usize },
}

/// A candidate controller: the weights of one network and its fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkGenome {
    pub id: GenomeId,
    pub weights: Vec<f32>,
    #[serde(default)]
    pub fitness: f32,
}

impl Genome for NetworkGenome {
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

/// A group of genomes with similar weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: u32,
    pub representative: Vec<f32>,
    pub members: Vec<GenomeId>,
}

/// Resumable state of a [`NeuroEvolution`] search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPopulation {
    pub hidden_units: usize,
    pub genomes: Vec<NetworkGenome>,
    pub next_genome_id: u64,
}

/// Builds [`FeedForwardNetwork`]s with a fixed hidden layer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkFactory {
    hidden_units: usize,
}

impl PolicyFactory<NetworkGenome> for NetworkFactory {
    type Policy = FeedForwardNetwork;
    type Error = NeuroEvolutionError;

    fn build(&self, genome: &NetworkGenome) -> Result<FeedForwardNetwork, NeuroEvolutionError> {
        FeedForwardNetwork::new(self.hidden_units, &genome.weights).map_err(|source| {
            NeuroEvolutionError::Network {
                genome: genome.id,
                source,
            }
        })
    }
}

/// Built-in engine: fixed-topology networks, weight-only evolution, speciation.
#[derive(Debug, Clone)]
pub struct NeuroEvolution {
    params: EvolutionParams,
    noise: Normal<f32>,
    rng: Pcg32,
    generation: u64,
    started: bool,
    genomes: Vec<NetworkGenome>,
    species: Vec<Species>,
    next_genome_id: u64,
    next_species_id: u32,
}

impl NeuroEvolution {
    /// Creates an engine with a random initial population.
    pub fn new(params: EvolutionParams, mut rng: Pcg32) -> Result<Self, ConfigError> {
        params.validate()?;
        let noise = Normal::new(0.0, params.mutation_sigma).map_err(|_| ConfigError::Invalid {
            field: "mutation_sigma",
            reason: "must be positive and finite",
        })?;
        let len = network::weight_count(params.hidden_units);
        let genomes = (0..params.population_size as u64)
            .map(|id| NetworkGenome {
                id: GenomeId(id),
                weights: weights::random(&mut rng, params.weight_limit, len),
                fitness: 0.0,
            })
            .collect::<Vec<_>>();
        let next_genome_id = genomes.len() as u64;

        let mut engine = Self {
            params,
            noise,
            rng,
            generation: 0,
            started: false,
            genomes,
            species: Vec::new(),
            next_genome_id,
            next_species_id: 0,
        };
        engine.speciate();
        Ok(engine)
    }

    #[must_use]
    pub fn params(&self) -> &EvolutionParams {
        &self.params
    }

    fn breed(&mut self) {
        let mut ranked = self.genomes.clone();
        ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let species_size = self
            .species
            .iter()
            .flat_map(|s| s.members.iter().map(move |id| (*id, s.members.len())))
            .collect::<HashMap<_, _>>();
        #[expect(clippy::cast_precision_loss)]
        let candidates = ranked
            .iter()
            .map(|genome| {
                let size = species_size.get(&genome.id).copied().unwrap_or(1);
                (genome, genome.fitness / size as f32)
            })
            .collect::<Vec<_>>();

        let target = self.params.population_size;
        let mut next = ranked
            .iter()
            .take(self.params.elite_count.min(target))
            .cloned()
            .collect::<Vec<_>>();

        while next.len() < target {
            let (Some(p1), Some(p2)) = (
                tournament_select(&candidates, self.params.tournament_size, &mut self.rng),
                tournament_select(&candidates, self.params.tournament_size, &mut self.rng),
            ) else {
                break;
            };
            let mut child = weights::blx_alpha(
                &p1.weights,
                &p2.weights,
                self.params.blx_alpha,
                self.params.weight_limit,
                &mut self.rng,
            );
            weights::mutate(
                &mut child,
                &self.noise,
                self.params.weight_limit,
                self.params.mutation_rate,
                &mut self.rng,
            );
            next.push(NetworkGenome {
                id: GenomeId(self.next_genome_id),
                weights: child,
                fitness: 0.0,
            });
            self.next_genome_id += 1;
        }

        self.genomes = next;
    }

    fn speciate(&mut self) {
        for species in &mut self.species {
            species.members.clear();
        }
        for genome in &self.genomes {
            let threshold = self.params.compatibility_threshold;
            if let Some(species) = self
                .species
                .iter_mut()
                .find(|s| weights::distance(&s.representative, &genome.weights) < threshold)
            {
                species.members.push(genome.id);
                continue;
            }
            self.species.push(Species {
                id: self.next_species_id,
                representative: genome.weights.clone(),
                members: vec![genome.id],
            });
            self.next_species_id += 1;
        }
        self.species.retain(|s| !s.members.is_empty());

        let weights_by_id = self
            .genomes
            .iter()
            .map(|g| (g.id, &g.weights))
            .collect::<HashMap<_, _>>();
        for species in &mut self.species {
            if let Some(weights) = weights_by_id.get(&species.members[0]) {
                species.representative.clone_from(weights);
            }
        }
        log::debug!(
            "generation {}: {} species over {} genomes",
            self.generation,
            self.species.len(),
            self.genomes.len()
        );
    }
}

impl EvolutionEngine for NeuroEvolution {
    type Genome = NetworkGenome;
    type Population = NetworkPopulation;
    type Species = Vec<Species>;
    type Factory = NetworkFactory;
    type Error = NeuroEvolutionError;

    fn generation(&self) -> u64 {
        self.generation
    }

    fn next_generation(&mut self) -> Result<u64, NeuroEvolutionError> {
        if self.started {
            self.breed();
            self.generation += 1;
            self.speciate();
        } else {
            self.started = true;
        }
        Ok(self.generation)
    }

    fn genomes(&self) -> &[NetworkGenome] {
        &self.genomes
    }

    fn genomes_mut(&mut self) -> &mut [NetworkGenome] {
        &mut self.genomes
    }

    fn policy_factory(&self) -> NetworkFactory {
        NetworkFactory {
            hidden_units: self.params.hidden_units,
        }
    }

    fn population(&self) -> NetworkPopulation {
        NetworkPopulation {
            hidden_units: self.params.hidden_units,
            genomes: self.genomes.clone(),
            next_genome_id: self.next_genome_id,
        }
    }

    fn species(&self) -> Vec<Species> {
        self.species.clone()
    }

    fn restore(
        &mut self,
        generation: u64,
        population: NetworkPopulation,
    ) -> Result<(), NeuroEvolutionError> {
        if population.genomes.is_empty() {
            return Err(NeuroEvolutionError::EmptyPopulation);
        }
        if population.hidden_units != self.params.hidden_units {
            return Err(NeuroEvolutionError::TopologyMismatch {
                expected: self.params.hidden_units,
                actual: population.hidden_units,
            });
        }
        let factory = self.policy_factory();
        for genome in &population.genomes {
            factory.build(genome)?;
        }

        let max_id = population.genomes.iter().map(|g| g.id.0).max().unwrap_or(0);
        self.next_genome_id = population.next_genome_id.max(max_id + 1);
        self.genomes = population.genomes;
        self.generation = generation;
        self.started = true;
        self.species.clear();
        self.speciate();
        Ok(())
    }
}

/// Picks the candidate with the highest shared fitness among `tournament_size`
/// random ones. Returns `None` only for an empty pool.
fn tournament_select<'a, R>(
    candidates: &[(&'a NetworkGenome, f32)],
    tournament_size: usize,
    rng: &mut R,
) -> Option<&'a NetworkGenome>
where
    R: Rng + ?Sized,
{
    candidates
        .choose_multiple(rng, tournament_size.max(1))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(genome, _)| *genome)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;

    use super::*;

    fn params() -> EvolutionParams {
        EvolutionParams {
            population_size: 10,
            elite_count: 2,
            tournament_size: 3,
            hidden_units: 2,
            ..EvolutionParams::default()
        }
    }

    fn engine() -> NeuroEvolution {
        NeuroEvolution::new(params(), Pcg32::seed_from_u64(11)).unwrap()
    }

    fn assign_fitness(engine: &mut NeuroEvolution) {
        for genome in engine.genomes_mut() {
            #[expect(clippy::cast_precision_loss)]
            let fitness = genome.id.0 as f32;
            genome.set_fitness(fitness);
        }
    }

    #[test]
    fn test_initial_population() {
        let engine = engine();
        assert_eq!(engine.genomes().len(), 10);
        let len = network::weight_count(2);
        assert!(engine.genomes().iter().all(|g| g.weights.len() == len));
        let species = engine.species();
        let members: usize = species.iter().map(|s| s.members.len()).sum();
        assert_eq!(members, 10);
    }

    #[test]
    fn test_first_call_hands_out_initial_population() {
        let mut engine = engine();
        let before = engine.genomes().to_vec();
        assert_eq!(engine.next_generation().unwrap(), 0);
        assert_eq!(engine.genomes(), before.as_slice());
        assert_eq!(engine.next_generation().unwrap(), 1);
        assert_eq!(engine.generation(), 1);
    }

    #[test]
    fn test_elites_survive_and_children_get_fresh_ids() {
        let mut engine = engine();
        engine.next_generation().unwrap();
        assign_fitness(&mut engine);
        let best = engine.genomes()[9].clone();
        let second = engine.genomes()[8].clone();

        engine.next_generation().unwrap();
        let genomes = engine.genomes();
        assert_eq!(genomes.len(), 10);
        assert_eq!(genomes[0].id, best.id);
        assert_eq!(genomes[0].weights, best.weights);
        assert_eq!(genomes[1].id, second.id);
        assert!(genomes[2..].iter().all(|g| g.id.0 >= 10));
        let limit = params().weight_limit;
        assert!(
            genomes
                .iter()
                .flat_map(|g| &g.weights)
                .all(|w| (-limit..=limit).contains(w))
        );
    }

    #[test]
    fn test_every_genome_builds_a_policy() {
        let engine = engine();
        let factory = engine.policy_factory();
        for genome in engine.genomes() {
            factory.build(genome).unwrap();
        }
    }

    #[test]
    fn test_factory_rejects_foreign_topology() {
        let engine = engine();
        let genome = NetworkGenome {
            id: GenomeId(99),
            weights: vec![0.0; 3],
            fitness: 0.0,
        };
        let err = engine.policy_factory().build(&genome).unwrap_err();
        assert!(matches!(err, NeuroEvolutionError::Network { genome, .. } if genome == GenomeId(99)));
    }

    #[test]
    fn test_restore_continues_from_checkpointed_population() {
        let mut source = engine();
        source.next_generation().unwrap();
        assign_fitness(&mut source);
        let population = source.population();

        let mut restored = NeuroEvolution::new(params(), Pcg32::seed_from_u64(5)).unwrap();
        restored.restore(7, population.clone()).unwrap();
        assert_eq!(restored.generation(), 7);
        assert_eq!(restored.genomes(), population.genomes.as_slice());

        assert_eq!(restored.next_generation().unwrap(), 8);
        assert_eq!(restored.genomes()[0].id, GenomeId(9));
        assert!(restored.genomes()[2..].iter().all(|g| g.id.0 >= 10));
    }

    #[test]
    fn test_restore_rejects_bad_populations() {
        let mut engine = engine();
        let empty = NetworkPopulation {
            hidden_units: 2,
            genomes: Vec::new(),
            next_genome_id: 0,
        };
        assert!(matches!(
            engine.restore(1, empty),
            Err(NeuroEvolutionError::EmptyPopulation)
        ));

        let mut other = engine.population();
        other.hidden_units = 3;
        assert!(matches!(
            engine.restore(1, other),
            Err(NeuroEvolutionError::TopologyMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_threshold_puts_every_genome_in_its_own_species() {
        let params = EvolutionParams {
            compatibility_threshold: 0.0,
            ..params()
        };
        let engine = NeuroEvolution::new(params, Pcg32::seed_from_u64(1)).unwrap();
        assert_eq!(engine.species().len(), 10);
    }

    #[test]
    fn test_huge_threshold_puts_everyone_together() {
        let params = EvolutionParams {
            compatibility_threshold: 1e9,
            ..params()
        };
        let mut engine = NeuroEvolution::new(params, Pcg32::seed_from_u64(1)).unwrap();
        engine.next_generation().unwrap();
        assign_fitness(&mut engine);
        engine.next_generation().unwrap();
        let species = engine.species();
        assert_eq!(species.len(), 1);
        assert_eq!(species[0].id, 0);
        assert_eq!(species[0].members.len(), 10);
    }
}
