//! The narrow contract between the evaluator and the evolutionary engine.
//!
//! The evaluator never looks inside a genome. It needs exactly three things:
//!
//! - a stable [`GenomeId`] and a read/write fitness accumulator ([`Genome`])
//! - a decision function built from the genome ([`Policy`])
//! - a way to read a decision ([`Action::from_output`])

use serde::{Deserialize, Serialize};

use crate::observation::Observation;

/// Output threshold above which the first policy output means "jump".
pub const JUMP_THRESHOLD: f32 = 0.5;

/// Stable identity of a genome across generations and checkpoints.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
#[display("genome#{_0}")]
pub struct GenomeId(pub u64);

/// An evolvable unit as seen by the evaluator.
pub trait Genome {
    fn id(&self) -> GenomeId;
    fn fitness(&self) -> f32;
    fn set_fitness(&mut self, fitness: f32);
}

/// Decision function built from one genome.
///
/// Given an observation, returns at least one output; only the first one is
/// read. `&mut self` allows stateful (recurrent) controllers.
pub trait Policy {
    fn activate(&mut self, observation: &Observation) -> Vec<f32>;
}

impl<F> Policy for F
where
    F: FnMut(&Observation) -> Vec<f32>,
{
    fn activate(&mut self, observation: &Observation) -> Vec<f32> {
        self(observation)
    }
}

/// What an agent does this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum Action {
    Jump,
    Idle,
}

impl Action {
    /// Interprets policy output: `output[0] > 0.5` jumps, anything else idles.
    ///
    /// An empty output idles.
    #[must_use]
    pub fn from_output(output: &[f32]) -> Self {
        match output.first() {
            Some(&value) if value > JUMP_THRESHOLD => Self::Jump,
            _ => Self::Idle,
        }
    }
}
