//! Fixed-topology feed-forward network decoded from a genome's weights.
//!
//! ```text
//! 6 observation inputs → `hidden` tanh units → 1 sigmoid output
//! ```
//!
//! Weights are laid out unit by unit: for each hidden unit its six input weights
//! followed by its bias, then the output unit's `hidden` weights followed by its
//! bias.

use flappy_evaluator::{
    observation::{OBSERVATION_LEN, Observation},
    policy::Policy,
};

/// Error returned when a weight vector does not match the topology.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("network with {hidden} hidden units needs {expected} weights, got {actual}")]
pub struct WeightCountError {
    pub hidden: usize,
    pub expected: usize,
    pub actual: usize,
}

/// Number of weights (biases included) for a network with `hidden` hidden units.
#[must_use]
pub const fn weight_count(hidden: usize) -> usize {
    hidden * (OBSERVATION_LEN + 1) + hidden + 1
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedForwardNetwork {
    hidden: usize,
    weights: Vec<f32>,
    activations: Vec<f32>,
}

impl FeedForwardNetwork {
    pub fn new(hidden: usize, weights: &[f32]) -> Result<Self, WeightCountError> {
        let expected = weight_count(hidden);
        if weights.len() != expected {
            return Err(WeightCountError {
                hidden,
                expected,
                actual: weights.len(),
            });
        }
        Ok(Self {
            hidden,
            weights: weights.to_vec(),
            activations: vec![0.0; hidden],
        })
    }

    #[must_use]
    pub fn hidden(&self) -> usize {
        self.hidden
    }

    /// Returns the output in `(0, 1)`.
    pub fn forward(&mut self, inputs: &[f32; OBSERVATION_LEN]) -> f32 {
        let (hidden_weights, output_weights) =
            self.weights.split_at(self.hidden * (OBSERVATION_LEN + 1));
        for (activation, unit) in self
            .activations
            .iter_mut()
            .zip(hidden_weights.chunks_exact(OBSERVATION_LEN + 1))
        {
            let (input_weights, bias) = unit.split_at(OBSERVATION_LEN);
            let sum = dot(input_weights, inputs) + bias[0];
            *activation = sum.tanh();
        }
        let (weights, bias) = output_weights.split_at(self.hidden);
        sigmoid(dot(weights, &self.activations) + bias[0])
    }
}

impl Policy for FeedForwardNetwork {
    fn activate(&mut self, observation: &Observation) -> Vec<f32> {
        vec![self.forward(observation.as_array())]
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
