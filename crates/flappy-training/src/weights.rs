//! Weight vector operations for the genetic algorithm.
//!
//! Network weights are signed, so every operation here works inside the symmetric
//! box `[-limit, limit]` instead of normalizing. The operations are used by
//! [`genetic::NeuroEvolution`](crate::genetic::NeuroEvolution) for initialization,
//! crossover, mutation and species assignment.
//!
//! # Operations
//!
//! - **Initialization**: [`random`] draws uniform weights
//! - **Crossover**: [`blx_alpha`] implements the BLX-α operator
//! - **Mutation**: [`mutate`] applies Gaussian noise
//! - **Distance**: [`distance`] measures genome similarity for speciation
//!
//! ## BLX-α Crossover
//!
//! For parents `x1` and `x2` at one position, with `d = |x2 - x1|`, the child is
//! drawn uniformly from `[min - α·d, max + α·d]` and clamped to the box. With
//! `α = 0` children stay between their parents; larger values explore further.
//!
//! ## Gaussian Mutation
//!
//! Each weight is perturbed with probability `rate` by noise from `N(0, σ²)`.
//! Small changes are more likely than large jumps.

use rand::Rng;
use rand_distr::Normal;

/// Creates a weight vector by applying a function to each index.
///
/// ```
/// use flappy_training::weights;
///
/// let weights = weights::from_fn(|i| i as f32 - 1.0, 3);
/// assert_eq!(weights, vec![-1.0, 0.0, 1.0]);
/// ```
pub fn from_fn<F>(mut f: F, len: usize) -> Vec<f32>
where
    F: FnMut(usize) -> f32,
{
    let mut values = Vec::with_capacity(len);
    for i in 0..len {
        values.push(f(i));
    }
    values
}

/// Generates `len` weights uniformly distributed in `[-limit, limit]`.
pub fn random<R>(rng: &mut R, limit: f32, len: usize) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    from_fn(|_| rng.random_range(-limit..=limit), len)
}

/// Performs BLX-α crossover between two parent weight vectors.
///
/// # Panics
///
/// Panics if parent vectors have different lengths.
pub fn blx_alpha<R>(p1: &[f32], p2: &[f32], alpha: f32, limit: f32, rng: &mut R) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    assert_eq!(p1.len(), p2.len());
    from_fn(
        |i| {
            let x1 = p1[i];
            let x2 = p2[i];
            let min = f32::min(x1, x2);
            let max = f32::max(x1, x2);
            let d = max - min;
            let lower = min - alpha * d;
            let upper = max + alpha * d;
            rng.random_range(lower..=upper).clamp(-limit, limit)
        },
        p1.len(),
    )
}

/// Applies Gaussian mutation in place, clamping results to `[-limit, limit]`.
pub fn mutate<R>(weights: &mut [f32], noise: &Normal<f32>, limit: f32, rate: f32, rng: &mut R)
where
    R: Rng + ?Sized,
{
    for w in weights {
        if rng.random_bool(rate.into()) {
            *w = (*w + rng.sample(noise)).clamp(-limit, limit);
        }
    }
}

/// Euclidean distance between two weight vectors of equal length.
///
/// # Panics
///
/// Panics if the vectors have different lengths.
#[must_use]
pub fn distance(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}
