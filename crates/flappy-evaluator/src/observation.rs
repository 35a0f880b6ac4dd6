//! Feature extraction: turning the shared world into one agent's observation.
//!
//! Every controller sees the world through the same six normalized numbers:
//!
//! | index | feature               | formula                                   | range     |
//! |-------|-----------------------|-------------------------------------------|-----------|
//! | 0     | horizontal distance   | `(pair.x - agent.x) / world_width`        | `[0, 1]`  |
//! | 1     | offset to top edge    | `(agent.y - gap_top) / world_height`      | `[-1, 1]` |
//! | 2     | offset to bottom edge | `(gap_bottom - agent.y) / world_height`   | `[-1, 1]` |
//! | 3     | velocity              | `agent.velocity / velocity_scale`         | `[-1, 1]` |
//! | 4     | height                | `agent.y / world_height`                  | `[0, 1]`  |
//! | 5     | gap center            | `gap_center / world_height`               | `[0, 1]`  |
//!
//! The pair used is the nearest one whose trailing edge is still ahead of the
//! agent. Pairs are scanned oldest first, so ties go to the earliest spawned pair.
//! With no such pair the observation is `(1, 0, 0, velocity, height, 0.5)`.
//!
//! Each component is clamped to its range; NaN inputs read as `0.0`.

use std::ops::RangeInclusive;

use flappy_engine::{Agent, ObstaclePair, WorldConfig};

/// Number of features in an [`Observation`].
pub const OBSERVATION_LEN: usize = 6;

const UNIT: RangeInclusive<f32> = 0.0..=1.0;
const SIGNED: RangeInclusive<f32> = -1.0..=1.0;

/// Fixed-length, normalized view of the world from one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation([f32; OBSERVATION_LEN]);

impl Observation {
    /// Declared range of each component, by index.
    pub const RANGES: [RangeInclusive<f32>; OBSERVATION_LEN] =
        [UNIT, SIGNED, SIGNED, SIGNED, UNIT, UNIT];

    /// Builds an observation, clamping every component into its declared range.
    #[must_use]
    pub fn new(values: [f32; OBSERVATION_LEN]) -> Self {
        let mut values = values;
        for (value, range) in values.iter_mut().zip(&Self::RANGES) {
            *value = if value.is_nan() {
                0.0
            } else {
                value.clamp(*range.start(), *range.end())
            };
        }
        Self(values)
    }

    #[must_use]
    pub const fn as_array(&self) -> &[f32; OBSERVATION_LEN] {
        &self.0
    }

    #[must_use]
    pub const fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub const fn horizontal_distance(&self) -> f32 {
        self.0[0]
    }

    #[must_use]
    pub const fn offset_to_top(&self) -> f32 {
        self.0[1]
    }

    #[must_use]
    pub const fn offset_to_bottom(&self) -> f32 {
        self.0[2]
    }

    #[must_use]
    pub const fn velocity(&self) -> f32 {
        self.0[3]
    }

    #[must_use]
    pub const fn height(&self) -> f32 {
        self.0[4]
    }

    #[must_use]
    pub const fn gap_center(&self) -> f32 {
        self.0[5]
    }
}

/// Returns the nearest pair whose trailing edge is still ahead of the agent.
///
/// `obstacles` must be in spawn order (oldest first), as yielded by
/// [`Simulator::obstacles`](flappy_engine::Simulator::obstacles).
pub fn nearest_pair_ahead<'a, I>(agent: &Agent, obstacles: I) -> Option<&'a ObstaclePair>
where
    I: IntoIterator<Item = &'a ObstaclePair>,
{
    obstacles
        .into_iter()
        .filter(|pair| pair.right() > agent.x())
        .fold(None, |nearest: Option<&ObstaclePair>, pair| match nearest {
            Some(best) if best.x() <= pair.x() => Some(best),
            _ => Some(pair),
        })
}

/// Maps world state to [`Observation`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureExtractor {
    world_width: f32,
    world_height: f32,
    velocity_scale: f32,
}

impl FeatureExtractor {
    /// Velocity that maps to `1.0` unless configured otherwise.
    pub const DEFAULT_VELOCITY_SCALE: f32 = 10.0;

    #[must_use]
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            world_width: config.width,
            world_height: config.height,
            velocity_scale: Self::DEFAULT_VELOCITY_SCALE,
        }
    }

    #[must_use]
    pub fn with_velocity_scale(self, velocity_scale: f32) -> Self {
        Self {
            velocity_scale,
            ..self
        }
    }

    /// Extracts the observation of `agent`; does not mutate anything.
    #[must_use]
    pub fn extract<'a, I>(&self, agent: &Agent, obstacles: I) -> Observation
    where
        I: IntoIterator<Item = &'a ObstaclePair>,
    {
        let velocity = agent.velocity() / self.velocity_scale;
        let height = agent.y() / self.world_height;
        let Some(pair) = nearest_pair_ahead(agent, obstacles) else {
            return Observation::new([1.0, 0.0, 0.0, velocity, height, 0.5]);
        };
        Observation::new([
            (pair.x() - agent.x()) / self.world_width,
            (agent.y() - pair.gap_top()) / self.world_height,
            (pair.gap_bottom() - agent.y()) / self.world_height,
            velocity,
            height,
            pair.gap_center() / self.world_height,
        ])
    }
}
